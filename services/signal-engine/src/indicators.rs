//! Indicator snapshots - precomputed technical values for one evaluation cycle

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{EngineError, Result};

/// Well-known indicator names
pub mod names {
    pub const SMA_20: &str = "sma_20";
    pub const SMA_50: &str = "sma_50";
    pub const RSI: &str = "rsi";
    pub const MACD: &str = "macd";
    pub const MACD_SIGNAL: &str = "macd_signal";
    pub const ATR: &str = "atr";
    pub const VOLATILITY: &str = "volatility";
    pub const CLOSE: &str = "close";
    /// Average traded volume; enables the liquidity assessment when present
    pub const AVG_VOLUME: &str = "avg_volume";
}

/// Immutable snapshot of named indicator values
///
/// Produced once per cycle by the indicator collaborator. Missing names are
/// reported as `MissingData`, never defaulted here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndicatorSet {
    values: BTreeMap<String, f64>,
}

impl IndicatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, used when assembling a snapshot
    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.values.insert(name.to_string(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Value that must be present and finite
    pub fn require(&self, name: &str) -> Result<f64> {
        match self.values.get(name) {
            Some(v) if v.is_finite() => Ok(*v),
            Some(v) => Err(EngineError::MissingData(format!(
                "indicator '{}' is not finite: {}",
                name, v
            ))),
            None => Err(EngineError::missing(name)),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl FromIterator<(String, f64)> for IndicatorSet {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
