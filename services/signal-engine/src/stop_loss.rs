//! Stop-loss placement
//!
//! Distance is the larger of a volatility-scaled percentage of entry and an
//! ATR multiple, widened by 1.2 in a volatile regime.

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::RiskConfig;
use crate::regime::MarketRegime;
use crate::signal::PositionSide;
use crate::state::RiskState;
use crate::types::{ensure_finite, EngineError, Result};

/// Position-history entries used for the fallback ATR
pub const ATR_LOOKBACK: usize = 14;

/// Reference volatility for percentage scaling
const REFERENCE_VOLATILITY: f64 = 0.02;

const VOLATILE_WIDENING: f64 = 1.2;

/// Which candidate distance set the stop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopMethod {
    Percentage,
    Atr,
}

/// Computed stop level
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StopLoss {
    pub price: f64,
    pub distance: f64,
    pub method: StopMethod,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StopLossCalculator {
    config: RiskConfig,
}

impl StopLossCalculator {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    /// Stop price, or `None` when no stop can be placed
    pub fn compute_stop_loss(
        &self,
        entry_price: f64,
        side: PositionSide,
        volatility: Option<f64>,
        atr: Option<f64>,
        state: &RiskState,
    ) -> Option<f64> {
        match self.try_compute(entry_price, side, volatility, atr, state) {
            Ok(stop) => Some(stop.price),
            Err(e) => {
                warn!("No stop computed: {}", e);
                None
            }
        }
    }

    pub fn try_compute(
        &self,
        entry_price: f64,
        side: PositionSide,
        volatility: Option<f64>,
        atr: Option<f64>,
        state: &RiskState,
    ) -> Result<StopLoss> {
        let entry_price = ensure_finite("entry_price", entry_price)?;
        if entry_price <= 0.0 {
            return Err(EngineError::InvalidInput(format!(
                "entry price must be positive, got {}",
                entry_price
            )));
        }

        let pct_distance = self.percentage_distance(entry_price, volatility)?;
        let regime = state.market_regime();
        let atr_distance = atr_distance(entry_price, atr, regime, state, &self.config)?;

        let (mut distance, method) = if atr_distance > pct_distance {
            (atr_distance, StopMethod::Atr)
        } else {
            (pct_distance, StopMethod::Percentage)
        };
        if regime == MarketRegime::Volatile {
            distance *= VOLATILE_WIDENING;
        }

        let price = match side {
            PositionSide::Long => entry_price - distance,
            PositionSide::Short => entry_price + distance,
        };
        debug!(
            "Stop for {:?} at {:.4}: {:.4} (distance {:.4}, {:?}, regime {})",
            side, entry_price, price, distance, method, regime
        );

        Ok(StopLoss {
            price,
            distance,
            method,
        })
    }

    fn percentage_distance(&self, entry_price: f64, volatility: Option<f64>) -> Result<f64> {
        let base = entry_price * self.config.base_stop_fraction;
        match volatility {
            None => Ok(base),
            Some(v) => {
                let v = ensure_finite("volatility", v)?;
                if v < 0.0 {
                    return Err(EngineError::InvalidInput(format!(
                        "volatility must be non-negative, got {}",
                        v
                    )));
                }
                Ok(base * (v / REFERENCE_VOLATILITY).clamp(0.5, 2.0))
            }
        }
    }
}

/// ATR multiple: supplied ATR in price units, else history-derived fraction of entry
fn atr_distance(
    entry_price: f64,
    atr: Option<f64>,
    regime: MarketRegime,
    state: &RiskState,
    config: &RiskConfig,
) -> Result<f64> {
    let multiplier = if regime == MarketRegime::Trending { 2.0 } else { 1.5 };
    let atr = match atr {
        Some(a) => {
            let a = ensure_finite("atr", a)?;
            if a < 0.0 {
                return Err(EngineError::InvalidInput(format!(
                    "atr must be non-negative, got {}",
                    a
                )));
            }
            a
        }
        None => history_atr(state.position_history(), config.base_stop_fraction) * entry_price,
    };
    Ok(atr * multiplier)
}

/// Mean absolute first difference of the last [`ATR_LOOKBACK`] position fractions
///
/// Falls back to `default_fraction` with too little history.
pub fn history_atr(position_history: &[f64], default_fraction: f64) -> f64 {
    if position_history.len() < ATR_LOOKBACK {
        return default_fraction;
    }
    let window = &position_history[position_history.len() - ATR_LOOKBACK..];
    let total: f64 = window.windows(2).map(|w| (w[1] - w[0]).abs()).sum();
    total / (ATR_LOOKBACK - 1) as f64
}
