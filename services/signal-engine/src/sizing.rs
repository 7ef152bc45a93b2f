//! Position sizing
//!
//! `size = min(base * vol * risk * market * time, base)` where
//! `base = portfolio_value * max_position_size`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error};

use crate::config::RiskConfig;
use crate::regime::{MarketRegime, MarketRegimeClassifier};
use crate::state::RiskState;
use crate::types::{ensure_finite, EngineError, Result};

/// Lower bound on the time-decay factor
const MIN_TIME_FACTOR: f64 = 0.5;

/// Individual multipliers behind a computed size
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SizingFactors {
    pub base_size: f64,
    pub vol_factor: f64,
    pub risk_factor: f64,
    pub market_factor: f64,
    pub time_factor: f64,
}

/// Outcome of a sizing call
///
/// On failure `size` is 0 and `error` carries the cause.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionSizeResult {
    pub size: f64,
    pub regime: MarketRegime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub factors: Option<SizingFactors>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_error")]
    pub error: Option<EngineError>,
}

fn serialize_error<S: serde::Serializer>(
    error: &Option<EngineError>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match error {
        Some(e) => serializer.serialize_str(&e.to_string()),
        None => serializer.serialize_none(),
    }
}

impl PositionSizeResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Sigmoid volatility damping: 0.5 at volatility 0.5, never reaching zero
pub fn volatility_factor(volatility: f64) -> f64 {
    1.0 / (1.0 + (volatility - 0.5).exp())
}

/// Exponential confidence damping: 1 at full confidence, e^-2 at none
pub fn risk_factor(confidence: f64) -> f64 {
    (-2.0 * (1.0 - confidence)).exp()
}

/// Exponential decay over hours since the last sizing call, floored at 0.5
pub fn time_factor(hours_elapsed: f64) -> f64 {
    (-0.1 * hours_elapsed.max(0.0)).exp().max(MIN_TIME_FACTOR)
}

/// Computes dynamically scaled position sizes
#[derive(Debug, Clone, Copy, Default)]
pub struct PositionSizer {
    config: RiskConfig,
    classifier: MarketRegimeClassifier,
}

impl PositionSizer {
    pub fn new(config: RiskConfig) -> Self {
        Self {
            config,
            classifier: MarketRegimeClassifier,
        }
    }

    pub fn size_position(
        &self,
        portfolio_value: f64,
        volatility: f64,
        confidence: f64,
        state: &mut RiskState,
    ) -> PositionSizeResult {
        self.size_position_at(portfolio_value, volatility, confidence, state, Utc::now())
    }

    /// Size a position as of `now`, falling back to zero on any error
    pub fn size_position_at(
        &self,
        portfolio_value: f64,
        volatility: f64,
        confidence: f64,
        state: &mut RiskState,
        now: DateTime<Utc>,
    ) -> PositionSizeResult {
        match self.try_size_position_at(portfolio_value, volatility, confidence, state, now) {
            Ok((size, factors)) => PositionSizeResult {
                size,
                regime: state.market_regime(),
                factors: Some(factors),
                error: None,
            },
            Err(e) => {
                error!("Error calculating position size: {}", e);
                PositionSizeResult {
                    size: 0.0,
                    regime: state.market_regime(),
                    factors: None,
                    error: Some(e),
                }
            }
        }
    }

    /// Fallible sizing; state is only mutated when inputs are valid
    pub fn try_size_position_at(
        &self,
        portfolio_value: f64,
        volatility: f64,
        confidence: f64,
        state: &mut RiskState,
        now: DateTime<Utc>,
    ) -> Result<(f64, SizingFactors)> {
        let portfolio_value = ensure_finite("portfolio_value", portfolio_value)?;
        if portfolio_value <= 0.0 {
            return Err(EngineError::InvalidInput(format!(
                "portfolio value must be positive, got {}",
                portfolio_value
            )));
        }
        let volatility = ensure_finite("volatility", volatility)?;
        if volatility < 0.0 {
            return Err(EngineError::InvalidInput(format!(
                "volatility must be non-negative, got {}",
                volatility
            )));
        }
        let confidence = ensure_finite("confidence", confidence)?.clamp(0.0, 1.0);

        let base_size = portfolio_value * self.config.max_position_size;
        let vol_factor = volatility_factor(volatility);
        let risk_factor = risk_factor(confidence);

        let assessment = self.classifier.classify(state.position_history());
        state.set_market_regime(assessment.regime);

        let hours = (now - state.last_update_time()).num_milliseconds() as f64 / 3_600_000.0;
        let time_factor = time_factor(hours);
        state.touch(now);

        let raw = base_size * vol_factor * risk_factor * assessment.market_factor * time_factor;
        let size = ensure_finite("position_size", raw)?.min(base_size).max(0.0);
        state.record_position(size / portfolio_value);

        debug!(
            "Position size {:.2} (base {:.2}, vol {:.3}, risk {:.3}, market {:.2}, time {:.3}, \
             regime {})",
            size,
            base_size,
            vol_factor,
            risk_factor,
            assessment.market_factor,
            time_factor,
            assessment.regime
        );

        Ok((
            size,
            SizingFactors {
                base_size,
                vol_factor,
                risk_factor,
                market_factor: assessment.market_factor,
                time_factor,
            },
        ))
    }
}
