//! Trade validation against hard risk limits
//!
//! Checks run in a fixed order and stop at the first failure:
//! 1. position size cap
//! 2. potential loss vs. max drawdown
//! 3. tighter size cap in a volatile regime
//! 4. recent drawdown level
//! 5. cumulative risk (optional, `risk.cumulative_risk_check`)

use serde::{Serialize, Serializer};
use std::fmt;
use tracing::{debug, error, info};

use crate::config::RiskConfig;
use crate::regime::MarketRegime;
use crate::state::RiskState;
use crate::types::{ensure_finite, EngineError, Result};

/// Drawdown entries averaged by the recent-drawdown check
pub const RECENT_DRAWDOWN_WINDOW: usize = 5;

const VOLATILE_SIZE_SCALE: f64 = 0.7;
const RECENT_DRAWDOWN_SCALE: f64 = 0.8;
const CUMULATIVE_RISK_SCALE: f64 = 2.0;

/// Why a trade was accepted or rejected
///
/// The display strings are stable and safe to match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationReason {
    Validated,
    ExceedsMaxPosition,
    ExceedsMaxDrawdown,
    TooLargeForVolatileMarket,
    RecentDrawdownTooHigh,
    CumulativeRiskTooHigh,
    ValidationError,
    NoStopComputed,
    NoPositionSize,
    TradeRiskTooHigh,
}

impl ValidationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationReason::Validated => "trade validated",
            ValidationReason::ExceedsMaxPosition => "position size exceeds maximum allowed",
            ValidationReason::ExceedsMaxDrawdown => "potential loss exceeds maximum drawdown",
            ValidationReason::TooLargeForVolatileMarket => {
                "position size too large for volatile market"
            }
            ValidationReason::RecentDrawdownTooHigh => "recent drawdown too high",
            ValidationReason::CumulativeRiskTooHigh => "cumulative risk too high",
            ValidationReason::ValidationError => "validation error",
            ValidationReason::NoStopComputed => "no stop computed",
            ValidationReason::NoPositionSize => "no position size computed",
            ValidationReason::TradeRiskTooHigh => "trade risk too high",
        }
    }
}

impl fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ValidationReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValidationResult {
    pub accepted: bool,
    pub reason: ValidationReason,
}

impl ValidationResult {
    pub fn accept() -> Self {
        Self {
            accepted: true,
            reason: ValidationReason::Validated,
        }
    }

    pub fn reject(reason: ValidationReason) -> Self {
        Self {
            accepted: false,
            reason,
        }
    }
}

/// Accepts or rejects fully specified trades; never mutates state
#[derive(Debug, Clone, Copy, Default)]
pub struct TradeValidator {
    config: RiskConfig,
}

impl TradeValidator {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn validate_trade(
        &self,
        portfolio_value: f64,
        position_size: f64,
        stop_loss_price: f64,
        entry_price: f64,
        state: &RiskState,
    ) -> ValidationResult {
        let result = match self.run_checks(
            portfolio_value,
            position_size,
            stop_loss_price,
            entry_price,
            state,
        ) {
            Ok(None) => ValidationResult::accept(),
            Ok(Some(reason)) => ValidationResult::reject(reason),
            Err(e) => {
                error!("Error validating trade: {}", e);
                ValidationResult::reject(ValidationReason::ValidationError)
            }
        };

        if result.accepted {
            debug!("Trade validated: size {:.2} of {:.2}", position_size, portfolio_value);
        } else {
            info!("Trade rejected: {}", result.reason);
        }
        result
    }

    /// `Ok(None)` when every check passes, `Ok(Some(reason))` on the first failure
    fn run_checks(
        &self,
        portfolio_value: f64,
        position_size: f64,
        stop_loss_price: f64,
        entry_price: f64,
        state: &RiskState,
    ) -> Result<Option<ValidationReason>> {
        let portfolio_value = ensure_finite("portfolio_value", portfolio_value)?;
        let max_size = portfolio_value * self.config.max_position_size;

        // Infinite sizes are oversize, not malformed
        if position_size > max_size {
            return Ok(Some(ValidationReason::ExceedsMaxPosition));
        }
        let position_size = ensure_finite("position_size", position_size)?;

        if portfolio_value <= 0.0 || position_size < 0.0 {
            return Err(EngineError::InvalidInput(format!(
                "portfolio value {} and position size {} must be positive",
                portfolio_value, position_size
            )));
        }
        let entry_price = ensure_finite("entry_price", entry_price)?;
        let stop_loss_price = ensure_finite("stop_loss_price", stop_loss_price)?;
        if entry_price <= 0.0 {
            return Err(EngineError::InvalidInput(format!(
                "entry price must be positive, got {}",
                entry_price
            )));
        }

        let loss = potential_loss(entry_price, stop_loss_price, position_size);
        if loss > portfolio_value * self.config.max_drawdown {
            return Ok(Some(ValidationReason::ExceedsMaxDrawdown));
        }

        if state.market_regime() == MarketRegime::Volatile
            && position_size > max_size * VOLATILE_SIZE_SCALE
        {
            return Ok(Some(ValidationReason::TooLargeForVolatileMarket));
        }

        if let Some(recent) = state.recent_drawdown_mean(RECENT_DRAWDOWN_WINDOW) {
            if recent > self.config.max_drawdown * RECENT_DRAWDOWN_SCALE {
                return Ok(Some(ValidationReason::RecentDrawdownTooHigh));
            }
        }

        if self.config.cumulative_risk_check
            && self.exceeds_cumulative_risk(loss, portfolio_value, state)
        {
            return Ok(Some(ValidationReason::CumulativeRiskTooHigh));
        }

        Ok(None)
    }

    /// True when recent drawdown plus this trade's loss exceeds twice the limit
    ///
    /// Needs at least five drawdown entries; invalid input counts as exceeding.
    pub fn exceeds_cumulative_risk(
        &self,
        potential_loss: f64,
        portfolio_value: f64,
        state: &RiskState,
    ) -> bool {
        if !potential_loss.is_finite() || !portfolio_value.is_finite() || portfolio_value <= 0.0 {
            error!(
                "Cannot check cumulative risk (loss {}, portfolio {}), rejecting",
                potential_loss, portfolio_value
            );
            return true;
        }
        match state.recent_drawdown_sum(RECENT_DRAWDOWN_WINDOW) {
            Some(recent) => {
                recent + potential_loss / portfolio_value
                    > self.config.max_drawdown * CUMULATIVE_RISK_SCALE
            }
            None => false,
        }
    }
}

/// Loss if the stop is hit: `|entry - stop| * size / entry`
pub fn potential_loss(entry_price: f64, stop_loss_price: f64, position_size: f64) -> f64 {
    (entry_price - stop_loss_price).abs() * position_size / entry_price
}
