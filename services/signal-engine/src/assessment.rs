//! Pre-trade risk scoring from volatility and liquidity

use serde::Serialize;
use tracing::{debug, warn};

use crate::types::{ensure_finite, EngineError, Result};

/// Daily dollar volume below which a market counts as illiquid
pub const LIQUIDITY_THRESHOLD: f64 = 1_000_000.0;

/// Trades scoring at or above this are not taken
pub const MAX_RISK_SCORE: f64 = 0.8;

const BASE_SCORE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TradeRiskAssessment {
    /// 0.5 baseline, 1.0 worst
    pub risk_score: f64,
    pub recommended_size: f64,
}

impl TradeRiskAssessment {
    pub fn is_acceptable(&self) -> bool {
        self.risk_score < MAX_RISK_SCORE
    }

    fn worst() -> Self {
        Self {
            risk_score: 1.0,
            recommended_size: 0.0,
        }
    }
}

/// Score a proposed trade and shrink its size by the score
pub fn assess_trade_risk(
    volatility: f64,
    avg_volume: f64,
    price: f64,
    proposed_size: f64,
) -> TradeRiskAssessment {
    match try_assess_trade_risk(volatility, avg_volume, price, proposed_size) {
        Ok(assessment) => assessment,
        Err(e) => {
            warn!("Trade risk assessment failed: {}", e);
            TradeRiskAssessment::worst()
        }
    }
}

pub fn try_assess_trade_risk(
    volatility: f64,
    avg_volume: f64,
    price: f64,
    proposed_size: f64,
) -> Result<TradeRiskAssessment> {
    let volatility = ensure_finite("volatility", volatility)?;
    let avg_volume = ensure_finite("avg_volume", avg_volume)?;
    let price = ensure_finite("price", price)?;
    let proposed_size = ensure_finite("proposed_size", proposed_size)?;
    if volatility < 0.0 || avg_volume < 0.0 || price <= 0.0 || proposed_size < 0.0 {
        return Err(EngineError::InvalidInput(format!(
            "volatility {}, volume {}, price {}, size {}",
            volatility, avg_volume, price, proposed_size
        )));
    }

    let mut score = BASE_SCORE;
    if volatility > 0.02 {
        score += 0.2;
        if volatility > 0.05 {
            score += 0.3;
        }
    }
    if avg_volume * price < LIQUIDITY_THRESHOLD {
        score += 0.2;
    }
    let risk_score = score.min(1.0);
    let recommended_size = proposed_size * (1.0 - risk_score);

    debug!("Trade risk score {:.2}, recommended size {:.2}", risk_score, recommended_size);
    Ok(TradeRiskAssessment {
        risk_score,
        recommended_size,
    })
}
