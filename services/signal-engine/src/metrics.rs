//! Risk metrics snapshot

use serde::Serialize;

use crate::config::RiskConfig;
use crate::regime::MarketRegime;
use crate::state::RiskState;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskMetrics {
    pub regime: MarketRegime,
    /// Latest drawdown entry, 0 with no history
    pub current_drawdown: f64,
    /// Largest drawdown still in the capped history
    pub max_historical_drawdown: f64,
    /// Latest position fraction relative to `max_position_size`
    pub position_utilization: f64,
}

pub fn get_risk_metrics(state: &RiskState, config: &RiskConfig) -> RiskMetrics {
    let drawdowns = state.drawdown_history();
    let current_drawdown = drawdowns.back().copied().unwrap_or(0.0);
    let max_historical_drawdown = drawdowns.iter().copied().fold(0.0, f64::max);
    let position_utilization = match state.position_history().last() {
        Some(fraction) if config.max_position_size > 0.0 => fraction / config.max_position_size,
        _ => 0.0,
    };

    RiskMetrics {
        regime: state.market_regime(),
        current_drawdown,
        max_historical_drawdown,
        position_utilization,
    }
}
