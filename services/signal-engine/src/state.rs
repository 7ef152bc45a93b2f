//! Risk State - the engine's only long-lived mutable data
//!
//! One `RiskState` per symbol (or per portfolio). Every call takes it by
//! `&mut`, so concurrent use needs one instance per thread or external
//! serialization; there is no internal locking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, warn};

use crate::regime::MarketRegime;

/// Drawdown history keeps only this many most recent entries
pub const DRAWDOWN_HISTORY_CAP: usize = 100;

/// Rolling risk history for one symbol or portfolio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskState {
    /// Realized position sizes as fractions of portfolio value, oldest first
    position_history: Vec<f64>,
    /// Optional cap on `position_history`; `None` keeps every entry
    position_history_limit: Option<usize>,
    /// Realized drawdown fractions, oldest first, FIFO beyond the cap
    drawdown_history: VecDeque<f64>,
    /// Regime from the latest sizing call
    market_regime: MarketRegime,
    /// Reference point for time decay
    last_update_time: DateTime<Utc>,
}

impl Default for RiskState {
    fn default() -> Self {
        Self::new()
    }
}

impl RiskState {
    pub fn new() -> Self {
        Self::new_at(Utc::now())
    }

    /// State whose time-decay clock starts at `now`
    pub fn new_at(now: DateTime<Utc>) -> Self {
        Self {
            position_history: Vec::new(),
            position_history_limit: None,
            drawdown_history: VecDeque::with_capacity(DRAWDOWN_HISTORY_CAP),
            market_regime: MarketRegime::Neutral,
            last_update_time: now,
        }
    }

    pub fn with_position_history_limit(mut self, limit: Option<usize>) -> Self {
        self.position_history_limit = limit;
        self.trim_positions();
        self
    }

    pub fn position_history(&self) -> &[f64] {
        &self.position_history
    }

    pub fn drawdown_history(&self) -> &VecDeque<f64> {
        &self.drawdown_history
    }

    pub fn market_regime(&self) -> MarketRegime {
        self.market_regime
    }

    pub fn last_update_time(&self) -> DateTime<Utc> {
        self.last_update_time
    }

    /// Append a realized position fraction
    pub fn record_position(&mut self, fraction: f64) {
        self.position_history.push(fraction);
        self.trim_positions();
    }

    fn trim_positions(&mut self) {
        if let Some(limit) = self.position_history_limit {
            if self.position_history.len() > limit {
                let excess = self.position_history.len() - limit;
                self.position_history.drain(..excess);
            }
        }
    }

    /// Append a drawdown fraction, evicting the oldest beyond the cap
    ///
    /// Returns false for non-finite values, which are dropped.
    pub fn record_drawdown(&mut self, drawdown: f64) -> bool {
        if !drawdown.is_finite() {
            warn!("Ignoring non-finite drawdown: {}", drawdown);
            return false;
        }
        self.drawdown_history.push_back(drawdown);
        while self.drawdown_history.len() > DRAWDOWN_HISTORY_CAP {
            self.drawdown_history.pop_front();
        }
        true
    }

    /// Record the latest bar's loss from a close series
    ///
    /// Uses the last simple return; gains record a drawdown of zero.
    /// Returns false when fewer than two closes are given or the previous
    /// close is not positive.
    pub fn update_from_closes(&mut self, closes: &[f64]) -> bool {
        if closes.len() < 2 {
            debug!("Not enough closes to update drawdown: {}", closes.len());
            return false;
        }
        let prev = closes[closes.len() - 2];
        let last = closes[closes.len() - 1];
        if prev.is_nan() || prev <= 0.0 || !last.is_finite() {
            warn!("Cannot compute return from closes {} -> {}", prev, last);
            return false;
        }
        let ret = (last - prev) / prev;
        self.record_drawdown((-ret).max(0.0))
    }

    /// Mean of the last `n` drawdown entries, `None` when history is empty
    pub fn recent_drawdown_mean(&self, n: usize) -> Option<f64> {
        if self.drawdown_history.is_empty() || n == 0 {
            return None;
        }
        let take = n.min(self.drawdown_history.len());
        let sum: f64 = self.drawdown_history.iter().rev().take(take).sum();
        Some(sum / take as f64)
    }

    /// Sum of the last `n` drawdown entries, `None` with fewer than `n` entries
    pub fn recent_drawdown_sum(&self, n: usize) -> Option<f64> {
        if self.drawdown_history.len() < n {
            return None;
        }
        Some(self.drawdown_history.iter().rev().take(n).sum())
    }

    pub(crate) fn set_market_regime(&mut self, regime: MarketRegime) {
        if regime != self.market_regime {
            debug!("Market regime: {} -> {}", self.market_regime, regime);
        }
        self.market_regime = regime;
    }

    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.last_update_time = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drawdown_fifo_eviction() {
        let mut state = RiskState::new();
        for i in 0..101 {
            assert!(state.record_drawdown(i as f64 / 1000.0));
        }
        assert_eq!(state.drawdown_history().len(), DRAWDOWN_HISTORY_CAP);
        let expected: Vec<f64> = (1..101).map(|i| i as f64 / 1000.0).collect();
        let actual: Vec<f64> = state.drawdown_history().iter().copied().collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_non_finite_drawdown_dropped() {
        let mut state = RiskState::new();
        assert!(!state.record_drawdown(f64::NAN));
        assert!(state.drawdown_history().is_empty());
    }

    #[test]
    fn test_recent_drawdown_mean_uses_last_five() {
        let mut state = RiskState::new();
        assert_eq!(state.recent_drawdown_mean(5), None);

        for dd in [0.5, 0.01, 0.01, 0.02, 0.02, 0.04] {
            state.record_drawdown(dd);
        }
        let mean = state.recent_drawdown_mean(5).unwrap();
        assert!((mean - 0.02).abs() < 1e-12);

        // Fewer entries than the window: mean of what exists
        let mut short = RiskState::new();
        short.record_drawdown(0.03);
        assert_eq!(short.recent_drawdown_mean(5), Some(0.03));
    }

    #[test]
    fn test_update_from_closes() {
        let mut state = RiskState::new();
        assert!(!state.update_from_closes(&[100.0]));
        assert!(!state.update_from_closes(&[0.0, 100.0]));

        assert!(state.update_from_closes(&[100.0, 98.0]));
        assert!(state.update_from_closes(&[98.0, 99.0]));
        let history: Vec<f64> = state.drawdown_history().iter().copied().collect();
        assert!((history[0] - 0.02).abs() < 1e-12);
        assert_eq!(history[1], 0.0);
    }

    #[test]
    fn test_position_history_unbounded_by_default() {
        let mut state = RiskState::new();
        for _ in 0..500 {
            state.record_position(0.05);
        }
        assert_eq!(state.position_history().len(), 500);
    }

    #[test]
    fn test_position_history_limit() {
        let mut state = RiskState::new().with_position_history_limit(Some(3));
        for i in 0..5 {
            state.record_position(i as f64);
        }
        assert_eq!(state.position_history(), &[2.0, 3.0, 4.0]);
    }
}
