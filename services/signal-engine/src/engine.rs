//! Decision Engine - one evaluation cycle per symbol
//!
//! indicators -> technical vote -> fusion with the model signal -> sizing
//! and stop placement -> validation -> trade decision.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::assessment::assess_trade_risk;
use crate::config::EngineConfig;
use crate::fusion::{FusionOutcome, SignalFusionPolicy};
use crate::indicators::{names, IndicatorSet};
use crate::metrics::{get_risk_metrics, RiskMetrics};
use crate::model::{FeatureVector, ModelSignalProvider};
use crate::regime::MarketRegime;
use crate::signal::{PositionSide, Signal, SignalStrength};
use crate::sizing::PositionSizer;
use crate::state::RiskState;
use crate::stop_loss::StopLossCalculator;
use crate::technical::TechnicalSignalRule;
use crate::validator::{TradeValidator, ValidationReason};

/// Decimal places kept on notional and stop price
pub const PRICE_DP: u32 = 8;

/// Fully specified trade handed to the execution side
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeProposal {
    pub id: uuid::Uuid,
    pub symbol: String,
    pub side: PositionSide,
    pub entry_price: f64,
    /// Position size in portfolio currency
    pub position_size: f64,
    /// `None` when no stop could be placed
    pub stop_loss: Option<f64>,
    pub notional: Decimal,
    pub stop_price: Option<Decimal>,
    pub regime: MarketRegime,
    pub fusion: FusionOutcome,
    pub strength: SignalStrength,
    pub created_at: DateTime<Utc>,
}

impl TradeProposal {
    /// Units of the instrument at the entry price
    pub fn quantity(&self) -> f64 {
        self.position_size / self.entry_price
    }
}

/// Outcome of one evaluation cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum TradeDecision {
    /// Fused signal is neutral or the cycle lacks what a trade needs
    Hold {
        symbol: String,
        fusion: FusionOutcome,
    },
    Approved {
        proposal: TradeProposal,
    },
    Rejected {
        proposal: TradeProposal,
        reason: ValidationReason,
    },
}

impl TradeDecision {
    pub fn is_approved(&self) -> bool {
        matches!(self, TradeDecision::Approved { .. })
    }

    pub fn proposal(&self) -> Option<&TradeProposal> {
        match self {
            TradeDecision::Hold { .. } => None,
            TradeDecision::Approved { proposal } | TradeDecision::Rejected { proposal, .. } => {
                Some(proposal)
            }
        }
    }

    pub fn fusion(&self) -> &FusionOutcome {
        match self {
            TradeDecision::Hold { fusion, .. } => fusion,
            TradeDecision::Approved { proposal } | TradeDecision::Rejected { proposal, .. } => {
                &proposal.fusion
            }
        }
    }
}

/// Runs decision cycles and owns one [`RiskState`] per symbol
pub struct DecisionEngine {
    config: EngineConfig,
    technical: TechnicalSignalRule,
    fusion: SignalFusionPolicy,
    sizer: PositionSizer,
    stops: StopLossCalculator,
    validator: TradeValidator,
    states: HashMap<String, RiskState>,
}

impl DecisionEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            technical: TechnicalSignalRule::new(config.technical),
            fusion: SignalFusionPolicy::new(config.fusion),
            sizer: PositionSizer::new(config.risk),
            stops: StopLossCalculator::new(config.risk),
            validator: TradeValidator::new(config.risk),
            states: HashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self, symbol: &str) -> Option<&RiskState> {
        self.states.get(symbol)
    }

    /// Symbols with risk state, sorted
    pub fn symbols(&self) -> Vec<&str> {
        let mut symbols: Vec<&str> = self.states.keys().map(String::as_str).collect();
        symbols.sort_unstable();
        symbols
    }

    fn state_entry(&mut self, symbol: &str) -> &mut RiskState {
        let limit = self.config.risk.position_history_limit;
        self.states.entry(symbol.to_string()).or_insert_with(|| {
            debug!("Creating risk state for {}", symbol);
            RiskState::new().with_position_history_limit(limit)
        })
    }

    /// Feed a close series into the symbol's drawdown history
    pub fn update_market_data(&mut self, symbol: &str, closes: &[f64]) -> bool {
        self.state_entry(symbol).update_from_closes(closes)
    }

    pub fn record_drawdown(&mut self, symbol: &str, drawdown: f64) -> bool {
        self.state_entry(symbol).record_drawdown(drawdown)
    }

    pub fn risk_metrics(&self, symbol: &str) -> Option<RiskMetrics> {
        self.states
            .get(symbol)
            .map(|state| get_risk_metrics(state, &self.config.risk))
    }

    pub fn evaluate(
        &mut self,
        symbol: &str,
        indicators: &IndicatorSet,
        portfolio_value: f64,
        provider: &dyn ModelSignalProvider,
    ) -> TradeDecision {
        self.evaluate_at(symbol, indicators, portfolio_value, provider, Utc::now())
    }

    pub fn evaluate_at(
        &mut self,
        symbol: &str,
        indicators: &IndicatorSet,
        portfolio_value: f64,
        provider: &dyn ModelSignalProvider,
        now: DateTime<Utc>,
    ) -> TradeDecision {
        let technical = self.technical.vote(indicators);
        let fusion = match FeatureVector::from_indicators(indicators) {
            Ok(features) => self.fusion.evaluate(provider, &features, technical),
            Err(e) => {
                warn!("{}: no model features ({}), using technical vote", symbol, e);
                FusionOutcome {
                    model_signal: Signal::Neutral,
                    technical_signal: technical,
                    confidence: 0.0,
                    fused: technical,
                }
            }
        };

        let hold = |fusion: FusionOutcome| TradeDecision::Hold {
            symbol: symbol.to_string(),
            fusion,
        };

        let Some(side) = fusion.fused.side() else {
            debug!("{}: neutral signal, holding", symbol);
            return hold(fusion);
        };
        let (entry_price, volatility) = match (
            indicators.require(names::CLOSE),
            indicators.require(names::VOLATILITY),
        ) {
            (Ok(close), Ok(vol)) => (close, vol),
            (Err(e), _) | (_, Err(e)) => {
                warn!("{}: cannot build a trade ({}), holding", symbol, e);
                return hold(fusion);
            }
        };
        let atr = indicators.get(names::ATR);

        let sizer = self.sizer;
        let stops = self.stops;
        let validator = self.validator;
        let state = self.state_entry(symbol);

        let sized =
            sizer.size_position_at(portfolio_value, volatility, fusion.confidence, state, now);
        let mut position_size = sized.size;
        let mut rejection = if !sized.is_ok() || sized.size <= 0.0 {
            Some(ValidationReason::NoPositionSize)
        } else {
            None
        };
        if rejection.is_none() {
            if let Some(avg_volume) = indicators.get(names::AVG_VOLUME) {
                let assessment =
                    assess_trade_risk(volatility, avg_volume, entry_price, position_size);
                if assessment.is_acceptable() {
                    position_size = assessment.recommended_size;
                } else {
                    rejection = Some(ValidationReason::TradeRiskTooHigh);
                }
            }
        }
        let stop = stops.compute_stop_loss(entry_price, side, Some(volatility), atr, state);

        let proposal = TradeProposal {
            id: uuid::Uuid::new_v4(),
            symbol: symbol.to_string(),
            side,
            entry_price,
            position_size,
            stop_loss: stop,
            notional: to_decimal(position_size).unwrap_or(Decimal::ZERO),
            stop_price: stop.and_then(to_decimal),
            regime: sized.regime,
            fusion,
            strength: SignalStrength::from_confidence(fusion.confidence),
            created_at: now,
        };

        let decision = match (rejection, stop) {
            (Some(reason), _) => TradeDecision::Rejected { proposal, reason },
            (None, None) => TradeDecision::Rejected {
                proposal,
                reason: ValidationReason::NoStopComputed,
            },
            (None, Some(stop_price)) => {
                let result = validator.validate_trade(
                    portfolio_value,
                    position_size,
                    stop_price,
                    entry_price,
                    state,
                );
                if result.accepted {
                    TradeDecision::Approved { proposal }
                } else {
                    TradeDecision::Rejected {
                        proposal,
                        reason: result.reason,
                    }
                }
            }
        };

        match &decision {
            TradeDecision::Approved { proposal } => info!(
                "{}: approved {:?} {:.6} units ({}) @ {:.4}, stop {:?}, {:?}",
                symbol,
                proposal.side,
                proposal.quantity(),
                proposal.notional,
                proposal.entry_price,
                proposal.stop_price,
                proposal.strength
            ),
            TradeDecision::Rejected { reason, .. } => info!("{}: rejected, {}", symbol, reason),
            TradeDecision::Hold { .. } => {}
        }
        decision
    }
}

/// Round to [`PRICE_DP`] places; `None` for non-finite input
fn to_decimal(value: f64) -> Option<Decimal> {
    Decimal::from_f64_retain(value).map(|d| d.round_dp(PRICE_DP))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelPrediction;

    fn bullish_indicators() -> IndicatorSet {
        IndicatorSet::new()
            .with(names::SMA_20, 105.0)
            .with(names::SMA_50, 100.0)
            .with(names::RSI, 55.0)
            .with(names::MACD, 1.2)
            .with(names::MACD_SIGNAL, 0.8)
            .with(names::VOLATILITY, 0.02)
            .with(names::ATR, 1.0)
            .with(names::CLOSE, 100.0)
    }

    #[test]
    fn test_neutral_signal_holds() {
        let mut engine = DecisionEngine::new(EngineConfig::default());
        let indicators = bullish_indicators().with(names::SMA_20, 100.0).with(names::MACD, 0.8);
        let decision = engine.evaluate("BTC", &indicators, 100_000.0, &ModelPrediction::neutral());
        assert!(matches!(decision, TradeDecision::Hold { .. }));
        // Holding does not create state
        assert!(engine.state("BTC").is_none());
    }

    #[test]
    fn test_agreeing_signals_approved() {
        let mut engine = DecisionEngine::new(EngineConfig::default());
        let provider = ModelPrediction::new(Signal::Long, 0.9);
        let decision = engine.evaluate("BTC", &bullish_indicators(), 100_000.0, &provider);

        assert!(decision.is_approved());
        let proposal = decision.proposal().unwrap();
        assert_eq!(proposal.side, PositionSide::Long);
        assert!(proposal.position_size > 0.0);
        assert!(proposal.position_size <= 10_000.0);
        assert!(proposal.stop_loss.unwrap() < 100.0);
        assert!(proposal.notional.scale() <= PRICE_DP);
        assert_eq!(proposal.strength, SignalStrength::VeryStrong);
        assert!((proposal.quantity() - proposal.position_size / 100.0).abs() < 1e-12);
        assert_eq!(engine.state("BTC").unwrap().position_history().len(), 1);
    }

    #[test]
    fn test_high_confidence_model_overrides_technical() {
        let mut engine = DecisionEngine::new(EngineConfig::default());
        let provider = ModelPrediction::new(Signal::Short, 0.95);
        let decision = engine.evaluate("ETH", &bullish_indicators(), 100_000.0, &provider);

        assert_eq!(decision.fusion().technical_signal, Signal::Long);
        assert_eq!(decision.fusion().fused, Signal::Short);
        let proposal = decision.proposal().unwrap();
        assert_eq!(proposal.side, PositionSide::Short);
        assert!(proposal.stop_loss.unwrap() > 100.0);
    }

    #[test]
    fn test_invalid_entry_rejected_without_stop() {
        let mut engine = DecisionEngine::new(EngineConfig::default());
        let indicators = bullish_indicators().with(names::CLOSE, 0.0);
        let provider = ModelPrediction::new(Signal::Long, 0.9);
        let decision = engine.evaluate("SOL", &indicators, 100_000.0, &provider);

        match decision {
            TradeDecision::Rejected { proposal, reason } => {
                assert_eq!(reason.to_string(), "no stop computed");
                assert!(proposal.stop_loss.is_none());
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_recent_drawdown_blocks_trades() {
        let mut engine = DecisionEngine::new(EngineConfig::default());
        for _ in 0..5 {
            engine.record_drawdown("BTC", 0.05);
        }
        let provider = ModelPrediction::new(Signal::Long, 0.9);
        let decision = engine.evaluate("BTC", &bullish_indicators(), 100_000.0, &provider);
        match decision {
            TradeDecision::Rejected { reason, .. } => {
                assert_eq!(reason, ValidationReason::RecentDrawdownTooHigh)
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_states_are_per_symbol() {
        let mut engine = DecisionEngine::new(EngineConfig::default());
        let provider = ModelPrediction::new(Signal::Long, 0.9);
        engine.evaluate("BTC", &bullish_indicators(), 100_000.0, &provider);
        engine.evaluate("BTC", &bullish_indicators(), 100_000.0, &provider);
        engine.evaluate("ETH", &bullish_indicators(), 100_000.0, &provider);

        assert_eq!(engine.symbols(), vec!["BTC", "ETH"]);
        assert_eq!(engine.state("BTC").unwrap().position_history().len(), 2);
        assert_eq!(engine.state("ETH").unwrap().position_history().len(), 1);
        assert!(engine.risk_metrics("ETH").unwrap().position_utilization > 0.0);
        assert!(engine.risk_metrics("DOGE").is_none());
    }

    #[test]
    fn test_missing_features_fall_back_to_technical() {
        let mut engine = DecisionEngine::new(EngineConfig::default());
        let indicators: IndicatorSet = bullish_indicators()
            .iter()
            .filter(|(name, _)| *name != names::VOLATILITY)
            .map(|(name, value)| (name.to_string(), value))
            .collect();
        let provider = ModelPrediction::new(Signal::Short, 0.99);
        let decision = engine.evaluate("BTC", &indicators, 100_000.0, &provider);

        assert_eq!(decision.fusion().model_signal, Signal::Neutral);
        assert_eq!(decision.fusion().fused, Signal::Long);
        // No volatility means no sizing input either
        assert!(matches!(decision, TradeDecision::Hold { .. }));
    }

    fn rejection_reason(decision: &TradeDecision) -> Option<ValidationReason> {
        match decision {
            TradeDecision::Rejected { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    #[test]
    fn test_zero_size_from_extreme_volatility_rejected() {
        let mut engine = DecisionEngine::new(EngineConfig::default());
        let indicators = bullish_indicators().with(names::VOLATILITY, 1000.0);
        let provider = ModelPrediction::new(Signal::Long, 0.9);
        let decision = engine.evaluate("BTC", &indicators, 100_000.0, &provider);

        assert!(!decision.is_approved());
        assert_eq!(rejection_reason(&decision), Some(ValidationReason::NoPositionSize));
        assert_eq!(decision.proposal().unwrap().position_size, 0.0);
        assert_eq!(
            rejection_reason(&decision).unwrap().to_string(),
            "no position size computed"
        );
    }

    #[test]
    fn test_failed_sizing_rejected() {
        let mut engine = DecisionEngine::new(EngineConfig::default());
        let provider = ModelPrediction::new(Signal::Long, f64::NAN);
        let decision = engine.evaluate("BTC", &bullish_indicators(), 100_000.0, &provider);

        // Fusion falls back to the technical vote, sizing cannot use the confidence
        assert_eq!(decision.fusion().fused, Signal::Long);
        assert_eq!(rejection_reason(&decision), Some(ValidationReason::NoPositionSize));
        assert!(engine.state("BTC").unwrap().position_history().is_empty());
    }

    #[test]
    fn test_liquid_market_assessment_shrinks_size() {
        let provider = ModelPrediction::new(Signal::Long, 0.9);

        let mut plain = DecisionEngine::new(EngineConfig::default());
        let unassessed = plain.evaluate("BTC", &bullish_indicators(), 100_000.0, &provider);
        let full_size = unassessed.proposal().unwrap().position_size;

        let mut engine = DecisionEngine::new(EngineConfig::default());
        // 50_000 * 100 of daily volume is liquid; volatility 0.02 adds nothing
        let indicators = bullish_indicators().with(names::AVG_VOLUME, 50_000.0);
        let decision = engine.evaluate("BTC", &indicators, 100_000.0, &provider);

        assert!(decision.is_approved());
        let size = decision.proposal().unwrap().position_size;
        assert!((size - full_size * 0.5).abs() < full_size * 1e-3);
    }

    #[test]
    fn test_illiquid_volatile_market_rejected() {
        let mut engine = DecisionEngine::new(EngineConfig::default());
        // 0.5 + 0.2 (volatility) + 0.2 (illiquid) = 0.9
        let indicators = bullish_indicators()
            .with(names::VOLATILITY, 0.03)
            .with(names::AVG_VOLUME, 100.0);
        let provider = ModelPrediction::new(Signal::Long, 0.9);
        let decision = engine.evaluate("BTC", &indicators, 100_000.0, &provider);

        assert_eq!(rejection_reason(&decision), Some(ValidationReason::TradeRiskTooHigh));
    }
}
