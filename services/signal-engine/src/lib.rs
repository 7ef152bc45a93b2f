//! Signal Engine Library
//!
//! Risk-adjusted signal fusion and position sizing: merges a model signal
//! with a technical vote, sizes the position, places a stop and validates
//! the trade against per-symbol risk state.

pub mod assessment;
pub mod config;
pub mod engine;
pub mod fusion;
pub mod indicators;
pub mod metrics;
pub mod model;
pub mod regime;
pub mod replay;
pub mod signal;
pub mod sizing;
pub mod state;
pub mod stop_loss;
pub mod technical;
pub mod types;
pub mod validator;

// Re-export main types for convenience
pub use assessment::{assess_trade_risk, TradeRiskAssessment};
pub use config::{EngineConfig, FusionConfig, LoggingConfig, RiskConfig, TechnicalConfig};
pub use engine::{DecisionEngine, TradeDecision, TradeProposal};
pub use fusion::{fuse_signal, FusionOutcome, SignalFusionPolicy};
pub use indicators::IndicatorSet;
pub use metrics::{get_risk_metrics, RiskMetrics};
pub use model::{
    BoostedModel, FeatureVector, ForestModel, ModelKind, ModelPrediction, ModelSignalProvider,
    SignalModel, Stump,
};
pub use regime::{MarketRegime, MarketRegimeClassifier, RegimeAssessment};
pub use replay::{Cycle, CycleFile};
pub use signal::{PositionSide, Signal, SignalStrength};
pub use sizing::{PositionSizeResult, PositionSizer, SizingFactors};
pub use state::RiskState;
pub use stop_loss::{StopLoss, StopLossCalculator, StopMethod};
pub use technical::{TechnicalSignalRule, TechnicalVotes};
pub use types::{EngineError, ErrorKind, Result};
pub use validator::{TradeValidator, ValidationReason, ValidationResult};
