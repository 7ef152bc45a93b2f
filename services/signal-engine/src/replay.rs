//! Recorded decision cycles, replayed through a [`DecisionEngine`]

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::{DecisionEngine, TradeDecision};
use crate::indicators::IndicatorSet;
use crate::model::{ModelPrediction, ModelSignalProvider, SignalModel};

/// One evaluation cycle for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cycle {
    pub symbol: String,
    pub portfolio_value: f64,
    pub indicators: IndicatorSet,
    /// Recent closes fed to drawdown tracking before evaluation
    #[serde(default)]
    pub closes: Vec<f64>,
    /// Precomputed model output; overrides the file-level model
    #[serde(default)]
    pub prediction: Option<ModelPrediction>,
}

/// A cycles file: an optional shared model plus the cycles in order
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CycleFile {
    #[serde(default)]
    pub model: Option<SignalModel>,
    pub cycles: Vec<Cycle>,
}

impl CycleFile {
    /// Run every cycle in order and collect the decisions
    pub fn replay(&self, engine: &mut DecisionEngine) -> Vec<TradeDecision> {
        let fallback = ModelPrediction::neutral();
        self.cycles
            .iter()
            .map(|cycle| {
                if !cycle.closes.is_empty() {
                    engine.update_market_data(&cycle.symbol, &cycle.closes);
                }
                let provider: &dyn ModelSignalProvider = match (&cycle.prediction, &self.model) {
                    (Some(prediction), _) => prediction,
                    (None, Some(model)) => model,
                    (None, None) => &fallback,
                };
                debug!("Replaying cycle for {}", cycle.symbol);
                engine.evaluate(&cycle.symbol, &cycle.indicators, cycle.portfolio_value, provider)
            })
            .collect()
    }
}
