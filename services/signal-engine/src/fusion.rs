//! Confidence-tiered fusion of model and technical signals

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::FusionConfig;
use crate::model::{FeatureVector, ModelSignalProvider};
use crate::signal::Signal;

/// Inputs and output of one fusion step
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FusionOutcome {
    pub model_signal: Signal,
    pub technical_signal: Signal,
    pub confidence: f64,
    pub fused: Signal,
}

/// Merges a model signal and a technical vote under a confidence policy
///
/// - confidence above `high_confidence`: model signal wins
/// - between the tiers: agreement passes through, otherwise weighted sign
/// - at or below `medium_confidence`: technical vote wins
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalFusionPolicy {
    config: FusionConfig,
}

impl SignalFusionPolicy {
    pub fn new(config: FusionConfig) -> Self {
        Self { config }
    }

    pub fn fuse(&self, model_signal: Signal, technical: Signal, confidence: f64) -> Signal {
        if !confidence.is_finite() {
            warn!("Non-finite model confidence {}, deferring to technical vote", confidence);
            return technical;
        }

        if confidence > self.config.high_confidence {
            model_signal
        } else if confidence > self.config.medium_confidence {
            if model_signal == technical {
                model_signal
            } else {
                let weight = self.config.model_weight;
                let score = weight * model_signal.value() as f64
                    + (1.0 - weight) * technical.value() as f64;
                Signal::from_score(score)
            }
        } else {
            technical
        }
    }

    /// Ask the injected provider for a prediction, then fuse it
    pub fn evaluate(
        &self,
        provider: &dyn ModelSignalProvider,
        features: &FeatureVector,
        technical: Signal,
    ) -> FusionOutcome {
        let prediction = provider.predict(features);
        let fused = self.fuse(prediction.signal, technical, prediction.confidence);
        debug!(
            "Fusion: model={} ({:.3}) technical={} -> {}",
            prediction.signal, prediction.confidence, technical, fused
        );
        FusionOutcome {
            model_signal: prediction.signal,
            technical_signal: technical,
            confidence: prediction.confidence,
            fused,
        }
    }
}

/// Fuse with the default tiers (0.8 / 0.6, 70/30 weighting)
pub fn fuse_signal(model_signal: Signal, technical_vote: Signal, confidence: f64) -> Signal {
    SignalFusionPolicy::default().fuse(model_signal, technical_vote, confidence)
}
