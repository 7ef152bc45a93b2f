//! Model signal providers
//!
//! Training happens elsewhere; this module only runs inference over
//! pre-trained decision stumps delivered as data.

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::indicators::{names, IndicatorSet};
use crate::signal::Signal;
use crate::types::{EngineError, Result};

/// Number of features fed to the models
pub const FEATURE_COUNT: usize = 7;

/// Model input derived from one indicator snapshot
///
/// Layout: `[sma_20, sma_50, rsi, volatility, sma_ratio, rsi_momentum, volatility_factor]`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(pub [f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn from_indicators(indicators: &IndicatorSet) -> Result<Self> {
        let raw = |name: &str| -> Result<f64> {
            indicators
                .get(name)
                .map(finite_or_zero)
                .ok_or_else(|| EngineError::missing(name))
        };

        let sma_20 = raw(names::SMA_20)?;
        let sma_50 = raw(names::SMA_50)?;
        let rsi = raw(names::RSI)?;
        let volatility = raw(names::VOLATILITY)?;

        let sma_ratio = if sma_50 != 0.0 { sma_20 / sma_50 } else { 1.0 };
        let rsi_momentum = if rsi > 50.0 {
            1.0
        } else if rsi < 50.0 {
            -1.0
        } else {
            0.0
        };
        let volatility_factor = if volatility != 0.0 {
            volatility.ln_1p()
        } else {
            0.0
        };

        Ok(Self(
            [sma_20, sma_50, rsi, volatility, sma_ratio, rsi_momentum, volatility_factor]
                .map(finite_or_zero),
        ))
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.0.get(index).copied()
    }
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// Directional prediction with the model's certainty
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPrediction {
    pub signal: Signal,
    pub confidence: f64,
}

impl ModelPrediction {
    pub fn new(signal: Signal, confidence: f64) -> Self {
        Self { signal, confidence }
    }

    /// No opinion; used whenever inference fails
    pub fn neutral() -> Self {
        Self::new(Signal::Neutral, 0.0)
    }

    /// Turn an up-move probability into a prediction
    ///
    /// The confidence bar rises with the spread between the two class
    /// probabilities: `0.6 + (max - min) * 0.1`.
    pub fn from_probability(p_up: f64) -> Self {
        if !p_up.is_finite() {
            return Self::neutral();
        }
        let p_up = p_up.clamp(0.0, 1.0);
        let p_down = 1.0 - p_up;
        let confidence = p_up.max(p_down);
        let threshold = 0.6 + (confidence - p_up.min(p_down)) * 0.1;

        if confidence < threshold {
            return Self::new(Signal::Neutral, confidence);
        }
        let signal = if p_up > p_down { Signal::Long } else { Signal::Short };
        Self::new(signal, confidence)
    }
}

/// Capability the fusion step depends on
pub trait ModelSignalProvider {
    fn predict(&self, features: &FeatureVector) -> ModelPrediction;
}

/// A precomputed prediction predicts itself
impl ModelSignalProvider for ModelPrediction {
    fn predict(&self, _features: &FeatureVector) -> ModelPrediction {
        *self
    }
}

/// Standardisation parameters fitted alongside the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureScaler {
    pub mean: [f64; FEATURE_COUNT],
    pub scale: [f64; FEATURE_COUNT],
}

impl FeatureScaler {
    pub fn transform(&self, features: &FeatureVector) -> FeatureVector {
        let mut out = features.0;
        for (i, value) in out.iter_mut().enumerate() {
            let scale = if self.scale[i] != 0.0 { self.scale[i] } else { 1.0 };
            *value = (*value - self.mean[i]) / scale;
        }
        FeatureVector(out)
    }
}

/// One-split decision tree
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stump {
    pub feature: usize,
    pub threshold: f64,
    /// Leaf value when `x[feature] <= threshold`
    pub left: f64,
    /// Leaf value otherwise
    pub right: f64,
}

impl Stump {
    fn leaf(&self, features: &FeatureVector) -> Result<f64> {
        let x = features.get(self.feature).ok_or_else(|| {
            EngineError::MissingData(format!("stump references feature {}", self.feature))
        })?;
        Ok(if x <= self.threshold { self.left } else { self.right })
    }
}

/// Bagged stumps; leaves hold the up-class probability of their split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestModel {
    pub stumps: Vec<Stump>,
    #[serde(default)]
    pub scaler: Option<FeatureScaler>,
}

impl ForestModel {
    pub fn probability_up(&self, features: &FeatureVector) -> Result<f64> {
        if self.stumps.is_empty() {
            return Err(EngineError::InvalidInput("forest has no stumps".to_string()));
        }
        let features = scale(self.scaler.as_ref(), features);
        let mut total = 0.0;
        for stump in &self.stumps {
            total += stump.leaf(&features)?;
        }
        Ok(total / self.stumps.len() as f64)
    }
}

/// Boosted stumps; leaves hold log-odds increments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostedModel {
    #[serde(default)]
    pub base_score: f64,
    pub stumps: Vec<Stump>,
    #[serde(default)]
    pub scaler: Option<FeatureScaler>,
}

impl BoostedModel {
    pub fn probability_up(&self, features: &FeatureVector) -> Result<f64> {
        if self.stumps.is_empty() {
            return Err(EngineError::InvalidInput("booster has no stumps".to_string()));
        }
        let features = scale(self.scaler.as_ref(), features);
        let mut margin = self.base_score;
        for stump in &self.stumps {
            margin += stump.leaf(&features)?;
        }
        Ok(1.0 / (1.0 + (-margin).exp()))
    }
}

fn scale(scaler: Option<&FeatureScaler>, features: &FeatureVector) -> FeatureVector {
    match scaler {
        Some(s) => s.transform(features),
        None => *features,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    RandomForest,
    GradientBoosting,
}

/// Closed set of supported model families
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignalModel {
    RandomForest(ForestModel),
    GradientBoosting(BoostedModel),
}

impl SignalModel {
    pub fn kind(&self) -> ModelKind {
        match self {
            SignalModel::RandomForest(_) => ModelKind::RandomForest,
            SignalModel::GradientBoosting(_) => ModelKind::GradientBoosting,
        }
    }

    pub fn try_predict(&self, features: &FeatureVector) -> Result<ModelPrediction> {
        let p_up = match self {
            SignalModel::RandomForest(m) => m.probability_up(features)?,
            SignalModel::GradientBoosting(m) => m.probability_up(features)?,
        };
        if !p_up.is_finite() {
            return Err(EngineError::Numeric(format!(
                "{:?} produced probability {}",
                self.kind(),
                p_up
            )));
        }
        Ok(ModelPrediction::from_probability(p_up))
    }
}

impl ModelSignalProvider for SignalModel {
    fn predict(&self, features: &FeatureVector) -> ModelPrediction {
        match self.try_predict(features) {
            Ok(prediction) => {
                debug!(
                    "{:?} prediction: {} ({:.3})",
                    self.kind(),
                    prediction.signal,
                    prediction.confidence
                );
                prediction
            }
            Err(e) => {
                error!("Error making prediction with {:?}: {}", self.kind(), e);
                ModelPrediction::neutral()
            }
        }
    }
}
