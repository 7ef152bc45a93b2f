//! Engine Configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, Level};

use crate::types::{EngineError, Result};

/// Prefix for environment overrides, e.g. `SIGNAL_ENGINE__RISK__MAX_DRAWDOWN=0.03`
pub const ENV_PREFIX: &str = "SIGNAL_ENGINE";

/// Complete engine configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct EngineConfig {
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub fusion: FusionConfig,
    #[serde(default)]
    pub technical: TechnicalConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Hard risk limits and sizing knobs
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct RiskConfig {
    /// Largest position as a fraction of portfolio value (e.g., 0.1 for 10%)
    #[serde(default = "default_max_position_size")]
    pub max_position_size: f64,
    /// Largest tolerated loss per trade as a fraction of portfolio value
    #[serde(default = "default_max_drawdown")]
    pub max_drawdown: f64,
    /// Percentage stop distance as a fraction of entry price
    #[serde(default = "default_base_stop_fraction")]
    pub base_stop_fraction: f64,
    /// Cap on position history entries. `None` keeps the full log.
    #[serde(default)]
    pub position_history_limit: Option<usize>,
    /// Run the cumulative drawdown check as a fifth validation step
    #[serde(default)]
    pub cumulative_risk_check: bool,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_position_size: default_max_position_size(),
            max_drawdown: default_max_drawdown(),
            base_stop_fraction: default_base_stop_fraction(),
            position_history_limit: None,
            cumulative_risk_check: false,
        }
    }
}

/// Confidence tiers for merging model and technical signals
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct FusionConfig {
    /// Above this the model signal is taken as-is
    #[serde(default = "default_high_confidence")]
    pub high_confidence: f64,
    /// At or below this the technical vote is taken as-is
    #[serde(default = "default_medium_confidence")]
    pub medium_confidence: f64,
    /// Model weight in the blended tier; the technical vote gets the rest
    #[serde(default = "default_model_weight")]
    pub model_weight: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            high_confidence: default_high_confidence(),
            medium_confidence: default_medium_confidence(),
            model_weight: default_model_weight(),
        }
    }
}

/// RSI bands for the momentum vote
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct TechnicalConfig {
    #[serde(default = "default_rsi_overbought")]
    pub rsi_overbought: f64,
    #[serde(default = "default_rsi_oversold")]
    pub rsi_oversold: f64,
}

impl Default for TechnicalConfig {
    fn default() -> Self {
        Self {
            rsi_overbought: default_rsi_overbought(),
            rsi_oversold: default_rsi_oversold(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl LoggingConfig {
    /// Parsed tracing level, INFO when the string is not a level name
    pub fn max_level(&self) -> Level {
        self.level.parse().unwrap_or(Level::INFO)
    }
}

fn default_max_position_size() -> f64 { 0.1 }
fn default_max_drawdown() -> f64 { 0.02 }
fn default_base_stop_fraction() -> f64 { 0.01 }
fn default_high_confidence() -> f64 { 0.8 }
fn default_medium_confidence() -> f64 { 0.6 }
fn default_model_weight() -> f64 { 0.7 }
fn default_rsi_overbought() -> f64 { 70.0 }
fn default_rsi_oversold() -> f64 { 30.0 }
fn default_log_level() -> String { "info".to_string() }

impl EngineConfig {
    /// Load config from an optional file, then apply environment overrides
    ///
    /// The file format follows the extension (yaml, toml, json).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            debug!("Loading engine config from {}", path.display());
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let config: EngineConfig = builder
            .build()
            .and_then(|c| c.try_deserialize::<EngineConfig>())
            .map_err(|e| EngineError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Default config file location (`<config dir>/signal-engine/engine.yaml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("signal-engine").join("engine.yaml"))
    }

    /// Check ranges and tier ordering
    pub fn validate(&self) -> Result<()> {
        let risk = &self.risk;
        check_fraction("risk.max_position_size", risk.max_position_size)?;
        check_fraction("risk.max_drawdown", risk.max_drawdown)?;
        check_fraction("risk.base_stop_fraction", risk.base_stop_fraction)?;
        if risk.position_history_limit == Some(0) {
            return Err(EngineError::Config(
                "risk.position_history_limit must be at least 1".to_string(),
            ));
        }

        let fusion = &self.fusion;
        if !(0.0..=1.0).contains(&fusion.medium_confidence)
            || !(0.0..=1.0).contains(&fusion.high_confidence)
            || fusion.medium_confidence > fusion.high_confidence
        {
            return Err(EngineError::Config(format!(
                "fusion tiers must satisfy 0 <= medium ({}) <= high ({}) <= 1",
                fusion.medium_confidence, fusion.high_confidence
            )));
        }
        if !(0.0..=1.0).contains(&fusion.model_weight) {
            return Err(EngineError::Config(format!(
                "fusion.model_weight out of range: {}",
                fusion.model_weight
            )));
        }

        if self.technical.rsi_oversold >= self.technical.rsi_overbought {
            return Err(EngineError::Config(format!(
                "technical.rsi_oversold ({}) must be below rsi_overbought ({})",
                self.technical.rsi_oversold, self.technical.rsi_overbought
            )));
        }
        Ok(())
    }
}

fn check_fraction(name: &str, value: f64) -> Result<()> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(EngineError::Config(format!(
            "{} must be in (0, 1], got {}",
            name, value
        )))
    }
}
