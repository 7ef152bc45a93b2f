//! Core error types shared by every engine component

use serde::Serialize;

/// Error types for the decision engine
///
/// None of these are fatal. Each component catches them at its boundary and
/// degrades to a conservative value (neutral signal, zero size, no stop, reject).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("Missing data: {0}")]
    MissingData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Numeric error: {0}")]
    Numeric(String),

    #[error("Config error: {0}")]
    Config(String),
}

/// Failure class of an [`EngineError`], for callers that only branch on kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MissingData,
    InvalidInput,
    Numeric,
    Config,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::MissingData(_) => ErrorKind::MissingData,
            EngineError::InvalidInput(_) => ErrorKind::InvalidInput,
            EngineError::Numeric(_) => ErrorKind::Numeric,
            EngineError::Config(_) => ErrorKind::Config,
        }
    }

    pub(crate) fn missing(name: &str) -> Self {
        EngineError::MissingData(format!("indicator '{}' not present", name))
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Reject NaN and infinities before they leak into sizing or stops
pub(crate) fn ensure_finite(name: &str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EngineError::Numeric(format!("{} is not finite: {}", name, value)))
    }
}
