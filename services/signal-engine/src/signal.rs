//! Directional signals and position sides

use serde::{Deserialize, Serialize};
use std::fmt;

/// Directional signal
///
/// Only the sign carries meaning; there is no ordering beyond it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// Enter or hold a long position (+1)
    Long,
    /// Enter or hold a short position (-1)
    Short,
    /// No action (0)
    #[default]
    Neutral,
}

impl Signal {
    /// Numeric vote in {-1, 0, +1}
    pub fn value(self) -> i32 {
        match self {
            Signal::Long => 1,
            Signal::Short => -1,
            Signal::Neutral => 0,
        }
    }

    /// Sign of an integer vote sum
    pub fn from_vote(vote: i32) -> Self {
        match vote.signum() {
            1 => Signal::Long,
            -1 => Signal::Short,
            _ => Signal::Neutral,
        }
    }

    /// Sign of a weighted score. Zero and NaN are neutral.
    pub fn from_score(score: f64) -> Self {
        if score > 0.0 {
            Signal::Long
        } else if score < 0.0 {
            Signal::Short
        } else {
            Signal::Neutral
        }
    }

    /// Side to open for this signal, if any
    pub fn side(self) -> Option<PositionSide> {
        match self {
            Signal::Long => Some(PositionSide::Long),
            Signal::Short => Some(PositionSide::Short),
            Signal::Neutral => None,
        }
    }

    pub fn is_actionable(self) -> bool {
        self != Signal::Neutral
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Signal::Long => "long",
            Signal::Short => "short",
            Signal::Neutral => "neutral",
        };
        f.write_str(s)
    }
}

/// Side of a position, used for stop placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionSide {
    Long,
    Short,
}

/// Signal strength bucket derived from model confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalStrength {
    Weak,
    Moderate,
    Strong,
    VeryStrong,
}

impl SignalStrength {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.9 {
            SignalStrength::VeryStrong
        } else if confidence >= 0.7 {
            SignalStrength::Strong
        } else if confidence >= 0.5 {
            SignalStrength::Moderate
        } else {
            SignalStrength::Weak
        }
    }
}
