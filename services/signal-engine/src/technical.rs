//! Rule-based technical vote
//!
//! Three independent votes, each in {-1, 0, +1}:
//! - Trend: SMA 20 vs SMA 50
//! - Momentum: RSI overbought/oversold bands
//! - MACD: MACD line vs signal line

use tracing::{debug, warn};

use crate::config::TechnicalConfig;
use crate::indicators::{names, IndicatorSet};
use crate::signal::Signal;
use crate::types::Result;

/// Per-rule votes that make up a technical signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TechnicalVotes {
    pub trend: Signal,
    pub momentum: Signal,
    pub macd: Signal,
}

impl TechnicalVotes {
    pub fn sum(&self) -> i32 {
        self.trend.value() + self.momentum.value() + self.macd.value()
    }

    /// Sign of the vote sum; ties are neutral
    pub fn combined(&self) -> Signal {
        Signal::from_vote(self.sum())
    }
}

/// Converts an indicator snapshot into a discrete vote
#[derive(Debug, Clone, Copy, Default)]
pub struct TechnicalSignalRule {
    config: TechnicalConfig,
}

impl TechnicalSignalRule {
    pub fn new(config: TechnicalConfig) -> Self {
        Self { config }
    }

    /// Individual votes, or `MissingData` if any required indicator is absent
    pub fn try_votes(&self, indicators: &IndicatorSet) -> Result<TechnicalVotes> {
        let sma_20 = indicators.require(names::SMA_20)?;
        let sma_50 = indicators.require(names::SMA_50)?;
        let rsi = indicators.require(names::RSI)?;
        let macd = indicators.require(names::MACD)?;
        let macd_signal = indicators.require(names::MACD_SIGNAL)?;

        let trend = compare(sma_20, sma_50);
        let momentum = if rsi > self.config.rsi_overbought {
            Signal::Short
        } else if rsi < self.config.rsi_oversold {
            Signal::Long
        } else {
            Signal::Neutral
        };
        let macd = compare(macd, macd_signal);

        Ok(TechnicalVotes {
            trend,
            momentum,
            macd,
        })
    }

    pub fn try_vote(&self, indicators: &IndicatorSet) -> Result<Signal> {
        let votes = self.try_votes(indicators)?;
        let signal = votes.combined();
        debug!(
            "Technical votes: trend={} momentum={} macd={} -> {}",
            votes.trend, votes.momentum, votes.macd, signal
        );
        Ok(signal)
    }

    /// Technical vote with the neutral fallback for incomplete snapshots
    pub fn vote(&self, indicators: &IndicatorSet) -> Signal {
        match self.try_vote(indicators) {
            Ok(signal) => signal,
            Err(e) => {
                warn!("Technical vote unavailable, using neutral: {}", e);
                Signal::Neutral
            }
        }
    }
}

fn compare(fast: f64, slow: f64) -> Signal {
    if fast > slow {
        Signal::Long
    } else if fast < slow {
        Signal::Short
    } else {
        Signal::Neutral
    }
}
