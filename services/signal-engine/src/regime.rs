//! Market regime classification from realized position-size history

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of most recent history entries the classifier looks at
pub const REGIME_WINDOW: usize = 10;

/// Discrete market-condition label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketRegime {
    #[default]
    Neutral,
    Trending,
    Volatile,
    Bullish,
    Bearish,
}

impl fmt::Display for MarketRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MarketRegime::Neutral => "neutral",
            MarketRegime::Trending => "trending",
            MarketRegime::Volatile => "volatile",
            MarketRegime::Bullish => "bullish",
            MarketRegime::Bearish => "bearish",
        };
        f.write_str(s)
    }
}

/// Classifier output
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RegimeAssessment {
    pub regime: MarketRegime,
    /// Multiplier applied to position size
    pub market_factor: f64,
    /// Mean first difference over the window
    pub trend: f64,
    /// Population standard deviation over the window
    pub volatility: f64,
}

impl RegimeAssessment {
    fn insufficient_data() -> Self {
        Self {
            regime: MarketRegime::Neutral,
            market_factor: 1.0,
            trend: 0.0,
            volatility: 0.0,
        }
    }
}

/// Derives the regime from scratch on every call
///
/// Stateless: the same history always yields the same assessment.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarketRegimeClassifier;

impl MarketRegimeClassifier {
    pub fn classify(&self, history: &[f64]) -> RegimeAssessment {
        if history.len() < REGIME_WINDOW {
            return RegimeAssessment::insufficient_data();
        }

        let window = &history[history.len() - REGIME_WINDOW..];
        let diffs: Vec<f64> = window.windows(2).map(|w| w[1] - w[0]).collect();
        let trend = mean(&diffs);
        let volatility = std_dev(window);

        let (regime, market_factor) = if volatility > mean(history) * 1.5 {
            (MarketRegime::Volatile, 0.7)
        } else if trend.abs() > std_dev(history) * 2.0 {
            (MarketRegime::Trending, if trend > 0.0 { 1.2 } else { 0.8 })
        } else {
            (MarketRegime::Neutral, 1.0)
        };

        RegimeAssessment {
            regime,
            market_factor,
            trend,
            volatility,
        }
    }
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divides by n)
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_history_is_neutral() {
        let assessment = MarketRegimeClassifier.classify(&[0.05; 9]);
        assert_eq!(assessment.regime, MarketRegime::Neutral);
        assert_eq!(assessment.market_factor, 1.0);
    }

    #[test]
    fn test_flat_history_is_neutral() {
        let assessment = MarketRegimeClassifier.classify(&[0.05; 20]);
        assert_eq!(assessment.regime, MarketRegime::Neutral);
        assert_eq!(assessment.trend, 0.0);
        assert!(assessment.volatility < 1e-12);
    }

    #[test]
    fn test_volatile_history() {
        // Alternating tiny and large fractions: std well above 1.5x the mean
        let history: Vec<f64> = (0..10).map(|i| if i % 2 == 0 { 0.0 } else { 0.1 }).collect();
        let mut padded = vec![0.0; 10];
        padded.extend(history);
        let assessment = MarketRegimeClassifier.classify(&padded);
        assert_eq!(assessment.regime, MarketRegime::Volatile);
        assert_eq!(assessment.market_factor, 0.7);
    }

    #[test]
    fn test_trending_up_and_down() {
        // Long flat stretch keeps the full-history std small
        let mut up = vec![0.05; 2000];
        up.extend((1..=10).map(|i| 0.05 + 0.0005 * i as f64));
        let assessment = MarketRegimeClassifier.classify(&up);
        assert_eq!(assessment.regime, MarketRegime::Trending);
        assert_eq!(assessment.market_factor, 1.2);

        let mut down = vec![0.05; 2000];
        down.extend((1..=10).map(|i| 0.05 - 0.0005 * i as f64));
        let assessment = MarketRegimeClassifier.classify(&down);
        assert_eq!(assessment.regime, MarketRegime::Trending);
        assert_eq!(assessment.market_factor, 0.8);
    }

    #[test]
    fn test_classification_is_pure() {
        let history: Vec<f64> = (0..15).map(|i| 0.04 + 0.001 * (i % 3) as f64).collect();
        let a = MarketRegimeClassifier.classify(&history);
        let b = MarketRegimeClassifier.classify(&history);
        assert_eq!(a, b);
    }

    #[test]
    fn test_std_dev_population() {
        assert!((std_dev(&[1.0, 2.0, 3.0, 4.0]) - 1.25f64.sqrt()).abs() < 1e-12);
        assert_eq!(mean(&[]), 0.0);
    }
}
