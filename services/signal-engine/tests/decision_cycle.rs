//! End-to-end decision cycle test harness
//!
//! Validates the full loop:
//! indicators → technical vote → fusion (mock model) → size + stop → validation → decision


use mock_provider::MockModelProvider;
use signal_engine::{
    indicators::names, CycleFile, DecisionEngine, EngineConfig, IndicatorSet, MarketRegime,
    PositionSide, RiskConfig, Signal, TradeDecision, ValidationReason,
};
use std::io::Write;

/// Trend up, RSI neutral, MACD up
fn bullish_indicators(close: f64) -> IndicatorSet {
    IndicatorSet::new()
        .with(names::SMA_20, close * 1.05)
        .with(names::SMA_50, close)
        .with(names::RSI, 55.0)
        .with(names::MACD, 1.2)
        .with(names::MACD_SIGNAL, 0.8)
        .with(names::VOLATILITY, 0.02)
        .with(names::ATR, close * 0.01)
        .with(names::CLOSE, close)
}

/// Test: Agreeing model and technical signals produce an approved long
#[test]
fn test_bullish_cycle_approved() {
    let mut engine = DecisionEngine::new(EngineConfig::default());
    let provider = MockModelProvider::constant(Signal::Long, 0.9);

    let decision = engine.evaluate("BTC", &bullish_indicators(100.0), 100_000.0, &provider);

    assert!(decision.is_approved(), "unexpected decision: {:?}", decision);
    assert_eq!(provider.calls(), 1);
    // sma_ratio feature
    let features = provider.last_features().unwrap();
    assert!((features.0[4] - 1.05).abs() < 1e-9);

    let proposal = decision.proposal().unwrap();
    assert_eq!(proposal.side, PositionSide::Long);
    assert!(proposal.position_size > 0.0 && proposal.position_size <= 10_000.0);
    assert!(proposal.stop_loss.unwrap() < proposal.entry_price);
    assert!(proposal.stop_price.is_some());
    assert_eq!(proposal.regime, MarketRegime::Neutral);

    println!("✅ Bullish cycle approved");
    println!("   Notional: {}", proposal.notional);
    println!("   Stop: {:?}", proposal.stop_price);
}

/// Test: Medium-confidence disagreement leans to the model
#[test]
fn test_medium_confidence_disagreement() {
    let mut engine = DecisionEngine::new(EngineConfig::default());
    let provider = MockModelProvider::constant(Signal::Short, 0.7);

    let decision = engine.evaluate("ETH", &bullish_indicators(2_000.0), 100_000.0, &provider);

    // 0.7 * -1 + 0.3 * 1 = -0.4
    assert_eq!(decision.fusion().technical_signal, Signal::Long);
    assert_eq!(decision.fusion().fused, Signal::Short);
    let proposal = decision.proposal().unwrap();
    assert_eq!(proposal.side, PositionSide::Short);
    assert!(proposal.stop_loss.unwrap() > 2_000.0);

    println!("✅ Disagreement resolved toward the model");
}

/// Test: Low-confidence model defers to a neutral technical vote
#[test]
fn test_low_confidence_neutral_holds() {
    let mut engine = DecisionEngine::new(EngineConfig::default());
    let provider = MockModelProvider::constant(Signal::Long, 0.5);
    let indicators = bullish_indicators(100.0)
        .with(names::SMA_20, 100.0)
        .with(names::MACD, 0.8);

    let decision = engine.evaluate("BTC", &indicators, 100_000.0, &provider);

    assert!(matches!(decision, TradeDecision::Hold { .. }));
    assert!(engine.state("BTC").is_none());
}

/// Test: A falling close series blocks the next trade
#[test]
fn test_drawdown_from_closes_blocks_trade() {
    let mut engine = DecisionEngine::new(EngineConfig::default());
    let provider = MockModelProvider::constant(Signal::Long, 0.9);

    assert!(engine.update_market_data("BTC", &[100.0, 97.0]));
    let decision = engine.evaluate("BTC", &bullish_indicators(97.0), 100_000.0, &provider);

    match decision {
        TradeDecision::Rejected { reason, .. } => {
            assert_eq!(reason.to_string(), "recent drawdown too high");
        }
        other => panic!("expected rejection, got {:?}", other),
    }

    let metrics = engine.risk_metrics("BTC").unwrap();
    assert!((metrics.current_drawdown - 0.03).abs() < 1e-9);
    assert!((metrics.max_historical_drawdown - 0.03).abs() < 1e-9);

    println!("✅ Trade blocked after a 3% drop");
}

/// Test: Scripted predictions are consumed one per cycle
#[test]
fn test_sequence_of_cycles_builds_history() {
    let mut engine = DecisionEngine::new(EngineConfig::default());
    let provider = MockModelProvider::new()
        .then(Signal::Long, 0.95)
        .then(Signal::Long, 0.85)
        .then(Signal::Short, 0.99);

    let sides: Vec<Option<PositionSide>> = (0..3)
        .map(|_| {
            engine
                .evaluate("SOL", &bullish_indicators(150.0), 50_000.0, &provider)
                .proposal()
                .map(|p| p.side)
        })
        .collect();

    assert_eq!(
        sides,
        vec![Some(PositionSide::Long), Some(PositionSide::Long), Some(PositionSide::Short)]
    );
    assert_eq!(provider.calls(), 3);
    let state = engine.state("SOL").unwrap();
    assert_eq!(state.position_history().len(), 3);
    assert!(state.position_history().iter().all(|f| *f > 0.0 && *f <= 0.1));
}

/// Test: Cumulative risk check from a config file
#[test]
fn test_config_enables_cumulative_risk_check() {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(
        file,
        "risk:\n  max_drawdown: 0.05\n  cumulative_risk_check: true"
    )
    .unwrap();
    let config = EngineConfig::load(Some(file.path())).unwrap();
    assert!(config.risk.cumulative_risk_check);

    let mut engine = DecisionEngine::new(config);
    // Mean 0.02 passes the recent check (<= 0.04); sum 0.1 already hits 2x the limit
    for _ in 0..5 {
        engine.record_drawdown("BTC", 0.02);
    }
    let provider = MockModelProvider::constant(Signal::Long, 0.9);
    let decision = engine.evaluate("BTC", &bullish_indicators(100.0), 100_000.0, &provider);

    match decision {
        TradeDecision::Rejected { reason, .. } => {
            assert_eq!(reason, ValidationReason::CumulativeRiskTooHigh)
        }
        other => panic!("expected rejection, got {:?}", other),
    }
}

/// Test: Position history cap from config applies to engine-owned state
#[test]
fn test_position_history_limit_from_config() {
    let config = EngineConfig {
        risk: RiskConfig {
            position_history_limit: Some(2),
            ..RiskConfig::default()
        },
        ..EngineConfig::default()
    };
    let mut engine = DecisionEngine::new(config);
    let provider = MockModelProvider::constant(Signal::Long, 0.9);
    for _ in 0..4 {
        engine.evaluate("BTC", &bullish_indicators(100.0), 100_000.0, &provider);
    }
    assert_eq!(engine.state("BTC").unwrap().position_history().len(), 2);
}

const CYCLES_YAML: &str = r#"
model:
  kind: random_forest
  stumps:
    - { feature: 2, threshold: 60.0, left: 1.0, right: 0.0 }
    - { feature: 2, threshold: 60.0, left: 1.0, right: 0.0 }
cycles:
  - symbol: BTC
    portfolio_value: 100000.0
    indicators: { sma_20: 105.0, sma_50: 100.0, rsi: 55.0, macd: 1.2, macd_signal: 0.8, volatility: 0.02, atr: 1.0, close: 100.0 }
  - symbol: ETH
    portfolio_value: 100000.0
    indicators: { sma_20: 2100.0, sma_50: 2000.0, rsi: 55.0, macd: 1.2, macd_signal: 0.8, volatility: 0.02, atr: 20.0, close: 2000.0 }
    prediction: { signal: short, confidence: 0.95 }
  - symbol: BTC
    portfolio_value: 100000.0
    closes: [100.0, 90.0]
    indicators: { sma_20: 105.0, sma_50: 100.0, rsi: 55.0, macd: 1.2, macd_signal: 0.8, volatility: 0.02, atr: 1.0, close: 90.0 }
  - symbol: ETH
    portfolio_value: 100000.0
    indicators: { sma_20: 2000.0, sma_50: 2000.0, rsi: 50.0, macd: 0.8, macd_signal: 0.8, volatility: 0.02, close: 2000.0 }
    prediction: { signal: neutral, confidence: 0.0 }
"#;

/// Test: Replaying a YAML cycles file with a shared model
#[test]
fn test_replay_cycles_file() {
    let cycles: CycleFile = serde_yaml::from_str(CYCLES_YAML).unwrap();
    assert_eq!(cycles.cycles.len(), 4);

    let mut engine = DecisionEngine::new(EngineConfig::default());
    let decisions = cycles.replay(&mut engine);

    // Shared forest: both stumps vote up at rsi 55
    assert!(decisions[0].is_approved());
    assert_eq!(decisions[0].fusion().model_signal, Signal::Long);
    assert_eq!(decisions[0].fusion().confidence, 1.0);

    // Per-cycle prediction overrides the shared model
    assert_eq!(decisions[1].proposal().unwrap().side, PositionSide::Short);

    // 10% drop recorded before evaluation
    assert!(matches!(
        decisions[2],
        TradeDecision::Rejected {
            reason: ValidationReason::RecentDrawdownTooHigh,
            ..
        }
    ));

    assert!(matches!(decisions[3], TradeDecision::Hold { .. }));

    // Decisions serialize with a tag and stable reason text
    let json = serde_json::to_value(&decisions[2]).unwrap();
    assert_eq!(json["decision"], "rejected");
    assert_eq!(json["reason"], "recent drawdown too high");

    assert_eq!(engine.symbols(), vec!["BTC", "ETH"]);
}
