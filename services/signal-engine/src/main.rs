//! Signal Engine - replays recorded decision cycles
//!
//! Usage: `signal-engine <cycles.(json|yaml)> [engine-config]`
//!
//! 1. Loads engine config (argument, `SIGNAL_ENGINE_CONFIG`, or the default path)
//! 2. Reads the cycles file
//! 3. Runs every cycle through the decision engine
//! 4. Prints one JSON decision per line, then risk metrics per symbol

use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use signal_engine::{CycleFile, DecisionEngine, EngineConfig};

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let cycles_path = args
        .next()
        .map(PathBuf::from)
        .ok_or_else(|| anyhow::anyhow!("usage: signal-engine <cycles-file> [config-file]"))?;
    let config_path = args
        .next()
        .map(PathBuf::from)
        .or_else(|| std::env::var("SIGNAL_ENGINE_CONFIG").ok().map(PathBuf::from))
        .or_else(|| EngineConfig::default_path().filter(|p| p.exists()));

    let config = EngineConfig::load(config_path.as_deref())
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_max_level(config.logging.max_level())
        .with_writer(std::io::stderr)
        .init();

    info!("Starting Signal Engine...");
    match &config_path {
        Some(path) => info!("Config: {}", path.display()),
        None => info!("Config: defaults + environment"),
    }

    let cycles = load_cycles(&cycles_path)?;
    info!("Loaded {} cycles from {}", cycles.cycles.len(), cycles_path.display());
    if let Some(model) = &cycles.model {
        info!("Shared model: {:?}", model.kind());
    }

    let mut engine = DecisionEngine::new(config);
    let decisions = cycles.replay(&mut engine);

    for decision in &decisions {
        println!("{}", serde_json::to_string(decision)?);
    }

    let approved = decisions.iter().filter(|d| d.is_approved()).count();
    info!("{} of {} cycles approved", approved, decisions.len());

    for symbol in engine.symbols() {
        if let Some(metrics) = engine.risk_metrics(symbol) {
            let line = serde_json::json!({ "symbol": symbol, "metrics": metrics });
            println!("{}", line);
        }
    }

    Ok(())
}

fn load_cycles(path: &Path) -> anyhow::Result<CycleFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read cycles file {}", path.display()))?;

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let cycles: CycleFile = match ext.as_deref() {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&raw)
            .with_context(|| format!("Invalid YAML in {}", path.display()))?,
        Some("json") => serde_json::from_str(&raw)
            .with_context(|| format!("Invalid JSON in {}", path.display()))?,
        other => {
            warn!("Unknown cycles file extension {:?}, trying JSON", other);
            serde_json::from_str(&raw)
                .with_context(|| format!("Invalid JSON in {}", path.display()))?
        }
    };
    Ok(cycles)
}
