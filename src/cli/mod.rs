//! Support code for the `graph-oplog` binary.

pub mod replay;
pub mod script;

pub use replay::{run_replay, ReplayOutcome};
pub use script::{ReplayScript, ScriptTransaction};

use anyhow::{Context, Result};
use graph_oplog_config::{LoggingConfig, OplogConfig};
use std::io::Write;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Resolve configuration: an explicit path wins over the usual lookup.
pub fn load_config(path: Option<&Path>) -> Result<OplogConfig> {
    match path {
        Some(path) => OplogConfig::load_from_path(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => OplogConfig::load(),
    }
}

/// Install the global subscriber; logs go to stderr so stdout stays JSON.
pub fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(logging.effective_filter())
        .context("parsing log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing tracing subscriber: {}", e))
}

/// Print each batch as one JSON line, optionally followed by the stats.
pub fn write_outcome(out: &mut impl Write, outcome: &ReplayOutcome, stats: bool) -> Result<()> {
    for batch in &outcome.batches {
        serde_json::to_writer(&mut *out, batch)?;
        writeln!(out)?;
    }
    if stats {
        serde_json::to_writer(&mut *out, &serde_json::json!({ "stats": outcome.stats }))?;
        writeln!(out)?;
    }
    Ok(())
}
