//! Common utility functions shared across CLI commands.

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// Read and parse a JSON input file. `what` names the file in errors.
pub fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read {what}: {}", path.display()))?;
    debug!(path = %path.display(), bytes = bytes.len(), "Read {what}");
    serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse {what}: {}", path.display()))
}

/// Pretty-print a value as JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Format a probability as a percentage with three decimals.
pub fn percent(probability: f64) -> String {
    format!("{:.3}%", probability * 100.0)
}
