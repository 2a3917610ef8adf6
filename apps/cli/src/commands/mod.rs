//! Subcommand handlers. Each returns the JSON document printed on stdout.

pub mod artifact;
pub mod dataset;
pub mod pipeline;

use std::io::Write;

use anyhow::Result;
use autoop_core::Artifact;
use serde::Serialize;
use serde_json::{Value, json};

/// Pretty-print `value` as JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

/// Artifact description without its payload.
pub fn describe_artifact(artifact: &Artifact) -> Value {
    json!({
        "id": artifact.id(),
        "name": artifact.name(),
        "version": artifact.version(),
        "type": artifact.artifact_type().as_str(),
        "asset_path": artifact.asset_path(),
        "tags": artifact.tags(),
        "metadata": artifact.metadata(),
        "size": artifact.read().map(|data| data.len()).ok(),
    })
}
