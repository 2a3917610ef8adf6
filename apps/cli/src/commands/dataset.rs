//! `autoop dataset ...`

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use autoop_core::AutoMlSystem;
use autoop_core::ml::{DataFrame, Dataset, detect_feature_types};
use clap::Subcommand;
use serde_json::{Value, json};
use tracing::info;

use super::describe_artifact;

#[derive(Debug, Subcommand)]
pub enum DatasetCommand {
    /// Register a CSV file as a dataset
    Upload {
        /// Path to a CSV file with a header row
        csv: PathBuf,
        /// Dataset name (defaults to the file stem)
        #[arg(long)]
        name: Option<String>,
        /// Dataset version
        #[arg(long)]
        version: Option<String>,
    },
    /// Print the detected type of every column
    Features {
        /// Dataset artifact id
        id: String,
    },
}

pub fn run(system: &mut AutoMlSystem, command: DatasetCommand) -> Result<Value> {
    match command {
        DatasetCommand::Upload { csv, name, version } => upload(system, &csv, name, version.as_deref()),
        DatasetCommand::Features { id } => features(system, &id),
    }
}

fn upload(
    system: &mut AutoMlSystem,
    csv: &Path,
    name: Option<String>,
    version: Option<&str>,
) -> Result<Value> {
    let name = match name {
        Some(name) => name,
        None => csv
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("cannot derive a dataset name from {}", csv.display()))?,
    };

    let bytes = std::fs::read(csv).with_context(|| format!("failed to read {}", csv.display()))?;
    let frame = DataFrame::from_csv(&bytes).with_context(|| format!("failed to parse {}", csv.display()))?;
    let dataset = Dataset::from_frame(&frame, &name, format!("dataset/{name}"), version)?;

    system.registry_mut().register(dataset.artifact())?;
    info!(id = %dataset.id(), rows = frame.n_rows(), columns = frame.n_columns(), "Uploaded dataset");

    Ok(json!({
        "artifact": describe_artifact(dataset.artifact()),
        "rows": frame.n_rows(),
        "columns": frame.column_names(),
    }))
}

fn features(system: &AutoMlSystem, id: &str) -> Result<Value> {
    let artifact = system.registry().get(id)?;
    let dataset = Dataset::from_artifact(artifact)?;
    let features = detect_feature_types(&dataset)?;
    Ok(json!({
        "dataset": id,
        "features": features,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoop_core::AutoopConfig;
    use tempfile::TempDir;

    #[test]
    fn test_upload_then_features() {
        let tmp = TempDir::new().unwrap();
        let csv = tmp.path().join("houses.csv");
        std::fs::write(&csv, "rooms,city,price\n3,Oslo,100\n4,Rome,150\n").unwrap();
        let mut system = AutoMlSystem::open(&AutoopConfig::from_assets_root(tmp.path().join("assets"))).unwrap();

        let uploaded = run(
            &mut system,
            DatasetCommand::Upload {
                csv,
                name: None,
                version: None,
            },
        )
        .unwrap();
        assert_eq!(uploaded["artifact"]["name"], "houses");
        assert_eq!(uploaded["artifact"]["asset_path"], "dataset/houses");
        assert_eq!(uploaded["rows"], 2);

        let id = uploaded["artifact"]["id"].as_str().unwrap().to_string();
        let features = run(&mut system, DatasetCommand::Features { id }).unwrap();
        assert_eq!(features["features"][1]["type"], "categorical");
        assert_eq!(features["features"][2]["type"], "numerical");
    }

    #[test]
    fn test_upload_rejects_ragged_csv() {
        let tmp = TempDir::new().unwrap();
        let csv = tmp.path().join("bad.csv");
        std::fs::write(&csv, "a,b\n1\n").unwrap();
        let mut system = AutoMlSystem::open(&AutoopConfig::from_assets_root(tmp.path())).unwrap();

        let result = run(
            &mut system,
            DatasetCommand::Upload {
                csv,
                name: Some("bad".into()),
                version: None,
            },
        );
        assert!(result.is_err());
        assert!(system.registry().list(None).unwrap().is_empty());
    }
}
