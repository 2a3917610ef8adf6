//! `autoop artifact ...`

use anyhow::Result;
use autoop_core::{ArtifactType, AutoMlSystem};
use clap::Subcommand;
use serde_json::{Value, json};

use super::describe_artifact;

#[derive(Debug, Subcommand)]
pub enum ArtifactCommand {
    /// List registered artifacts
    List {
        /// Only list artifacts of this type (dataset, pipeline, ...)
        #[arg(long = "type")]
        artifact_type: Option<ArtifactType>,
    },
    /// Show one artifact's record
    Show { id: String },
    /// Delete an artifact's bytes and record
    Delete { id: String },
}

pub fn run(system: &mut AutoMlSystem, command: ArtifactCommand) -> Result<Value> {
    match command {
        ArtifactCommand::List { artifact_type } => {
            let artifacts = system.registry().list(artifact_type.as_ref())?;
            Ok(Value::Array(artifacts.iter().map(describe_artifact).collect()))
        }
        ArtifactCommand::Show { id } => Ok(describe_artifact(&system.registry().get(&id)?)),
        ArtifactCommand::Delete { id } => {
            system.registry_mut().delete(&id)?;
            Ok(json!({ "deleted": id }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoop_core::{Artifact, AutoopConfig};
    use tempfile::TempDir;

    #[test]
    fn test_list_show_delete() {
        let tmp = TempDir::new().unwrap();
        let mut system = AutoMlSystem::open(&AutoopConfig::from_assets_root(tmp.path())).unwrap();
        let dataset = Artifact::new("d", ArtifactType::Dataset, "dataset/d").with_data("a\n1\n");
        let report = Artifact::new("r", "report".parse().unwrap(), "report/r").with_data("{}");
        system.registry_mut().register(&dataset).unwrap();
        system.registry_mut().register(&report).unwrap();

        let listed = run(
            &mut system,
            ArtifactCommand::List {
                artifact_type: Some(ArtifactType::Dataset),
            },
        )
        .unwrap();
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert_eq!(listed[0]["size"], 4);

        let shown = run(&mut system, ArtifactCommand::Show { id: report.id() }).unwrap();
        assert_eq!(shown["type"], "report");

        run(&mut system, ArtifactCommand::Delete { id: dataset.id() }).unwrap();
        assert!(run(&mut system, ArtifactCommand::Show { id: dataset.id() }).is_err());
    }
}
