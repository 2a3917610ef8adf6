//! `autoop pipeline ...`

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use autoop_core::ml::{
    CLASSIFICATION_METRICS, Dataset, Feature, ModelType, Pipeline, REGRESSION_METRICS,
    detect_frame_feature_types, get_metric, get_model,
};
use autoop_core::{ArtifactType, AutoMlSystem, DEFAULT_VERSION, generate_id};
use clap::Subcommand;
use serde_json::{Value, json};
use tracing::info;

use super::describe_artifact;

#[derive(Debug, Subcommand)]
pub enum PipelineCommand {
    /// Train and evaluate a model on a registered dataset
    Run {
        /// Dataset artifact id
        #[arg(long)]
        dataset: String,
        /// Model name, e.g. multiple_linear_regression or random_forest
        #[arg(long)]
        model: String,
        /// Target column
        #[arg(long)]
        target: String,
        /// Input column, repeatable (defaults to every other column)
        #[arg(long = "input")]
        inputs: Vec<String>,
        /// Metric name, repeatable (defaults to every metric for the model type)
        #[arg(long = "metric")]
        metrics: Vec<String>,
        /// Fraction of rows used for training
        #[arg(long, default_value_t = 0.8)]
        split: f64,
        /// Register the fitted pipeline under this name
        #[arg(long)]
        save: Option<String>,
        /// Version of the saved pipeline
        #[arg(long, requires = "save")]
        version: Option<String>,
    },
    /// Describe a saved pipeline
    Show { id: String },
    /// Predict the target for every row of a CSV file
    Predict {
        /// Pipeline artifact id
        id: String,
        /// CSV file containing the pipeline's input columns
        csv: PathBuf,
    },
}

pub fn run(system: &mut AutoMlSystem, command: PipelineCommand) -> Result<Value> {
    match command {
        PipelineCommand::Run {
            dataset,
            model,
            target,
            inputs,
            metrics,
            split,
            save,
            version,
        } => {
            let request = RunRequest {
                dataset,
                model,
                target,
                inputs,
                metrics,
                split,
            };
            execute(system, &request, save.as_deref(), version.as_deref())
        }
        PipelineCommand::Show { id } => show(system, &id),
        PipelineCommand::Predict { id, csv } => predict(system, &id, &csv),
    }
}

struct RunRequest {
    dataset: String,
    model: String,
    target: String,
    inputs: Vec<String>,
    metrics: Vec<String>,
    split: f64,
}

fn execute(
    system: &mut AutoMlSystem,
    request: &RunRequest,
    save: Option<&str>,
    version: Option<&str>,
) -> Result<Value> {
    let dataset = Dataset::from_artifact(system.registry().get(&request.dataset)?)?;
    let features = detect_frame_feature_types(&dataset.read()?);

    let target = find_feature(&features, &request.target)?;
    let inputs = if request.inputs.is_empty() {
        features
            .iter()
            .filter(|f| f.name() != request.target)
            .cloned()
            .collect()
    } else {
        request
            .inputs
            .iter()
            .map(|name| find_feature(&features, name))
            .collect::<Result<Vec<_>>>()?
    };

    let model = get_model(&request.model)?;
    let metric_names: Vec<String> = if request.metrics.is_empty() {
        let defaults = match model.model_type() {
            ModelType::Regression => REGRESSION_METRICS,
            ModelType::Classification => CLASSIFICATION_METRICS,
        };
        defaults.iter().map(|name| (*name).to_string()).collect()
    } else {
        request.metrics.clone()
    };
    let metrics = metric_names
        .iter()
        .map(|name| get_metric(name))
        .collect::<autoop_core::Result<Vec<_>>>()?;

    let mut pipeline = Pipeline::new(dataset, model, metrics, inputs, target, request.split)?;
    let result = pipeline.execute()?;

    let saved = match save {
        Some(name) => {
            let version = version.unwrap_or(DEFAULT_VERSION);
            check_save_target(system, &pipeline, name, version)?;
            let artifact = pipeline.save(name, version, &format!("pipeline/{name}.blob"))?;
            system.registry_mut().register(&artifact)?;
            info!(id = %artifact.id(), "Saved pipeline");
            Some(describe_artifact(&artifact))
        }
        None => None,
    };

    Ok(json!({
        "pipeline": pipeline.summary(),
        "result": result,
        "saved": saved,
    }))
}

/// Refuse a save that would replace the pipeline's own dataset or any non-pipeline artifact.
fn check_save_target(
    system: &AutoMlSystem,
    pipeline: &Pipeline,
    name: &str,
    version: &str,
) -> Result<()> {
    let id = generate_id(name, version);
    if id == pipeline.dataset().id() {
        bail!("cannot save pipeline as {name:?} version {version}: id {id} belongs to its dataset");
    }
    if system.registry().exists(&id)? {
        let existing = system.registry().get(&id)?;
        if *existing.artifact_type() != ArtifactType::Pipeline {
            bail!(
                "cannot save pipeline as {name:?} version {version}: id {id} belongs to a {} artifact",
                existing.artifact_type()
            );
        }
    }
    Ok(())
}

fn find_feature(features: &[Feature], name: &str) -> Result<Feature> {
    features
        .iter()
        .find(|f| f.name() == name)
        .cloned()
        .ok_or_else(|| anyhow!("dataset has no column named {name:?}"))
}

fn show(system: &AutoMlSystem, id: &str) -> Result<Value> {
    let artifact = system.registry().get(id)?;
    let pipeline = Pipeline::from_artifact(system.registry(), &artifact)?;
    Ok(json!({
        "artifact": describe_artifact(&artifact),
        "pipeline": pipeline.summary(),
    }))
}

fn predict(system: &AutoMlSystem, id: &str, csv: &Path) -> Result<Value> {
    let artifact = system.registry().get(id)?;
    let pipeline = Pipeline::from_artifact(system.registry(), &artifact)?;

    let bytes = std::fs::read(csv).with_context(|| format!("failed to read {}", csv.display()))?;
    let predictions = pipeline
        .predict_csv(&bytes)
        .with_context(|| format!("failed to predict {}", csv.display()))?;
    info!(id, rows = predictions.len(), "Predicted");

    Ok(json!({
        "pipeline": id,
        "target": pipeline.target_feature().name(),
        "predictions": predictions,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::dataset::{self, DatasetCommand};
    use autoop_core::AutoopConfig;
    use tempfile::TempDir;

    fn upload(system: &mut AutoMlSystem, dir: &Path, file: &str, csv: &str) -> String {
        let path = dir.join(file);
        std::fs::write(&path, csv).unwrap();
        let uploaded = dataset::run(
            system,
            DatasetCommand::Upload {
                csv: path,
                name: None,
                version: None,
            },
        )
        .unwrap();
        uploaded["artifact"]["id"].as_str().unwrap().to_string()
    }

    fn linear_csv() -> String {
        let mut csv = String::from("x,y\n");
        for i in 0..20 {
            csv.push_str(&format!("{i},{}\n", 2 * i + 1));
        }
        csv
    }

    fn run_command(dataset: &str, model: &str, target: &str, save: Option<&str>) -> PipelineCommand {
        PipelineCommand::Run {
            dataset: dataset.to_string(),
            model: model.to_string(),
            target: target.to_string(),
            inputs: Vec::new(),
            metrics: Vec::new(),
            split: 0.8,
            save: save.map(str::to_string),
            version: None,
        }
    }

    #[test]
    fn test_run_save_show_predict() {
        let tmp = TempDir::new().unwrap();
        let mut system = AutoMlSystem::open(&AutoopConfig::from_assets_root(tmp.path().join("assets"))).unwrap();
        let dataset_id = upload(&mut system, tmp.path(), "line.csv", &linear_csv());

        let output = run(
            &mut system,
            run_command(&dataset_id, "multiple_linear_regression", "y", Some("line_fit")),
        )
        .unwrap();
        assert_eq!(output["result"]["test_metrics"].as_array().unwrap().len(), 3);
        assert_eq!(output["result"]["test_predictions"].as_array().unwrap().len(), 4);
        assert_eq!(output["saved"]["asset_path"], "pipeline/line_fit.blob");
        assert_eq!(output["saved"]["type"], "pipeline");

        let pipeline_id = output["saved"]["id"].as_str().unwrap().to_string();
        let shown = run(&mut system, PipelineCommand::Show { id: pipeline_id.clone() }).unwrap();
        assert_eq!(shown["pipeline"]["model"], "multiple_linear_regression");
        assert_eq!(shown["pipeline"]["target_feature"]["name"], "y");

        let new_rows = tmp.path().join("new.csv");
        std::fs::write(&new_rows, "x\n100\n").unwrap();
        let predicted = run(
            &mut system,
            PipelineCommand::Predict {
                id: pipeline_id,
                csv: new_rows,
            },
        )
        .unwrap();
        let value = predicted["predictions"][0].as_f64().unwrap();
        assert!((value - 201.0).abs() < 1e-6);
    }

    #[test]
    fn test_save_rejects_id_of_existing_dataset() {
        let tmp = TempDir::new().unwrap();
        let mut system = AutoMlSystem::open(&AutoopConfig::from_assets_root(tmp.path().join("assets"))).unwrap();
        let dataset_id = upload(&mut system, tmp.path(), "line.csv", &linear_csv());
        let other_id = upload(&mut system, tmp.path(), "other.csv", &linear_csv());

        for name in ["line", "other"] {
            let err = run(
                &mut system,
                run_command(&dataset_id, "multiple_linear_regression", "y", Some(name)),
            )
            .unwrap_err();
            assert!(err.to_string().contains("cannot save pipeline"));
        }

        let listed = system.registry().list(Some(&ArtifactType::Dataset)).unwrap();
        assert_eq!(listed.len(), 2);
        assert!(system.registry().list(Some(&ArtifactType::Pipeline)).unwrap().is_empty());
        assert!(run(&mut system, PipelineCommand::Show { id: dataset_id }).is_err());
        assert_eq!(
            *system.registry().get(&other_id).unwrap().artifact_type(),
            ArtifactType::Dataset
        );
    }

    #[test]
    fn test_save_replaces_existing_pipeline() {
        let tmp = TempDir::new().unwrap();
        let mut system = AutoMlSystem::open(&AutoopConfig::from_assets_root(tmp.path().join("assets"))).unwrap();
        let dataset_id = upload(&mut system, tmp.path(), "line.csv", &linear_csv());

        let first = run(&mut system, run_command(&dataset_id, "lasso", "y", Some("fit"))).unwrap();
        let second = run(
            &mut system,
            run_command(&dataset_id, "multiple_linear_regression", "y", Some("fit")),
        )
        .unwrap();
        assert_eq!(first["saved"]["id"], second["saved"]["id"]);

        let shown = run(
            &mut system,
            PipelineCommand::Show {
                id: second["saved"]["id"].as_str().unwrap().to_string(),
            },
        )
        .unwrap();
        assert_eq!(shown["pipeline"]["model"], "multiple_linear_regression");
    }

    #[test]
    fn test_predict_keeps_categorical_codes_as_text() {
        let tmp = TempDir::new().unwrap();
        let mut system = AutoMlSystem::open(&AutoopConfig::from_assets_root(tmp.path().join("assets"))).unwrap();
        let mut csv = String::from("code,label\n");
        for i in 0..10 {
            let row = if i % 2 == 0 { "x,a" } else { "1.50,b" };
            csv.push_str(row);
            csv.push('\n');
        }
        let dataset_id = upload(&mut system, tmp.path(), "codes.csv", &csv);

        let output = run(
            &mut system,
            run_command(&dataset_id, "k_nearest_neighbors", "label", Some("codes_knn")),
        )
        .unwrap();
        let pipeline_id = output["saved"]["id"].as_str().unwrap().to_string();

        let new_rows = tmp.path().join("new.csv");
        std::fs::write(&new_rows, "code\n1.50\n").unwrap();
        let predicted = run(
            &mut system,
            PipelineCommand::Predict {
                id: pipeline_id,
                csv: new_rows,
            },
        )
        .unwrap();
        assert_eq!(predicted["predictions"], serde_json::json!(["b"]));
    }

    #[test]
    fn test_run_without_save_registers_nothing() {
        let tmp = TempDir::new().unwrap();
        let mut system = AutoMlSystem::open(&AutoopConfig::from_assets_root(tmp.path().join("assets"))).unwrap();
        let dataset_id = upload(&mut system, tmp.path(), "line.csv", &linear_csv());

        let output = run(&mut system, run_command(&dataset_id, "lasso", "y", None)).unwrap();
        assert!(output["saved"].is_null());
        assert_eq!(system.registry().list(None).unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_target_column() {
        let tmp = TempDir::new().unwrap();
        let mut system = AutoMlSystem::open(&AutoopConfig::from_assets_root(tmp.path().join("assets"))).unwrap();
        let dataset_id = upload(&mut system, tmp.path(), "line.csv", &linear_csv());

        let err = run(&mut system, run_command(&dataset_id, "lasso", "missing", None)).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_model_must_match_target_type() {
        let tmp = TempDir::new().unwrap();
        let mut system = AutoMlSystem::open(&AutoopConfig::from_assets_root(tmp.path().join("assets"))).unwrap();
        let dataset_id = upload(&mut system, tmp.path(), "line.csv", &linear_csv());

        assert!(run(&mut system, run_command(&dataset_id, "k_nearest_neighbors", "y", None)).is_err());
    }

    #[test]
    fn test_classification_defaults_to_classification_metrics() {
        let tmp = TempDir::new().unwrap();
        let mut system = AutoMlSystem::open(&AutoopConfig::from_assets_root(tmp.path().join("assets"))).unwrap();
        let mut csv = String::from("size,label\n");
        for i in 0..20 {
            let label = if i < 10 { "small" } else { "large" };
            csv.push_str(&format!("{i},{label}\n"));
        }
        let dataset_id = upload(&mut system, tmp.path(), "sizes.csv", &csv);

        let output = run(
            &mut system,
            run_command(&dataset_id, "k_nearest_neighbors", "label", None),
        )
        .unwrap();
        let names: Vec<&str> = output["pipeline"]["metrics"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m.as_str().unwrap())
            .collect();
        assert_eq!(names, CLASSIFICATION_METRICS);
    }
}
