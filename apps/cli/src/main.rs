//! AutoOp command-line interface
//!
//! Registers CSV datasets, trains and evaluates model pipelines on them, and
//! manages the stored artifacts. Every command prints one JSON document on
//! stdout; logs go to stderr.

mod commands;
mod config;

use std::path::PathBuf;

use anyhow::Result;
use autoop_core::AutoMlSystem;
use clap::{Parser, Subcommand};
use tracing::debug;

use commands::{artifact::ArtifactCommand, dataset::DatasetCommand, pipeline::PipelineCommand};
use config::LogFormat;

#[derive(Debug, Parser)]
#[command(name = "autoop", version, about = "Artifact registry and ML pipeline runner")]
struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, global = true, env = "AUTOOP_CONFIG")]
    config: Option<PathBuf>,

    /// Assets directory holding `objects/` and `dbo/`; overrides any configuration
    #[arg(long, global = true)]
    assets: Option<PathBuf>,

    /// Log output format on stderr
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Manage datasets
    #[command(subcommand)]
    Dataset(DatasetCommand),
    /// Inspect and delete stored artifacts
    #[command(subcommand)]
    Artifact(ArtifactCommand),
    /// Run, inspect and apply pipelines
    #[command(subcommand)]
    Pipeline(PipelineCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    config::init_tracing(cli.log_format);
    debug!(log_format = cli.log_format.as_str(), "Logging initialized");

    let settings = config::resolve(cli.config.as_deref(), cli.assets.as_ref())?;
    settings.log_startup();

    let mut system = AutoMlSystem::open(&settings)?;
    let output = match cli.command {
        Command::Dataset(command) => commands::dataset::run(&mut system, command)?,
        Command::Artifact(command) => commands::artifact::run(&mut system, command)?,
        Command::Pipeline(command) => commands::pipeline::run(&mut system, command)?,
    };
    commands::print_json(&output)
}
