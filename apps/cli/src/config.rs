//! Command-line configuration: logging setup and storage root resolution.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use autoop_core::AutoopConfig;
use clap::ValueEnum;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "autoop=info,autoop_core=info,autoop_cli=info";

/// Log output format on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
        }
    }
}

/// Install the global tracing subscriber. Logs go to stderr so stdout stays JSON.
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

/// Resolve storage roots: `--assets` wins over `--config`, which wins over the environment.
pub fn resolve(config_file: Option<&Path>, assets: Option<&PathBuf>) -> Result<AutoopConfig> {
    if let Some(root) = assets {
        return Ok(AutoopConfig::from_assets_root(root));
    }
    AutoopConfig::load(config_file).with_context(|| match config_file {
        Some(path) => format!("failed to load configuration from {}", path.display()),
        None => "failed to load configuration".to_string(),
    })
}
