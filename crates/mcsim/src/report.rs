//! Run report printed by the CLI

use clap::ValueEnum;
use color_eyre::eyre::eyre;
use mcsim_core::{FittedDistribution, Summary};
use serde::Serialize;

/// Serialization format of the report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

/// Summary of one model output column
#[derive(Debug, Clone, Serialize)]
pub struct OutputReport {
    pub name: String,
    pub summary: Summary,
}

/// Parameters estimated for a variable declared with a `fit` block
#[derive(Debug, Clone, Serialize)]
pub struct FittedVariable {
    pub name: String,
    pub fit: FittedDistribution,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Iterations actually evaluated (fewer than configured if a stop rule fired)
    pub iterations: usize,
    /// Worker threads the engine resolved to
    pub workers: usize,
    pub outputs: Vec<OutputReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fitted: Vec<FittedVariable>,
}

impl Report {
    pub fn render(&self, format: OutputFormat) -> color_eyre::Result<String> {
        match format {
            OutputFormat::Yaml => serde_saphyr::to_string(self)
                .map_err(|e| eyre!("failed to serialize report as YAML: {e}")),
            OutputFormat::Json => serde_json::to_string_pretty(self)
                .map_err(|e| eyre!("failed to serialize report as JSON: {e}")),
        }
    }
}
