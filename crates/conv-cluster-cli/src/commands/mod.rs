//! CLI command handlers
//!
//! # Modules
//!
//! - `run`: full pipeline over a feature file
//! - `recluster`: re-cluster the coordinates of an annotated file
//! - `summary`: cluster summary of an annotated file
//!
//! Every handler returns the process exit code. Configuration is layered:
//! TOML file (or the command's defaults), then `CONV_CLUSTER_*` environment
//! variables, then command-line flags.

pub mod recluster;
pub mod run;
pub mod summary;

use std::path::Path;

use anyhow::Context;
use conv_cluster_core::config::PipelineConfig;
use tracing::error;

use crate::error::{exit_code_for_error, failed_stage, CliExitCode};

/// Load the config file when given, otherwise start from `defaults`, then
/// apply environment overrides.
pub fn load_config(path: Option<&Path>, defaults: PipelineConfig) -> anyhow::Result<PipelineConfig> {
    let config = match path {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => defaults,
    };
    Ok(config.with_env_overrides())
}

/// Print a command result and turn it into an exit code.
pub fn finish<T: std::fmt::Display>(command: &str, result: anyhow::Result<T>) -> i32 {
    match result {
        Ok(report) => {
            println!("{}", report);
            CliExitCode::Success.into()
        }
        Err(err) => {
            let code = exit_code_for_error(&err);
            let stage = failed_stage(&err).unwrap_or("cli");
            error!("{} failed at stage {}: {:#}", command, stage, err);
            eprintln!("Error [{}]: {:#}", stage, err);
            code.into()
        }
    }
}
