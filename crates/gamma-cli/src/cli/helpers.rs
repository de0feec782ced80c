use super::CliError;
use anyhow::Context;
use faer::Mat;
use gamma_core::common::GammaConfig;
use gamma_core::phonons::serialization::write_text_artifact;
use gamma_core::phonons::{PhononSystem, SparseThirdOrder, SystemInput, ThirdOrderInput};
use serde::Serialize;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Installs the stderr subscriber; `RUST_LOG` wins over `--verbose`.
pub(super) fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // ignored when a subscriber is already installed
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}

pub(super) fn load_config(path: &Path) -> Result<GammaConfig, CliError> {
    Ok(GammaConfig::from_path(path)?)
}

pub(super) fn load_system(path: &Path) -> Result<PhononSystem, CliError> {
    Ok(SystemInput::from_path(path)?.into_system()?)
}

pub(super) fn load_third_order(path: &Path) -> Result<SparseThirdOrder, CliError> {
    Ok(ThirdOrderInput::from_path(path)?.into_tensor()?)
}

pub(super) fn matrix_rows(matrix: &Mat<f64>) -> Vec<Vec<f64>> {
    (0..matrix.nrows())
        .map(|row| (0..matrix.ncols()).map(|col| matrix[(row, col)]).collect())
        .collect()
}

/// Pretty JSON to `output`, or to stdout when absent.
pub(super) fn emit_json<T: Serialize>(value: &T, output: Option<&Path>) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render JSON output")?;
    match output {
        Some(path) => write_text_artifact(path, &rendered)
            .with_context(|| format!("failed to write '{}'", path.display()))?,
        None => println!("{rendered}"),
    }
    Ok(())
}
