use super::CliError;
use super::helpers::{emit_json, load_config, load_system, load_third_order, matrix_rows};
use gamma_core::domain::GammaError;
use gamma_core::phonons::{GammaOutcome, PassReport, ThermalCache, calculate_gamma, replay_log};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

#[derive(clap::Args)]
pub(super) struct GammaArgs {
    /// Phonon system JSON (mesh, cell, masses, frequencies, eigenvectors)
    #[arg(long)]
    system: PathBuf,

    /// Sparse third-order force constants JSON
    #[arg(long)]
    third_order: PathBuf,

    /// Run configuration JSON
    #[arg(long)]
    config: PathBuf,

    /// Write the result here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(clap::Args)]
pub(super) struct ThermalArgs {
    /// Phonon system JSON
    #[arg(long)]
    system: PathBuf,

    /// Run configuration JSON
    #[arg(long)]
    config: PathBuf,
}

#[derive(clap::Args)]
pub(super) struct CheckpointArgs {
    /// Checkpoint log file (scattering_matrix_0 or scattering_matrix_1)
    #[arg(long)]
    log: PathBuf,
}

#[derive(Serialize)]
struct PassSummary {
    process: &'static str,
    state: &'static str,
    log_path: String,
    start_mode: usize,
    resumed_records: usize,
    discarded_records: usize,
    written_records: usize,
}

impl From<&PassReport> for PassSummary {
    fn from(report: &PassReport) -> Self {
        Self {
            process: report.process.as_str(),
            state: report.state.as_str(),
            log_path: report.log_path.display().to_string(),
            start_mode: report.start_mode,
            resumed_records: report.resumed_records,
            discarded_records: report.discarded_records,
            written_records: report.written_records,
        }
    }
}

#[derive(Serialize)]
struct GammaReport {
    gamma: Vec<f64>,
    phase_space: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gamma_tensor: Option<Vec<Vec<f64>>>,
    passes: Vec<PassSummary>,
}

impl From<GammaOutcome> for GammaReport {
    fn from(outcome: GammaOutcome) -> Self {
        Self {
            passes: outcome.passes.iter().map(PassSummary::from).collect(),
            gamma_tensor: outcome.gamma_tensor.as_ref().map(matrix_rows),
            gamma: outcome.gamma,
            phase_space: outcome.phase_space,
        }
    }
}

#[derive(Serialize)]
struct ThermalReport {
    folder: String,
    occupations: Vec<Vec<f64>>,
    heat_capacity: Vec<Vec<f64>>,
}

pub(super) fn run_gamma_command(args: GammaArgs) -> Result<i32, CliError> {
    let config = load_config(&args.config)?;
    config.validate()?;
    let system = load_system(&args.system)?;
    let third_order = load_third_order(&args.third_order)?;

    let mut cache = ThermalCache::new(&config, system.frequencies());
    let occupations = cache.occupations()?.clone();
    let outcome = calculate_gamma(&system, &third_order, &occupations, &config)?;
    info!(
        modes = outcome.gamma.len(),
        tensor = outcome.gamma_tensor.is_some(),
        "scattering rates ready"
    );

    emit_json(&GammaReport::from(outcome), args.output.as_deref())?;
    Ok(0)
}

pub(super) fn run_thermal_command(args: ThermalArgs) -> Result<i32, CliError> {
    let config = load_config(&args.config)?;
    config.validate()?;
    let system = load_system(&args.system)?;

    let mut cache = ThermalCache::new(&config, system.frequencies());
    let occupations = matrix_rows(cache.occupations()?);
    let heat_capacity = matrix_rows(cache.heat_capacity()?);
    let report = ThermalReport {
        folder: cache.folder().display().to_string(),
        occupations,
        heat_capacity,
    };

    emit_json(&report, None)?;
    Ok(0)
}

pub(super) fn run_checkpoint_command(args: CheckpointArgs) -> Result<i32, CliError> {
    let replay = replay_log(&args.log).map_err(GammaError::from)?.ok_or_else(|| {
        GammaError::io_system(
            "IO.CHECKPOINT_MISSING",
            format!("checkpoint '{}' does not exist", args.log.display()),
        )
    })?;

    emit_json(&replay.summary(), None)?;
    Ok(0)
}
