//! Checkpointed accumulation of scattering rates.
//!
//! Each process pass moves through `NotStarted -> Resuming -> Computing ->
//! Done`. The per-process log is the only resume state: every record on disk
//! is replayed into the accumulators before the first unvisited bra mode is
//! computed. Fresh contributions are rounded to log precision before they are
//! summed, so a resumed run reproduces an uninterrupted one exactly.

use super::checkpoint::{CheckpointWriter, TripletRecord, log_path, replay_log};
use super::matrix_element::{MatrixElementEngine, RescaledEigenvectors};
use super::phase::PhaseFactors;
use super::selection::{SelectionInput, Triplet, WidthSource, select_triplets};
use super::system::PhononSystem;
use super::traits::CouplingProvider;
use crate::common::GammaConfig;
use crate::common::constants::RATE_PREFACTOR;
use crate::domain::{ComputeResult, GammaError, ModeIndex, ProcessKind};
use crate::numerics::BroadeningKernel;
use faer::Mat;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassState {
    NotStarted,
    Resuming,
    Computing,
    Done,
}

impl PassState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Resuming => "resuming",
            Self::Computing => "computing",
            Self::Done => "done",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PassReport {
    pub process: ProcessKind,
    pub state: PassState,
    pub log_path: PathBuf,
    /// First bra mode computed in this invocation.
    pub start_mode: usize,
    pub resumed_records: usize,
    pub discarded_records: usize,
    pub written_records: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GammaOutcome {
    /// Scattering rate per flat mode index.
    pub gamma: Vec<f64>,
    pub phase_space: Vec<f64>,
    /// `[bra, partner]` contributions, present only when requested.
    pub gamma_tensor: Option<Mat<f64>>,
    pub passes: [PassReport; 2],
}

/// Running totals owned by one `calculate_gamma` invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct GammaAccumulator {
    gamma: Vec<f64>,
    phase_space: Vec<f64>,
    gamma_tensor: Option<Mat<f64>>,
}

impl GammaAccumulator {
    pub fn new(n_phonons: usize, is_gamma_tensor_enabled: bool) -> Self {
        Self {
            gamma: vec![0.0; n_phonons],
            phase_space: vec![0.0; n_phonons],
            gamma_tensor: is_gamma_tensor_enabled.then(|| Mat::<f64>::zeros(n_phonons, n_phonons)),
        }
    }

    pub fn n_phonons(&self) -> usize {
        self.gamma.len()
    }

    pub fn gamma(&self) -> &[f64] {
        &self.gamma
    }

    pub fn phase_space(&self) -> &[f64] {
        &self.phase_space
    }

    pub fn gamma_tensor(&self) -> Option<&Mat<f64>> {
        self.gamma_tensor.as_ref()
    }

    /// Adds one record; plus subtracts from the `kp` partner's tensor entry.
    pub fn apply(&mut self, process: ProcessKind, record: &TripletRecord) -> ComputeResult<()> {
        let n_phonons = self.n_phonons();
        if record.bra >= n_phonons || record.kp_mode >= n_phonons || record.kpp_mode >= n_phonons {
            return Err(GammaError::computation(
                "RUN.CHECKPOINT_MISMATCH",
                format!(
                    "record ({}, {}, {}) does not fit a system of {n_phonons} modes",
                    record.bra, record.kp_mode, record.kpp_mode
                ),
            ));
        }

        self.gamma[record.bra] += record.rate;
        self.phase_space[record.bra] += record.dirac;
        if let Some(tensor) = self.gamma_tensor.as_mut() {
            match process {
                ProcessKind::Plus => tensor[(record.bra, record.kp_mode)] -= record.rate,
                ProcessKind::Minus => tensor[(record.bra, record.kp_mode)] += record.rate,
            }
            tensor[(record.bra, record.kpp_mode)] += record.rate;
        }
        Ok(())
    }

    pub fn into_outcome(self, passes: [PassReport; 2]) -> GammaOutcome {
        GammaOutcome {
            gamma: self.gamma,
            phase_space: self.phase_space,
            gamma_tensor: self.gamma_tensor,
            passes,
        }
    }
}

/// Read-only fields shared by both passes.
struct PassContext<'a, P: ?Sized> {
    system: &'a PhononSystem,
    provider: &'a P,
    occupations: &'a Mat<f64>,
    frequency_threshold: f64,
    kernel: BroadeningKernel,
    widths: WidthSource<'a>,
    eigenvectors: RescaledEigenvectors,
    phases: PhaseFactors,
    omegas: Mat<f64>,
}

/// Runs the plus pass then the minus pass, resuming each from its log.
pub fn calculate_gamma<P>(
    system: &PhononSystem,
    provider: &P,
    occupations: &Mat<f64>,
    config: &GammaConfig,
) -> ComputeResult<GammaOutcome>
where
    P: CouplingProvider + ?Sized,
{
    let kernel = config.validate()?;
    let frequencies = system.frequencies();
    if occupations.nrows() != frequencies.nrows() || occupations.ncols() != frequencies.ncols() {
        return Err(GammaError::input_validation(
            "INPUT.OCCUPATIONS_SHAPE",
            format!(
                "occupations are {}x{}, frequencies are {}x{}",
                occupations.nrows(),
                occupations.ncols(),
                frequencies.nrows(),
                frequencies.ncols()
            ),
        ));
    }
    let widths = match config.sigma_in {
        Some(sigma) => WidthSource::Fixed(sigma),
        None => WidthSource::adaptive(system)?,
    };

    let context = PassContext {
        system,
        provider,
        occupations,
        frequency_threshold: config.frequency_threshold,
        kernel,
        widths,
        eigenvectors: RescaledEigenvectors::new(system),
        phases: PhaseFactors::for_mesh(system)?,
        omegas: system.omegas(),
    };
    let folder = config.checkpoint_folder();
    info!(
        folder = %folder.display(),
        n_phonons = system.n_phonons(),
        kernel = %kernel.shape(),
        "lifetime calculation started"
    );

    let mut accumulator =
        GammaAccumulator::new(system.n_phonons(), config.is_gamma_tensor_enabled);
    let plus = run_pass(&context, ProcessKind::Plus, &folder, &mut accumulator)?;
    let minus = run_pass(&context, ProcessKind::Minus, &folder, &mut accumulator)?;
    Ok(accumulator.into_outcome([plus, minus]))
}

fn run_pass<P>(
    context: &PassContext<'_, P>,
    process: ProcessKind,
    folder: &Path,
    accumulator: &mut GammaAccumulator,
) -> ComputeResult<PassReport>
where
    P: CouplingProvider + ?Sized,
{
    let path = log_path(folder, process);
    let mut report = PassReport {
        process,
        state: PassState::NotStarted,
        log_path: path.clone(),
        start_mode: 0,
        resumed_records: 0,
        discarded_records: 0,
        written_records: 0,
    };

    let mut truncate_to = None;
    if let Some(replay) = replay_log(&path)? {
        report.state = PassState::Resuming;
        for record in &replay.records {
            accumulator.apply(process, record)?;
        }
        report.resumed_records = replay.records.len();
        report.discarded_records = replay.discarded_records;
        report.start_mode = replay.resume_mode();
        if replay.has_torn_tail {
            warn!(
                path = %path.display(),
                discarded = replay.discarded_records,
                resume_mode = report.start_mode,
                "checkpoint tail was torn, recomputing the unfinished mode"
            );
        }
        if replay.needs_truncation() {
            truncate_to = Some(replay.valid_len);
        }
        info!(
            process = %process,
            records = report.resumed_records,
            resume_mode = report.start_mode,
            "resuming from checkpoint"
        );
    }

    report.state = PassState::Computing;
    let system = context.system;
    let n_modes = system.n_modes();
    let mut writer = CheckpointWriter::open(&path, truncate_to)?;
    let engine = MatrixElementEngine::new(&context.eigenvectors, &context.phases, process);

    for nu in report.start_mode..system.n_phonons() {
        let bra = ModeIndex::from_flat(nu, n_modes);
        if system.frequency(bra) <= context.frequency_threshold {
            continue;
        }

        let triplets = select_triplets(&SelectionInput {
            mesh: system.mesh(),
            process,
            bra,
            frequencies: system.frequencies(),
            omegas: &context.omegas,
            frequency_threshold: context.frequency_threshold,
            kernel: &context.kernel,
            widths: context.widths,
        });
        if triplets.is_empty() {
            debug!(process = %process, nu, "no triplet survives");
            continue;
        }

        let records = evaluate_mode(context, &engine, process, bra, &triplets)?;
        for record in &records {
            accumulator.apply(process, record)?;
        }
        writer.append_mode(&records)?;
        debug!(process = %process, nu, triplets = records.len(), "bra mode done");
    }

    report.written_records = writer.finish()?;
    report.state = PassState::Done;
    info!(
        process = %process,
        written = report.written_records,
        resumed = report.resumed_records,
        "scattering pass done"
    );
    Ok(report)
}

fn evaluate_mode<P>(
    context: &PassContext<'_, P>,
    engine: &MatrixElementEngine<'_>,
    process: ProcessKind,
    bra: ModeIndex,
    triplets: &[Triplet],
) -> ComputeResult<Vec<TripletRecord>>
where
    P: CouplingProvider + ?Sized,
{
    let system = context.system;
    let n_modes = system.n_modes();
    let nu = bra.flat(n_modes);

    let coupling = context
        .provider
        .projected_coupling(bra, &context.eigenvectors.bra_vector(bra))
        .map_err(|error| {
            GammaError::computation(
                "RUN.COUPLING_TENSOR",
                format!("coupling tensor for mode {nu} could not be produced: {error}"),
            )
        })?;
    if coupling.n_modes() != n_modes || coupling.n_replicas() != context.phases.n_replicas() {
        return Err(GammaError::computation(
            "RUN.COUPLING_TENSOR",
            format!(
                "coupling for mode {nu} spans {} replicas x {} modes, system has {} x {n_modes}",
                coupling.n_replicas(),
                coupling.n_modes(),
                context.phases.n_replicas()
            ),
        ));
    }

    let squared = engine.squared_elements(&coupling, triplets);
    let omegas = &context.omegas;
    let occupations = context.occupations;
    let omega_bra = omegas[(bra.wavevector, bra.branch)];
    let nptk = system.mesh().nptk() as f64;

    Ok(triplets
        .iter()
        .zip(squared)
        .map(|(triplet, matrix_element_sq)| {
            let kp = triplet.kp_mode();
            let kpp = triplet.kpp_mode();
            let n_p = occupations[(kp.wavevector, kp.branch)];
            let n_pp = occupations[(kpp.wavevector, kpp.branch)];
            let weight = match process {
                ProcessKind::Plus => n_p - n_pp,
                ProcessKind::Minus => 0.5 * (1.0 + n_p + n_pp),
            };
            let dirac = weight
                / (omegas[(kp.wavevector, kp.branch)] * omegas[(kpp.wavevector, kpp.branch)])
                * context.kernel.density(triplet.delta_omega, triplet.width);
            let rate = RATE_PREFACTOR * matrix_element_sq * dirac / omega_bra / nptk;
            TripletRecord::quantized(nu, kp.flat(n_modes), kpp.flat(n_modes), rate, dirac)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::{GammaAccumulator, PassState};
    use crate::domain::ProcessKind;
    use crate::phonons::checkpoint::TripletRecord;

    #[test]
    fn tensor_signs_follow_process() {
        let mut accumulator = GammaAccumulator::new(4, true);
        let record = TripletRecord::quantized(1, 2, 3, 0.5, 2.0);
        accumulator
            .apply(ProcessKind::Plus, &record)
            .expect("record fits");
        accumulator
            .apply(ProcessKind::Minus, &record)
            .expect("record fits");

        assert_eq!(accumulator.gamma(), &[0.0, 1.0, 0.0, 0.0]);
        assert_eq!(accumulator.phase_space(), &[0.0, 4.0, 0.0, 0.0]);
        let tensor = accumulator.gamma_tensor().expect("tensor enabled");
        assert_eq!(tensor[(1, 2)], 0.0);
        assert_eq!(tensor[(1, 3)], 1.0);
        assert_eq!(tensor[(0, 0)], 0.0);
    }

    #[test]
    fn disabled_tensor_is_absent_and_bad_records_fail() {
        let mut accumulator = GammaAccumulator::new(2, false);
        assert!(accumulator.gamma_tensor().is_none());
        let error = accumulator
            .apply(ProcessKind::Plus, &TripletRecord::quantized(0, 5, 1, 1.0, 1.0))
            .expect_err("partner outside the system");
        assert_eq!(error.placeholder(), "RUN.CHECKPOINT_MISMATCH");
        assert_eq!(PassState::Done.as_str(), "done");
    }
}
