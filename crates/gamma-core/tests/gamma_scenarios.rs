use gamma_core::common::GammaConfig;
use gamma_core::domain::{ComputeResult, GammaError, GammaErrorCategory, ModeIndex, ProcessKind};
use gamma_core::phonons::{
    PassState, PhononSystem, ProjectedCoupling, SparseThirdOrder, SystemInput, ThirdOrderEntry,
    ThermalCache, TripletRecord, calculate_gamma, compute_occupations, log_path,
};
use num_complex::Complex64;
use std::fs;
use tempfile::TempDir;

fn identity_eigenvectors() -> Vec<Vec<[f64; 2]>> {
    (0..3)
        .map(|row| {
            (0..3)
                .map(|col| if row == col { [1.0, 0.0] } else { [0.0, 0.0] })
                .collect()
        })
        .collect()
}

fn gamma_point_system(frequencies: [f64; 3]) -> PhononSystem {
    SystemInput {
        k_size: Some([1, 1, 1]),
        cell: Some([[5.0, 0.0, 0.0], [0.0, 5.0, 0.0], [0.0, 0.0, 5.0]]),
        masses: Some(vec![28.0]),
        frequencies: Some(vec![frequencies.to_vec()]),
        eigenvectors: Some(vec![identity_eigenvectors()]),
        ..SystemInput::default()
    }
    .into_system()
    .expect("gamma point system should validate")
}

fn uniform_third_order(value: f64) -> SparseThirdOrder {
    let entries = (0..3)
        .flat_map(|first| {
            (0..3).flat_map(move |second| {
                (0..3).map(move |third| ThirdOrderEntry {
                    first,
                    second,
                    third,
                    value,
                })
            })
        })
        .collect();
    SparseThirdOrder::new(3, 1, entries).expect("third order should validate")
}

#[test]
fn isolated_mode_has_no_partners() {
    let temp = TempDir::new().expect("tempdir should be created");
    let mut config = GammaConfig::new(temp.path(), 100.0);
    config.frequency_threshold = 0.1;
    config.sigma_in = Some(0.5);

    // one physical mode; the padding branches sit below threshold
    let system = gamma_point_system([0.0, 5.0, 0.0]);
    let mut seeded = faer::Mat::<f64>::zeros(1, 3);
    seeded[(0, 1)] = 0.3;
    let mut cache = ThermalCache::new(&config, system.frequencies());
    cache
        .set_occupations(seeded.clone())
        .expect("seeding should succeed");
    let occupations = cache.occupations().expect("seeded occupations").clone();
    assert_eq!(occupations, seeded);

    let outcome = calculate_gamma(&system, &uniform_third_order(1.0), &occupations, &config)
        .expect("toy calculation should succeed");

    assert_eq!(outcome.gamma, vec![0.0; 3]);
    assert_eq!(outcome.phase_space, vec![0.0; 3]);
    for report in &outcome.passes {
        assert_eq!(report.state, PassState::Done);
        assert_eq!(report.written_records, 0);
        let text = fs::read_to_string(&report.log_path).expect("log is created empty");
        assert!(text.is_empty());
    }
}

#[test]
fn plus_weight_vanishes_for_equal_partner_populations() {
    let temp = TempDir::new().expect("tempdir should be created");
    let mut config = GammaConfig::new(temp.path(), 300.0);
    config.sigma_in = Some(5.0);

    let system = gamma_point_system([0.5, 2.0, 2.0]);
    let occupations = compute_occupations(system.frequencies(), 300.0, false, 0.001);
    calculate_gamma(&system, &uniform_third_order(0.5), &occupations, &config)
        .expect("calculation should succeed");

    let path = log_path(&config.checkpoint_folder(), ProcessKind::Plus);
    let text = fs::read_to_string(path).expect("plus log should exist");
    let records: Vec<TripletRecord> = text
        .lines()
        .map(|line| TripletRecord::parse_line(line).expect("log line should parse"))
        .collect();

    let frequency = |mode: usize| system.frequency(ModeIndex::from_flat(mode, 3));
    let degenerate: Vec<_> = records
        .iter()
        .filter(|record| frequency(record.kp_mode) == frequency(record.kpp_mode))
        .collect();
    assert!(!degenerate.is_empty());
    for record in degenerate {
        assert_eq!(record.rate, 0.0, "{record:?}");
        assert_eq!(record.dirac, 0.0, "{record:?}");
    }
    assert!(
        records
            .iter()
            .any(|record| frequency(record.kp_mode) != frequency(record.kpp_mode)
                && record.dirac != 0.0)
    );
}

#[test]
fn failing_provider_stops_the_pass() {
    let temp = TempDir::new().expect("tempdir should be created");
    let mut config = GammaConfig::new(temp.path(), 300.0);
    config.sigma_in = Some(5.0);
    let system = gamma_point_system([0.5, 2.0, 2.0]);
    let occupations = compute_occupations(system.frequencies(), 300.0, false, 0.001);

    let provider = |bra: ModeIndex, _: &[Complex64]| -> ComputeResult<ProjectedCoupling> {
        Err(GammaError::io_system(
            "IO.THIRD_ORDER_READ",
            format!("no coupling for branch {}", bra.branch),
        ))
    };
    let error = calculate_gamma(&system, &provider, &occupations, &config)
        .expect_err("provider failure should propagate");
    assert_eq!(error.placeholder(), "RUN.COUPLING_TENSOR");
    assert_eq!(error.category(), GammaErrorCategory::ComputationError);
    assert!(error.message().contains("no coupling"));
}

#[test]
fn mismatched_coupling_shape_is_rejected() {
    let temp = TempDir::new().expect("tempdir should be created");
    let mut config = GammaConfig::new(temp.path(), 300.0);
    config.sigma_in = Some(5.0);
    let system = gamma_point_system([0.5, 2.0, 2.0]);
    let occupations = compute_occupations(system.frequencies(), 300.0, false, 0.001);

    let provider = |_: ModeIndex, _: &[Complex64]| ProjectedCoupling::new(2, 3, Vec::new());
    let error = calculate_gamma(&system, &provider, &occupations, &config)
        .expect_err("two replicas do not fit a gamma point system");
    assert_eq!(error.placeholder(), "RUN.COUPLING_TENSOR");
}

#[test]
fn unsupported_kernel_is_rejected_before_any_work() {
    let temp = TempDir::new().expect("tempdir should be created");
    let mut config = GammaConfig::new(temp.path(), 300.0);
    config.sigma_in = Some(0.5);
    config.broadening = "box".to_string();
    let system = gamma_point_system([0.5, 2.0, 2.0]);
    let occupations = compute_occupations(system.frequencies(), 300.0, false, 0.001);

    let error = calculate_gamma(&system, &uniform_third_order(1.0), &occupations, &config)
        .expect_err("unknown kernel should fail");
    assert_eq!(error.placeholder(), "INPUT.BROADENING_KERNEL");
    assert_eq!(error.exit_code(), 2);
    assert!(!config.checkpoint_folder().exists());
}

#[test]
fn adaptive_widths_require_velocities() {
    let temp = TempDir::new().expect("tempdir should be created");
    let config = GammaConfig::new(temp.path(), 300.0);
    let system = gamma_point_system([0.5, 2.0, 2.0]);
    let occupations = compute_occupations(system.frequencies(), 300.0, false, 0.001);

    let error = calculate_gamma(&system, &uniform_third_order(1.0), &occupations, &config)
        .expect_err("adaptive widths need group velocities");
    assert_eq!(error.placeholder(), "INPUT.MISSING_FIELD");
    assert!(error.message().contains("velocities"));
}

#[test]
fn occupation_shape_must_match_frequencies() {
    let temp = TempDir::new().expect("tempdir should be created");
    let mut config = GammaConfig::new(temp.path(), 300.0);
    config.sigma_in = Some(0.5);
    let system = gamma_point_system([0.5, 2.0, 2.0]);

    let error = calculate_gamma(
        &system,
        &uniform_third_order(1.0),
        &faer::Mat::<f64>::zeros(2, 3),
        &config,
    )
    .expect_err("occupations for two wavevectors");
    assert_eq!(error.placeholder(), "INPUT.OCCUPATIONS_SHAPE");
}
