//! Equilibrium occupations and modal heat capacities, memoized on disk.
//!
//! Files live in `<folder>/<temperature>/<classic|quantum>/`. They carry no
//! key besides that path, so stale files survive a change of frequencies
//! until the folder is cleared.

use super::serialization::{decode_f64_matrix, encode_f64_matrix, write_binary_artifact};
use crate::common::GammaConfig;
use crate::common::constants::{KELVIN_TO_JOULE, KELVIN_TO_THZ};
use crate::domain::{ComputeResult, GammaError};
use faer::Mat;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const OCCUPATIONS_FILE: &str = "occupations.bin";
pub const HEAT_CAPACITY_FILE: &str = "c_v.bin";

/// Bose-Einstein (or classical) populations, zero on non-physical modes.
pub fn compute_occupations(
    frequencies: &Mat<f64>,
    temperature: f64,
    is_classic: bool,
    frequency_threshold: f64,
) -> Mat<f64> {
    let thermal_energy = temperature * KELVIN_TO_THZ;
    let mut occupations = Mat::<f64>::zeros(frequencies.nrows(), frequencies.ncols());
    for k in 0..frequencies.nrows() {
        for mu in 0..frequencies.ncols() {
            let frequency = frequencies[(k, mu)];
            if frequency <= frequency_threshold {
                continue;
            }
            occupations[(k, mu)] = if is_classic {
                thermal_energy / frequency
            } else {
                1.0 / ((frequency / thermal_energy).exp() - 1.0)
            };
        }
    }
    occupations
}

pub fn compute_heat_capacity(
    frequencies: &Mat<f64>,
    occupations: &Mat<f64>,
    temperature: f64,
    is_classic: bool,
    frequency_threshold: f64,
) -> Mat<f64> {
    let thermal_energy = temperature * KELVIN_TO_THZ;
    let mut heat_capacity = Mat::<f64>::zeros(frequencies.nrows(), frequencies.ncols());
    for k in 0..frequencies.nrows() {
        for mu in 0..frequencies.ncols() {
            let frequency = frequencies[(k, mu)];
            if frequency <= frequency_threshold {
                continue;
            }
            heat_capacity[(k, mu)] = if is_classic {
                KELVIN_TO_JOULE
            } else {
                let n = occupations[(k, mu)];
                KELVIN_TO_JOULE * n * (n + 1.0) * frequency * frequency
                    / (thermal_energy * thermal_energy)
            };
        }
    }
    heat_capacity
}

/// Explicit get / set access to the two cached fields.
#[derive(Debug)]
pub struct ThermalCache<'a> {
    folder: PathBuf,
    temperature: f64,
    is_classic: bool,
    frequency_threshold: f64,
    frequencies: &'a Mat<f64>,
    occupations: Option<Mat<f64>>,
    heat_capacity: Option<Mat<f64>>,
}

impl<'a> ThermalCache<'a> {
    pub fn new(config: &GammaConfig, frequencies: &'a Mat<f64>) -> Self {
        Self {
            folder: config.thermal_folder(),
            temperature: config.temperature,
            is_classic: config.is_classic,
            frequency_threshold: config.frequency_threshold,
            frequencies,
            occupations: None,
            heat_capacity: None,
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn occupations(&mut self) -> ComputeResult<&Mat<f64>> {
        let values = match self.occupations.take() {
            Some(values) => values,
            None => match self.load(OCCUPATIONS_FILE)? {
                Some(values) => values,
                None => {
                    let values = compute_occupations(
                        self.frequencies,
                        self.temperature,
                        self.is_classic,
                        self.frequency_threshold,
                    );
                    self.persist(OCCUPATIONS_FILE, &values)?;
                    values
                }
            },
        };
        let values: &Mat<f64> = self.occupations.insert(values);
        Ok(values)
    }

    pub fn set_occupations(&mut self, values: Mat<f64>) -> ComputeResult<()> {
        self.check_shape(OCCUPATIONS_FILE, &values)?;
        self.persist(OCCUPATIONS_FILE, &values)?;
        self.occupations = Some(values);
        Ok(())
    }

    pub fn heat_capacity(&mut self) -> ComputeResult<&Mat<f64>> {
        let values = match self.heat_capacity.take() {
            Some(values) => values,
            None => match self.load(HEAT_CAPACITY_FILE)? {
                Some(values) => values,
                None => {
                    let occupations = self.occupations()?.clone();
                    let values = compute_heat_capacity(
                        self.frequencies,
                        &occupations,
                        self.temperature,
                        self.is_classic,
                        self.frequency_threshold,
                    );
                    self.persist(HEAT_CAPACITY_FILE, &values)?;
                    values
                }
            },
        };
        let values: &Mat<f64> = self.heat_capacity.insert(values);
        Ok(values)
    }

    pub fn set_heat_capacity(&mut self, values: Mat<f64>) -> ComputeResult<()> {
        self.check_shape(HEAT_CAPACITY_FILE, &values)?;
        self.persist(HEAT_CAPACITY_FILE, &values)?;
        self.heat_capacity = Some(values);
        Ok(())
    }

    fn check_shape(&self, name: &str, values: &Mat<f64>) -> ComputeResult<()> {
        if values.nrows() != self.frequencies.nrows() || values.ncols() != self.frequencies.ncols() {
            return Err(GammaError::io_system(
                "IO.CACHE_SHAPE",
                format!(
                    "{name} holds {}x{} values, frequencies are {}x{}",
                    values.nrows(),
                    values.ncols(),
                    self.frequencies.nrows(),
                    self.frequencies.ncols()
                ),
            ));
        }
        Ok(())
    }

    fn load(&self, name: &str) -> ComputeResult<Option<Mat<f64>>> {
        let path = self.folder.join(name);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                warn!(path = %path.display(), "thermal cache missing, computing");
                return Ok(None);
            }
            Err(error) => {
                return Err(GammaError::io_system(
                    "IO.CACHE_READ",
                    format!("failed to read '{}': {}", path.display(), error),
                ));
            }
        };
        let values = decode_f64_matrix(&bytes).map_err(|error| {
            GammaError::io_system(
                "IO.CACHE_DECODE",
                format!("failed to decode '{}': {}", path.display(), error),
            )
        })?;
        self.check_shape(name, &values)?;
        debug!(path = %path.display(), "thermal cache loaded");
        Ok(Some(values))
    }

    fn persist(&self, name: &str, values: &Mat<f64>) -> ComputeResult<()> {
        let path = self.folder.join(name);
        write_binary_artifact(&path, &encode_f64_matrix(values)).map_err(|error| {
            GammaError::io_system(
                "IO.CACHE_WRITE",
                format!("failed to write '{}': {}", path.display(), error),
            )
        })?;
        debug!(path = %path.display(), "thermal cache stored");
        Ok(())
    }
}
