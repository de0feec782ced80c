//! Run configuration for the scattering-rate engine.
//!
//! The on-disk form is JSON. `GammaConfig::validate` resolves the kernel name
//! and checks every numeric field before any computation starts.

use crate::domain::{ComputeResult, GammaError};
use crate::numerics::{BroadeningKernel, DEFAULT_DELTA_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_FREQUENCY_THRESHOLD: f64 = 0.001;
pub const DEFAULT_BROADENING: &str = "gauss";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GammaConfig {
    /// Root folder for caches and checkpoint logs.
    pub folder: PathBuf,
    /// Kelvin.
    pub temperature: f64,
    #[serde(default)]
    pub is_classic: bool,
    /// THz. Modes at or below are treated as non-physical.
    #[serde(default = "default_frequency_threshold")]
    pub frequency_threshold: f64,
    /// Fixed broadening width in THz; adaptive widths are used when absent.
    #[serde(default)]
    pub sigma_in: Option<f64>,
    #[serde(default = "default_broadening")]
    pub broadening: String,
    #[serde(default = "default_delta_threshold")]
    pub delta_threshold: u32,
    #[serde(default)]
    pub is_delta_correction_enabled: bool,
    #[serde(default)]
    pub is_gamma_tensor_enabled: bool,
}

fn default_frequency_threshold() -> f64 {
    DEFAULT_FREQUENCY_THRESHOLD
}

fn default_broadening() -> String {
    DEFAULT_BROADENING.to_string()
}

fn default_delta_threshold() -> u32 {
    DEFAULT_DELTA_THRESHOLD
}

impl GammaConfig {
    pub fn new(folder: impl Into<PathBuf>, temperature: f64) -> Self {
        Self {
            folder: folder.into(),
            temperature,
            is_classic: false,
            frequency_threshold: DEFAULT_FREQUENCY_THRESHOLD,
            sigma_in: None,
            broadening: DEFAULT_BROADENING.to_string(),
            delta_threshold: DEFAULT_DELTA_THRESHOLD,
            is_delta_correction_enabled: false,
            is_gamma_tensor_enabled: false,
        }
    }

    pub fn from_json_str(source: &str) -> ComputeResult<Self> {
        serde_json::from_str(source).map_err(|error| {
            GammaError::input_validation(
                "INPUT.CONFIG_PARSE",
                format!("failed to parse gamma configuration: {error}"),
            )
        })
    }

    pub fn from_path(path: &Path) -> ComputeResult<Self> {
        let source = fs::read_to_string(path).map_err(|error| {
            GammaError::io_system(
                "IO.CONFIG_READ",
                format!("failed to read configuration '{}': {}", path.display(), error),
            )
        })?;
        Self::from_json_str(&source)
    }

    /// Validates every field and resolves the broadening kernel.
    pub fn validate(&self) -> ComputeResult<BroadeningKernel> {
        if !self.temperature.is_finite() || self.temperature <= 0.0 {
            return Err(GammaError::input_validation(
                "INPUT.CONFIG_TEMPERATURE",
                format!("temperature must be finite and > 0, got {}", self.temperature),
            ));
        }
        if !self.frequency_threshold.is_finite() || self.frequency_threshold < 0.0 {
            return Err(GammaError::input_validation(
                "INPUT.CONFIG_THRESHOLD",
                format!(
                    "frequency threshold must be finite and >= 0, got {}",
                    self.frequency_threshold
                ),
            ));
        }
        if let Some(sigma) = self.sigma_in {
            if !sigma.is_finite() || sigma <= 0.0 {
                return Err(GammaError::input_validation(
                    "INPUT.CONFIG_SIGMA",
                    format!("fixed broadening width must be finite and > 0, got {sigma}"),
                ));
            }
        }

        BroadeningKernel::from_name(
            &self.broadening,
            self.delta_threshold,
            self.is_delta_correction_enabled,
        )
        .map_err(|error| GammaError::input_validation("INPUT.BROADENING_KERNEL", error.to_string()))
    }

    pub fn statistics_label(&self) -> &'static str {
        if self.is_classic { "classic" } else { "quantum" }
    }

    /// `<folder>/<temperature>/<classic|quantum>`
    pub fn thermal_folder(&self) -> PathBuf {
        self.folder
            .join(self.temperature.to_string())
            .join(self.statistics_label())
    }

    /// Checkpoint directory, with a `sigma_in_*` sub-folder for fixed widths.
    pub fn checkpoint_folder(&self) -> PathBuf {
        let base = self.thermal_folder();
        match self.sigma_in {
            Some(sigma) => base.join(format!("sigma_in_{}", sigma.to_string().replace('.', "_"))),
            None => base,
        }
    }
}
