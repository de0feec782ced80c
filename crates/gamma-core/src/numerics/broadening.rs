//! Normalized stand-ins for the energy-conservation delta function.
//!
//! Every kernel integrates to one over the real line at fixed width. When the
//! truncation correction is enabled the density is divided by the fraction of
//! that integral captured inside `delta_threshold` widths, so the truncated
//! window still carries unit weight.

use super::special::erf;
use std::f64::consts::{PI, SQRT_2};
use std::fmt::{Display, Formatter};

pub const DEFAULT_DELTA_THRESHOLD: u32 = 2;
pub const MAX_DELTA_THRESHOLD: u32 = 10;

/// Integral of a unit Lorentzian over `+- n * gamma`, for `n = 1..=10`.
const LORENTZIAN_CORRECTIONS: [f64; MAX_DELTA_THRESHOLD as usize] = [
    0.704_833, 0.844_042, 0.894_863, 0.920_833, 0.936_549, 0.947_071, 0.954_604, 0.960_263,
    0.964_669, 0.968_195,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BroadeningShape {
    Gaussian,
    Lorentzian,
    Triangular,
}

impl BroadeningShape {
    pub fn from_name(name: &str) -> Result<Self, KernelError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "gauss" | "gaussian" => Ok(Self::Gaussian),
            "lorentz" | "lorentzian" => Ok(Self::Lorentzian),
            "triangle" | "triangular" => Ok(Self::Triangular),
            _ => Err(KernelError::UnsupportedKernel {
                name: name.to_string(),
            }),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gaussian => "gauss",
            Self::Lorentzian => "lorentz",
            Self::Triangular => "triangle",
        }
    }

    const fn density_fn(self) -> fn(f64, f64) -> f64 {
        match self {
            Self::Gaussian => gaussian_density,
            Self::Lorentzian => lorentzian_density,
            Self::Triangular => triangular_density,
        }
    }
}

impl Display for BroadeningShape {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KernelError {
    #[error("unsupported broadening kernel '{name}', expected one of gauss, lorentz, triangle")]
    UnsupportedKernel { name: String },
    #[error("delta threshold must be in 1..={max}, got {value}", max = MAX_DELTA_THRESHOLD)]
    ThresholdOutOfRange { value: u32 },
    #[error("broadening input length mismatch: deltas={deltas}, widths={widths}")]
    LengthMismatch { deltas: usize, widths: usize },
}

/// Width argument for vectorized evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Widths<'a> {
    Uniform(f64),
    PerElement(&'a [f64]),
}

/// A kernel resolved once at configuration time.
#[derive(Debug, Clone, Copy)]
pub struct BroadeningKernel {
    shape: BroadeningShape,
    delta_threshold: u32,
    correction: f64,
    density_fn: fn(f64, f64) -> f64,
}

impl BroadeningKernel {
    pub fn new(
        shape: BroadeningShape,
        delta_threshold: u32,
        is_correction_enabled: bool,
    ) -> Result<Self, KernelError> {
        if !(1..=MAX_DELTA_THRESHOLD).contains(&delta_threshold) {
            return Err(KernelError::ThresholdOutOfRange {
                value: delta_threshold,
            });
        }

        let correction = if is_correction_enabled {
            match shape {
                BroadeningShape::Gaussian => erf(delta_threshold as f64 / SQRT_2),
                BroadeningShape::Lorentzian => {
                    LORENTZIAN_CORRECTIONS[(delta_threshold - 1) as usize]
                }
                BroadeningShape::Triangular => 1.0,
            }
        } else {
            1.0
        };

        Ok(Self {
            shape,
            delta_threshold,
            correction,
            density_fn: shape.density_fn(),
        })
    }

    pub fn from_name(
        name: &str,
        delta_threshold: u32,
        is_correction_enabled: bool,
    ) -> Result<Self, KernelError> {
        Self::new(
            BroadeningShape::from_name(name)?,
            delta_threshold,
            is_correction_enabled,
        )
    }

    pub fn shape(&self) -> BroadeningShape {
        self.shape
    }

    pub fn delta_threshold(&self) -> u32 {
        self.delta_threshold
    }

    pub fn correction(&self) -> f64 {
        self.correction
    }

    /// Half-width of the energy window, in the same units as `width`.
    pub fn window(&self, width: f64) -> f64 {
        self.delta_threshold as f64 * width
    }

    pub fn density(&self, delta_energy: f64, width: f64) -> f64 {
        (self.density_fn)(delta_energy, width) / self.correction
    }

    pub fn densities(
        &self,
        deltas: &[f64],
        widths: Widths<'_>,
    ) -> Result<Vec<f64>, KernelError> {
        match widths {
            Widths::Uniform(width) => Ok(deltas
                .iter()
                .map(|delta| self.density(*delta, width))
                .collect()),
            Widths::PerElement(widths) => {
                if widths.len() != deltas.len() {
                    return Err(KernelError::LengthMismatch {
                        deltas: deltas.len(),
                        widths: widths.len(),
                    });
                }
                Ok(deltas
                    .iter()
                    .zip(widths)
                    .map(|(delta, width)| self.density(*delta, *width))
                    .collect())
            }
        }
    }
}

/// `exp(-d^2 / s^2) / sqrt(pi s^2)`
pub fn gaussian_density(delta_energy: f64, sigma: f64) -> f64 {
    (-(delta_energy * delta_energy) / (sigma * sigma)).exp() / (PI * sigma * sigma).sqrt()
}

/// Full width at half maximum `gamma`.
pub fn lorentzian_density(delta_energy: f64, gamma: f64) -> f64 {
    let half_width = gamma * 0.5;
    half_width / (delta_energy * delta_energy + half_width * half_width) / PI
}

pub fn triangular_density(delta_energy: f64, width: f64) -> f64 {
    let delta = delta_energy.abs();
    let width = width.abs();
    if delta < width {
        (1.0 - delta / width) / width
    } else {
        0.0
    }
}
