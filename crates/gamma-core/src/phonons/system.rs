//! Harmonic inputs of a phonon calculation: mesh, cell, masses, and the
//! per-wavevector frequencies, group velocities and eigenvectors.
//!
//! `SystemInput` is the JSON face. Every field is optional at parse time so
//! that a missing one surfaces as `INPUT.MISSING_FIELD` naming the field.

use super::mesh::Mesh;
use crate::common::constants::PI2;
use crate::domain::{ComputeResult, GammaError, ModeIndex};
use crate::numerics::{LatticeError, Matrix3, Vector3, invert3};
use faer::Mat;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Translations of the periodic replicas making up the force-constant supercell.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicaSet {
    pub supercell: [usize; 3],
    pub positions: Vec<Vector3>,
}

#[derive(Debug, Clone)]
pub struct PhononSystem {
    mesh: Mesh,
    cell: Matrix3,
    cell_inverse: Matrix3,
    masses: Vec<f64>,
    frequencies: Mat<f64>,
    velocities: Option<Vec<Vector3>>,
    eigenvectors: Vec<Mat<Complex64>>,
    replicas: Option<ReplicaSet>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SystemInput {
    #[serde(default)]
    pub k_size: Option<[usize; 3]>,
    /// Lattice vectors as rows.
    #[serde(default)]
    pub cell: Option<Matrix3>,
    /// One mass per atom of the unit cell.
    #[serde(default)]
    pub masses: Option<Vec<f64>>,
    /// `[wavevector][branch]`, THz.
    #[serde(default)]
    pub frequencies: Option<Vec<Vec<f64>>>,
    /// `[wavevector][branch][cart]`.
    #[serde(default)]
    pub velocities: Option<Vec<Vec<Vector3>>>,
    /// `[wavevector][atom * 3 + cart][branch]` as `[re, im]`.
    #[serde(default)]
    pub eigenvectors: Option<Vec<Vec<Vec<[f64; 2]>>>>,
    #[serde(default)]
    pub supercell: Option<[usize; 3]>,
    #[serde(default)]
    pub replica_positions: Option<Vec<Vector3>>,
}

fn shape_error(message: String) -> GammaError {
    GammaError::input_validation("INPUT.SYSTEM_SHAPE", message)
}

fn lattice_error(error: LatticeError) -> GammaError {
    GammaError::input_validation("INPUT.SYSTEM_CELL", error.to_string())
}

impl SystemInput {
    pub fn from_json_str(source: &str) -> ComputeResult<Self> {
        serde_json::from_str(source).map_err(|error| {
            GammaError::input_validation(
                "INPUT.SYSTEM_PARSE",
                format!("failed to parse phonon system: {error}"),
            )
        })
    }

    pub fn from_path(path: &Path) -> ComputeResult<Self> {
        let source = fs::read_to_string(path).map_err(|error| {
            GammaError::io_system(
                "IO.SYSTEM_READ",
                format!("failed to read phonon system '{}': {}", path.display(), error),
            )
        })?;
        Self::from_json_str(&source)
    }

    pub fn into_system(self) -> ComputeResult<PhononSystem> {
        let mesh = Mesh::new(self.k_size.ok_or_else(|| GammaError::missing_field("k_size"))?)?;
        let cell = self.cell.ok_or_else(|| GammaError::missing_field("cell"))?;
        let cell_inverse = invert3(&cell).map_err(lattice_error)?;
        let masses = self.masses.ok_or_else(|| GammaError::missing_field("masses"))?;
        let frequency_rows = self
            .frequencies
            .ok_or_else(|| GammaError::missing_field("frequencies"))?;
        let eigenvector_rows = self
            .eigenvectors
            .ok_or_else(|| GammaError::missing_field("eigenvectors"))?;

        if masses.is_empty() {
            return Err(shape_error("at least one atom mass is required".to_string()));
        }
        if let Some(mass) = masses.iter().find(|mass| !mass.is_finite() || **mass <= 0.0) {
            return Err(GammaError::input_validation(
                "INPUT.SYSTEM_MASS",
                format!("atom masses must be finite and > 0, got {mass}"),
            ));
        }

        let nptk = mesh.nptk();
        let n_modes = 3 * masses.len();
        let frequencies = frequency_matrix(&frequency_rows, nptk, n_modes)?;
        let eigenvectors = eigenvector_matrices(&eigenvector_rows, nptk, n_modes)?;
        let velocities = self
            .velocities
            .map(|rows| flatten_velocities(rows, nptk, n_modes))
            .transpose()?;
        let replicas = match (self.supercell, self.replica_positions) {
            (Some(supercell), Some(positions)) => {
                if supercell.iter().any(|count| *count == 0) || positions.is_empty() {
                    return Err(shape_error(
                        "supercell counts and replica positions must be non-empty".to_string(),
                    ));
                }
                Some(ReplicaSet {
                    supercell,
                    positions,
                })
            }
            (None, None) => None,
            (Some(_), None) => return Err(GammaError::missing_field("replica_positions")),
            (None, Some(_)) => return Err(GammaError::missing_field("supercell")),
        };
        if replicas.is_none() && !mesh.is_gamma_only() {
            return Err(GammaError::missing_field("replica_positions"));
        }

        Ok(PhononSystem {
            mesh,
            cell,
            cell_inverse,
            masses,
            frequencies,
            velocities,
            eigenvectors,
            replicas,
        })
    }
}

fn frequency_matrix(rows: &[Vec<f64>], nptk: usize, n_modes: usize) -> ComputeResult<Mat<f64>> {
    if rows.len() != nptk {
        return Err(shape_error(format!(
            "frequencies hold {} wavevectors, mesh has {nptk}",
            rows.len()
        )));
    }
    let mut matrix = Mat::<f64>::zeros(nptk, n_modes);
    for (k, row) in rows.iter().enumerate() {
        if row.len() != n_modes {
            return Err(shape_error(format!(
                "frequencies[{k}] holds {} branches, expected {n_modes}",
                row.len()
            )));
        }
        for (mu, value) in row.iter().copied().enumerate() {
            if !value.is_finite() {
                return Err(shape_error(format!("frequencies[{k}][{mu}] is not finite")));
            }
            matrix[(k, mu)] = value;
        }
    }
    Ok(matrix)
}

fn eigenvector_matrices(
    rows: &[Vec<Vec<[f64; 2]>>],
    nptk: usize,
    n_modes: usize,
) -> ComputeResult<Vec<Mat<Complex64>>> {
    if rows.len() != nptk {
        return Err(shape_error(format!(
            "eigenvectors hold {} wavevectors, mesh has {nptk}",
            rows.len()
        )));
    }
    rows.iter()
        .enumerate()
        .map(|(k, block)| {
            if block.len() != n_modes || block.iter().any(|row| row.len() != n_modes) {
                return Err(shape_error(format!(
                    "eigenvectors[{k}] must be {n_modes}x{n_modes}"
                )));
            }
            let mut matrix = Mat::<Complex64>::zeros(n_modes, n_modes);
            for (cart, row) in block.iter().enumerate() {
                for (mu, [re, im]) in row.iter().copied().enumerate() {
                    matrix[(cart, mu)] = Complex64::new(re, im);
                }
            }
            Ok(matrix)
        })
        .collect()
}

fn flatten_velocities(
    rows: Vec<Vec<Vector3>>,
    nptk: usize,
    n_modes: usize,
) -> ComputeResult<Vec<Vector3>> {
    if rows.len() != nptk || rows.iter().any(|row| row.len() != n_modes) {
        return Err(shape_error(format!(
            "velocities must be {nptk}x{n_modes}x3"
        )));
    }
    Ok(rows.into_iter().flatten().collect())
}

impl PhononSystem {
    pub fn mesh(&self) -> Mesh {
        self.mesh
    }

    pub fn n_modes(&self) -> usize {
        3 * self.masses.len()
    }

    pub fn n_phonons(&self) -> usize {
        self.mesh.nptk() * self.n_modes()
    }

    pub fn cell(&self) -> &Matrix3 {
        &self.cell
    }

    pub fn cell_inverse(&self) -> &Matrix3 {
        &self.cell_inverse
    }

    pub fn masses(&self) -> &[f64] {
        &self.masses
    }

    pub fn frequencies(&self) -> &Mat<f64> {
        &self.frequencies
    }

    pub fn frequency(&self, mode: ModeIndex) -> f64 {
        self.frequencies[(mode.wavevector, mode.branch)]
    }

    /// Angular frequencies `2 pi f`.
    pub fn omegas(&self) -> Mat<f64> {
        let mut omegas = self.frequencies.clone();
        for k in 0..omegas.nrows() {
            for mu in 0..omegas.ncols() {
                omegas[(k, mu)] *= PI2;
            }
        }
        omegas
    }

    /// Flat `[wavevector * n_modes + branch]` group velocities, if supplied.
    pub fn velocities(&self) -> Option<&[Vector3]> {
        self.velocities.as_deref()
    }

    /// Eigenvectors of one wavevector, rows are `atom * 3 + cart`, columns branches.
    pub fn eigenvectors(&self, wavevector: usize) -> &Mat<Complex64> {
        &self.eigenvectors[wavevector]
    }

    pub fn replicas(&self) -> Option<&ReplicaSet> {
        self.replicas.as_ref()
    }

    pub fn n_replicas(&self) -> usize {
        self.replicas
            .as_ref()
            .map_or(1, |replicas| replicas.positions.len())
    }
}
