//! Third-order coupling, raw and projected onto a bra mode.
//!
//! The raw tensor is sparse in `(first, second, third)` where `first` runs
//! over the unit-cell cartesian coordinates and `second`/`third` over
//! `replica * n_modes + cart`. Projecting contracts `first` with the bra
//! eigenvector and leaves a sparse `(replica, cart, replica, cart)` tensor.

use super::traits::CouplingProvider;
use crate::domain::{ComputeResult, GammaError, ModeIndex};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CouplingEntry {
    pub replica_a: usize,
    pub index_a: usize,
    pub replica_b: usize,
    pub index_b: usize,
    pub value: Complex64,
}

/// Bra-projected coupling `V[l, i, t, j]`, stored sparse.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedCoupling {
    n_replicas: usize,
    n_modes: usize,
    entries: Vec<CouplingEntry>,
}

impl ProjectedCoupling {
    pub fn new(
        n_replicas: usize,
        n_modes: usize,
        entries: Vec<CouplingEntry>,
    ) -> ComputeResult<Self> {
        if let Some(entry) = entries.iter().find(|entry| {
            entry.replica_a >= n_replicas
                || entry.replica_b >= n_replicas
                || entry.index_a >= n_modes
                || entry.index_b >= n_modes
        }) {
            return Err(GammaError::computation(
                "RUN.COUPLING_TENSOR",
                format!(
                    "coupling entry ({}, {}, {}, {}) is outside {n_replicas} replicas x {n_modes} modes",
                    entry.replica_a, entry.index_a, entry.replica_b, entry.index_b
                ),
            ));
        }
        Ok(Self {
            n_replicas,
            n_modes,
            entries,
        })
    }

    pub fn n_replicas(&self) -> usize {
        self.n_replicas
    }

    pub fn n_modes(&self) -> usize {
        self.n_modes
    }

    pub fn entries(&self) -> &[CouplingEntry] {
        &self.entries
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThirdOrderEntry {
    pub first: usize,
    pub second: usize,
    pub third: usize,
    pub value: f64,
}

/// Raw third-order force constants in sparse form.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseThirdOrder {
    n_modes: usize,
    n_replicas: usize,
    entries: Vec<ThirdOrderEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThirdOrderInput {
    #[serde(default)]
    pub n_modes: Option<usize>,
    #[serde(default)]
    pub n_replicas: Option<usize>,
    #[serde(default)]
    pub entries: Option<Vec<ThirdOrderEntry>>,
}

impl ThirdOrderInput {
    pub fn from_path(path: &Path) -> ComputeResult<Self> {
        let source = fs::read_to_string(path).map_err(|error| {
            GammaError::io_system(
                "IO.THIRD_ORDER_READ",
                format!("failed to read third order '{}': {}", path.display(), error),
            )
        })?;
        serde_json::from_str(&source).map_err(|error| {
            GammaError::input_validation(
                "INPUT.THIRD_ORDER_PARSE",
                format!("failed to parse third order: {error}"),
            )
        })
    }

    pub fn into_tensor(self) -> ComputeResult<SparseThirdOrder> {
        SparseThirdOrder::new(
            self.n_modes
                .ok_or_else(|| GammaError::missing_field("n_modes"))?,
            self.n_replicas
                .ok_or_else(|| GammaError::missing_field("n_replicas"))?,
            self.entries
                .ok_or_else(|| GammaError::missing_field("entries"))?,
        )
    }
}

impl SparseThirdOrder {
    pub fn new(
        n_modes: usize,
        n_replicas: usize,
        entries: Vec<ThirdOrderEntry>,
    ) -> ComputeResult<Self> {
        let span = n_replicas * n_modes;
        if let Some(entry) = entries.iter().find(|entry| {
            entry.first >= n_modes || entry.second >= span || entry.third >= span
        }) {
            return Err(GammaError::input_validation(
                "INPUT.THIRD_ORDER_SHAPE",
                format!(
                    "third order entry ({}, {}, {}) is outside {n_modes} x {span} x {span}",
                    entry.first, entry.second, entry.third
                ),
            ));
        }
        if let Some(entry) = entries.iter().find(|entry| !entry.value.is_finite()) {
            return Err(GammaError::input_validation(
                "INPUT.THIRD_ORDER_SHAPE",
                format!(
                    "third order entry ({}, {}, {}) is not finite",
                    entry.first, entry.second, entry.third
                ),
            ));
        }
        Ok(Self {
            n_modes,
            n_replicas,
            entries,
        })
    }

    pub fn n_modes(&self) -> usize {
        self.n_modes
    }

    pub fn n_replicas(&self) -> usize {
        self.n_replicas
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Contracts the first index with `bra_vector`; duplicate targets are summed.
    pub fn project(&self, bra_vector: &[Complex64]) -> ComputeResult<ProjectedCoupling> {
        if bra_vector.len() != self.n_modes {
            return Err(GammaError::computation(
                "RUN.COUPLING_TENSOR",
                format!(
                    "bra vector holds {} components, third order expects {}",
                    bra_vector.len(),
                    self.n_modes
                ),
            ));
        }

        let mut merged: BTreeMap<(usize, usize), Complex64> = BTreeMap::new();
        for entry in &self.entries {
            let contribution = bra_vector[entry.first] * entry.value;
            *merged
                .entry((entry.second, entry.third))
                .or_insert(Complex64::new(0.0, 0.0)) += contribution;
        }

        let entries = merged
            .into_iter()
            .map(|((second, third), value)| CouplingEntry {
                replica_a: second / self.n_modes,
                index_a: second % self.n_modes,
                replica_b: third / self.n_modes,
                index_b: third % self.n_modes,
                value,
            })
            .collect();
        ProjectedCoupling::new(self.n_replicas, self.n_modes, entries)
    }
}

impl CouplingProvider for SparseThirdOrder {
    fn projected_coupling(
        &self,
        _bra: ModeIndex,
        bra_vector: &[Complex64],
    ) -> ComputeResult<ProjectedCoupling> {
        self.project(bra_vector)
    }
}
