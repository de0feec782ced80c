//! Scattering amplitudes `M[n, m] = sum V[l,i,t,j] e1[n,i] chi1[l] e2[m,j] chi2[t]`.
//!
//! `e1`/`chi1` belong to `kp` and are conjugated for minus processes only;
//! `e2`/`chi2` belong to `kpp` and are always conjugated. The coupling is
//! first folded with both phase vectors into an `n_modes x n_modes` block,
//! then sandwiched between the two eigenvector sets.

use super::coupling::ProjectedCoupling;
use super::phase::PhaseFactors;
use super::selection::Triplet;
use super::system::PhononSystem;
use crate::domain::{ModeIndex, ProcessKind};
use faer::Mat;
use num_complex::Complex64;

/// Eigenvectors divided by `sqrt(mass)`, stored `[k][(branch, atom * 3 + cart)]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RescaledEigenvectors {
    per_wavevector: Vec<Mat<Complex64>>,
}

impl RescaledEigenvectors {
    pub fn new(system: &PhononSystem) -> Self {
        let n_modes = system.n_modes();
        let inverse_sqrt_mass: Vec<f64> = system
            .masses()
            .iter()
            .flat_map(|mass| [1.0 / mass.sqrt(); 3])
            .collect();

        let per_wavevector = (0..system.mesh().nptk())
            .map(|k| {
                let raw = system.eigenvectors(k);
                let mut rescaled = Mat::<Complex64>::zeros(n_modes, n_modes);
                for branch in 0..n_modes {
                    for cart in 0..n_modes {
                        rescaled[(branch, cart)] = raw[(cart, branch)] * inverse_sqrt_mass[cart];
                    }
                }
                rescaled
            })
            .collect();
        Self { per_wavevector }
    }

    pub fn n_modes(&self) -> usize {
        self.per_wavevector.first().map_or(0, |block| block.nrows())
    }

    pub fn get(&self, wavevector: usize) -> &Mat<Complex64> {
        &self.per_wavevector[wavevector]
    }

    pub fn bra_vector(&self, mode: ModeIndex) -> Vec<Complex64> {
        let block = &self.per_wavevector[mode.wavevector];
        (0..block.ncols())
            .map(|cart| block[(mode.branch, cart)])
            .collect()
    }
}

pub struct MatrixElementEngine<'a> {
    eigenvectors: &'a RescaledEigenvectors,
    phases: &'a PhaseFactors,
    process: ProcessKind,
}

impl<'a> MatrixElementEngine<'a> {
    pub fn new(
        eigenvectors: &'a RescaledEigenvectors,
        phases: &'a PhaseFactors,
        process: ProcessKind,
    ) -> Self {
        Self {
            eigenvectors,
            phases,
            process,
        }
    }

    /// `|M|^2` for each triplet, in input order. Runs of triplets sharing a
    /// `kp` reuse one dense amplitude block.
    pub fn squared_elements(&self, coupling: &ProjectedCoupling, triplets: &[Triplet]) -> Vec<f64> {
        let mut squared = Vec::with_capacity(triplets.len());
        let mut start = 0;
        while start < triplets.len() {
            let head = triplets[start];
            let run = triplets[start..]
                .iter()
                .take_while(|triplet| {
                    triplet.index_kp == head.index_kp && triplet.index_kpp == head.index_kpp
                })
                .count();
            let amplitudes = self.amplitudes(coupling, head.index_kp, head.index_kpp);
            squared.extend(
                triplets[start..start + run]
                    .iter()
                    .map(|triplet| amplitudes[(triplet.branch_p, triplet.branch_pp)].norm_sqr()),
            );
            start += run;
        }
        squared
    }

    /// Dense `(branch_p, branch_pp)` amplitude block for one wavevector pair.
    pub fn amplitudes(
        &self,
        coupling: &ProjectedCoupling,
        index_kp: usize,
        index_kpp: usize,
    ) -> Mat<Complex64> {
        let n_modes = coupling.n_modes();
        let conjugate_first = !self.process.is_plus();

        let mut folded = Mat::<Complex64>::zeros(n_modes, n_modes);
        for entry in coupling.entries() {
            let chi_first = self.phases.get(index_kp, entry.replica_a);
            let chi_first = if conjugate_first { chi_first.conj() } else { chi_first };
            let chi_second = self.phases.get(index_kpp, entry.replica_b).conj();
            folded[(entry.index_a, entry.index_b)] += entry.value * chi_first * chi_second;
        }

        let first = self.eigenvectors.get(index_kp);
        let second = self.eigenvectors.get(index_kpp);
        let zero = Complex64::new(0.0, 0.0);

        let mut half = Mat::<Complex64>::zeros(n_modes, n_modes);
        for branch in 0..n_modes {
            for col in 0..n_modes {
                let mut sum = zero;
                for row in 0..n_modes {
                    let left = first[(branch, row)];
                    let left = if conjugate_first { left.conj() } else { left };
                    sum += left * folded[(row, col)];
                }
                half[(branch, col)] = sum;
            }
        }

        let mut amplitudes = Mat::<Complex64>::zeros(n_modes, n_modes);
        for branch_p in 0..n_modes {
            for branch_pp in 0..n_modes {
                let mut sum = zero;
                for col in 0..n_modes {
                    sum += half[(branch_p, col)] * second[(branch_pp, col)].conj();
                }
                amplitudes[(branch_p, branch_pp)] = sum;
            }
        }
        amplitudes
    }
}
