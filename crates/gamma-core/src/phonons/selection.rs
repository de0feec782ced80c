//! Quasi-momentum and energy conservation filter.
//!
//! For a bra mode `(k, mu)` every mesh point `p` fixes its partner
//! `pp = wrap(k + s p)`. A branch pair `(mup, mupp)` survives when both
//! partner frequencies are physical and the angular mismatch
//! `|w(k, mu) + s w(p, mup) - w(pp, mupp)|` lies inside the kernel window.

use super::mesh::Mesh;
use super::system::PhononSystem;
use crate::common::constants::PI2;
use crate::domain::{ComputeResult, GammaError, ModeIndex, ProcessKind};
use crate::numerics::{AdaptiveWidthEstimator, BroadeningKernel, Vector3};
use faer::Mat;

/// One surviving `(kp, mup, kpp, mupp)` candidate of a bra mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triplet {
    pub index_kp: usize,
    pub branch_p: usize,
    pub index_kpp: usize,
    pub branch_pp: usize,
    /// Absolute angular-frequency mismatch.
    pub delta_omega: f64,
    /// Angular kernel width, `2 pi sigma`.
    pub width: f64,
}

impl Triplet {
    pub fn kp_mode(&self) -> ModeIndex {
        ModeIndex::new(self.index_kp, self.branch_p)
    }

    pub fn kpp_mode(&self) -> ModeIndex {
        ModeIndex::new(self.index_kpp, self.branch_pp)
    }
}

/// Broadening width per candidate, in THz.
#[derive(Debug, Clone, Copy)]
pub enum WidthSource<'a> {
    Fixed(f64),
    Adaptive {
        estimator: AdaptiveWidthEstimator,
        velocities: &'a [Vector3],
        n_modes: usize,
    },
}

impl<'a> WidthSource<'a> {
    pub fn adaptive(system: &'a PhononSystem) -> ComputeResult<Self> {
        let velocities = system
            .velocities()
            .ok_or_else(|| GammaError::missing_field("velocities"))?;
        Ok(Self::Adaptive {
            estimator: AdaptiveWidthEstimator::new(system.cell_inverse(), system.mesh().k_size()),
            velocities,
            n_modes: system.n_modes(),
        })
    }

    /// Row-major `(mup, mupp)` widths, `None` for a fixed width.
    fn pair_widths(&self, index_kp: usize, index_kpp: usize) -> Option<Vec<f64>> {
        match self {
            Self::Fixed(_) => None,
            Self::Adaptive {
                estimator,
                velocities,
                n_modes,
            } => {
                let n = *n_modes;
                let velocities_p = &velocities[index_kp * n..(index_kp + 1) * n];
                let velocities_pp = &velocities[index_kpp * n..(index_kpp + 1) * n];
                Some(estimator.pair_widths(velocities_p, velocities_pp))
            }
        }
    }
}

/// Adaptive widths of every branch pair between two wavevectors.
pub fn adaptive_widths(
    system: &PhononSystem,
    index_kp: usize,
    index_kpp: usize,
) -> ComputeResult<Vec<f64>> {
    let source = WidthSource::adaptive(system)?;
    Ok(source
        .pair_widths(index_kp, index_kpp)
        .unwrap_or_default())
}

pub struct SelectionInput<'a> {
    pub mesh: Mesh,
    pub process: ProcessKind,
    pub bra: ModeIndex,
    pub frequencies: &'a Mat<f64>,
    pub omegas: &'a Mat<f64>,
    pub frequency_threshold: f64,
    pub kernel: &'a BroadeningKernel,
    pub widths: WidthSource<'a>,
}

/// Survivors in `(kp, mup, mupp)` mesh order.
pub fn select_triplets(input: &SelectionInput<'_>) -> Vec<Triplet> {
    let n_modes = input.frequencies.ncols();
    let omega_bra = input.omegas[(input.bra.wavevector, input.bra.branch)];
    let sign = input.process.sign_f64();
    let threshold = input.frequency_threshold;
    let mut triplets = Vec::new();

    for (index_kp, index_kpp) in input
        .mesh
        .conjugate_indices(input.bra.wavevector, input.process)
        .into_iter()
        .enumerate()
    {
        let pair_widths = input.widths.pair_widths(index_kp, index_kpp);
        for branch_p in 0..n_modes {
            if input.frequencies[(index_kp, branch_p)] <= threshold {
                continue;
            }
            let partial = omega_bra + sign * input.omegas[(index_kp, branch_p)];
            for branch_pp in 0..n_modes {
                if input.frequencies[(index_kpp, branch_pp)] <= threshold {
                    continue;
                }
                let sigma = match (&input.widths, &pair_widths) {
                    (WidthSource::Fixed(sigma), _) => *sigma,
                    (_, Some(widths)) => widths[branch_p * n_modes + branch_pp],
                    (_, None) => continue,
                };
                let width = PI2 * sigma;
                let delta_omega = (partial - input.omegas[(index_kpp, branch_pp)]).abs();
                if delta_omega < input.kernel.window(width) {
                    triplets.push(Triplet {
                        index_kp,
                        branch_p,
                        index_kpp,
                        branch_pp,
                        delta_omega,
                        width,
                    });
                }
            }
        }
    }
    triplets
}

#[cfg(test)]
mod tests {
    use super::{SelectionInput, WidthSource, adaptive_widths, select_triplets};
    use crate::domain::{ModeIndex, ProcessKind};
    use crate::numerics::{BroadeningKernel, BroadeningShape};
    use crate::phonons::mesh::Mesh;
    use crate::phonons::system::{PhononSystem, SystemInput};

    fn chain_system(frequencies: Vec<Vec<f64>>, velocities: Option<Vec<Vec<[f64; 3]>>>) -> PhononSystem {
        let nptk = frequencies.len();
        let eigen: Vec<Vec<[f64; 2]>> = (0..3)
            .map(|row| (0..3).map(|col| [if row == col { 1.0 } else { 0.0 }, 0.0]).collect())
            .collect();
        SystemInput {
            k_size: Some([nptk, 1, 1]),
            cell: Some([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]),
            masses: Some(vec![1.0]),
            frequencies: Some(frequencies),
            velocities,
            eigenvectors: Some(vec![eigen; nptk]),
            supercell: Some([nptk, 1, 1]),
            replica_positions: Some(vec![[0.0, 0.0, 0.0]]),
        }
        .into_system()
        .expect("chain system should validate")
    }

    fn select(
        system: &PhononSystem,
        process: ProcessKind,
        bra: ModeIndex,
        widths: WidthSource<'_>,
    ) -> Vec<super::Triplet> {
        let kernel = BroadeningKernel::new(BroadeningShape::Gaussian, 2, false)
            .expect("gaussian kernel");
        let omegas = system.omegas();
        select_triplets(&SelectionInput {
            mesh: system.mesh(),
            process,
            bra,
            frequencies: system.frequencies(),
            omegas: &omegas,
            frequency_threshold: 0.1,
            kernel: &kernel,
            widths,
        })
    }

    #[test]
    fn survivors_conserve_momentum_and_energy() {
        let rows = vec![
            vec![0.0, 1.0, 2.0],
            vec![1.0, 2.0, 3.0],
            vec![1.0, 2.0, 3.0],
            vec![2.0, 3.0, 4.0],
        ];
        let system = chain_system(rows, None);
        let mesh = Mesh::new([4, 1, 1]).expect("mesh");

        for process in ProcessKind::ORDER {
            let bra = ModeIndex::new(1, 1);
            let triplets = select(&system, process, bra, WidthSource::Fixed(0.05));
            assert!(!triplets.is_empty(), "{process} should find partners");
            for triplet in &triplets {
                assert_eq!(
                    mesh.wrap_combine(bra.wavevector, process, triplet.index_kp),
                    triplet.index_kpp
                );
                assert!(triplet.delta_omega < 2.0 * triplet.width);
                assert!(system.frequency(triplet.kp_mode()) > 0.1);
                assert!(system.frequency(triplet.kpp_mode()) > 0.1);
            }
        }
    }

    #[test]
    fn plus_process_matches_hand_count() {
        // bra (k=1, f=2.0); plus pairs (p, pp=1+p): (0,1) (1,2) (2,3) (3,0)
        let rows = vec![
            vec![0.0, 1.0, 2.0],
            vec![1.0, 2.0, 3.0],
            vec![1.0, 2.0, 3.0],
            vec![2.0, 3.0, 4.0],
        ];
        let system = chain_system(rows, None);
        let triplets = select(&system, ProcessKind::Plus, ModeIndex::new(1, 1), WidthSource::Fixed(0.01));

        // exact matches of 2 + f(p, mup) == f(pp, mupp)
        let picked: Vec<_> = triplets
            .iter()
            .map(|t| (t.index_kp, t.branch_p, t.index_kpp, t.branch_pp))
            .collect();
        assert_eq!(picked, vec![(0, 1, 1, 2), (1, 0, 2, 2), (2, 0, 3, 1), (2, 1, 3, 2)]);
        assert!(triplets.iter().all(|t| t.delta_omega < 1.0e-12));
    }

    #[test]
    fn non_physical_partners_are_excluded() {
        let system = SystemInput {
            k_size: Some([1, 1, 1]),
            cell: Some([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]),
            masses: Some(vec![1.0]),
            frequencies: Some(vec![vec![0.0, 0.0, 5.0]]),
            eigenvectors: Some(vec![vec![vec![[0.0, 0.0]; 3]; 3]]),
            ..SystemInput::default()
        }
        .into_system()
        .expect("molecule should validate");

        // 5 - 0 == 5 would match exactly, but 0 THz partners are non-physical
        let triplets = select(&system, ProcessKind::Minus, ModeIndex::new(0, 2), WidthSource::Fixed(0.5));
        assert!(triplets.is_empty());
    }

    #[test]
    fn adaptive_widths_use_velocity_differences() {
        let rows = vec![vec![1.0, 2.0, 3.0], vec![1.0, 2.0, 3.0]];
        let velocities = vec![
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]],
            vec![[0.0, 0.0, 0.0], [0.0, 0.0, 0.0], [0.0, 0.0, 0.0]],
        ];
        let system = chain_system(rows.clone(), Some(velocities));

        let widths = adaptive_widths(&system, 0, 1).expect("velocities are present");
        assert_eq!(widths.len(), 9);
        // delta_k = 1 / 2 along x
        assert_eq!(widths[0], 0.0);
        assert!((widths[3] - (0.25_f64 / 6.0).sqrt()).abs() < 1.0e-15);
        assert!((widths[6] - (1.0_f64 / 6.0).sqrt()).abs() < 1.0e-15);

        let without = chain_system(rows, None);
        let error = adaptive_widths(&without, 0, 1).expect_err("velocities are required");
        assert_eq!(error.placeholder(), "INPUT.MISSING_FIELD");

        // zero adaptive width closes the window entirely
        let source = WidthSource::adaptive(&system).expect("adaptive source");
        let triplets = select(&system, ProcessKind::Minus, ModeIndex::new(1, 1), source);
        assert!(triplets.iter().all(|t| t.width > 0.0));
    }
}
