use super::system::PhononSystem;
use crate::common::constants::PI2;
use crate::domain::{ComputeResult, GammaError};
use crate::numerics::lattice::{dot3, mat_vec, replicate_cell, wrap_minimum_image};
use crate::numerics::invert3;
use faer::Mat;
use num_complex::Complex64;

/// `chi[k, r] = exp(i dx_r . q_k)` for every mesh wavevector and replica.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseFactors {
    values: Mat<Complex64>,
}

impl PhaseFactors {
    /// Unit factors for a non-periodic system.
    pub fn constant(nptk: usize, n_replicas: usize) -> Self {
        let mut values = Mat::<Complex64>::zeros(nptk, n_replicas);
        for k in 0..nptk {
            for replica in 0..n_replicas {
                values[(k, replica)] = Complex64::new(1.0, 0.0);
            }
        }
        Self { values }
    }

    pub fn for_mesh(system: &PhononSystem) -> ComputeResult<Self> {
        let mesh = system.mesh();
        let replicas = match system.replicas() {
            Some(replicas) if !mesh.is_gamma_only() => replicas,
            _ => return Ok(Self::constant(mesh.nptk(), system.n_replicas())),
        };

        let replicated_cell = replicate_cell(system.cell(), replicas.supercell);
        let replicated_inverse = invert3(&replicated_cell).map_err(|error| {
            GammaError::input_validation("INPUT.SYSTEM_CELL", error.to_string())
        })?;
        let translations: Vec<_> = replicas
            .positions
            .iter()
            .map(|position| wrap_minimum_image(position, &replicated_cell, &replicated_inverse))
            .collect();

        let mut values = Mat::<Complex64>::zeros(mesh.nptk(), translations.len());
        for k in 0..mesh.nptk() {
            let mut wavevector = mat_vec(system.cell_inverse(), &mesh.fractional(k));
            for component in wavevector.iter_mut() {
                *component *= PI2;
            }
            for (replica, translation) in translations.iter().enumerate() {
                values[(k, replica)] = Complex64::from_polar(1.0, dot3(translation, &wavevector));
            }
        }
        Ok(Self { values })
    }

    pub fn nptk(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_replicas(&self) -> usize {
        self.values.ncols()
    }

    pub fn get(&self, wavevector: usize, replica: usize) -> Complex64 {
        self.values[(wavevector, replica)]
    }
}

#[cfg(test)]
mod tests {
    use super::PhaseFactors;
    use crate::phonons::system::SystemInput;
    use std::f64::consts::PI;

    fn chain_input(k_size: [usize; 3], supercell: [usize; 3]) -> SystemInput {
        let nptk: usize = k_size.iter().product();
        let eigen: Vec<Vec<[f64; 2]>> = (0..3)
            .map(|row| (0..3).map(|col| [f64::from(u8::from(row == col)), 0.0]).collect())
            .collect();
        SystemInput {
            k_size: Some(k_size),
            cell: Some([[2.0, 0.0, 0.0], [0.0, 3.0, 0.0], [0.0, 0.0, 4.0]]),
            masses: Some(vec![1.0]),
            frequencies: Some(vec![vec![1.0, 2.0, 3.0]; nptk]),
            velocities: None,
            eigenvectors: Some(vec![eigen; nptk]),
            supercell: Some(supercell),
            replica_positions: Some(vec![[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [4.0, 0.0, 0.0]]),
        }
    }

    #[test]
    fn gamma_only_mesh_has_unit_phases() {
        let system = chain_input([1, 1, 1], [3, 1, 1])
            .into_system()
            .expect("system should validate");
        let phases = PhaseFactors::for_mesh(&system).expect("phases should build");

        assert_eq!(phases.nptk(), 1);
        assert_eq!(phases.n_replicas(), 3);
        for replica in 0..3 {
            assert_eq!(phases.get(0, replica).re, 1.0);
            assert_eq!(phases.get(0, replica).im, 0.0);
        }
    }

    #[test]
    fn periodic_phases_follow_wrapped_translations() {
        let system = chain_input([3, 1, 1], [3, 1, 1])
            .into_system()
            .expect("system should validate");
        let phases = PhaseFactors::for_mesh(&system).expect("phases should build");

        // q_1 = 2 pi / (3 * 2); replica 2 at x = 4 wraps to x = -2 in a 6 long cell
        let q = 2.0 * PI / 6.0;
        let expected = [0.0, 2.0 * q, -2.0 * q];
        for (replica, angle) in expected.into_iter().enumerate() {
            let value = phases.get(1, replica);
            assert!((value.norm() - 1.0).abs() < 1.0e-14);
            assert!((value.arg() - angle).abs() < 1.0e-12, "replica {replica}");
        }
        for replica in 0..3 {
            assert!((phases.get(0, replica).re - 1.0).abs() < 1.0e-15);
        }
    }
}
