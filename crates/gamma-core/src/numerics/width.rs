use super::lattice::{Matrix3, Vector3};

/// Per-pair broadening width derived from group-velocity differences.
///
/// The velocity difference of two modes is projected on the reciprocal cell
/// divided by the mesh density; the width is `sqrt(sum(projection^2) / 6)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptiveWidthEstimator {
    delta_k: Matrix3,
}

impl AdaptiveWidthEstimator {
    pub fn new(cell_inverse: &Matrix3, k_size: [usize; 3]) -> Self {
        let mut delta_k = [[0.0; 3]; 3];
        for (row, values) in delta_k.iter_mut().enumerate() {
            for (col, value) in values.iter_mut().enumerate() {
                *value = cell_inverse[row][col] / k_size[col] as f64;
            }
        }
        Self { delta_k }
    }

    pub fn width(&self, velocity_difference: &Vector3) -> f64 {
        let sum_sq: f64 = self
            .delta_k
            .iter()
            .map(|row| {
                let projected: f64 = row
                    .iter()
                    .zip(velocity_difference)
                    .map(|(delta, velocity)| delta * velocity)
                    .sum();
                projected * projected
            })
            .sum();
        (sum_sq / 6.0).sqrt()
    }

    /// Widths for every branch pair of two wavevectors, row-major in
    /// `(branch_p, branch_pp)`.
    pub fn pair_widths(&self, velocities_p: &[Vector3], velocities_pp: &[Vector3]) -> Vec<f64> {
        let mut widths = Vec::with_capacity(velocities_p.len() * velocities_pp.len());
        for velocity_p in velocities_p {
            for velocity_pp in velocities_pp {
                let difference = [
                    velocity_p[0] - velocity_pp[0],
                    velocity_p[1] - velocity_pp[1],
                    velocity_p[2] - velocity_pp[2],
                ];
                widths.push(self.width(&difference));
            }
        }
        widths
    }
}

pub fn broadening_width(
    velocity_difference: &Vector3,
    cell_inverse: &Matrix3,
    k_size: [usize; 3],
) -> f64 {
    AdaptiveWidthEstimator::new(cell_inverse, k_size).width(velocity_difference)
}

#[cfg(test)]
mod tests {
    use super::{AdaptiveWidthEstimator, broadening_width};

    #[test]
    fn cubic_cell_width_matches_closed_form() {
        let lattice = 5.0;
        let cell_inverse = [
            [1.0 / lattice, 0.0, 0.0],
            [0.0, 1.0 / lattice, 0.0],
            [0.0, 0.0, 1.0 / lattice],
        ];
        let k_size = [4, 4, 2];
        let difference = [1.0, 2.0, -3.0];

        let expected = ((1.0 / 20.0_f64).powi(2) + (2.0 / 20.0_f64).powi(2) + (3.0 / 10.0_f64).powi(2))
            / 6.0;
        let actual = broadening_width(&difference, &cell_inverse, k_size);
        assert!((actual - expected.sqrt()).abs() < 1.0e-15);
    }

    #[test]
    fn identical_velocities_give_zero_width() {
        let estimator = AdaptiveWidthEstimator::new(&[[0.2, 0.1, 0.0], [0.0, 0.2, 0.0], [0.0, 0.0, 0.2]], [3, 3, 3]);
        let velocities = [[0.5, -0.25, 1.0], [2.0, 0.0, 0.0]];
        let widths = estimator.pair_widths(&velocities, &velocities);

        assert_eq!(widths.len(), 4);
        assert_eq!(widths[0], 0.0);
        assert_eq!(widths[3], 0.0);
        assert!(widths[1] > 0.0);
        assert_eq!(widths[1], widths[2]);
    }
}
