use super::coupling::ProjectedCoupling;
use crate::domain::{ComputeResult, ModeIndex};
use num_complex::Complex64;

/// Produces the third-order coupling already contracted with one bra mode.
///
/// `bra_vector` is the mass-rescaled eigenvector of `bra`, indexed by
/// `atom * 3 + cart`.
pub trait CouplingProvider {
    fn projected_coupling(
        &self,
        bra: ModeIndex,
        bra_vector: &[Complex64],
    ) -> ComputeResult<ProjectedCoupling>;
}

impl<F> CouplingProvider for F
where
    F: Fn(ModeIndex, &[Complex64]) -> ComputeResult<ProjectedCoupling>,
{
    fn projected_coupling(
        &self,
        bra: ModeIndex,
        bra_vector: &[Complex64],
    ) -> ComputeResult<ProjectedCoupling> {
        self(bra, bra_vector)
    }
}
