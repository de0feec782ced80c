//! Physical constants and the unit conversions applied by the scattering engine.
//!
//! Values follow CODATA 2014. Frequencies are carried in THz, angular
//! frequencies in rad/ps, and the scattering rate leaves the engine in THz.

use std::f64::consts::PI;

pub const PI2: f64 = 2.0 * PI;

/// Reduced Planck constant, J s.
pub const HBAR: f64 = 1.054_571_800e-34;
/// Elementary charge, C.
pub const ELEMENTARY_CHARGE: f64 = 1.602_176_620_8e-19;
/// Avogadro constant, 1/mol.
pub const AVOGADRO: f64 = 6.022_140_857e23;
/// Boltzmann constant, J/K.
pub const BOLTZMANN: f64 = 1.380_648_52e-23;

/// `k_B T / h` in THz per kelvin.
pub const KELVIN_TO_THZ: f64 = BOLTZMANN / (PI2 * HBAR) * 1.0e-12;
pub const KELVIN_TO_JOULE: f64 = BOLTZMANN;

/// eV to the 10 J/mol force-constant unit.
pub const EV_TO_TEN_J_PER_MOL: f64 = AVOGADRO * ELEMENTARY_CHARGE / 10.0;
pub const GAMMA_TO_THZ: f64 = 1.0e11 * AVOGADRO * EV_TO_TEN_J_PER_MOL * EV_TO_TEN_J_PER_MOL;

/// Prefactor of the golden-rule sum, before division by `omega(bra) * nptk`.
pub const RATE_PREFACTOR: f64 = HBAR * PI / 4.0 * GAMMA_TO_THZ;

#[cfg(test)]
mod tests {
    use super::{
        AVOGADRO, BOLTZMANN, ELEMENTARY_CHARGE, EV_TO_TEN_J_PER_MOL, GAMMA_TO_THZ, HBAR,
        KELVIN_TO_JOULE, KELVIN_TO_THZ, PI2, RATE_PREFACTOR,
    };
    use std::f64::consts::PI;

    #[test]
    fn constants_match_expected_relationships() {
        assert!((PI2 - 2.0 * PI).abs() <= 1.0e-15);
        assert_eq!(KELVIN_TO_JOULE, BOLTZMANN);
        assert!((EV_TO_TEN_J_PER_MOL - 9_648.533).abs() < 1.0e-2);
        // 300 K corresponds to roughly 6.25 THz.
        assert!((300.0 * KELVIN_TO_THZ - 6.251).abs() < 1.0e-2);
    }

    #[test]
    fn physics_constants_remain_finite_and_positive() {
        for value in [
            HBAR,
            ELEMENTARY_CHARGE,
            AVOGADRO,
            BOLTZMANN,
            KELVIN_TO_THZ,
            GAMMA_TO_THZ,
            RATE_PREFACTOR,
        ] {
            assert!(value.is_finite());
            assert!(value > 0.0);
        }
    }
}
