pub mod errors;

pub use errors::{ComputeResult, GammaError, GammaErrorCategory, GammaResult};

use std::fmt::{Display, Formatter};

/// Three-phonon process family. The sign enters both quasi-momentum
/// conservation (`k ± k' = k''`) and the occupation weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessKind {
    Plus,
    Minus,
}

impl ProcessKind {
    /// Plus runs before minus.
    pub const ORDER: [ProcessKind; 2] = [ProcessKind::Plus, ProcessKind::Minus];

    pub const fn sign(self) -> i64 {
        match self {
            Self::Plus => 1,
            Self::Minus => -1,
        }
    }

    pub const fn sign_f64(self) -> f64 {
        match self {
            Self::Plus => 1.0,
            Self::Minus => -1.0,
        }
    }

    pub const fn is_plus(self) -> bool {
        matches!(self, Self::Plus)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plus => "plus",
            Self::Minus => "minus",
        }
    }

    /// Suffix used for the per-process checkpoint file.
    pub const fn log_suffix(self) -> &'static str {
        match self {
            Self::Plus => "_1",
            Self::Minus => "_0",
        }
    }
}

impl Display for ProcessKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// A vibrational mode as `(wavevector, branch)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModeIndex {
    pub wavevector: usize,
    pub branch: usize,
}

impl ModeIndex {
    pub const fn new(wavevector: usize, branch: usize) -> Self {
        Self { wavevector, branch }
    }

    pub const fn flat(self, n_modes: usize) -> usize {
        self.wavevector * n_modes + self.branch
    }

    pub const fn from_flat(nu: usize, n_modes: usize) -> Self {
        Self {
            wavevector: nu / n_modes,
            branch: nu % n_modes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ModeIndex, ProcessKind};

    #[test]
    fn flat_mode_index_is_invertible() {
        let n_modes = 6;
        for nu in 0..(4 * n_modes) {
            let mode = ModeIndex::from_flat(nu, n_modes);
            assert!(mode.branch < n_modes);
            assert_eq!(mode.flat(n_modes), nu);
        }
        assert_eq!(ModeIndex::new(2, 5).flat(n_modes), 17);
    }

    #[test]
    fn process_order_and_labels_are_stable() {
        assert_eq!(ProcessKind::ORDER, [ProcessKind::Plus, ProcessKind::Minus]);
        assert_eq!(ProcessKind::Plus.sign(), 1);
        assert_eq!(ProcessKind::Minus.sign(), -1);
        assert_eq!(ProcessKind::Plus.log_suffix(), "_1");
        assert_eq!(ProcessKind::Minus.log_suffix(), "_0");
        assert_eq!(ProcessKind::Minus.to_string(), "minus");
    }
}
