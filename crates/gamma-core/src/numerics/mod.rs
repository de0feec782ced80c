pub mod broadening;
pub mod lattice;
pub mod special;
pub mod width;

pub use broadening::{
    BroadeningKernel, BroadeningShape, DEFAULT_DELTA_THRESHOLD, KernelError, MAX_DELTA_THRESHOLD,
    Widths, gaussian_density, lorentzian_density, triangular_density,
};
pub use lattice::{LatticeError, Matrix3, Vector3, invert3};
pub use special::erf;
pub use width::{AdaptiveWidthEstimator, broadening_width};
