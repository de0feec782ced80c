pub mod config;
pub mod constants;

pub use config::{DEFAULT_BROADENING, DEFAULT_FREQUENCY_THRESHOLD, GammaConfig};
