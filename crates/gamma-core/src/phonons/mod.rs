pub mod accumulator;
pub mod checkpoint;
pub mod coupling;
pub mod matrix_element;
pub mod mesh;
pub mod phase;
pub mod selection;
pub mod serialization;
pub mod system;
pub mod thermal;
pub mod traits;

pub use accumulator::{GammaAccumulator, GammaOutcome, PassReport, PassState, calculate_gamma};
pub use checkpoint::{
    CheckpointError, CheckpointReplay, CheckpointSummary, CheckpointWriter, TripletRecord,
    log_path, replay_log,
};
pub use coupling::{
    CouplingEntry, ProjectedCoupling, SparseThirdOrder, ThirdOrderEntry, ThirdOrderInput,
};
pub use matrix_element::{MatrixElementEngine, RescaledEigenvectors};
pub use mesh::Mesh;
pub use phase::PhaseFactors;
pub use selection::{SelectionInput, Triplet, WidthSource, adaptive_widths, select_triplets};
pub use system::{PhononSystem, ReplicaSet, SystemInput};
pub use thermal::{ThermalCache, compute_heat_capacity, compute_occupations};
pub use traits::CouplingProvider;
