pub mod penalty;

pub use penalty::{FineAssessment, FineConfig, FineEngine};
