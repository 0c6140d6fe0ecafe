//! Fixed-cadence resampling of per-entity trajectories.

pub mod grid;
pub mod resample;

use thiserror::Error;

pub use grid::TimeGrid;
pub use resample::{resample, select_indices};

#[derive(Debug, Error, PartialEq)]
pub enum SampleError {
    #[error("grid interval must be greater than zero")]
    InvalidInterval,

    #[error("entity {0} has no rows")]
    NoRows(String),

    #[error("entity {entity}: row {row} has a non-finite timestamp")]
    NonFiniteTimestamp { entity: String, row: usize },

    #[error("timeline ends at {t_end_ms}ms, before the first observation")]
    NegativeTimeline { t_end_ms: f64 },

    #[error("grid of {points} points exceeds the {max} point limit")]
    GridTooLarge { points: u64, max: u64 },
}
