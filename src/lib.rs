//! Resamples per-player replay telemetry onto a fixed time grid.
//!
//! Raw parser output for a match is turned into an [`types::EntityTable`] by
//! [`records`], each tracked player is carried forward onto a shared grid by
//! [`sampler`], and [`aggregator`] does this for whole batches. [`pipeline`]
//! wires in the external replay parser and replay acquisition.

pub mod aggregator;
pub mod config;
pub mod error;
pub mod export;
pub mod latency;
pub mod pipeline;
pub mod records;
pub mod replay;
pub mod sampler;
pub mod types;

pub use aggregator::Aggregator;
pub use config::{Config, SamplingOptions};
pub use error::{AppError, Result};
pub use types::{BatchReport, EntityTable, MatchResultSet, RawRecord, ResampledSeries};
