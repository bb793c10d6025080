#![warn(missing_docs)]
//! Threadscale Statistics
//!
//! Numeric building blocks for a scaling report:
//! - Sample summaries (plain mean, drop-first mean, last sample, sum)
//! - Serial and one-thread baselines with scalability and speedup ratios

mod scaling;
mod summary;

pub use scaling::{BaselineKind, RunBaseline, ScalingError};
pub use summary::{SampleSummary, drop_first_mean, mean, sum};
