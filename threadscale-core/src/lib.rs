#![warn(missing_docs)]
//! Threadscale Core - Range Parsing and Log Scraping
//!
//! The two input stages of a scaling session:
//! - [`parse_thread_range`] turns a compact specification such as
//!   `"0,1,2:8:2"` into the ordered set of thread counts to run
//! - [`StatsExtractor`] scans a run's log and pulls out the metrics named by
//!   a [`RuleSet`]

mod extract;
mod range;

pub use extract::{
    ExtractError, MetricKind, MetricRule, MetricValue, RuleSet, StatsExtractor, StatsRecord,
};
pub use range::{MAX_THREAD_COUNT, RangeError, parse_thread_range};
