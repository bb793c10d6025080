//! Session Metadata

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Describes the session a table was collected in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMeta {
    /// Tool version
    pub version: String,
    /// When the session started
    pub started_at: DateTime<Utc>,
    /// Workload command line
    pub command: Vec<String>,
    /// Repeats per launch
    pub runs: usize,
    /// Planned thread counts, in run order
    pub threads: Vec<u32>,
}

impl ReportMeta {
    /// Metadata stamped with the current time
    pub fn new(command: Vec<String>, runs: usize, threads: Vec<u32>) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: Utc::now(),
            command,
            runs,
            threads,
        }
    }
}
