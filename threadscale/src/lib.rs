#![warn(missing_docs)]
//! # Threadscale
//!
//! Thread-scaling benchmark sessions for workloads that report their own
//! statistics.
//!
//! Threadscale launches a workload once per thread count, scrapes the
//! statistics log each run leaves behind, and aggregates one row per run
//! into a CSV report:
//! - **Thread ranges**: compact specs like `0,1,2,4:16:4`, where `0` is the
//!   serial baseline
//! - **Log scraping**: first-match pattern rules, required or optional,
//!   scalar or comma-separated vector
//! - **Scaling metrics**: drop-first mean, GC and idle time, scalability
//!   against one thread and speedup against the serial run
//! - **Partial reports**: rows collected before a failure or an interrupt
//!   are always written
//!
//! ## Quick Start
//!
//! ```ignore
//! use threadscale::prelude::*;
//!
//! let passes = plan_from_spec(Some("0,1,2"), 0, false)?;
//! let launcher = CommandLauncher::new(LaunchConfig::new("./app", vec![]), Interrupt::new());
//! let meta = ReportMeta::new(vec!["./app".into()], 1, vec![0, 1, 2]);
//! let mut session = Orchestrator::new(launcher, SessionConfig::default(), meta, Interrupt::new())?
//!     .with_sink(ReportSink::new("report.csv", OutputFormat::Csv));
//! session.run(&passes)?;
//! ```

// Re-export parsing and extraction
pub use threadscale_core::{
    ExtractError, MAX_THREAD_COUNT, MetricKind, MetricRule, MetricValue, RangeError, RuleSet,
    StatsExtractor, StatsRecord, parse_thread_range,
};

// Re-export stats
pub use threadscale_stats::{
    BaselineKind, RunBaseline, SampleSummary, ScalingError, drop_first_mean, mean, sum,
};

// Re-export report types
pub use threadscale_report::{
    Cell, OutputFormat, ReportMeta, ReportRow, ReportTable, TableError, format_human_output,
    generate_csv_report, generate_json_report, render_report, scaling_columns,
};

// Re-export session types
pub use threadscale_cli::{
    CommandLauncher, Interrupt, LaunchConfig, LaunchError, MetricsComputer, MetricsError,
    Orchestrator, Pass, ReportSink, RuleCatalog, RunLauncher, RunMode, RunRequest,
    SessionConfig, SessionError, ThreadscaleConfig, plan_from_spec, plan_passes,
};

/// Report column names
pub mod columns {
    pub use threadscale_report::{
        ABORT_RATIO, AVERAGE_TIME, COMMITTED_ITS, CUSTOM_PREFIX, GC_TIME, IDLE_THREAD_TIME,
        LAST_TIME, RUN_PREFIX, SCALABILITY, SERIAL_TIME, SPEEDUP, THREAD, THREAD_TIME,
        TOTAL_ITS, WOGC_RUN_PREFIX, custom_column, run_column, wogc_run_column,
    };
}

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        CommandLauncher, Interrupt, LaunchConfig, Orchestrator, OutputFormat, Pass, ReportMeta,
        ReportSink, RunLauncher, SessionConfig, SessionError, plan_from_spec,
    };
}

/// Run the Threadscale CLI.
///
/// ```ignore
/// fn main() -> anyhow::Result<()> {
///     threadscale::run()
/// }
/// ```
pub use threadscale_cli::run;
