//! Row Metrics
//!
//! Turns one run's [`StatsRecord`] into the cells of a report row, and
//! keeps the session's serial and one-thread reference times.
//!
//! Serial runs do not report per-thread time, so they are scanned with a
//! smaller rule set and their rows leave the thread-time columns empty.

use crate::launcher::RunMode;
use thiserror::Error;
use threadscale_core::{ExtractError, MetricRule, RuleSet, StatsExtractor, StatsRecord};
use threadscale_report::{
    ABORT_RATIO, AVERAGE_TIME, COMMITTED_ITS, Cell, GC_TIME, IDLE_THREAD_TIME, LAST_TIME,
    ReportRow, SCALABILITY, SERIAL_TIME, SPEEDUP, THREAD, THREAD_TIME, TOTAL_ITS, custom_column,
    run_column, wogc_run_column,
};
use threadscale_stats::{BaselineKind, RunBaseline, SampleSummary, ScalingError, sum};

/// Stats key of the GC-inclusive wall time samples
pub const WALLTIME: &str = "walltime";
/// Stats key of the GC-exclusive wall time samples
pub const WALLTIME_WO_GC: &str = "walltime wo gc";

/// Errors deriving a row from extracted statistics
#[derive(Debug, Error)]
pub enum MetricsError {
    /// A built-in metric is absent
    #[error("metric '{0}' missing from statistics")]
    MissingMetric(&'static str),

    /// A sample vector is empty
    #[error("metric '{0}' has no samples")]
    NoSamples(&'static str),

    /// Parallel row requested for zero threads
    #[error("cannot compute a row for zero threads")]
    ZeroThreads,

    /// Baseline missing or zero
    #[error(transparent)]
    Scaling(#[from] ScalingError),
}

/// Extraction rules for serial and parallel passes
#[derive(Debug, Clone)]
pub struct RuleCatalog {
    serial: StatsExtractor,
    parallel: StatsExtractor,
    custom_count: usize,
}

impl RuleCatalog {
    /// Built-in rules plus one optional `CUSTOM<i>` rule per pattern
    pub fn new(custom: &[String], section_marker: Option<&str>) -> Result<Self, ExtractError> {
        let mut rules = RuleSet::new();
        rules.push(MetricRule::scalar(COMMITTED_ITS, r"Committed Iterations: (\S+)")?);
        rules.push(MetricRule::scalar(TOTAL_ITS, r"Total Iterations: (\S+)")?);
        rules.push(MetricRule::scalar(ABORT_RATIO, r"Abort ratio: (\S+)")?);
        rules.push(MetricRule::vector(WALLTIME, r"With GC \(ms\): \[(.*?)\]")?);
        rules.push(MetricRule::vector(WALLTIME_WO_GC, r"Without GC \(ms\): \[(.*?)\]")?);
        for (i, pattern) in custom.iter().enumerate() {
            rules.push(MetricRule::optional(custom_column(i), pattern)?);
        }

        let mut parallel = rules.clone();
        parallel.push(MetricRule::vector(
            THREAD_TIME,
            r"Thread time per measured period \(thread\*ms\): \[(.*?)\]",
        )?);
        parallel.push(MetricRule::vector(
            IDLE_THREAD_TIME,
            r"Idle thread time per measured period \(thread\*ms\): \[(.*?)\]",
        )?);

        let with_marker = |extractor: StatsExtractor| match section_marker {
            Some(marker) => extractor.with_section_marker(marker),
            None => extractor,
        };
        Ok(Self {
            serial: with_marker(StatsExtractor::new(rules)),
            parallel: with_marker(StatsExtractor::new(parallel)),
            custom_count: custom.len(),
        })
    }

    /// Extractor for a pass of the given mode
    pub fn extractor(&self, mode: RunMode) -> &StatsExtractor {
        match mode {
            RunMode::Serial => &self.serial,
            RunMode::Parallel | RunMode::Profile => &self.parallel,
        }
    }

    /// Number of `CUSTOM<i>` rules
    pub fn custom_count(&self) -> usize {
        self.custom_count
    }
}

/// Label of the thread column for a pass
pub fn thread_label(threads: u32, mode: RunMode) -> Cell {
    match mode {
        RunMode::Serial => Cell::from("serial"),
        RunMode::Parallel => Cell::from(threads),
        RunMode::Profile => Cell::from(format!("g{}", threads)),
    }
}

/// Derives row cells and tracks the session baselines
#[derive(Debug, Clone)]
pub struct MetricsComputer {
    runs: usize,
    custom_count: usize,
    baseline: RunBaseline,
}

impl MetricsComputer {
    /// Computer with no baselines recorded yet
    pub fn new(runs: usize, custom_count: usize) -> Self {
        Self {
            runs,
            custom_count,
            baseline: RunBaseline::new(),
        }
    }

    /// Baselines recorded so far
    pub fn baseline(&self) -> &RunBaseline {
        &self.baseline
    }

    /// Cells for one run. A serial run captures the serial baseline, the
    /// first parallel one-thread run captures the one-thread baseline.
    /// Profiling rows carry no scaling ratios.
    pub fn compute(
        &mut self,
        stats: &StatsRecord,
        threads: u32,
        mode: RunMode,
    ) -> Result<ReportRow, MetricsError> {
        if threads == 0 {
            return Err(MetricsError::ZeroThreads);
        }

        let mut row = ReportRow::new();
        row.set(THREAD, thread_label(threads, mode));
        for name in [COMMITTED_ITS, TOTAL_ITS, ABORT_RATIO] {
            row.set(name, required_scalar(stats, name)?);
        }

        let walltime = required_vector(stats, WALLTIME)?;
        let walltime_wo_gc = required_vector(stats, WALLTIME_WO_GC)?;
        for (i, value) in walltime.iter().take(self.runs).enumerate() {
            row.set(run_column(i + 1), *value);
        }
        for (i, value) in walltime_wo_gc.iter().take(self.runs).enumerate() {
            row.set(wogc_run_column(i + 1), *value);
        }

        let summary =
            SampleSummary::from_samples(walltime).ok_or(MetricsError::NoSamples(WALLTIME))?;
        let last = summary.last;
        row.set(AVERAGE_TIME, summary.average);
        row.set(LAST_TIME, last);

        if mode != RunMode::Serial {
            let last_wo_gc = *walltime_wo_gc
                .last()
                .ok_or(MetricsError::NoSamples(WALLTIME_WO_GC))?;
            row.set(GC_TIME, last - last_wo_gc);

            let thread_time = sum(required_vector(stats, THREAD_TIME)?);
            row.set(THREAD_TIME, thread_time);
            row.set(SERIAL_TIME, last - thread_time / f64::from(threads));
            row.set(IDLE_THREAD_TIME, sum(required_vector(stats, IDLE_THREAD_TIME)?));
        }

        match mode {
            RunMode::Serial => {
                if !self.baseline.record(BaselineKind::Serial, last) {
                    tracing::warn!("serial baseline already captured, keeping the first");
                }
            }
            RunMode::Parallel => {
                if threads == 1 {
                    self.baseline.record(BaselineKind::OneThread, last);
                }
                row.set(SCALABILITY, self.baseline.scalability(threads, last)?);
                row.set(SPEEDUP, self.baseline.speedup(last)?);
            }
            RunMode::Profile => {}
        }

        for i in 0..self.custom_count {
            let column = custom_column(i);
            if let Some(value) = stats.scalar(&column) {
                row.set(column, value);
            }
        }

        Ok(row)
    }
}

fn required_scalar(stats: &StatsRecord, name: &'static str) -> Result<f64, MetricsError> {
    stats.scalar(name).ok_or(MetricsError::MissingMetric(name))
}

fn required_vector<'a>(
    stats: &'a StatsRecord,
    name: &'static str,
) -> Result<&'a [f64], MetricsError> {
    stats.vector(name).ok_or(MetricsError::MissingMetric(name))
}
