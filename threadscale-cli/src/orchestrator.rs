//! Session Orchestration
//!
//! Drives one report session: plan the passes, launch each one, scrape its
//! log, compute the row and seal it into the table.
//!
//! Pass order is fixed:
//!
//! ```text
//!   serial (if 0 planned) → ascending thread counts → profile @1 → profile @max
//! ```
//!
//! The report file is written on every way out of [`Orchestrator::run`]:
//! normal completion, a failing pass, or an operator interrupt. Rows sealed
//! before the failure are always kept.

use crate::interrupt::Interrupt;
use crate::launcher::{LaunchError, RunLauncher, RunMode, RunRequest};
use crate::metrics::{MetricsComputer, MetricsError, RuleCatalog};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeSet;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;
use threadscale_core::{ExtractError, RangeError, parse_thread_range};
use threadscale_report::{
    OutputFormat, ReportMeta, ReportTable, TableError, render_report, scaling_columns,
};

/// One launch of the workload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Serial runtime baseline
    Serial,
    /// Parallel runtime at a thread count
    Threads(u32),
    /// Profiling run at a thread count
    Profile(u32),
}

impl Pass {
    /// Launch parameters for this pass
    pub fn request(&self, runs: usize) -> RunRequest {
        let (threads, mode) = match *self {
            Pass::Serial => (1, RunMode::Serial),
            Pass::Threads(t) => (t, RunMode::Parallel),
            Pass::Profile(t) => (t, RunMode::Profile),
        };
        RunRequest {
            threads,
            mode,
            runs,
        }
    }
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pass::Serial => write!(f, "serial"),
            Pass::Threads(t) => write!(f, "{} thread(s)", t),
            Pass::Profile(t) => write!(f, "profile @ {} thread(s)", t),
        }
    }
}

/// Order the passes for a set of thread counts. `0` stands for the serial
/// baseline. Profiling adds a pass at one thread and, when the largest
/// planned count is above one, a pass at that count.
pub fn plan_passes(threads: &BTreeSet<u32>, profile: bool) -> Vec<Pass> {
    let mut passes: Vec<Pass> = threads
        .iter()
        .map(|&t| if t == 0 { Pass::Serial } else { Pass::Threads(t) })
        .collect();

    if profile {
        passes.push(Pass::Profile(1));
        if let Some(&max) = threads.last() {
            if max > 1 {
                passes.push(Pass::Profile(max));
            }
        }
    }
    passes
}

/// Parse a thread range and plan its passes
pub fn plan_from_spec(
    spec: Option<&str>,
    max_threads: u32,
    profile: bool,
) -> Result<Vec<Pass>, SessionError> {
    let threads = parse_thread_range(spec, max_threads)?;
    Ok(plan_passes(&threads, profile))
}

/// File name a profiling log is kept under
pub fn profile_log_name(threads: u32) -> String {
    format!("report-stats-g{}.txt", threads)
}

/// Why a session stopped
#[derive(Debug, Error)]
pub enum SessionError {
    /// Bad thread range
    #[error(transparent)]
    Range(#[from] RangeError),

    /// A metric rule failed to build
    #[error("invalid metric rule: {0}")]
    Rules(#[source] ExtractError),

    /// The workload could not be run
    #[error("{pass}: {source}")]
    Launch {
        /// Pass being launched
        pass: Pass,
        /// Launcher failure
        #[source]
        source: LaunchError,
    },

    /// The run finished but its log could not be opened
    #[error("{pass}: cannot open log {}: {source}", path.display())]
    ReadLog {
        /// Pass whose log is missing
        pass: Pass,
        /// Where the log was expected
        path: PathBuf,
        /// Open failure
        #[source]
        source: std::io::Error,
    },

    /// The log lacked a metric or held a malformed one
    #[error("{pass}: {source}")]
    Extract {
        /// Pass whose log was scanned
        pass: Pass,
        /// Extraction failure
        #[source]
        source: ExtractError,
    },

    /// Row metrics could not be derived
    #[error("{pass}: {source}")]
    Metrics {
        /// Pass whose row failed
        pass: Pass,
        /// Computation failure
        #[source]
        source: MetricsError,
    },

    /// Operator interrupt
    #[error("interrupted")]
    Interrupted,

    /// The report could not be rendered or written
    #[error("failed to write report {}: {source}", path.display())]
    Report {
        /// Report destination
        path: PathBuf,
        /// Render or write failure
        #[source]
        source: TableError,
    },

    /// Other filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where and how the report is written
#[derive(Debug, Clone)]
pub struct ReportSink {
    /// Destination file
    pub path: PathBuf,
    /// Rendering
    pub format: OutputFormat,
}

impl ReportSink {
    /// Sink writing `format` to `path`
    pub fn new(path: impl Into<PathBuf>, format: OutputFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    /// Render and write the sealed rows
    pub fn write(&self, table: &ReportTable, meta: &ReportMeta) -> Result<(), SessionError> {
        let report_err = |source| SessionError::Report {
            path: self.path.clone(),
            source,
        };
        let content = render_report(table, meta, self.format).map_err(report_err)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| report_err(e.into()))?;
            }
        }
        std::fs::write(&self.path, content).map_err(|e| report_err(e.into()))?;
        tracing::info!("report written to {}", self.path.display());
        Ok(())
    }
}

/// Session settings that shape the table
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Repeats per launch
    pub runs: usize,
    /// Extra column patterns
    pub custom_columns: Vec<String>,
    /// Banner the log's statistics follow
    pub section_marker: Option<String>,
    /// Show a progress bar
    pub progress: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            runs: 1,
            custom_columns: Vec::new(),
            section_marker: Some("= Merged Statistics =".to_string()),
            progress: false,
        }
    }
}

/// Runs passes in order and accumulates the report table
pub struct Orchestrator<L: RunLauncher> {
    launcher: L,
    catalog: RuleCatalog,
    computer: MetricsComputer,
    table: ReportTable,
    meta: ReportMeta,
    sink: Option<ReportSink>,
    interrupt: Interrupt,
    runs: usize,
    progress: bool,
}

impl<L: RunLauncher> Orchestrator<L> {
    /// Build the rule catalog and an empty table for `config`
    pub fn new(
        launcher: L,
        config: SessionConfig,
        meta: ReportMeta,
        interrupt: Interrupt,
    ) -> Result<Self, SessionError> {
        let catalog = RuleCatalog::new(&config.custom_columns, config.section_marker.as_deref())
            .map_err(SessionError::Rules)?;
        let custom_count = catalog.custom_count();
        Ok(Self {
            launcher,
            catalog,
            computer: MetricsComputer::new(config.runs, custom_count),
            table: ReportTable::with_columns(scaling_columns(config.runs, custom_count)),
            meta,
            sink: None,
            interrupt,
            runs: config.runs,
            progress: config.progress,
        })
    }

    /// Write the report here whenever the session ends
    pub fn with_sink(mut self, sink: ReportSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Rows sealed so far
    pub fn table(&self) -> &ReportTable {
        &self.table
    }

    /// Report header
    pub fn meta(&self) -> &ReportMeta {
        &self.meta
    }

    /// The launcher driving each pass
    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    /// Run every pass. The report is flushed before this returns, whatever
    /// the outcome.
    pub fn run(&mut self, passes: &[Pass]) -> Result<(), SessionError> {
        let Self {
            launcher,
            catalog,
            computer,
            table,
            meta,
            sink,
            interrupt,
            runs,
            progress,
        } = self;

        let flush = FlushOnExit {
            table,
            meta,
            sink: sink.as_ref(),
            done: false,
        };

        let pb = if *progress {
            ProgressBar::new(passes.len() as u64)
        } else {
            ProgressBar::hidden()
        };
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );

        for &pass in passes {
            if interrupt.is_triggered() {
                pb.abandon_with_message("Interrupted");
                return Err(SessionError::Interrupted);
            }
            pb.set_message(pass.to_string());

            let request = pass.request(*runs);
            pb.suspend(|| launcher.launch(&request))
                .map_err(|source| match source {
                    LaunchError::Interrupted { .. } => SessionError::Interrupted,
                    source => SessionError::Launch { pass, source },
                })?;

            let log_path = launcher.log_path();
            let file = File::open(&log_path).map_err(|source| SessionError::ReadLog {
                pass,
                path: log_path.clone(),
                source,
            })?;
            let reader = BufReader::new(file);
            let stats = catalog
                .extractor(request.mode)
                .extract_reader(reader)
                .map_err(|source| SessionError::Extract { pass, source })?;
            let row = computer
                .compute(&stats, request.threads, request.mode)
                .map_err(|source| SessionError::Metrics { pass, source })?;

            flush.table.update(row);
            flush.table.seal();
            tracing::debug!("sealed row for {}", pass);

            if let Pass::Profile(t) = pass {
                keep_profile_log(&log_path, t)?;
            }
            pb.inc(1);
        }

        pb.finish_with_message("Complete");
        flush.finish()
    }
}

/// Move a profiling log out of the way of the next pass
fn keep_profile_log(log_path: &Path, threads: u32) -> Result<PathBuf, SessionError> {
    let target = log_path.with_file_name(profile_log_name(threads));
    std::fs::rename(log_path, &target)?;
    tracing::debug!("kept profile log as {}", target.display());
    Ok(target)
}

/// Writes the report when the session loop exits, on any path
struct FlushOnExit<'a> {
    table: &'a mut ReportTable,
    meta: &'a ReportMeta,
    sink: Option<&'a ReportSink>,
    done: bool,
}

impl FlushOnExit<'_> {
    fn finish(mut self) -> Result<(), SessionError> {
        self.done = true;
        match self.sink {
            Some(sink) => sink.write(self.table, self.meta),
            None => Ok(()),
        }
    }
}

impl Drop for FlushOnExit<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        // A half-built row never reaches the report
        self.table.discard_current();
        if let Some(sink) = self.sink {
            tracing::warn!(
                "session ended early, writing {} row(s) collected so far",
                self.table.rows().len()
            );
            if let Err(e) = sink.write(self.table, self.meta) {
                tracing::warn!("{}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use threadscale_report::{SCALABILITY, SPEEDUP, THREAD};

    fn stats_log(walltime: f64) -> String {
        format!(
            "= Merged Statistics =\n\
             Committed Iterations: 10\n\
             Total Iterations: 20\n\
             Abort ratio: 0\n\
             With GC (ms): [{walltime}]\n\
             Without GC (ms): [{walltime}]\n\
             Thread time per measured period (thread*ms): [1]\n\
             Idle thread time per measured period (thread*ms): [0]\n"
        )
    }

    /// Writes one canned log per launch; `None` fails the launch
    struct ScriptedLauncher {
        dir: PathBuf,
        logs: VecDeque<Option<String>>,
        launched: Vec<RunRequest>,
    }

    impl RunLauncher for ScriptedLauncher {
        fn launch(&mut self, request: &RunRequest) -> Result<(), LaunchError> {
            self.launched.push(*request);
            match self.logs.pop_front().flatten() {
                Some(text) => Ok(std::fs::write(self.log_path(), text)?),
                None => Err(LaunchError::ExitStatus {
                    command: self.describe(request),
                    code: 1,
                }),
            }
        }

        fn log_path(&self) -> PathBuf {
            self.dir.join("stats.txt")
        }

        fn describe(&self, request: &RunRequest) -> String {
            format!("app -t {}", request.threads)
        }
    }

    fn orchestrator(
        dir: &Path,
        logs: Vec<Option<String>>,
    ) -> Orchestrator<ScriptedLauncher> {
        let launcher = ScriptedLauncher {
            dir: dir.to_path_buf(),
            logs: logs.into(),
            launched: Vec::new(),
        };
        let meta = ReportMeta::new(vec!["app".into()], 1, vec![0, 1, 2]);
        Orchestrator::new(launcher, SessionConfig::default(), meta, Interrupt::new())
            .unwrap()
            .with_sink(ReportSink::new(dir.join("report.csv"), OutputFormat::Csv))
    }

    fn set(values: &[u32]) -> BTreeSet<u32> {
        values.iter().copied().collect()
    }

    #[test]
    fn test_plan_order() {
        assert_eq!(
            plan_passes(&set(&[2, 0, 1]), false),
            vec![Pass::Serial, Pass::Threads(1), Pass::Threads(2)]
        );
    }

    #[test]
    fn test_plan_profile_passes() {
        assert_eq!(
            plan_passes(&set(&[1, 4]), true),
            vec![
                Pass::Threads(1),
                Pass::Threads(4),
                Pass::Profile(1),
                Pass::Profile(4)
            ]
        );
        // No second profiling pass when the largest count is one
        assert_eq!(
            plan_passes(&set(&[0, 1]), true),
            vec![Pass::Serial, Pass::Threads(1), Pass::Profile(1)]
        );
    }

    #[test]
    fn test_plan_from_spec_rejects_bad_range() {
        assert!(matches!(
            plan_from_spec(Some("1:"), 4, false),
            Err(SessionError::Range(_))
        ));
        assert_eq!(plan_from_spec(None, 1, false).unwrap().len(), 2);
    }

    #[test]
    fn test_serial_request_uses_one_thread() {
        let request = Pass::Serial.request(3);
        assert_eq!(request.threads, 1);
        assert_eq!(request.mode, RunMode::Serial);
        assert_eq!(request.runs, 3);
    }

    #[test]
    fn test_session_writes_all_rows() {
        let dir = tempfile::tempdir().unwrap();
        let logs = [400.0, 390.0, 210.0].map(|t| Some(stats_log(t))).to_vec();
        let mut orch = orchestrator(dir.path(), logs);
        orch.run(&[Pass::Serial, Pass::Threads(1), Pass::Threads(2)])
            .unwrap();

        let rows = orch.table().rows();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].get(THREAD).unwrap().to_string(), "serial");
        let scalability = rows[2].get(SCALABILITY).and_then(|c| c.as_f64()).unwrap();
        let speedup = rows[2].get(SPEEDUP).and_then(|c| c.as_f64()).unwrap();
        assert!((scalability - 390.0 / 210.0).abs() < 1e-12);
        assert!((speedup - 400.0 / 210.0).abs() < 1e-12);

        let csv = std::fs::read_to_string(dir.path().join("report.csv")).unwrap();
        assert_eq!(csv.lines().count(), 4);
    }

    #[test]
    fn test_failed_launch_flushes_sealed_rows() {
        let dir = tempfile::tempdir().unwrap();
        let logs = vec![Some(stats_log(400.0)), None, Some(stats_log(210.0))];
        let mut orch = orchestrator(dir.path(), logs);
        let err = orch
            .run(&[Pass::Serial, Pass::Threads(1), Pass::Threads(2)])
            .unwrap_err();

        assert!(matches!(
            err,
            SessionError::Launch {
                pass: Pass::Threads(1),
                ..
            }
        ));
        // The loop stops at the failure
        assert_eq!(orch.launcher().launched.len(), 2);
        let csv = std::fs::read_to_string(dir.path().join("report.csv")).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("serial,"));
    }

    #[test]
    fn test_interrupt_before_pass_flushes() {
        let dir = tempfile::tempdir().unwrap();
        let interrupt = Interrupt::new();
        let launcher = ScriptedLauncher {
            dir: dir.path().to_path_buf(),
            logs: VecDeque::new(),
            launched: Vec::new(),
        };
        let meta = ReportMeta::new(vec!["app".into()], 1, vec![1]);
        let mut orch = Orchestrator::new(
            launcher,
            SessionConfig::default(),
            meta,
            interrupt.clone(),
        )
        .unwrap()
        .with_sink(ReportSink::new(dir.path().join("report.csv"), OutputFormat::Csv));

        interrupt.trigger();
        assert!(matches!(
            orch.run(&[Pass::Threads(1)]),
            Err(SessionError::Interrupted)
        ));
        assert!(orch.launcher().launched.is_empty());
        let csv = std::fs::read_to_string(dir.path().join("report.csv")).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }

    /// Triggers `interrupt` once `after` launches have completed
    struct InterruptingLauncher {
        inner: ScriptedLauncher,
        interrupt: Interrupt,
        after: usize,
    }

    impl RunLauncher for InterruptingLauncher {
        fn launch(&mut self, request: &RunRequest) -> Result<(), LaunchError> {
            self.inner.launch(request)?;
            if self.inner.launched.len() == self.after {
                self.interrupt.trigger();
            }
            Ok(())
        }

        fn log_path(&self) -> PathBuf {
            self.inner.log_path()
        }

        fn describe(&self, request: &RunRequest) -> String {
            self.inner.describe(request)
        }
    }

    #[test]
    fn test_interrupt_after_first_pass_keeps_its_row() {
        let dir = tempfile::tempdir().unwrap();
        let interrupt = Interrupt::new();
        let launcher = InterruptingLauncher {
            inner: ScriptedLauncher {
                dir: dir.path().to_path_buf(),
                logs: vec![Some(stats_log(400.0)), Some(stats_log(390.0))].into(),
                launched: Vec::new(),
            },
            interrupt: interrupt.clone(),
            after: 1,
        };
        let meta = ReportMeta::new(vec!["app".into()], 1, vec![0, 1]);
        let mut orch = Orchestrator::new(launcher, SessionConfig::default(), meta, interrupt)
            .unwrap()
            .with_sink(ReportSink::new(dir.path().join("report.csv"), OutputFormat::Csv));

        assert!(matches!(
            orch.run(&[Pass::Serial, Pass::Threads(1)]),
            Err(SessionError::Interrupted)
        ));
        assert_eq!(orch.launcher().inner.launched.len(), 1);
        assert_eq!(orch.table().rows().len(), 1);
        let csv = std::fs::read_to_string(dir.path().join("report.csv")).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("serial,"));
    }

    /// Reports success without leaving a log behind
    struct NoLogLauncher {
        dir: PathBuf,
    }

    impl RunLauncher for NoLogLauncher {
        fn launch(&mut self, _request: &RunRequest) -> Result<(), LaunchError> {
            Ok(())
        }

        fn log_path(&self) -> PathBuf {
            self.dir.join("stats.txt")
        }

        fn describe(&self, request: &RunRequest) -> String {
            format!("app -t {}", request.threads)
        }
    }

    #[test]
    fn test_missing_log_names_the_pass() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = NoLogLauncher {
            dir: dir.path().to_path_buf(),
        };
        let meta = ReportMeta::new(vec!["app".into()], 1, vec![1]);
        let mut orch = Orchestrator::new(launcher, SessionConfig::default(), meta, Interrupt::new())
            .unwrap()
            .with_sink(ReportSink::new(dir.path().join("report.csv"), OutputFormat::Csv));

        let err = orch.run(&[Pass::Threads(1)]).unwrap_err();
        match &err {
            SessionError::ReadLog { pass, path, source } => {
                assert_eq!(*pass, Pass::Threads(1));
                assert_eq!(path, &dir.path().join("stats.txt"));
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(err.to_string().starts_with("1 thread(s): cannot open log"));
        let csv = std::fs::read_to_string(dir.path().join("report.csv")).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn test_profile_log_renamed() {
        let dir = tempfile::tempdir().unwrap();
        let logs = vec![Some(stats_log(100.0))];
        let mut orch = orchestrator(dir.path(), logs);
        orch.run(&[Pass::Profile(1)]).unwrap();

        assert!(dir.path().join("report-stats-g1.txt").exists());
        assert!(!dir.path().join("stats.txt").exists());
        assert_eq!(
            orch.table().rows()[0].get(THREAD).unwrap().to_string(),
            "g1"
        );
    }

    #[test]
    fn test_bad_custom_pattern_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = ScriptedLauncher {
            dir: dir.path().to_path_buf(),
            logs: VecDeque::new(),
            launched: Vec::new(),
        };
        let config = SessionConfig {
            custom_columns: vec!["no group".to_string()],
            ..SessionConfig::default()
        };
        let meta = ReportMeta::new(vec![], 1, vec![]);
        assert!(matches!(
            Orchestrator::new(launcher, config, meta, Interrupt::new()),
            Err(SessionError::Rules(_))
        ));
    }
}
