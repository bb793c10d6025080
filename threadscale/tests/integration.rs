//! End-to-end sessions driven through the public API

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use threadscale::columns::{LAST_TIME, SCALABILITY, SPEEDUP, THREAD};
use threadscale::{
    BaselineKind, Cell, CommandLauncher, ExtractError, Interrupt, LaunchConfig, LaunchError,
    MetricsError, Orchestrator, OutputFormat, ReportMeta, ReportSink, RunLauncher, RunMode,
    RunRequest, ScalingError, SessionConfig, SessionError, plan_from_spec,
};

fn stats_log(walltime: f64) -> String {
    format!(
        "Committed Iterations: 1\n\
         ==== Merged Statistics ====\n\
         Committed Iterations: 1000\n\
         Total Iterations: 1010\n\
         Abort ratio: 0.0099\n\
         With GC (ms): [{w0},{walltime}]\n\
         Without GC (ms): [{w0},{walltime}]\n\
         Thread time per measured period (thread*ms): [{walltime}]\n\
         Idle thread time per measured period (thread*ms): [0]\n",
        w0 = walltime + 50.0,
    )
}

/// Serves canned logs keyed by (mode, threads); unknown requests fail
struct ScriptedLauncher {
    dir: PathBuf,
    logs: HashMap<(RunMode, u32), String>,
    launched: Vec<RunRequest>,
}

impl ScriptedLauncher {
    fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            logs: HashMap::new(),
            launched: Vec::new(),
        }
    }

    fn with_log(mut self, mode: RunMode, threads: u32, text: String) -> Self {
        self.logs.insert((mode, threads), text);
        self
    }
}

impl RunLauncher for ScriptedLauncher {
    fn launch(&mut self, request: &RunRequest) -> Result<(), LaunchError> {
        self.launched.push(*request);
        match self.logs.get(&(request.mode, request.threads)) {
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
        format!("app -r {} -t {}", request.runs, request.threads)
    }
}

fn session<L: RunLauncher>(
    launcher: L,
    report: &Path,
    format: OutputFormat,
    runs: usize,
) -> Orchestrator<L> {
    let config = SessionConfig {
        runs,
        ..SessionConfig::default()
    };
    let meta = ReportMeta::new(vec!["app".to_string()], runs, vec![]);
    Orchestrator::new(launcher, config, meta, Interrupt::new())
        .unwrap()
        .with_sink(ReportSink::new(report, format))
}

fn number(cell: Option<&Cell>) -> f64 {
    cell.and_then(Cell::as_f64).unwrap()
}

fn baseline_launcher(dir: &Path) -> ScriptedLauncher {
    ScriptedLauncher::new(dir)
        .with_log(RunMode::Serial, 1, stats_log(400.0))
        .with_log(RunMode::Parallel, 1, stats_log(390.0))
        .with_log(RunMode::Parallel, 2, stats_log(210.0))
}

#[test]
fn test_serial_one_two_thread_session() {
    let dir = tempfile::tempdir().unwrap();
    let report = dir.path().join("report.csv");
    let passes = plan_from_spec(Some("0,1,2"), 8, false).unwrap();

    let mut orch = session(baseline_launcher(dir.path()), &report, OutputFormat::Csv, 2);
    orch.run(&passes).unwrap();

    let rows = orch.table().rows();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].get(THREAD), Some(&Cell::from("serial")));
    assert_eq!(rows[1].get(THREAD), Some(&Cell::from(1u32)));
    assert_eq!(number(rows[1].get(SCALABILITY)), 1.0);
    assert_eq!(number(rows[2].get(LAST_TIME)), 210.0);
    assert!((number(rows[2].get(SCALABILITY)) - 390.0 / 210.0).abs() < 1e-12);
    assert!((number(rows[2].get(SPEEDUP)) - 400.0 / 210.0).abs() < 1e-12);

    let csv = std::fs::read_to_string(&report).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(
        lines[0],
        "T,r1,r2,wogcr1,wogcr2,LAST TIME,AVERAGE TIME,committed its,total its,\
         ABORT RATIO,thread time,IDLE THREAD TIME,GC TIME,SERIAL TIME,SCALABILITY,SPEEDUP"
    );
    // Serial rows leave the per-thread and ratio columns empty
    assert_eq!(
        lines[1],
        "serial,450.0,400.0,450.0,400.0,400.0,400.0,1000.0,1010.0,0.0099,,,,,,"
    );
    assert!(lines[2].starts_with("1,440.0,390.0,"));
    assert!(csv.ends_with('\n'));
}

#[test]
fn test_missing_metric_flushes_earlier_rows() {
    let dir = tempfile::tempdir().unwrap();
    let report = dir.path().join("report.csv");
    let truncated = stats_log(210.0).replace("Abort ratio", "Abort rate");
    let launcher = baseline_launcher(dir.path()).with_log(RunMode::Parallel, 2, truncated);
    let passes = plan_from_spec(Some("0:2"), 0, false).unwrap();

    let mut orch = session(launcher, &report, OutputFormat::Csv, 2);
    let err = orch.run(&passes).unwrap_err();
    assert!(matches!(
        err,
        SessionError::Extract {
            source: ExtractError::MissingRequiredMetric(ref name),
            ..
        } if name == "ABORT RATIO"
    ));

    let csv = std::fs::read_to_string(&report).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with("serial,"));
    assert!(lines[2].starts_with("1,"));
}

#[test]
fn test_run_failure_stops_session() {
    let dir = tempfile::tempdir().unwrap();
    let report = dir.path().join("report.csv");
    let passes = plan_from_spec(Some("0,1,2,4"), 0, false).unwrap();

    let mut orch = session(baseline_launcher(dir.path()), &report, OutputFormat::Csv, 2);
    let err = orch.run(&passes).unwrap_err();
    assert!(matches!(
        err,
        SessionError::Launch {
            source: LaunchError::ExitStatus { code: 1, .. },
            ..
        }
    ));
    assert_eq!(orch.table().rows().len(), 3);
    assert_eq!(std::fs::read_to_string(&report).unwrap().lines().count(), 4);
}

#[test]
fn test_missing_baseline_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let report = dir.path().join("report.csv");
    let passes = plan_from_spec(Some("2"), 0, false).unwrap();

    let mut orch = session(baseline_launcher(dir.path()), &report, OutputFormat::Csv, 2);
    let err = orch.run(&passes).unwrap_err();
    assert!(matches!(
        err,
        SessionError::Metrics {
            source: MetricsError::Scaling(ScalingError::BaselineUnavailable(
                BaselineKind::OneThread
            )),
            ..
        }
    ));
    // Header only
    assert_eq!(std::fs::read_to_string(&report).unwrap().lines().count(), 1);
}

#[test]
fn test_profiling_passes_keep_their_logs() {
    let dir = tempfile::tempdir().unwrap();
    let report = dir.path().join("report.csv");
    let launcher = baseline_launcher(dir.path())
        .with_log(RunMode::Profile, 1, stats_log(395.0))
        .with_log(RunMode::Profile, 2, stats_log(215.0));
    let passes = plan_from_spec(Some("0:2"), 0, true).unwrap();
    assert_eq!(passes.len(), 5);

    let mut orch = session(launcher, &report, OutputFormat::Csv, 2);
    orch.run(&passes).unwrap();

    let labels: Vec<String> = orch
        .table()
        .rows()
        .iter()
        .map(|row| row.get(THREAD).unwrap().to_string())
        .collect();
    assert_eq!(labels, vec!["serial", "1", "2", "g1", "g2"]);
    assert!(orch.table().rows()[3].get(SPEEDUP).is_none());

    let g1 = std::fs::read_to_string(dir.path().join("report-stats-g1.txt")).unwrap();
    let g2 = std::fs::read_to_string(dir.path().join("report-stats-g2.txt")).unwrap();
    assert!(g1.contains("[445,395]"));
    assert!(g2.contains("[265,215]"));
}

#[test]
fn test_json_report() {
    let dir = tempfile::tempdir().unwrap();
    let report = dir.path().join("out").join("report.json");
    let passes = plan_from_spec(Some("0,1"), 0, false).unwrap();

    let mut orch = session(baseline_launcher(dir.path()), &report, OutputFormat::Json, 2);
    orch.run(&passes).unwrap();

    let text = std::fs::read_to_string(&report).unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    let rows = json["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["T"], "serial");
    assert_eq!(rows[1]["T"], 1);
    assert!(rows[0].get("SPEEDUP").is_none());
    assert_eq!(json["meta"]["runs"], 2);
}

#[cfg(unix)]
#[test]
fn test_command_launcher_session() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    // argv: -r <runs> -t <threads> [-s]
    let script = r#"#!/bin/sh
if [ "$5" = "-s" ]; then w=400; elif [ "$4" = "1" ]; then w=390; else w=210; fi
cat > stats.txt <<EOF
= Merged Statistics =
Committed Iterations: 10
Total Iterations: 20
Abort ratio: 0
With GC (ms): [$w]
Without GC (ms): [$w]
Thread time per measured period (thread*ms): [$w]
Idle thread time per measured period (thread*ms): [0]
EOF
"#;
    let app = dir.path().join("app.sh");
    std::fs::write(&app, script).unwrap();
    std::fs::set_permissions(&app, std::fs::Permissions::from_mode(0o755)).unwrap();

    let config = LaunchConfig {
        working_dir: dir.path().to_path_buf(),
        ..LaunchConfig::new(app.to_string_lossy(), vec![])
    };
    let launcher = CommandLauncher::new(config, Interrupt::new());
    let report = dir.path().join("report.csv");
    let passes = plan_from_spec(Some("0,1,2"), 0, false).unwrap();

    let mut orch = session(launcher, &report, OutputFormat::Csv, 1);
    orch.run(&passes).unwrap();

    let rows = orch.table().rows();
    assert_eq!(rows.len(), 3);
    assert_eq!(number(rows[0].get(LAST_TIME)), 400.0);
    assert!((number(rows[2].get(SPEEDUP)) - 400.0 / 210.0).abs() < 1e-12);
}
