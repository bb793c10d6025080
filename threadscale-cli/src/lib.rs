#![warn(missing_docs)]
//! Threadscale CLI Library
//!
//! Runs a workload across a range of thread counts and collects one report
//! row per run. Each run's statistics log is scraped for iteration counts,
//! wall times and per-thread time, and the rows are written as CSV (or
//! JSON) with scalability and speedup against the serial and one-thread
//! baselines.
//!
//! # Example
//!
//! ```text
//! threadscale -a 0,1,2,4:16:4 -r 3 -- ./bin/app apps.sssp.Main input.gr
//! ```
//!
//! The workload receives `-r <runs> -t <threads>` (plus `-s` for the serial
//! pass and `-g` for profiling passes) ahead of its own arguments.

mod config;
mod interrupt;
mod launcher;
mod metrics;
mod orchestrator;

pub use config::*;
pub use interrupt::Interrupt;
pub use launcher::{CommandLauncher, LaunchConfig, LaunchError, RunLauncher, RunMode, RunRequest};
pub use metrics::{
    MetricsComputer, MetricsError, RuleCatalog, WALLTIME, WALLTIME_WO_GC, thread_label,
};
pub use orchestrator::{
    Orchestrator, Pass, ReportSink, SessionConfig, SessionError, plan_from_spec, plan_passes,
    profile_log_name,
};

use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;
use threadscale_report::{OutputFormat, ReportMeta, format_human_output};

/// Threadscale CLI arguments
#[derive(Parser, Debug)]
#[command(name = "threadscale")]
#[command(author, version, about = "Threadscale - thread-scaling benchmark sessions")]
pub struct Cli {
    /// Optional subcommand (Run, Plan, Init); defaults to Run
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Thread counts to run, e.g. "0,1,2,4:16:4" (0 is the serial run)
    /// Defaults to 0 through --max-threads
    #[arg(short = 'a', long)]
    pub threads_range: Option<String>,

    /// Upper end of the default thread range
    #[arg(short = 't', long)]
    pub max_threads: Option<u32>,

    /// Repeats per launch
    #[arg(short, long)]
    pub runs: Option<usize>,

    /// Add profiling passes at one thread and at the largest thread count
    #[arg(short = 'x', long)]
    pub profile: bool,

    /// Extra report column scraped from the log (regex with one group)
    #[arg(short = 'c', long = "custom", value_name = "REGEX")]
    pub custom: Vec<String>,

    /// Report file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Report format: csv, json
    #[arg(long)]
    pub format: Option<String>,

    /// Per-launch timeout (e.g. "30m"); unset waits forever
    #[arg(long)]
    pub timeout: Option<String>,

    /// Statistics log the workload writes
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Dry run - print the planned passes without launching anything
    #[arg(long)]
    pub dry_run: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Only print warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Workload program and its arguments
    #[arg(last = true, value_name = "PROGRAM")]
    pub program: Vec<String>,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the session (default)
    Run,
    /// Print the planned passes and their command lines
    Plan,
    /// Print a commented default threadscale.toml
    Init,
}

/// Run the Threadscale CLI with the process arguments.
///
/// # Returns
/// Returns `Ok(())` on success and after an operator interrupt (the rows
/// collected so far are written first), or an error if the session failed.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_with_cli(cli)
}

/// Run the Threadscale CLI with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    // Initialize logging
    let filter = if cli.verbose {
        "threadscale=debug"
    } else if cli.quiet {
        "threadscale=warn"
    } else {
        "threadscale=info"
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if matches!(cli.command, Some(Commands::Init)) {
        print!("{}", ThreadscaleConfig::default_toml());
        return Ok(());
    }

    // Discover threadscale.toml configuration (CLI flags override)
    let config = ThreadscaleConfig::discover().unwrap_or_default();
    let settings = Settings::resolve(&cli, &config)?;
    let passes = plan_from_spec(
        settings.threads_range.as_deref(),
        settings.max_threads,
        settings.profile,
    )?;

    match cli.command {
        Some(Commands::Plan) => print_plan(&settings, &passes),
        _ if cli.dry_run => print_plan(&settings, &passes),
        _ => run_session(&settings, &passes, cli.quiet),
    }
}

/// Effective session settings: threadscale.toml values with CLI overrides
#[derive(Debug, Clone)]
struct Settings {
    program: Option<String>,
    args: Vec<String>,
    threads_range: Option<String>,
    max_threads: u32,
    runs: usize,
    profile: bool,
    custom_columns: Vec<String>,
    output: PathBuf,
    format: OutputFormat,
    timeout: Option<Duration>,
    log_file: PathBuf,
    section_marker: String,
    threads_flag: String,
    runs_flag: String,
    serial_flag: String,
    profile_flag: String,
}

impl Settings {
    fn resolve(cli: &Cli, config: &ThreadscaleConfig) -> anyhow::Result<Self> {
        let runner = &config.runner;
        let report = &config.report;

        // Program after `--` replaces the configured one, arguments included
        let (program, args) = match cli.program.split_first() {
            Some((program, args)) => (Some(program.clone()), args.to_vec()),
            None => (runner.program.clone(), runner.args.clone()),
        };

        let runs = cli.runs.unwrap_or(runner.runs);
        if runs == 0 {
            anyhow::bail!("runs must be at least 1");
        }

        let format = cli
            .format
            .as_deref()
            .unwrap_or(report.format.as_str())
            .parse::<OutputFormat>()
            .map_err(|e| anyhow::anyhow!(e))?;

        let timeout = cli
            .timeout
            .as_deref()
            .or(runner.timeout.as_deref())
            .map(ThreadscaleConfig::parse_duration)
            .transpose()?
            .map(Duration::from_nanos);

        let custom_columns = if cli.custom.is_empty() {
            report.custom_columns.clone()
        } else {
            cli.custom.clone()
        };

        Ok(Self {
            program,
            args,
            threads_range: cli.threads_range.clone(),
            max_threads: cli.max_threads.unwrap_or(runner.max_threads),
            runs,
            profile: cli.profile || report.profile,
            custom_columns,
            output: cli
                .output
                .clone()
                .unwrap_or_else(|| PathBuf::from(&report.output)),
            format,
            timeout,
            log_file: cli
                .log_file
                .clone()
                .unwrap_or_else(|| PathBuf::from(&runner.log_file)),
            section_marker: runner.section_marker.clone(),
            threads_flag: runner.threads_flag.clone(),
            runs_flag: runner.runs_flag.clone(),
            serial_flag: runner.serial_flag.clone(),
            profile_flag: runner.profile_flag.clone(),
        })
    }

    fn launch_config(&self, program: &str) -> LaunchConfig {
        LaunchConfig {
            log_file: self.log_file.clone(),
            timeout: self.timeout,
            threads_flag: self.threads_flag.clone(),
            runs_flag: self.runs_flag.clone(),
            serial_flag: self.serial_flag.clone(),
            profile_flag: self.profile_flag.clone(),
            ..LaunchConfig::new(program, self.args.clone())
        }
    }

    fn session_config(&self, progress: bool) -> SessionConfig {
        SessionConfig {
            runs: self.runs,
            custom_columns: self.custom_columns.clone(),
            section_marker: (!self.section_marker.is_empty())
                .then(|| self.section_marker.clone()),
            progress,
        }
    }
}

fn print_plan(settings: &Settings, passes: &[Pass]) -> anyhow::Result<()> {
    let program = settings.program.as_deref().unwrap_or("<program>");
    let launch = settings.launch_config(program);

    println!("Threadscale Plan:");
    for (i, pass) in passes.iter().enumerate() {
        let request = pass.request(settings.runs);
        println!("├── {:>2}. {}", i + 1, pass);
        println!("│   └── {}", launch.command_line(&request).join(" "));
    }
    println!("{} pass(es), report: {}", passes.len(), settings.output.display());
    Ok(())
}

fn run_session(settings: &Settings, passes: &[Pass], quiet: bool) -> anyhow::Result<()> {
    let Some(program) = settings.program.as_deref() else {
        anyhow::bail!("no workload program; pass it after `--` or set runner.program");
    };

    let interrupt = Interrupt::from_signals()?;
    let launcher = CommandLauncher::new(settings.launch_config(program), interrupt.clone());

    let mut command = vec![program.to_string()];
    command.extend(settings.args.iter().cloned());
    let threads = passes
        .iter()
        .map(|pass| match pass {
            Pass::Serial => 0,
            Pass::Threads(t) | Pass::Profile(t) => *t,
        })
        .collect();
    let meta = ReportMeta::new(command, settings.runs, threads);

    let progress = !quiet && std::io::stdout().is_terminal();
    let sink = ReportSink::new(&settings.output, settings.format);
    let mut orchestrator =
        Orchestrator::new(launcher, settings.session_config(progress), meta, interrupt)?
            .with_sink(sink);

    println!(
        "Running {} pass(es), {} run(s) per launch...\n",
        passes.len(),
        settings.runs
    );
    let result = orchestrator.run(passes);

    if !quiet {
        print!(
            "{}",
            format_human_output(orchestrator.table(), orchestrator.meta())
        );
    }

    match result {
        Ok(()) => Ok(()),
        Err(SessionError::Interrupted) => {
            println!("Caught interrupt, wrote results so far");
            Ok(())
        }
        Err(e) => {
            eprintln!("Run failed, wrote results so far");
            Err(e.into())
        }
    }
}
