//! Workload Launcher
//!
//! Runs the external workload once per pass and waits for it to finish.
//! The workload writes a fixed-name statistics log into its working
//! directory; only one launch is ever in flight, so each pass sees the log
//! of its own run.
//!
//! The wait loop polls the child so that an operator interrupt or the
//! optional timeout can stop it: SIGTERM first, then SIGKILL after a short
//! grace window.

use crate::interrupt::Interrupt;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus};
use std::time::{Duration, Instant};
use thiserror::Error;

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const TERMINATE_GRACE: Duration = Duration::from_millis(500);

/// Errors from launching one pass
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The program could not be started
    #[error("failed to spawn {program}: {source}")]
    SpawnFailed {
        /// Program path as configured
        program: String,
        /// OS error
        #[source]
        source: std::io::Error,
    },

    /// Non-zero exit
    #[error("command exited with status {code}: {command}")]
    ExitStatus {
        /// Printable command line
        command: String,
        /// Exit code
        code: i32,
    },

    /// Killed by a signal
    #[error("command killed by signal {signal}: {command}")]
    Signaled {
        /// Printable command line
        command: String,
        /// Signal number
        signal: i32,
    },

    /// Ran past the configured timeout and was terminated
    #[error("command timed out after {timeout:?}: {command}")]
    Timeout {
        /// Printable command line
        command: String,
        /// Limit that was exceeded
        timeout: Duration,
    },

    /// Stopped by an operator interrupt
    #[error("interrupted while running: {command}")]
    Interrupted {
        /// Printable command line
        command: String,
    },

    /// Exited cleanly without writing its log
    #[error("statistics log not written: {}", .0.display())]
    MissingLog(PathBuf),

    /// Waiting on or signalling the child failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// What kind of pass a launch belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunMode {
    /// Serial runtime, the speedup reference
    Serial,
    /// Parallel runtime at a given thread count
    Parallel,
    /// Parallel runtime with profiling enabled
    Profile,
}

/// Parameters of a single launch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunRequest {
    /// Thread count passed to the workload
    pub threads: u32,
    /// Pass kind
    pub mode: RunMode,
    /// Repeats inside the one launch
    pub runs: usize,
}

/// Immutable description of how to launch the workload
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    /// Workload executable
    pub program: String,
    /// Extra arguments appended after the generated flags
    pub args: Vec<String>,
    /// Directory the workload runs in
    pub working_dir: PathBuf,
    /// Log name, relative to `working_dir`
    pub log_file: PathBuf,
    /// Per-launch wall clock limit
    pub timeout: Option<Duration>,
    /// Flag preceding the thread count
    pub threads_flag: String,
    /// Flag preceding the repeat count
    pub runs_flag: String,
    /// Flag selecting the serial build
    pub serial_flag: String,
    /// Flag enabling profiling
    pub profile_flag: String,
}

impl LaunchConfig {
    /// Config with the default flag spellings and log name
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            working_dir: PathBuf::from("."),
            log_file: PathBuf::from("stats.txt"),
            timeout: None,
            threads_flag: "-t".to_string(),
            runs_flag: "-r".to_string(),
            serial_flag: "-s".to_string(),
            profile_flag: "-g".to_string(),
        }
    }

    /// Full argument vector (program first) for one launch
    pub fn command_line(&self, request: &RunRequest) -> Vec<String> {
        let mut argv = vec![
            self.program.clone(),
            self.runs_flag.clone(),
            request.runs.to_string(),
            self.threads_flag.clone(),
            request.threads.to_string(),
        ];
        match request.mode {
            RunMode::Serial => argv.push(self.serial_flag.clone()),
            RunMode::Profile => argv.push(self.profile_flag.clone()),
            RunMode::Parallel => {}
        }
        argv.extend(self.args.iter().cloned());
        argv
    }

    /// Where the workload leaves its statistics
    pub fn log_path(&self) -> PathBuf {
        self.working_dir.join(&self.log_file)
    }
}

/// Something that can run one pass and leave a log behind
pub trait RunLauncher {
    /// Run to completion. On success the log at [`RunLauncher::log_path`]
    /// belongs to this run.
    fn launch(&mut self, request: &RunRequest) -> Result<(), LaunchError>;

    /// Fixed location of the statistics log
    fn log_path(&self) -> PathBuf;

    /// Printable command line for a request
    fn describe(&self, request: &RunRequest) -> String;
}

/// Launches the workload as a child process
pub struct CommandLauncher {
    config: LaunchConfig,
    interrupt: Interrupt,
}

impl CommandLauncher {
    /// Launcher that stops its child when `interrupt` is raised
    pub fn new(config: LaunchConfig, interrupt: Interrupt) -> Self {
        Self { config, interrupt }
    }

    /// Launch settings
    pub fn config(&self) -> &LaunchConfig {
        &self.config
    }
}

impl RunLauncher for CommandLauncher {
    fn launch(&mut self, request: &RunRequest) -> Result<(), LaunchError> {
        let argv = self.config.command_line(request);
        let command = argv.join(" ");
        let log_path = self.config.log_path();

        // A stale log from an earlier pass must never be mistaken for this one
        remove_if_exists(&log_path)?;

        tracing::info!("$ {}", command);
        let child = Command::new(&argv[0])
            .args(&argv[1..])
            .current_dir(&self.config.working_dir)
            .spawn()
            .map_err(|source| LaunchError::SpawnFailed {
                program: self.config.program.clone(),
                source,
            })?;

        let started = Instant::now();
        let mut guard = ChildGuard::new(child);
        let status = guard.wait(self.config.timeout, &self.interrupt, &command)?;
        tracing::debug!(
            "finished in {:.1}s with {}",
            started.elapsed().as_secs_f64(),
            status
        );

        // The child shares our process group, so Ctrl-C reaches it first
        if !status.success() && self.interrupt.is_triggered() {
            return Err(LaunchError::Interrupted { command });
        }
        check_status(status, &command)?;
        if !log_path.exists() {
            return Err(LaunchError::MissingLog(log_path));
        }
        Ok(())
    }

    fn log_path(&self) -> PathBuf {
        self.config.log_path()
    }

    fn describe(&self, request: &RunRequest) -> String {
        self.config.command_line(request).join(" ")
    }
}

fn remove_if_exists(path: &Path) -> Result<(), LaunchError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(LaunchError::Io(e)),
    }
}

fn check_status(status: ExitStatus, command: &str) -> Result<(), LaunchError> {
    if status.success() {
        return Ok(());
    }
    if let Some(signal) = status.signal() {
        return Err(LaunchError::Signaled {
            command: command.to_string(),
            signal,
        });
    }
    Err(LaunchError::ExitStatus {
        command: command.to_string(),
        code: status.code().unwrap_or(-1),
    })
}

/// Send SIGTERM to a process. Returns `Err` if the signal could not be delivered.
fn send_sigterm(pid: u32) -> Result<(), std::io::Error> {
    let ret = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if ret == -1 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Owns a running child; a child still alive on drop is terminated.
struct ChildGuard {
    child: Child,
    reaped: bool,
}

impl ChildGuard {
    fn new(child: Child) -> Self {
        Self {
            child,
            reaped: false,
        }
    }

    fn wait(
        &mut self,
        timeout: Option<Duration>,
        interrupt: &Interrupt,
        command: &str,
    ) -> Result<ExitStatus, LaunchError> {
        let start = Instant::now();
        loop {
            if let Some(status) = self.child.try_wait()? {
                self.reaped = true;
                return Ok(status);
            }
            if interrupt.is_triggered() {
                self.terminate();
                return Err(LaunchError::Interrupted {
                    command: command.to_string(),
                });
            }
            if let Some(timeout) = timeout {
                if start.elapsed() >= timeout {
                    tracing::warn!("timeout after {:?}, terminating: {}", timeout, command);
                    self.terminate();
                    return Err(LaunchError::Timeout {
                        command: command.to_string(),
                        timeout,
                    });
                }
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    /// SIGTERM, wait out the grace window, then SIGKILL
    fn terminate(&mut self) {
        if self.reaped {
            return;
        }
        // Ignore error: the child may already be gone
        let _ = send_sigterm(self.child.id());

        let deadline = Instant::now() + TERMINATE_GRACE;
        while Instant::now() < deadline {
            match self.child.try_wait() {
                Ok(Some(_)) => {
                    self.reaped = true;
                    return;
                }
                Ok(None) => std::thread::sleep(POLL_INTERVAL),
                Err(_) => break,
            }
        }

        let _ = self.child.kill();
        let _ = self.child.wait();
        self.reaped = true;
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        self.terminate();
    }
}
