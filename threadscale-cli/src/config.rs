//! Configuration loading from threadscale.toml
//!
//! Session settings can be kept in a `threadscale.toml` next to the workload.
//! The file is discovered by walking up from the current directory; every
//! field has a default and command-line flags override it.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the configuration file looked up during discovery
pub const CONFIG_FILE: &str = "threadscale.toml";

/// Threadscale configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ThreadscaleConfig {
    /// How to launch the workload
    #[serde(default)]
    pub runner: RunnerConfig,
    /// What to write at the end of a session
    #[serde(default)]
    pub report: ReportConfig,
}

/// Workload launch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Executable to launch
    #[serde(default)]
    pub program: Option<String>,
    /// Arguments appended after the threadscale-controlled flags
    #[serde(default)]
    pub args: Vec<String>,
    /// Statistics log the workload writes into its working directory
    #[serde(default = "default_log_file")]
    pub log_file: String,
    /// Repeats per launch
    #[serde(default = "default_runs")]
    pub runs: usize,
    /// Upper end of the default thread range
    #[serde(default = "default_max_threads")]
    pub max_threads: u32,
    /// Per-launch timeout (e.g. "10m"); unset means wait forever
    #[serde(default)]
    pub timeout: Option<String>,
    /// Banner after which the log's statistics are read
    #[serde(default = "default_section_marker")]
    pub section_marker: String,
    /// Flag carrying the thread count
    #[serde(default = "default_threads_flag")]
    pub threads_flag: String,
    /// Flag carrying the repeat count
    #[serde(default = "default_runs_flag")]
    pub runs_flag: String,
    /// Flag selecting the serial runtime
    #[serde(default = "default_serial_flag")]
    pub serial_flag: String,
    /// Flag enabling runtime profiling
    #[serde(default = "default_profile_flag")]
    pub profile_flag: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            program: None,
            args: Vec::new(),
            log_file: default_log_file(),
            runs: default_runs(),
            max_threads: default_max_threads(),
            timeout: None,
            section_marker: default_section_marker(),
            threads_flag: default_threads_flag(),
            runs_flag: default_runs_flag(),
            serial_flag: default_serial_flag(),
            profile_flag: default_profile_flag(),
        }
    }
}

fn default_log_file() -> String {
    "stats.txt".to_string()
}
fn default_runs() -> usize {
    1
}
fn default_max_threads() -> u32 {
    1
}
fn default_section_marker() -> String {
    "= Merged Statistics =".to_string()
}
fn default_threads_flag() -> String {
    "-t".to_string()
}
fn default_runs_flag() -> String {
    "-r".to_string()
}
fn default_serial_flag() -> String {
    "-s".to_string()
}
fn default_profile_flag() -> String {
    "-g".to_string()
}

/// Report output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Report file path
    #[serde(default = "default_output")]
    pub output: String,
    /// Report format: "csv" or "json"
    #[serde(default = "default_format")]
    pub format: String,
    /// Extra columns, each a regex with one capture group
    #[serde(default)]
    pub custom_columns: Vec<String>,
    /// Append profiling passes at 1 and at the maximum thread count
    #[serde(default)]
    pub profile: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            format: default_format(),
            custom_columns: Vec::new(),
            profile: false,
        }
    }
}

fn default_output() -> String {
    "report.csv".to_string()
}
fn default_format() -> String {
    "csv".to_string()
}

impl ThreadscaleConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Try to discover and load configuration by walking up from current directory
    pub fn discover() -> Option<Self> {
        let mut dir = std::env::current_dir().ok()?;
        loop {
            let config_path = dir.join(CONFIG_FILE);
            if config_path.exists() {
                return match Self::load(&config_path) {
                    Ok(config) => Some(config),
                    Err(e) => {
                        tracing::warn!("ignoring {}: {}", config_path.display(), e);
                        None
                    }
                };
            }
            if !dir.pop() {
                break;
            }
        }
        None
    }

    /// Generate a default configuration as TOML string
    pub fn default_toml() -> String {
        r#"# Threadscale Configuration

[runner]
# Workload executable and its own arguments
# program = "./bin/app"
# args = ["apps.sssp.Main", "input.gr"]
# Statistics log written by the workload
log_file = "stats.txt"
# Repeats per launch (one wall time sample each)
runs = 1
# Default thread range is 0 (serial) through max_threads
max_threads = 1
# Per-launch timeout (uncomment to enable)
# timeout = "30m"
# Statistics after this banner are authoritative
section_marker = "= Merged Statistics ="
# Flags passed to the workload
threads_flag = "-t"
runs_flag = "-r"
serial_flag = "-s"
profile_flag = "-g"

[report]
# Report file
output = "report.csv"
# Format: csv or json
format = "csv"
# Extra columns scraped from the log, one capture group each
# custom_columns = ['^Nodes visited: (\d+)']
custom_columns = []
# Profiling passes at 1 and max threads
profile = false
"#
        .to_string()
    }

    /// Parse duration string (e.g., "3s", "500ms", "2m") to nanoseconds
    pub fn parse_duration(s: &str) -> anyhow::Result<u64> {
        let s = s.trim();
        if s.is_empty() {
            return Err(anyhow::anyhow!("Empty duration string"));
        }

        // Find where the number ends and unit begins
        let (num_part, unit_part) = s
            .char_indices()
            .find(|(_, c)| c.is_alphabetic())
            .map(|(i, _)| s.split_at(i))
            .unwrap_or((s, "s"));

        let value: f64 = num_part
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid duration number: {}", num_part))?;
        if value < 0.0 {
            return Err(anyhow::anyhow!("Negative duration: {}", s));
        }

        let multiplier: u64 = match unit_part.to_lowercase().as_str() {
            "ms" => 1_000_000,
            "s" | "" => 1_000_000_000,
            "m" | "min" => 60_000_000_000,
            "h" => 3_600_000_000_000,
            _ => return Err(anyhow::anyhow!("Unknown duration unit: {}", unit_part)),
        };

        Ok((value * multiplier as f64) as u64)
    }
}
