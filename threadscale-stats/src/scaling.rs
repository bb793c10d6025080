//! Scaling Ratios
//!
//! A session captures two reference times: the serial run and the first
//! one-thread run. Every later row divides a baseline by its own
//! steady-state time.
//!
//! - scalability = one-thread time / t-thread time (1 at t = 1)
//! - speedup = serial time / t-thread time
//!
//! A missing baseline or a zero divisor is an error, never `inf` or `NaN`.

use std::fmt;
use thiserror::Error;

/// Which reference time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaselineKind {
    /// Serial run
    Serial,
    /// First run at one thread
    OneThread,
}

impl fmt::Display for BaselineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BaselineKind::Serial => write!(f, "serial"),
            BaselineKind::OneThread => write!(f, "one-thread"),
        }
    }
}

/// Errors from scaling computations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScalingError {
    /// Baseline not captured yet, or captured as zero
    #[error("{0} baseline unavailable")]
    BaselineUnavailable(BaselineKind),

    /// Row time cannot be used as a divisor
    #[error("cannot divide by run time {0}")]
    InvalidRunTime(f64),
}

/// Reference times for one report session. Each is captured at most once.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunBaseline {
    serial: Option<f64>,
    one_thread: Option<f64>,
}

impl RunBaseline {
    /// Empty baseline
    pub fn new() -> Self {
        Self::default()
    }

    /// Serial reference time, if captured
    pub fn serial(&self) -> Option<f64> {
        self.serial
    }

    /// One-thread reference time, if captured
    pub fn one_thread(&self) -> Option<f64> {
        self.one_thread
    }

    /// Capture a reference time. Returns `false` and leaves the baseline
    /// untouched if it was already set.
    pub fn record(&mut self, kind: BaselineKind, time: f64) -> bool {
        let slot = match kind {
            BaselineKind::Serial => &mut self.serial,
            BaselineKind::OneThread => &mut self.one_thread,
        };
        if slot.is_some() {
            return false;
        }
        *slot = Some(time);
        true
    }

    fn get(&self, kind: BaselineKind) -> Result<f64, ScalingError> {
        let value = match kind {
            BaselineKind::Serial => self.serial,
            BaselineKind::OneThread => self.one_thread,
        };
        match value {
            Some(v) if v.is_finite() && v != 0.0 => Ok(v),
            _ => Err(ScalingError::BaselineUnavailable(kind)),
        }
    }

    /// Serial time over `last`
    pub fn speedup(&self, last: f64) -> Result<f64, ScalingError> {
        ratio(self.get(BaselineKind::Serial)?, last)
    }

    /// One-thread time over `last`; exactly 1 for a one-thread row
    pub fn scalability(&self, threads: u32, last: f64) -> Result<f64, ScalingError> {
        if threads == 1 {
            return Ok(1.0);
        }
        ratio(self.get(BaselineKind::OneThread)?, last)
    }
}

fn ratio(baseline: f64, last: f64) -> Result<f64, ScalingError> {
    if last == 0.0 || !last.is_finite() {
        return Err(ScalingError::InvalidRunTime(last));
    }
    Ok(baseline / last)
}
