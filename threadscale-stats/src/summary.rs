//! Sample Summaries
//!
//! Repeated runs of one workload produce a short series of wall times. The
//! first sample usually carries warm-up cost, so the headline average drops
//! it, and the last sample is taken as the steady-state figure.

/// Arithmetic mean, `None` for an empty slice
pub fn mean(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        None
    } else {
        Some(sum(samples) / samples.len() as f64)
    }
}

/// Mean of every sample but the first. Falls back to the plain mean when
/// there is only one sample.
pub fn drop_first_mean(samples: &[f64]) -> Option<f64> {
    match samples {
        [] => None,
        [_] => mean(samples),
        [_, rest @ ..] => mean(rest),
    }
}

/// Sum of all samples (0 for an empty slice)
pub fn sum(samples: &[f64]) -> f64 {
    samples.iter().sum()
}

/// Summary of one repeated-run series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleSummary {
    /// Number of samples
    pub count: usize,
    /// Plain mean
    pub mean: f64,
    /// Mean excluding the first sample
    pub average: f64,
    /// Final sample
    pub last: f64,
    /// Sum of samples
    pub sum: f64,
}

impl SampleSummary {
    /// Summarize a series, `None` if it is empty
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        let last = *samples.last()?;
        Some(Self {
            count: samples.len(),
            mean: mean(samples)?,
            average: drop_first_mean(samples)?,
            last,
            sum: sum(samples),
        })
    }
}
