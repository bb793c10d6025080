//! Column Catalogue
//!
//! Header names of a scaling report, and the fixed order they appear in.

/// Thread count (or `serial` / `g<t>` for special passes)
pub const THREAD: &str = "T";
/// Prefix of per-repeat GC-inclusive wall time columns (`r1`, `r2`, ...)
pub const RUN_PREFIX: &str = "r";
/// Prefix of per-repeat GC-exclusive wall time columns (`wogcr1`, ...)
pub const WOGC_RUN_PREFIX: &str = "wogcr";
/// Final wall time sample
pub const LAST_TIME: &str = "LAST TIME";
/// Drop-first mean of wall time samples
pub const AVERAGE_TIME: &str = "AVERAGE TIME";
/// Committed iterations
pub const COMMITTED_ITS: &str = "committed its";
/// Total iterations
pub const TOTAL_ITS: &str = "total its";
/// Abort ratio
pub const ABORT_RATIO: &str = "ABORT RATIO";
/// Summed per-thread busy time
pub const THREAD_TIME: &str = "thread time";
/// Summed per-thread idle time
pub const IDLE_THREAD_TIME: &str = "IDLE THREAD TIME";
/// Last wall time minus last wall time without GC
pub const GC_TIME: &str = "GC TIME";
/// Sequential-equivalent time
pub const SERIAL_TIME: &str = "SERIAL TIME";
/// One-thread time over this row's time
pub const SCALABILITY: &str = "SCALABILITY";
/// Serial time over this row's time
pub const SPEEDUP: &str = "SPEEDUP";
/// Prefix of user-defined columns (`CUSTOM0`, ...)
pub const CUSTOM_PREFIX: &str = "CUSTOM";

/// Name of the `index`-th (1-based) wall time column
pub fn run_column(index: usize) -> String {
    format!("{}{}", RUN_PREFIX, index)
}

/// Name of the `index`-th (1-based) wall time without GC column
pub fn wogc_run_column(index: usize) -> String {
    format!("{}{}", WOGC_RUN_PREFIX, index)
}

/// Name of the `index`-th (0-based) custom column
pub fn custom_column(index: usize) -> String {
    format!("{}{}", CUSTOM_PREFIX, index)
}

/// Full header for a session with `runs` repeats per launch and
/// `custom_count` user-defined columns.
pub fn scaling_columns(runs: usize, custom_count: usize) -> Vec<String> {
    let mut columns = Vec::with_capacity(13 + 2 * runs + custom_count);
    columns.push(THREAD.to_string());
    columns.extend((1..=runs).map(run_column));
    columns.extend((1..=runs).map(wogc_run_column));
    columns.extend(
        [
            LAST_TIME,
            AVERAGE_TIME,
            COMMITTED_ITS,
            TOTAL_ITS,
            ABORT_RATIO,
            THREAD_TIME,
            IDLE_THREAD_TIME,
            GC_TIME,
            SERIAL_TIME,
            SCALABILITY,
            SPEEDUP,
        ]
        .map(String::from),
    );
    columns.extend((0..custom_count).map(custom_column));
    columns
}
