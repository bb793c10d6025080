//! Terminal Summary
//!
//! Compact view of a finished (or partial) session: one line per row with
//! the headline timing and scaling figures.

use crate::columns::{AVERAGE_TIME, LAST_TIME, SCALABILITY, SPEEDUP, THREAD};
use crate::meta::ReportMeta;
use crate::table::{Cell, ReportTable};

fn number(cell: Option<&Cell>) -> String {
    match cell.and_then(Cell::as_f64) {
        Some(v) => format!("{:.2}", v),
        None => "-".to_string(),
    }
}

/// Format a table for terminal display
pub fn format_human_output(table: &ReportTable, meta: &ReportMeta) -> String {
    let mut output = String::new();

    output.push('\n');
    output.push_str("Threadscale Results\n");
    output.push_str(&"=".repeat(60));
    output.push('\n');
    output.push_str(&format!(
        "command: {}\nstarted: {}  runs per launch: {}\n\n",
        meta.command.join(" "),
        meta.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
        meta.runs
    ));

    output.push_str(&format!(
        "  {:<8}  {:>12}  {:>12}  {:>10}  {:>11}\n",
        THREAD, "last (ms)", "avg (ms)", "speedup", "scalability"
    ));
    output.push_str(&format!("  {}\n", "-".repeat(59)));

    for row in table.rows() {
        let label = row.get(THREAD).map(ToString::to_string).unwrap_or_default();
        output.push_str(&format!(
            "  {:<8}  {:>12}  {:>12}  {:>10}  {:>11}\n",
            label,
            number(row.get(LAST_TIME)),
            number(row.get(AVERAGE_TIME)),
            number(row.get(SPEEDUP)),
            number(row.get(SCALABILITY)),
        ));
    }

    output.push_str(&format!("\n{} row(s)\n", table.rows().len()));
    output
}
