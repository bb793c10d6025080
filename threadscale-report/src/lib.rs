#![warn(missing_docs)]
//! Threadscale Report - Result Table and Output
//!
//! Accumulates one row per benchmark pass in a table whose column order is
//! declared once, then renders it as:
//! - CSV (the primary artifact)
//! - JSON (rows plus session metadata)
//! - a human-readable terminal summary

mod columns;
mod csv;
mod human;
mod json;
mod meta;
mod table;

pub use columns::*;
pub use crate::csv::{generate_csv_report, write_csv};
pub use human::format_human_output;
pub use json::generate_json_report;
pub use meta::ReportMeta;
pub use table::{Cell, ReportRow, ReportTable, TableError};

/// Output format of the report file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Comma-separated values with a header line
    #[default]
    Csv,
    /// JSON document with metadata
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("Unknown output format: {}", other)),
        }
    }
}

/// Render a table in the requested format
pub fn render_report(
    table: &ReportTable,
    meta: &ReportMeta,
    format: OutputFormat,
) -> Result<String, TableError> {
    match format {
        OutputFormat::Csv => generate_csv_report(table),
        OutputFormat::Json => generate_json_report(table, meta),
    }
}
