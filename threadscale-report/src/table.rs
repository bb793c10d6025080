//! Result Table
//!
//! Append-only table with a column order fixed up front. A row is built by
//! any number of [`ReportTable::update`] calls and committed with
//! [`ReportTable::seal`]; the next update starts a fresh row.
//!
//! Rendering is total: any column a row never received renders as an empty
//! cell, and every sealed row is always included. This is what makes a
//! partial report safe to write when a session is cut short.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Errors from table construction and rendering
#[derive(Debug, Error)]
pub enum TableError {
    /// Columns may be set only once
    #[error("columns already declared")]
    ColumnsAlreadyDeclared,

    /// CSV writer failure
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serializer failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Write failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Rendered bytes were not valid UTF-8
    #[error("rendered output is not UTF-8")]
    Encoding,
}

/// A rendered table value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    /// Whole number
    Int(i64),
    /// Measurement or ratio
    Float(f64),
    /// Label
    Text(String),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Int(v) => write!(f, "{}", v),
            // Shortest round-trip form, always with a fractional part ("10.0")
            Cell::Float(v) => write!(f, "{:?}", v),
            Cell::Text(v) => f.write_str(v),
        }
    }
}

impl Cell {
    /// Numeric value, if any
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(v) => Some(*v as f64),
            Cell::Float(v) => Some(*v),
            Cell::Text(_) => None,
        }
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Float(v)
    }
}

impl From<i64> for Cell {
    fn from(v: i64) -> Self {
        Cell::Int(v)
    }
}

impl From<u32> for Cell {
    fn from(v: u32) -> Self {
        Cell::Int(i64::from(v))
    }
}

impl From<&str> for Cell {
    fn from(v: &str) -> Self {
        Cell::Text(v.to_string())
    }
}

impl From<String> for Cell {
    fn from(v: String) -> Self {
        Cell::Text(v)
    }
}

/// One row: column name to value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportRow {
    cells: HashMap<String, Cell>,
}

impl ReportRow {
    /// Row with no cells
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a cell; the last write per column wins
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Cell>) {
        self.cells.insert(column.into(), value.into());
    }

    /// Cell in `column`, if set
    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.cells.get(column)
    }

    /// Copy every cell of `other` over this row
    pub fn merge(&mut self, other: ReportRow) {
        self.cells.extend(other.cells);
    }

    /// True when no cell is set
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Number of cells set
    pub fn len(&self) -> usize {
        self.cells.len()
    }
}

impl<K: Into<String>, V: Into<Cell>> FromIterator<(K, V)> for ReportRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = ReportRow::new();
        for (k, v) in iter {
            row.set(k, v);
        }
        row
    }
}

/// Column-stable row accumulator
#[derive(Debug, Clone, Default)]
pub struct ReportTable {
    columns: Vec<String>,
    rows: Vec<ReportRow>,
    current: ReportRow,
}

impl ReportTable {
    /// Empty table with no columns yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with its columns already declared
    pub fn with_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Fix the output column order. Allowed once, before any row exists.
    pub fn declare_columns<I, S>(&mut self, columns: I) -> Result<(), TableError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if !self.columns.is_empty() || !self.rows.is_empty() || !self.current.is_empty() {
            return Err(TableError::ColumnsAlreadyDeclared);
        }
        self.columns = columns.into_iter().map(Into::into).collect();
        Ok(())
    }

    /// Merge cells into the row under construction
    pub fn update(&mut self, partial: ReportRow) {
        self.current.merge(partial);
    }

    /// Set one cell of the row under construction
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Cell>) {
        self.current.set(column, value);
    }

    /// Commit the row under construction and start a new one
    pub fn seal(&mut self) {
        let row = std::mem::take(&mut self.current);
        self.rows.push(row);
    }

    /// Drop the row under construction without committing it
    pub fn discard_current(&mut self) -> ReportRow {
        std::mem::take(&mut self.current)
    }

    /// Declared columns in output order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Sealed rows, in insertion order
    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    /// The row under construction
    pub fn current(&self) -> &ReportRow {
        &self.current
    }

    /// Cells of a sealed row in declared column order; absent cells are `None`
    pub fn ordered_cells<'a>(
        &'a self,
        row: &'a ReportRow,
    ) -> impl Iterator<Item = Option<&'a Cell>> {
        self.columns.iter().map(move |c| row.get(c))
    }

    /// Header plus one CSV line per sealed row
    pub fn lines(&self) -> Result<Vec<String>, TableError> {
        Ok(crate::csv::generate_csv_report(self)?
            .lines()
            .map(String::from)
            .collect())
    }
}
