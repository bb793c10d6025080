//! CSV Output

use crate::table::{ReportTable, TableError};
use std::io::Write;

/// Write the header and every sealed row. Absent cells are empty fields.
pub fn write_csv<W: Write>(table: &ReportTable, writer: W) -> Result<(), TableError> {
    let mut wtr = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(writer);

    wtr.write_record(table.columns())?;
    for row in table.rows() {
        let fields: Vec<String> = table
            .ordered_cells(row)
            .map(|cell| cell.map(ToString::to_string).unwrap_or_default())
            .collect();
        wtr.write_record(&fields)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Render the table as a CSV string with a trailing newline
pub fn generate_csv_report(table: &ReportTable) -> Result<String, TableError> {
    let mut buf = Vec::new();
    write_csv(table, &mut buf)?;
    String::from_utf8(buf).map_err(|_| TableError::Encoding)
}
