//! JSON Output

use crate::meta::ReportMeta;
use crate::table::{ReportTable, TableError};
use serde_json::{Map, Value, json};

/// Render the table as a JSON document.
///
/// Rows are objects whose keys follow the declared column order; cells a row
/// never received are omitted rather than written as empty strings.
pub fn generate_json_report(table: &ReportTable, meta: &ReportMeta) -> Result<String, TableError> {
    let rows: Vec<Value> = table
        .rows()
        .iter()
        .map(|row| -> Result<Value, serde_json::Error> {
            let mut object = Map::new();
            for (column, cell) in table.columns().iter().zip(table.ordered_cells(row)) {
                if let Some(cell) = cell {
                    object.insert(column.clone(), serde_json::to_value(cell)?);
                }
            }
            Ok(Value::Object(object))
        })
        .collect::<Result<_, serde_json::Error>>()?;

    let document = json!({
        "meta": meta,
        "columns": table.columns(),
        "rows": rows,
    });
    Ok(serde_json::to_string_pretty(&document)?)
}
