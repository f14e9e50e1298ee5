//! JSON representation of scans.
//!
//! Two producers share this parsing code:
//!
//! - the Tiled server, whose `primary/data` node serializes as an object of
//!   column arrays and whose metadata carries the start document under `start`
//! - scan files written by `beamlinex save -d json`, which use the same shape:
//!
//! ```json
//! { "start": { "uid": "...", "scan_id": 42, "time": 1.49e9, ... },
//!   "table": { "time": [...], "bragg": [...], "VFMcamroi1": [...] } }
//! ```

use serde::Serialize;
use serde_json::{Map, Value};

use crate::domain::{Column, Scan, ScanHeader, ScanTable};
use crate::error::AppError;

/// Parse a start document.
pub fn parse_header(start: &Value) -> Result<ScanHeader, AppError> {
    serde_json::from_value(start.clone())
        .map_err(|e| AppError::runtime(format!("Invalid start document: {e}")))
}

/// Parse an object of column arrays, keeping numeric scalar columns only.
///
/// `null` entries become `NaN`; columns holding strings, booleans or nested
/// arrays (e.g. detector images) are skipped.
pub fn parse_table(data: &Map<String, Value>) -> Result<ScanTable, AppError> {
    let mut columns = Vec::with_capacity(data.len());
    for (name, value) in data {
        match numeric_column(value) {
            Some(values) => columns.push(Column {
                name: name.clone(),
                values,
            }),
            None => log::debug!("skipping non-numeric column '{name}'"),
        }
    }
    ScanTable::new(columns)
}

fn numeric_column(value: &Value) -> Option<Vec<f64>> {
    let items = value.as_array()?;
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Number(n) => out.push(n.as_f64()?),
            Value::Null => out.push(f64::NAN),
            _ => return None,
        }
    }
    Some(out)
}

/// Parse a full scan document (`{"start": ..., "table": ...}`).
pub fn parse_scan(doc: &Value) -> Result<Scan, AppError> {
    let start = doc
        .get("start")
        .ok_or_else(|| AppError::runtime("Scan document has no 'start' section."))?;
    let header = parse_header(start)?;
    let table = doc
        .get("table")
        .and_then(Value::as_object)
        .ok_or_else(|| AppError::runtime("Scan document has no 'table' object."))?;
    let table = parse_table(table)?.order_for(&header);
    Ok(Scan { header, table })
}

#[derive(Serialize)]
struct ScanDocumentRef<'a> {
    start: &'a ScanHeader,
    table: Map<String, Value>,
}

/// Serialize a scan (optionally a column subset) to the scan document shape.
pub fn scan_to_json(header: &ScanHeader, table: &ScanTable) -> Result<Value, AppError> {
    let mut map = Map::new();
    for col in table.columns() {
        let values = col
            .values
            .iter()
            .map(|&v| serde_json::Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null))
            .collect();
        map.insert(col.name.clone(), Value::Array(values));
    }
    serde_json::to_value(ScanDocumentRef {
        start: header,
        table: map,
    })
    .map_err(|e| AppError::runtime(format!("Failed to serialize scan {}: {e}", header.scan_id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_start_and_numeric_columns() {
        let doc = json!({
            "start": {
                "uid": "fb8686a1", "scan_id": 565, "time": 1490000000.5,
                "beamline_id": "SMI", "plan_name": "scan",
                "motors": ["bragg"], "detectors": ["VFMcamroi1"],
                "extra": {"ignored": true}
            },
            "table": {
                "VFMcamroi1": [1, 5, 2],
                "bragg": [10.0, 10.1, 10.2],
                "image": [[1, 2], [3, 4], [5, 6]],
                "note": ["a", "b", "c"],
                "ring_current": [300.1, null, 299.9]
            }
        });
        let scan = parse_scan(&doc).unwrap();
        assert_eq!(scan.header.scan_id, 565);
        assert_eq!(scan.header.beamline_id, "SMI");
        assert_eq!(scan.table.names(), vec!["bragg", "VFMcamroi1", "ring_current"]);
        assert!(scan.table.column("ring_current").unwrap()[1].is_nan());
    }

    #[test]
    fn document_round_trips_through_json() {
        let doc = json!({
            "start": {"uid": "abcdef", "scan_id": 1, "time": 0.0, "beamline_id": "CHX"},
            "table": {"dcm_b": [1.0, 2.0], "i": [3.0, 4.0]}
        });
        let scan = parse_scan(&doc).unwrap();
        let again = parse_scan(&scan_to_json(&scan.header, &scan.table).unwrap()).unwrap();
        assert_eq!(scan, again);
    }

    #[test]
    fn missing_sections_are_errors() {
        assert!(parse_scan(&json!({"table": {}})).is_err());
        assert!(parse_scan(&json!({"start": {"uid": "x", "scan_id": 1, "time": 0}})).is_err());
    }
}
