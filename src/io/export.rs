//! Write scan tables and numeric matrices to disk.
//!
//! Formats:
//! - `.csv`: comma separated with a header row (optional unnamed index column)
//! - `.json`: scan document, re-readable by `JsonDirSource`
//! - anything else: whitespace-aligned text table
//! - matrices: `# header` line then `%.18e` values, space separated

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::data::document::scan_to_json;
use crate::domain::{ScanHeader, ScanTable};
use crate::error::AppError;

/// Column alignment of text tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Justify {
    Left,
    Right,
}

/// Shortest round-trip representation; `NaN` for missing values.
pub fn format_value(v: f64) -> String {
    if v.is_nan() { "NaN".to_string() } else { format!("{v}") }
}

/// Render a table as aligned text, columns separated by two spaces.
pub fn format_text_table(table: &ScanTable, index: bool, justify: Justify) -> String {
    let mut cols: Vec<Vec<String>> = Vec::new();
    if index {
        let mut idx = vec![String::new()];
        idx.extend((0..table.rows()).map(|i| i.to_string()));
        cols.push(idx);
    }
    for col in table.columns() {
        let mut cells = vec![col.name.clone()];
        cells.extend(col.values.iter().map(|&v| format_value(v)));
        cols.push(cells);
    }

    let widths: Vec<usize> = cols
        .iter()
        .map(|c| c.iter().map(|s| s.chars().count()).max().unwrap_or(0))
        .collect();

    let mut out = String::new();
    for row in 0..=table.rows() {
        let line: Vec<String> = cols
            .iter()
            .zip(&widths)
            .enumerate()
            .map(|(i, (cells, &w))| match justify {
                Justify::Left => format!("{:<w$}", cells[row]),
                // The index stays left-aligned.
                Justify::Right if index && i == 0 => format!("{:<w$}", cells[row]),
                Justify::Right => format!("{:>w$}", cells[row]),
            })
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    }
    out
}

/// Write a table as CSV.
pub fn write_csv_table(path: &Path, table: &ScanTable, index: bool) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::runtime(format!("Failed to create CSV '{}': {e}", path.display())))?;
    let csv_err = |e: csv::Error| AppError::runtime(format!("Failed to write CSV '{}': {e}", path.display()));

    let mut header: Vec<String> = Vec::with_capacity(table.columns().len() + 1);
    if index {
        header.push(String::new());
    }
    header.extend(table.names().into_iter().map(str::to_string));
    writer.write_record(&header).map_err(csv_err)?;

    for row in 0..table.rows() {
        let mut record = Vec::with_capacity(header.len());
        if index {
            record.push(row.to_string());
        }
        record.extend(table.columns().iter().map(|c| {
            let v = c.values[row];
            if v.is_nan() { String::new() } else { format!("{v}") }
        }));
        writer.write_record(&record).map_err(csv_err)?;
    }
    writer
        .flush()
        .map_err(|e| AppError::runtime(format!("Failed to write CSV '{}': {e}", path.display())))
}

/// Save a scan table; the format follows the file extension.
pub fn save_scan_table(
    path: &Path,
    header: &ScanHeader,
    table: &ScanTable,
    index: bool,
) -> Result<(), AppError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "csv" => write_csv_table(path, table, index),
        "json" => {
            let file = File::create(path).map_err(|e| {
                AppError::runtime(format!("Failed to create '{}': {e}", path.display()))
            })?;
            serde_json::to_writer_pretty(BufWriter::new(file), &scan_to_json(header, table)?)
                .map_err(|e| AppError::runtime(format!("Failed to write '{}': {e}", path.display())))
        }
        _ => write_text(path, &format_text_table(table, index, Justify::Left)),
    }
}

pub fn write_text(path: &Path, content: &str) -> Result<(), AppError> {
    fs::write(path, content)
        .map_err(|e| AppError::runtime(format!("Failed to write '{}': {e}", path.display())))
}

/// C-style `%.18e` (`1.500000000000000000e+02`).
pub fn format_sci(v: f64) -> String {
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let s = format!("{v:.18e}");
    match s.split_once('e') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{mantissa}e{sign}{:02}", exp.abs())
        }
        None => s,
    }
}

/// Write rows of numbers as a `# header` line and a whitespace matrix.
pub fn save_matrix(path: &Path, header: Option<&str>, rows: &[Vec<f64>]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::runtime(format!("Failed to create '{}': {e}", path.display())))?;
    let mut out = BufWriter::new(file);
    let io_err = |e: std::io::Error| AppError::runtime(format!("Failed to write '{}': {e}", path.display()));

    if let Some(h) = header {
        for line in h.lines() {
            writeln!(out, "# {line}").map_err(io_err)?;
        }
    }
    for row in rows {
        let line: Vec<String> = row.iter().map(|&v| format_sci(v)).collect();
        writeln!(out, "{}", line.join(" ")).map_err(io_err)?;
    }
    out.flush().map_err(io_err)
}

/// Read a whitespace-separated matrix; `#` lines and blank lines are skipped.
pub fn read_matrix(path: &Path) -> Result<Vec<Vec<f64>>, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::usage(format!("Failed to open '{}': {e}", path.display())))?;

    let mut rows: Vec<Vec<f64>> = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| AppError::runtime(format!("Failed to read '{}': {e}", path.display())))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let row = trimmed
            .split_whitespace()
            .map(|tok| tok.parse::<f64>())
            .collect::<Result<Vec<f64>, _>>()
            .map_err(|e| {
                AppError::usage(format!("{}:{}: invalid number ({e}).", path.display(), idx + 1))
            })?;
        if let Some(first) = rows.first() {
            if first.len() != row.len() {
                return Err(AppError::usage(format!(
                    "{}:{}: expected {} columns, found {}.",
                    path.display(),
                    idx + 1,
                    first.len(),
                    row.len()
                )));
            }
        }
        rows.push(row);
    }
    Ok(rows)
}
