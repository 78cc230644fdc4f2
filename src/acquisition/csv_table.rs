//! CSV reading and writing for raw acquisition tables.
//!
//! Every column must be numeric. Blank lines are skipped by the reader; a row
//! with a missing or non-numeric cell fails the whole table so a damaged file
//! is never half-analyzed.

use std::io::{Read, Write};
use std::path::Path;

use crate::error::{AnalysisError, AnalysisResult};
use crate::types::RawTable;

/// Parse a headed CSV stream into a column-major [`RawTable`].
pub fn read_table<R: Read>(reader: R) -> AnalysisResult<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(false)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| AnalysisError::malformed(format!("reading CSV header: {e}")))?
        .iter()
        .map(str::to_string)
        .collect();
    if headers.is_empty() || headers.iter().all(String::is_empty) {
        return Err(AnalysisError::malformed("CSV has no header row"));
    }

    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); headers.len()];
    for (row_no, result) in reader.records().enumerate() {
        // Data rows are numbered from 1, after the header
        let row = row_no + 1;
        let record = result.map_err(|e| AnalysisError::malformed(format!("CSV row {row}: {e}")))?;
        for (col_idx, cell) in record.iter().enumerate() {
            let value = cell.parse::<f64>().map_err(|_| {
                AnalysisError::malformed(format!(
                    "CSV row {row}, column '{}': '{cell}' is not a number",
                    headers[col_idx]
                ))
            })?;
            columns[col_idx].push(value);
        }
    }

    Ok(RawTable::new(headers, columns))
}

/// Read a CSV file from disk.
pub fn read_table_from_path(path: &Path) -> AnalysisResult<RawTable> {
    let file = std::fs::File::open(path)
        .map_err(|e| AnalysisError::malformed(format!("opening {}: {e}", path.display())))?;
    read_table(file)
}

/// Write `table` as CSV with a header row.
pub fn write_table<W: Write>(table: &RawTable, writer: W) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(&table.headers)?;
    for row in 0..table.row_count() {
        wtr.write_record(table.columns.iter().map(|c| c[row].to_string()))?;
    }
    wtr.flush()?;
    Ok(())
}
