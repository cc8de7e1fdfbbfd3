//! CSV import orchestration: tokenize, infer, merge schema, validate rows,
//! build records, hand the batch to the mutation layer.
//!
//! Parse failures abort before any schema mutation, so a malformed file
//! cannot corrupt a table's columns. Row validation failures never abort
//! the batch; they ride along in the report next to the count of rows
//! that did succeed.

use log::debug;
use serde::Serialize;

use crate::{
    data::coerce_import_value,
    error::Result,
    event::{EventSink, Notice},
    infer,
    mutation::{Coordinator, WriteMode},
    schema::{self, ColumnType},
    table::{Record, Table},
    tokenizer, validate,
};

/// Hard cap on rows accepted from a single CSV file. Rows beyond it are
/// dropped with a surfaced warning, never silently processed.
pub const MAX_IMPORT_ROWS: usize = 1000;

/// Data rows shown by the upload preview.
pub const PREVIEW_ROWS: usize = 5;

/// Outcome of a CSV import.
#[derive(Debug, Serialize)]
pub struct ImportReport {
    /// Records accepted into the table.
    pub imported: usize,
    /// Every row-scoped validation message, display-row tagged.
    pub errors: Vec<String>,
    /// Rows dropped by the cap, if any.
    pub clipped: Option<usize>,
    /// Sanitized keys of columns merged into the schema by this import.
    pub merged_columns: Vec<String>,
    /// How the accepted records were persisted; `None` when nothing was
    /// written.
    pub mode: Option<WriteMode>,
}

/// Imports CSV text into `table`.
pub fn import_csv(
    coordinator: &Coordinator<'_>,
    table: &mut Table,
    csv_text: &str,
    sink: &mut dyn EventSink,
) -> Result<ImportReport> {
    let parsed = tokenizer::parse(csv_text)?;

    let total = parsed.rows.len();
    let rows = &parsed.rows[..total.min(MAX_IMPORT_ROWS)];
    let clipped = (total > MAX_IMPORT_ROWS).then(|| total - MAX_IMPORT_ROWS);
    if let Some(dropped) = clipped {
        sink.emit(Notice::warning(format!(
            "large CSV detected ({total} rows); importing only the first {MAX_IMPORT_ROWS}, dropping {dropped}"
        )));
    }

    let mut merged_columns = Vec::new();
    for header in &parsed.headers {
        let key = schema::sanitize_key(header);
        if table.has_column(&key) {
            continue;
        }
        let samples: Vec<String> = rows
            .iter()
            .filter_map(|row| row.get(header))
            .filter(|value| !value.trim().is_empty())
            .take(infer::MAX_SAMPLE_VALUES)
            .cloned()
            .collect();
        let inference = infer::infer(header, &samples);
        if let Some(column) = schema::merge_column(table, header, inference) {
            debug!("merged column \"{}\" as {}", column.key, column.column_type);
            merged_columns.push(column.key);
        }
    }

    let mut errors = Vec::new();
    let mut accepted = Vec::new();
    for (index, row) in rows.iter().enumerate() {
        let row_errors = validate::validate_csv_row(&parsed.headers, row, index);
        if !row_errors.is_empty() {
            errors.extend(row_errors);
            continue;
        }
        let mut record = Record::new(table.allocate_local_id());
        for header in &parsed.headers {
            let key = schema::sanitize_key(header);
            let raw = row.get(header).map(String::as_str).unwrap_or("");
            let column_type = table
                .column(&key)
                .map(|column| column.column_type)
                .unwrap_or(ColumnType::Text);
            record.set(key, coerce_import_value(raw, &column_type));
        }
        accepted.push(record);
    }

    let mut report = ImportReport {
        imported: 0,
        errors,
        clipped,
        merged_columns,
        mode: None,
    };

    if !accepted.is_empty() {
        let outcome = coordinator.bulk_create(table, accepted, sink);
        report.imported = outcome.value;
        report.mode = Some(outcome.mode);
    }

    if report.errors.is_empty() {
        sink.emit(Notice::success(format!(
            "imported {} record(s) into table \"{}\"",
            report.imported, table.name
        )));
    } else {
        sink.emit(Notice::warning(format!(
            "import completed with {} validation error(s); {} valid record(s) imported",
            report.errors.len(),
            report.imported
        )));
    }

    Ok(report)
}

/// Headers plus the first few data rows, for showing before an import is
/// committed.
#[derive(Debug, Serialize)]
pub struct Preview {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub total_rows: usize,
}

pub fn preview(csv_text: &str, limit: usize) -> Result<Preview> {
    let parsed = tokenizer::parse(csv_text)?;
    let rows = parsed
        .rows
        .iter()
        .take(limit)
        .map(|row| {
            parsed
                .headers
                .iter()
                .map(|header| row.get(header).cloned().unwrap_or_default())
                .collect()
        })
        .collect();
    Ok(Preview {
        headers: parsed.headers.clone(),
        rows,
        total_rows: parsed.rows.len(),
    })
}
