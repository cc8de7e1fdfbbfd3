//! Column schema model and the per-table schema registry.
//!
//! Owns [`ColumnType`] (a closed set of seven semantic types), [`Column`]
//! metadata, header key sanitization, and the merge/add/remove operations
//! that keep a table's column set collision-free.
//!
//! Two invariants live here: the identity column is never produced by a
//! merge and is never removable, and a table flagged with baseline
//! protection refuses to drop any of its creation-time columns.

use std::{fmt, str::FromStr};

use anyhow::anyhow;
use heck::ToTitleCase;
use serde::{Deserialize, Serialize};

use crate::{
    data::default_for_column,
    error::{Error, Result},
    infer::{self, Inference},
    table::Table,
};

/// Key of the identity column present in every table.
pub const ID_COLUMN_KEY: &str = "id";

/// The application's primary entity table. Its baseline columns are
/// protected from deletion and the table itself cannot be dropped.
pub const PRIMARY_TABLE: &str = "users";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Text,
    Number,
    Email,
    Tel,
    Url,
    Date,
    Checkbox,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Text => "text",
            ColumnType::Number => "number",
            ColumnType::Email => "email",
            ColumnType::Tel => "tel",
            ColumnType::Url => "url",
            ColumnType::Date => "date",
            ColumnType::Checkbox => "checkbox",
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &["text", "number", "email", "tel", "url", "date", "checkbox"]
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(ColumnType::Text),
            "number" => Ok(ColumnType::Number),
            "email" => Ok(ColumnType::Email),
            "tel" | "phone" => Ok(ColumnType::Tel),
            "url" => Ok(ColumnType::Url),
            "date" => Ok(ColumnType::Date),
            "checkbox" => Ok(ColumnType::Checkbox),
            _ => Err(anyhow!(
                "Unknown column type '{value}'. Supported types: {}",
                ColumnType::variants().join(", ")
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    /// Sanitized key, unique within the table.
    pub key: String,
    /// Original display header.
    pub label: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    pub required: bool,
    /// False only for the identity column.
    pub editable: bool,
}

impl Column {
    /// The non-editable identity column every table starts with.
    pub fn identity() -> Self {
        Column {
            key: ID_COLUMN_KEY.to_string(),
            label: "ID".to_string(),
            column_type: ColumnType::Number,
            required: true,
            editable: false,
        }
    }
}

/// Requested interactive column addition.
#[derive(Debug, Clone)]
pub struct NewColumn {
    pub key: String,
    pub label: String,
    pub column_type: ColumnType,
    pub required: bool,
    /// Back-filled into existing records; type-appropriate zero/empty when
    /// absent.
    pub default_value: Option<String>,
}

/// Reduces a display header to a stable column key: lower-cased, every
/// character outside `[a-z0-9]` replaced with an underscore. Idempotent.
pub fn sanitize_key(header: &str) -> String {
    header
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Derives a display label from a bare column key reported by the remote
/// store.
pub fn label_for_key(key: &str) -> String {
    if key == ID_COLUMN_KEY {
        return "ID".to_string();
    }
    key.to_title_case()
}

/// Appends a new editable column inferred from `header`, unless a column
/// with the sanitized key already exists; a collision is a silent no-op,
/// not an error.
pub fn merge_column(table: &mut Table, header: &str, inference: Inference) -> Option<Column> {
    let key = sanitize_key(header);
    if table.has_column(&key) {
        return None;
    }
    let column = Column {
        key,
        label: header.to_string(),
        column_type: inference.column_type,
        required: inference.required,
        editable: true,
    };
    table.columns.push(column.clone());
    Some(column)
}

/// Adds a column through the interactive path. Unlike [`merge_column`],
/// duplicate keys are an error here, and existing records are back-filled
/// with the column's default value.
pub fn add_column(table: &mut Table, new: &NewColumn) -> Result<Column> {
    if new.key.trim().is_empty() || new.label.trim().is_empty() {
        return Err(Error::Validation(vec![
            "column key and label are required".to_string(),
        ]));
    }
    let key = sanitize_key(&new.key);
    if table.has_column(&key) {
        return Err(Error::DuplicateColumn { key });
    }
    let column = Column {
        key: key.clone(),
        label: new.label.clone(),
        column_type: new.column_type,
        required: new.required,
        editable: true,
    };
    table.columns.push(column.clone());
    backfill_default(table, &key, new.column_type, new.default_value.as_deref());
    Ok(column)
}

/// Fills `key` into every record that does not carry it yet.
pub fn backfill_default(
    table: &mut Table,
    key: &str,
    column_type: ColumnType,
    configured: Option<&str>,
) {
    let default = default_for_column(&column_type, configured);
    for record in &mut table.records {
        record
            .values
            .entry(key.to_string())
            .or_insert_with(|| default.clone());
    }
}

/// Checks the deletion guards without mutating anything.
pub fn ensure_removable(table: &Table, key: &str) -> Result<()> {
    if key == ID_COLUMN_KEY {
        return Err(Error::ProtectedColumn {
            key: key.to_string(),
        });
    }
    if table.protect_baseline && table.baseline.iter().any(|k| k == key) {
        return Err(Error::ProtectedColumn {
            key: key.to_string(),
        });
    }
    if !table.has_column(key) {
        return Err(Error::UnknownColumn {
            key: key.to_string(),
        });
    }
    Ok(())
}

/// Removes a column and strips its key from every record. Identity and
/// baseline-protected columns always refuse.
pub fn remove_column(table: &mut Table, key: &str) -> Result<()> {
    ensure_removable(table, key)?;
    table.columns.retain(|column| column.key != key);
    for record in &mut table.records {
        record.values.remove(key);
    }
    Ok(())
}

/// Rebuilds a table's columns from the bare key names the remote store
/// reports, refining each type from the first record's value for that key.
/// The identity column is re-inserted at the front if the store omits it.
pub fn sync_columns(table: &mut Table, keys: &[String]) {
    if keys.is_empty() {
        return;
    }
    let first = table.records.first().cloned();
    let mut columns: Vec<Column> = keys
        .iter()
        .map(|key| {
            if key == ID_COLUMN_KEY {
                return Column::identity();
            }
            let sample = first.as_ref().and_then(|record| record.value(key));
            Column {
                key: key.clone(),
                label: label_for_key(key),
                column_type: infer::refine(key, sample),
                required: false,
                editable: true,
            }
        })
        .collect();
    if !columns.iter().any(|column| column.key == ID_COLUMN_KEY) {
        columns.insert(0, Column::identity());
    }
    table.columns = columns;
}
