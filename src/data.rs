//! Scalar cell values and column-driven coercion.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::ColumnType;

/// A record cell: text or a finite number. Untagged so records round-trip
/// as plain YAML/JSON scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
}

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(value.into())
    }

    pub fn number(value: f64) -> Self {
        Value::Number(value)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Number(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(_) => None,
        }
    }

    pub fn as_display(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    (*n as i64).to_string()
                } else {
                    n.to_string()
                }
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

/// Parses a string as a finite number, the check the import path uses to
/// decide whether a raw field is numeric.
pub fn parse_finite_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Import-side coercion: number columns keep numbers when the raw value
/// parses; everything else stays a trimmed string.
pub fn coerce_import_value(raw: &str, column_type: &ColumnType) -> Value {
    match column_type {
        ColumnType::Number if !raw.trim().is_empty() => match parse_finite_number(raw) {
            Some(n) => Value::Number(n),
            None => Value::text(raw.trim()),
        },
        ColumnType::Number
        | ColumnType::Text
        | ColumnType::Email
        | ColumnType::Tel
        | ColumnType::Url
        | ColumnType::Date
        | ColumnType::Checkbox => Value::text(raw.trim()),
    }
}

/// Form-side coercion: number fields truncate to whole numbers and fall
/// back to zero when unparsable; all other types pass through verbatim.
pub fn coerce_form_value(raw: &str, column_type: &ColumnType) -> Value {
    match column_type {
        ColumnType::Number => {
            Value::Number(parse_finite_number(raw).map(f64::trunc).unwrap_or(0.0))
        }
        ColumnType::Text
        | ColumnType::Email
        | ColumnType::Tel
        | ColumnType::Url
        | ColumnType::Date
        | ColumnType::Checkbox => Value::text(raw),
    }
}

/// Default cell for a freshly added column, back-filled into records that
/// predate the column.
pub fn default_for_column(column_type: &ColumnType, configured: Option<&str>) -> Value {
    match configured {
        Some(raw) if !raw.trim().is_empty() => coerce_form_value(raw, column_type),
        _ => match column_type {
            ColumnType::Number => Value::Number(0.0),
            ColumnType::Text
            | ColumnType::Email
            | ColumnType::Tel
            | ColumnType::Url
            | ColumnType::Date
            | ColumnType::Checkbox => Value::text(""),
        },
    }
}
