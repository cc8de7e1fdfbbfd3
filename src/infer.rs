//! Column type inference for unknown CSV headers.
//!
//! Header-name keywords are checked first, in a deliberate order; sample
//! values are a fallback for anonymous headers only. The header signal is
//! cheap and usually right, so it always wins over sample shapes.

use std::sync::OnceLock;

use regex::Regex;

use crate::{
    data::{parse_finite_number, Value},
    schema::ColumnType,
};

/// Upper bound on sample values inspected per column.
pub const MAX_SAMPLE_VALUES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inference {
    pub column_type: ColumnType,
    pub required: bool,
}

fn absolute_url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^https?://").expect("static pattern"))
}

fn phone_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[\d\s\-\+\(\)]+$").expect("static pattern"))
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

/// Guesses a column type and required flag from a header name and up to
/// [`MAX_SAMPLE_VALUES`] non-empty sample values. First match wins.
pub fn infer(header: &str, samples: &[String]) -> Inference {
    let lowered = header.to_lowercase();

    if contains_any(&lowered, &["email", "mail"]) {
        return Inference {
            column_type: ColumnType::Email,
            required: true,
        };
    }
    if contains_any(&lowered, &["age", "number", "count"]) {
        return Inference {
            column_type: ColumnType::Number,
            required: false,
        };
    }
    if contains_any(&lowered, &["phone", "tel", "mobile"]) {
        return Inference {
            column_type: ColumnType::Tel,
            required: false,
        };
    }
    if contains_any(&lowered, &["url", "website", "link"]) {
        return Inference {
            column_type: ColumnType::Url,
            required: false,
        };
    }
    if contains_any(&lowered, &["date", "birth", "created"]) {
        return Inference {
            column_type: ColumnType::Date,
            required: false,
        };
    }
    if contains_any(&lowered, &["name", "title", "first", "last"]) {
        return Inference {
            column_type: ColumnType::Text,
            required: true,
        };
    }

    let non_empty: Vec<&str> = samples
        .iter()
        .map(String::as_str)
        .filter(|value| !value.trim().is_empty())
        .take(MAX_SAMPLE_VALUES)
        .collect();
    if !non_empty.is_empty() {
        if non_empty
            .iter()
            .all(|value| parse_finite_number(value).is_some())
        {
            return Inference {
                column_type: ColumnType::Number,
                required: false,
            };
        }
        if non_empty
            .iter()
            .all(|value| absolute_url_pattern().is_match(value))
        {
            return Inference {
                column_type: ColumnType::Url,
                required: false,
            };
        }
        if non_empty
            .iter()
            .all(|value| phone_pattern().is_match(value) && value.len() >= 10)
        {
            return Inference {
                column_type: ColumnType::Tel,
                required: false,
            };
        }
    }

    Inference {
        column_type: ColumnType::Text,
        required: false,
    }
}

/// Value-driven refinement for columns synced from the remote store, which
/// only reports bare key names. Key fragments win, then the shape of the
/// first seen value.
pub fn refine(key: &str, value: Option<&Value>) -> ColumnType {
    let lowered = key.to_lowercase();

    if lowered.contains("email") {
        return ColumnType::Email;
    }
    if lowered.contains("phone") || lowered.contains("tel") {
        return ColumnType::Tel;
    }
    if lowered.contains("url") || lowered.contains("website") || lowered.contains("link") {
        return ColumnType::Url;
    }
    if lowered.contains("date") || lowered.contains("time") {
        return ColumnType::Date;
    }

    match value {
        Some(Value::Number(_)) => ColumnType::Number,
        Some(Value::Text(s)) if parse_finite_number(s).is_some() => ColumnType::Number,
        _ => ColumnType::Text,
    }
}
