//! Validation rules shared by the import and interactive paths.
//!
//! CSV rows only undergo the email and age format checks; required-ness is
//! enforced at the interactive layer. The asymmetry is deliberate: a bulk
//! file may legitimately carry blank cells that a form submission may not.

use std::{collections::BTreeMap, ops::RangeInclusive, sync::OnceLock};

use regex::Regex;

use crate::schema::{Column, ColumnType};

/// Age range accepted during import.
const AGE_RANGE: RangeInclusive<f64> = 0.0..=150.0;

/// Matches the remote store's email pattern.
pub fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("static pattern")
    })
}

/// Empty values pass; required-ness is a separate check.
pub fn is_valid_email(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || email_pattern().is_match(trimmed)
}

/// Validates one CSV row against its headers. `row_index` is the
/// zero-based data row index; reported numbers are display rows, with the
/// header row counting as row 1.
pub fn validate_csv_row(
    headers: &[String],
    row: &BTreeMap<String, String>,
    row_index: usize,
) -> Vec<String> {
    let display_row = row_index + 2;
    let mut errors = Vec::new();

    for header in headers {
        let value = row.get(header).map(String::as_str).unwrap_or("");
        if value.trim().is_empty() {
            continue;
        }
        let lowered = header.to_lowercase();

        if (lowered.contains("email") || lowered.contains("mail"))
            && !email_pattern().is_match(value.trim())
        {
            errors.push(format!(
                "Row {display_row}: Invalid email format \"{value}\" in column \"{header}\""
            ));
        }

        if lowered.contains("age") {
            let in_range = value
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|age| AGE_RANGE.contains(age))
                .is_some();
            if !in_range {
                errors.push(format!(
                    "Row {display_row}: Invalid age \"{value}\" in column \"{header}\""
                ));
            }
        }
    }

    errors
}

/// Interactive-path validation: email format on email columns, then a
/// single aggregate error naming every missing required field.
pub fn validate_record_input(
    columns: &[Column],
    input: &BTreeMap<String, String>,
) -> Vec<String> {
    let mut errors = Vec::new();

    for column in columns {
        let is_email =
            column.column_type == ColumnType::Email || column.key.to_lowercase().contains("email");
        if !is_email {
            continue;
        }
        if let Some(value) = input.get(&column.key)
            && !value.trim().is_empty()
            && !email_pattern().is_match(value.trim())
        {
            errors.push(format!(
                "Please enter a valid email address for {}",
                column.label
            ));
        }
    }

    let missing: Vec<&str> = columns
        .iter()
        .filter(|column| column.required && column.editable)
        .filter(|column| {
            input
                .get(&column.key)
                .map(|value| value.trim().is_empty())
                .unwrap_or(true)
        })
        .map(|column| column.label.as_str())
        .collect();
    if !missing.is_empty() {
        errors.push(format!(
            "Please fill in all required fields: {}",
            missing.join(", ")
        ));
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn email_pattern_matches_the_remote_rule() {
        assert!(is_valid_email("john@x.com"));
        assert!(is_valid_email("  spaced@x.com  "));
        assert!(is_valid_email(""));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("missing@tld"));
    }

    #[test]
    fn csv_row_errors_use_display_row_numbers() {
        let errors = validate_csv_row(
            &headers(&["Email"]),
            &row(&[("Email", "not-an-email")]),
            1,
        );
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0],
            "Row 3: Invalid email format \"not-an-email\" in column \"Email\""
        );
    }

    #[test]
    fn age_values_outside_the_range_are_rejected() {
        let bad = validate_csv_row(&headers(&["age"]), &row(&[("age", "151")]), 0);
        assert_eq!(bad.len(), 1);
        assert!(bad[0].starts_with("Row 2: Invalid age"));

        assert!(validate_csv_row(&headers(&["age"]), &row(&[("age", "150")]), 0).is_empty());
        assert!(validate_csv_row(&headers(&["age"]), &row(&[("age", "")]), 0).is_empty());
        assert_eq!(
            validate_csv_row(&headers(&["age"]), &row(&[("age", "old")]), 0).len(),
            1
        );
    }

    #[test]
    fn blank_cells_skip_format_checks() {
        let errors = validate_csv_row(
            &headers(&["Email", "age"]),
            &row(&[("Email", ""), ("age", "  ")]),
            0,
        );
        assert!(errors.is_empty());
    }

    #[test]
    fn record_input_aggregates_missing_required_fields() {
        let columns = vec![
            Column::identity(),
            Column {
                key: "name".to_string(),
                label: "Name".to_string(),
                column_type: ColumnType::Text,
                required: true,
                editable: true,
            },
            Column {
                key: "email".to_string(),
                label: "Email".to_string(),
                column_type: ColumnType::Email,
                required: true,
                editable: true,
            },
        ];

        let errors = validate_record_input(&columns, &row(&[("email", "bad")]));
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0], "Please enter a valid email address for Email");
        assert_eq!(errors[1], "Please fill in all required fields: Name");

        let clean = validate_record_input(
            &columns,
            &row(&[("name", "Jane"), ("email", "jane@x.com")]),
        );
        assert!(clean.is_empty());
    }

    #[test]
    fn identity_column_never_counts_as_missing() {
        let columns = vec![Column::identity()];
        assert!(validate_record_input(&columns, &BTreeMap::new()).is_empty());
    }
}
