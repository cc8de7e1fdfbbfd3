//! Quote-aware CSV tokenizer.
//!
//! Deliberately lenient: short data rows pad missing trailing fields, rows
//! whose first field is empty are skipped, and fields are trimmed after
//! unquoting. These leniencies are contract points for the import path,
//! which is why this is a small state machine rather than a strict reader.

use std::collections::BTreeMap;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCsv {
    pub headers: Vec<String>,
    /// One map per data row, keyed by the original header text.
    pub rows: Vec<BTreeMap<String, String>>,
}

impl ParsedCsv {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Splits one line on commas outside double quotes. A doubled quote inside
/// a quoted field collapses to one literal quote. Every field is trimmed
/// of surrounding whitespace after unquoting.
pub fn tokenize_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                if in_quotes && chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = !in_quotes;
                }
            }
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            other => current.push(other),
        }
    }
    fields.push(current.trim().to_string());
    fields
}

/// Parses CSV text into a header row plus per-row header→value maps.
///
/// Blank lines are skipped for both header detection and data. The header
/// field count defines the expected width: shorter data rows pad missing
/// trailing fields with empty strings, extra trailing fields are dropped.
/// A row whose first field is empty after parsing is treated as a stray
/// separator and skipped.
pub fn parse(text: &str) -> Result<ParsedCsv> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    if lines.is_empty() {
        return Err(Error::EmptyInput);
    }

    let headers = tokenize_line(lines[0]);
    let mut rows = Vec::new();
    for line in &lines[1..] {
        let values = tokenize_line(line);
        if values[0].is_empty() {
            continue;
        }
        let mut row = BTreeMap::new();
        for (idx, header) in headers.iter().enumerate() {
            row.insert(header.clone(), values.get(idx).cloned().unwrap_or_default());
        }
        rows.push(row);
    }

    Ok(ParsedCsv { headers, rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_line_splits_on_unquoted_commas_only() {
        assert_eq!(tokenize_line("a,b,c"), vec!["a", "b", "c"]);
        assert_eq!(tokenize_line("\"Doe, John\",john@x.com"), vec![
            "Doe, John",
            "john@x.com"
        ]);
    }

    #[test]
    fn tokenize_line_collapses_doubled_quotes() {
        assert_eq!(tokenize_line("\"say \"\"hi\"\"\",x"), vec!["say \"hi\"", "x"]);
    }

    #[test]
    fn tokenize_line_trims_after_unquoting() {
        assert_eq!(tokenize_line("  a ,\" padded \""), vec!["a", "padded"]);
        assert_eq!(tokenize_line("a,,b"), vec!["a", "", "b"]);
    }

    #[test]
    fn parse_skips_blank_lines_and_pads_short_rows() {
        let parsed = parse("name,email\n\n  \nJane\n").expect("parse");
        assert_eq!(parsed.headers, vec!["name", "email"]);
        assert_eq!(parsed.row_count(), 1);
        assert_eq!(parsed.rows[0]["name"], "Jane");
        assert_eq!(parsed.rows[0]["email"], "");
    }

    #[test]
    fn parse_skips_rows_with_empty_first_field() {
        let parsed = parse("name,email\n,stray@x.com\nJane,jane@x.com\n").expect("parse");
        assert_eq!(parsed.row_count(), 1);
        assert_eq!(parsed.rows[0]["name"], "Jane");
    }

    #[test]
    fn parse_drops_fields_beyond_the_header_width() {
        let parsed = parse("a,b\n1,2,3\n").expect("parse");
        assert_eq!(parsed.rows[0].len(), 2);
        assert_eq!(parsed.rows[0]["b"], "2");
    }

    #[test]
    fn parse_fails_on_effectively_empty_input() {
        assert!(matches!(parse(""), Err(Error::EmptyInput)));
        assert!(matches!(parse(" \n  \n"), Err(Error::EmptyInput)));
    }

    #[test]
    fn parse_accepts_header_only_input() {
        let parsed = parse("name,email\n").expect("parse");
        assert_eq!(parsed.row_count(), 0);
    }
}
