//! File intake for CSV uploads: extension and size guards, then decoding.
//!
//! Both guards run before any parsing; a mis-named or oversized file is
//! rejected without touching the tokenizer.

use std::{fs, path::Path};

use anyhow::{anyhow, bail, ensure, Context, Result};
use encoding_rs::{Encoding, UTF_8};

/// Largest CSV file accepted for import.
pub const MAX_IMPORT_FILE_BYTES: u64 = 5 * 1024 * 1024;

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

/// Reads a CSV file for import, rejecting non-`.csv` extensions and files
/// over [`MAX_IMPORT_FILE_BYTES`].
pub fn read_csv_file(path: &Path, encoding_label: Option<&str>) -> Result<String> {
    let is_csv = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    ensure!(is_csv, "Input {path:?} is not a .csv file");

    let metadata = fs::metadata(path).with_context(|| format!("Reading metadata for {path:?}"))?;
    if metadata.len() > MAX_IMPORT_FILE_BYTES {
        bail!(
            "Input {path:?} is {} bytes; the import limit is {MAX_IMPORT_FILE_BYTES}",
            metadata.len()
        );
    }

    let encoding = resolve_encoding(encoding_label)?;
    let bytes = fs::read(path).with_context(|| format!("Reading input file {path:?}"))?;
    decode_bytes(&bytes, encoding)
}
