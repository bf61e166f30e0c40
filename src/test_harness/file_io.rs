//! Expected data file loading
//!
//! The `expected` file holds one row per line, fields separated by the
//! case's expected delimiter. Fields may be double-quoted to embed the
//! delimiter; `""` inside quotes is a literal quote. An empty, unquoted
//! field denotes NULL. Blank lines are skipped and trailing `\r` stripped.

use super::error::{TestHarnessError, TestHarnessResult};
use std::path::Path;

/// One expected field; `None` means the store value must be NULL
pub type ExpectedField = Option<String>;

/// One expected row, identifier first
pub type ExpectedRow = Vec<ExpectedField>;

/// Load expected rows from a file
pub fn load_expected_rows(path: &Path, delimiter: char) -> TestHarnessResult<Vec<ExpectedRow>> {
    let content = std::fs::read_to_string(path).map_err(|e| TestHarnessError::IoError {
        message: e.to_string(),
        path: path.display().to_string(),
    })?;

    Ok(parse_expected_rows(&content, delimiter))
}

/// Parse expected rows from text
pub fn parse_expected_rows(content: &str, delimiter: char) -> Vec<ExpectedRow> {
    content
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .map(|line| split_delimited_line(line, delimiter))
        .collect()
}

/// Split a delimited line, honoring double-quoted fields
///
/// Quotes are removed. A quoted empty field (`""`) is an empty string,
/// not NULL.
pub fn split_delimited_line(line: &str, delimiter: char) -> ExpectedRow {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    // Escaped quote ("")
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(c);
            }
        } else if c == '"' {
            in_quotes = true;
            quoted = true;
        } else if c == delimiter {
            fields.push(finish_field(&mut current, quoted));
            quoted = false;
        } else {
            current.push(c);
        }
    }
    fields.push(finish_field(&mut current, quoted));
    fields
}

fn finish_field(current: &mut String, quoted: bool) -> ExpectedField {
    let value = std::mem::take(current);
    if !quoted && value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
