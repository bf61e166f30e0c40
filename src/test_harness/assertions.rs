//! Row comparison between the expected data set and the store
//!
//! Rows are paired by identifier (the first field), not by position:
//! - `SELECT COUNT(*)` must match the number of expected rows
//! - every expected row needs its own actual row with the same identifier
//! - paired rows must agree field by field, with NULL only matching an
//!   empty expected field
//!
//! All mismatches are collected; the resulting error cites the first one and
//! the total.

use super::error::{TestHarnessError, TestHarnessResult};
use super::file_io::{ExpectedField, ExpectedRow};
use super::store::{quote_identifier, FieldValue, StoreConnection, StoreRow};
use std::collections::HashMap;
use std::fmt;

/// A single difference between expected and actual table contents
#[derive(Debug, Clone, PartialEq)]
pub enum RowMismatch {
    /// Row count differs
    Count { expected: usize, actual: usize },

    /// No unconsumed actual row carries this identifier (`None` = NULL)
    MissingRow { identifier: Option<String> },

    /// Paired rows have a different number of fields
    FieldCount {
        identifier: Option<String>,
        index: usize,
        expected: usize,
        actual: usize,
    },

    /// Paired rows differ in one field
    Field {
        identifier: Option<String>,
        index: usize,
        expected: ExpectedField,
        actual: FieldValue,
    },
}

impl RowMismatch {
    fn identifier(&self) -> Option<String> {
        match self {
            RowMismatch::Count { .. } => None,
            RowMismatch::MissingRow { identifier }
            | RowMismatch::FieldCount { identifier, .. }
            | RowMismatch::Field { identifier, .. } => {
                Some(identifier.clone().unwrap_or_else(|| "NULL".to_string()))
            }
        }
    }

    fn field(&self) -> Option<usize> {
        match self {
            RowMismatch::FieldCount { index, .. } | RowMismatch::Field { index, .. } => Some(*index),
            _ => None,
        }
    }

    fn expected_text(&self) -> String {
        match self {
            RowMismatch::Count { expected, .. } => format!("{} rows", expected),
            RowMismatch::MissingRow { identifier } => {
                format!("row '{}'", display_identifier(identifier))
            }
            RowMismatch::FieldCount { expected, .. } => format!("{} fields", expected),
            RowMismatch::Field { expected, .. } => display_expected(expected),
        }
    }

    fn actual_text(&self) -> String {
        match self {
            RowMismatch::Count { actual, .. } => format!("{} rows", actual),
            RowMismatch::MissingRow { .. } => "(missing)".to_string(),
            RowMismatch::FieldCount { actual, .. } => format!("{} fields", actual),
            RowMismatch::Field { actual, .. } => actual.to_string(),
        }
    }
}

/// Mismatches spelled out in a validation error message
const LISTED_MISMATCHES: usize = 5;

/// Fold every mismatch into one `ValidationMismatch`
///
/// The message lists the first few mismatches. The detail fields come from
/// the first row-level mismatch, so a count difference never hides the
/// identifier behind it. Returns `None` when there is nothing to report.
pub fn mismatch_error(mismatches: &[RowMismatch]) -> Option<TestHarnessError> {
    let primary = mismatches
        .iter()
        .find(|m| !matches!(m, RowMismatch::Count { .. }))
        .or_else(|| mismatches.first())?;

    let mut message = mismatches
        .iter()
        .take(LISTED_MISMATCHES)
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    if mismatches.len() > LISTED_MISMATCHES {
        message.push_str(&format!(
            "; and {} more",
            mismatches.len() - LISTED_MISMATCHES
        ));
    }

    Some(TestHarnessError::ValidationMismatch {
        message,
        identifier: primary.identifier(),
        field: primary.field(),
        expected: primary.expected_text(),
        actual: primary.actual_text(),
        mismatches: mismatches.len(),
    })
}

impl fmt::Display for RowMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowMismatch::Count { expected, actual } => write!(
                f,
                "row count mismatch: expected {} rows, table has {}",
                expected, actual
            ),
            RowMismatch::MissingRow { identifier } => write!(
                f,
                "no row with identifier '{}'",
                display_identifier(identifier)
            ),
            RowMismatch::FieldCount {
                identifier,
                index,
                expected,
                actual,
            } => write!(
                f,
                "row '{}' has {} fields, expected {} (first missing field {})",
                display_identifier(identifier),
                actual,
                expected,
                index
            ),
            RowMismatch::Field {
                identifier,
                index,
                expected,
                actual,
            } => write!(
                f,
                "row '{}' field {}: actual {} != expected {}",
                display_identifier(identifier),
                index,
                actual,
                display_expected(expected)
            ),
        }
    }
}

/// Compare expected rows against actual rows
///
/// Pure pairing and field comparison; the row count check lives in
/// [`verify_table`] because it uses its own query.
pub fn compare_rows(expected: &[ExpectedRow], actual: &[StoreRow]) -> Vec<RowMismatch> {
    let mut groups: HashMap<Option<String>, Vec<usize>> = HashMap::new();
    for (idx, row) in actual.iter().enumerate() {
        let key = row
            .first()
            .and_then(FieldValue::to_text)
            .map(|text| text.trim().to_string());
        groups.entry(key).or_default().push(idx);
    }

    let mut mismatches = Vec::new();

    for expected_row in expected {
        let identifier = expected_row
            .first()
            .cloned()
            .flatten()
            .map(|text| text.trim().to_string());

        let candidates = match groups.get_mut(&identifier) {
            Some(candidates) if !candidates.is_empty() => candidates,
            _ => {
                mismatches.push(RowMismatch::MissingRow { identifier });
                continue;
            }
        };

        // Prefer an exact match among duplicates, else report against the first
        let exact = candidates
            .iter()
            .position(|&idx| compare_fields(&identifier, expected_row, &actual[idx]).is_none());

        match exact {
            Some(pos) => {
                candidates.remove(pos);
            }
            None => {
                let idx = candidates.remove(0);
                if let Some(mismatch) = compare_fields(&identifier, expected_row, &actual[idx]) {
                    mismatches.push(mismatch);
                }
            }
        }
    }

    mismatches
}

/// Null-aware field comparison of one paired row
fn compare_fields(
    identifier: &Option<String>,
    expected: &ExpectedRow,
    actual: &StoreRow,
) -> Option<RowMismatch> {
    for index in 0..expected.len().max(actual.len()) {
        let (expected_field, actual_field) = match (expected.get(index), actual.get(index)) {
            (Some(e), Some(a)) => (e, a),
            _ => {
                return Some(RowMismatch::FieldCount {
                    identifier: identifier.clone(),
                    index,
                    expected: expected.len(),
                    actual: actual.len(),
                });
            }
        };

        let equal = match (expected_field, actual_field.to_text()) {
            (None, None) => true,
            (Some(e), Some(a)) => e.trim() == a.trim(),
            _ => false,
        };

        if !equal {
            return Some(RowMismatch::Field {
                identifier: identifier.clone(),
                index,
                expected: expected_field.clone(),
                actual: actual_field.clone(),
            });
        }
    }
    None
}

/// Verify a table's contents against the expected rows
pub async fn verify_table(
    store: &mut dyn StoreConnection,
    table: &str,
    expected: &[ExpectedRow],
) -> TestHarnessResult<()> {
    let table_name = quote_identifier(table);
    let mut mismatches = Vec::new();

    let count_sql = format!("SELECT COUNT(*) FROM {}", table_name);
    let count_rows = store.query(&count_sql).await?;
    let actual_count = count_rows
        .first()
        .and_then(|row| row.first())
        .and_then(FieldValue::to_text)
        .and_then(|text| text.trim().parse::<usize>().ok())
        .ok_or_else(|| TestHarnessError::StoreError {
            statement: count_sql.clone(),
            message: "query did not return a row count".to_string(),
        })?;

    if actual_count != expected.len() {
        mismatches.push(RowMismatch::Count {
            expected: expected.len(),
            actual: actual_count,
        });
    }

    let rows = store.query(&format!("SELECT * FROM {}", table_name)).await?;
    mismatches.extend(compare_rows(expected, &rows));

    match mismatch_error(&mismatches) {
        None => {
            log::debug!("Table '{}' matches {} expected rows", table, expected.len());
            Ok(())
        }
        Some(err) => {
            log::debug!("Table '{}' has {} mismatches", table, mismatches.len());
            Err(err)
        }
    }
}

fn display_identifier(identifier: &Option<String>) -> &str {
    identifier.as_deref().unwrap_or("NULL")
}

fn display_expected(field: &ExpectedField) -> String {
    match field {
        Some(text) => format!("'{}'", text),
        None => "NULL".to_string(),
    }
}
