//! Argument validation shared by the domain modules

use crate::error::{PolarisError, Result};
use uuid::Uuid;

pub const SORT_FIELDS_REQUIRED: &str =
    "sort_by and sort_order both fields must be initialized or both must be uninitialized.";

pub const DATES_REQUIRED: &str =
    "both start_date and end_date fields must be initialized or both must be uninitialized.";

/// Page sizes must be positive
pub fn check_first(first: i64) -> Result<i64> {
    if first <= 0 {
        return Err(PolarisError::validation(format!(
            "'{}' is an invalid value for 'first'. Value must be an integer greater than 0.",
            first
        )));
    }
    Ok(first)
}

/// A required identifier must be non-empty
pub fn validate_id<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(PolarisError::validation(format!("{} field is required.", field))),
    }
}

pub fn validate_uuid(value: &str, field: &str) -> Result<Uuid> {
    Uuid::parse_str(value.trim())
        .map_err(|_| PolarisError::validation(format!("'{}' is an invalid value for '{}'. Value must be a UUID.", value, field)))
}

/// `sort_by` and `sort_order` come together or not at all
pub fn require_sort_pair(sort_by: Option<&str>, sort_order: Option<&str>) -> Result<()> {
    if is_set(sort_by) != is_set(sort_order) {
        return Err(PolarisError::validation(SORT_FIELDS_REQUIRED));
    }
    Ok(())
}

/// Start and end dates come together or not at all
pub fn require_date_pair(start: Option<&str>, end: Option<&str>) -> Result<()> {
    if is_set(start) != is_set(end) {
        return Err(PolarisError::validation(DATES_REQUIRED));
    }
    Ok(())
}

/// Split a comma separated argument, dropping blanks
pub fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_set(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.is_empty())
}
