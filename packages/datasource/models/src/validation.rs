//! Strict validation of hand-edited JSON configuration files.
//!
//! Every file is validated record by record so that a single load reports
//! every problem at once instead of stopping at the first.

use std::collections::BTreeSet;
use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::Value;

/// One problem found while validating a configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Where the problem is, e.g. `datasources.json[3]`.
    pub location: String,
    /// What is wrong.
    pub message: String,
}

impl ValidationIssue {
    /// Creates an issue at `location`.
    #[must_use]
    pub fn new(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

/// A configuration file (or set of files) failed validation.
#[derive(Debug)]
pub struct ConfigurationError {
    /// The file or files that were validated.
    pub origin: String,
    /// Every violation found.
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid configuration in {} ({} issue{})",
            self.origin,
            self.issues.len(),
            if self.issues.len() == 1 { "" } else { "s" }
        )?;
        for issue in &self.issues {
            write!(f, "\n  {issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ConfigurationError {}

impl ConfigurationError {
    /// Returns `Err` carrying `issues` when any were found.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if `issues` is non-empty.
    pub fn check(origin: impl Into<String>, issues: Vec<ValidationIssue>) -> Result<(), Self> {
        if issues.is_empty() {
            Ok(())
        } else {
            Err(Self {
                origin: origin.into(),
                issues,
            })
        }
    }
}

/// Parses `contents` as a JSON array, returning its elements.
///
/// Malformed JSON or a non-array document is recorded as an issue and yields
/// no elements.
pub fn parse_array(
    origin: &str,
    contents: &str,
    issues: &mut Vec<ValidationIssue>,
) -> Vec<Value> {
    match serde_json::from_str::<Value>(contents) {
        Ok(Value::Array(items)) => items,
        Ok(other) => {
            issues.push(ValidationIssue::new(
                origin,
                format!("expected a JSON array, found {}", json_type_name(&other)),
            ));
            Vec::new()
        }
        Err(e) => {
            issues.push(ValidationIssue::new(origin, format!("malformed JSON: {e}")));
            Vec::new()
        }
    }
}

/// Deserializes each element independently, recording an issue for every
/// element that does not match `T`.
///
/// Valid records are returned with their index in the source array.
pub fn parse_records<T: DeserializeOwned>(
    origin: &str,
    items: Vec<Value>,
    issues: &mut Vec<ValidationIssue>,
) -> Vec<(usize, T)> {
    let mut records = Vec::with_capacity(items.len());
    for (idx, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<T>(item) {
            Ok(record) => records.push((idx, record)),
            Err(e) => issues.push(ValidationIssue::new(record_location(origin, idx), e.to_string())),
        }
    }
    records
}

/// Records an issue for every id that is empty or appears more than once.
///
/// `ids` pairs each id with the index of its record in the source array.
pub fn check_unique_ids<'a>(
    origin: &str,
    label: &str,
    ids: impl IntoIterator<Item = (usize, &'a str)>,
    issues: &mut Vec<ValidationIssue>,
) {
    let mut seen = BTreeSet::new();
    for (idx, id) in ids {
        if id.trim().is_empty() {
            issues.push(ValidationIssue::new(
                record_location(origin, idx),
                format!("{label} must not be empty"),
            ));
        } else if !seen.insert(id) {
            issues.push(ValidationIssue::new(
                record_location(origin, idx),
                format!("duplicate {label} '{id}'"),
            ));
        }
    }
}

/// Location string for element `idx` of `origin`.
#[must_use]
pub fn record_location(origin: &str, idx: usize) -> String {
    format!("{origin}[{idx}]")
}

const fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
