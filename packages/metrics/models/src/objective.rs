//! Planning objectives.

use std::collections::BTreeMap;

use mpa_datasource_models::validation::{
    ConfigurationError, ValidationIssue, check_unique_ids, parse_array, parse_records,
    record_location,
};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::MetricsError;

/// Whether an activity counts toward an objective.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ObjectiveAnswer {
    /// Counts.
    Yes,
    /// Does not count.
    No,
    /// Counts conditionally.
    Maybe,
}

/// A numeric planning target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Objective {
    /// Unique id of the objective.
    pub objective_id: String,
    /// Short description for display.
    pub short_desc: String,
    /// Target fraction, non-negative.
    pub target: f64,
    /// Activity name to whether it counts toward this objective.
    #[serde(default)]
    pub counts_toward: BTreeMap<String, ObjectiveAnswer>,
}

/// Objective shape consumed by older report components, keyed by `id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyObjective {
    /// Same as `objectiveId`.
    pub id: String,
    /// The full objective.
    #[serde(flatten)]
    pub objective: Objective,
}

impl From<Objective> for LegacyObjective {
    fn from(objective: Objective) -> Self {
        Self {
            id: objective.objective_id.clone(),
            objective,
        }
    }
}

/// Validated catalog of objectives.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Objectives(Vec<Objective>);

impl Objectives {
    /// Parses and validates an objectives file.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] listing every malformed record,
    /// every negative or non-finite target, and every duplicate or empty
    /// `objectiveId`.
    pub fn parse(origin: &str, contents: &str) -> Result<Self, ConfigurationError> {
        let mut issues = Vec::new();
        let objectives = Self::parse_collecting(origin, contents, &mut issues);
        ConfigurationError::check(origin, issues)?;
        Ok(objectives)
    }

    /// Like [`parse`](Self::parse) but appends issues to `issues`.
    pub fn parse_collecting(origin: &str, contents: &str, issues: &mut Vec<ValidationIssue>) -> Self {
        let items = parse_array(origin, contents, issues);
        let records: Vec<(usize, Objective)> = parse_records(origin, items, issues);
        for (idx, objective) in &records {
            if !objective.target.is_finite() || objective.target < 0.0 {
                issues.push(ValidationIssue::new(
                    record_location(origin, *idx),
                    format!("target must be a non-negative number, got {}", objective.target),
                ));
            }
        }
        check_unique_ids(
            origin,
            "objectiveId",
            records.iter().map(|(idx, o)| (*idx, o.objective_id.as_str())),
            issues,
        );
        Self(records.into_iter().map(|(_, o)| o).collect())
    }

    /// Wraps already-validated objectives.
    #[must_use]
    pub const fn from_vec(objectives: Vec<Objective>) -> Self {
        Self(objectives)
    }

    /// Returns the objective with `objective_id`.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::NotFound`] if absent.
    pub fn get(&self, objective_id: &str) -> Result<&Objective, MetricsError> {
        self.0
            .iter()
            .find(|o| o.objective_id == objective_id)
            .ok_or_else(|| MetricsError::NotFound {
                kind: "Objective",
                id: objective_id.to_string(),
            })
    }

    /// Iterates objectives in file order.
    pub fn iter(&self) -> std::slice::Iter<'_, Objective> {
        self.0.iter()
    }

    /// Number of objectives.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
