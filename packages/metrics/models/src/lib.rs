#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Metric group, objective, and metric types.
//!
//! A [`MetricGroup`] names one overlap computation and breaks it into
//! [`DataClass`]es. Each class resolves to exactly one datasource, either
//! the group's shared datasource (split by `classKey`) or its own.

pub mod legacy;
pub mod objective;

use mpa_datasource_models::validation::{
    ConfigurationError, ValidationIssue, check_unique_ids, parse_array, parse_records,
    record_location,
};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use legacy::{LegacyDataClass, LegacyMetricGroup};
pub use objective::{LegacyObjective, Objective, ObjectiveAnswer, Objectives};

/// Errors from metric group and objective lookups.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// No metric group or objective with the requested id exists.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// What was looked up, e.g. `"MetricGroup"`.
        kind: &'static str,
        /// The requested id.
        id: String,
    },

    /// A class does not resolve to exactly one datasource.
    #[error("Cannot resolve datasource for class {class_id} in metric group {metric_id}: {message}")]
    Resolution {
        /// The metric group id.
        metric_id: String,
        /// The class id.
        class_id: String,
        /// Why resolution failed.
        message: String,
    },
}

/// Kind of overlap a metric group computes. Informational only.
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
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum MetricType {
    /// Area of overlap.
    AreaOverlap,
    /// Count of overlapping features.
    CountOverlap,
    /// Sum of overlapping raster values.
    ValueOverlap,
}

/// One category within a metric group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DataClass {
    /// Unique identifier for the class within its group.
    pub class_id: String,
    /// Name suitable for display.
    pub display: String,
    /// Datasource for this class alone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datasource_id: Option<String>,
    /// Number used by categorical rasters to represent this class.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numeric_class_id: Option<i64>,
    /// Property splitting this class's datasource, when the group has none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_key: Option<String>,
    /// Map layer associated with this class.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer_id: Option<String>,
    /// Class-level objective, overriding the group's.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective_id: Option<String>,
}

impl DataClass {
    /// The class value used to look up precalculated stats: the numeric id
    /// when present, otherwise the class id.
    #[must_use]
    pub fn stats_class_value(&self) -> String {
        self.numeric_class_id
            .map_or_else(|| self.class_id.clone(), |n| n.to_string())
    }
}

/// A named overlap computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MetricGroup {
    /// Unique id of the metric in the project.
    pub metric_id: String,
    /// Overlap kind.
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    /// Datasource shared by every class.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datasource_id: Option<String>,
    /// Property splitting the shared datasource into classes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_key: Option<String>,
    /// Classes, in display order.
    pub classes: Vec<DataClass>,
    /// Map layer associated with the whole group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer_id: Option<String>,
    /// Group-level objective, applying to every class.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective_id: Option<String>,
}

impl MetricGroup {
    /// Resolves the single datasource backing `class`.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Resolution`] if neither the group nor the
    /// class names a datasource, or if both name different ones.
    pub fn class_datasource_id<'a>(&'a self, class: &'a DataClass) -> Result<&'a str, MetricsError> {
        match (self.datasource_id.as_deref(), class.datasource_id.as_deref()) {
            (Some(group), None) => Ok(group),
            (None, Some(own)) => Ok(own),
            (Some(group), Some(own)) if group == own => Ok(group),
            (Some(group), Some(own)) => Err(self.resolution_error(
                class,
                format!("group datasource {group} conflicts with class datasource {own}"),
            )),
            (None, None) => Err(self.resolution_error(class, "no datasourceId on group or class".to_string())),
        }
    }

    /// The class key used to split `class`'s datasource: `explicit` if
    /// given, else the group's, else the class's own.
    #[must_use]
    pub fn class_key_for<'a>(&'a self, class: &'a DataClass, explicit: Option<&'a str>) -> Option<&'a str> {
        explicit
            .or(self.class_key.as_deref())
            .or(class.class_key.as_deref())
    }

    fn resolution_error(&self, class: &DataClass, message: String) -> MetricsError {
        MetricsError::Resolution {
            metric_id: self.metric_id.clone(),
            class_id: class.class_id.clone(),
            message,
        }
    }
}

/// Validated catalog of metric groups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricGroups(Vec<MetricGroup>);

impl MetricGroups {
    /// Parses and validates a metric groups file.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] listing every malformed record and
    /// every duplicate or empty `metricId` or `classId`.
    pub fn parse(origin: &str, contents: &str) -> Result<Self, ConfigurationError> {
        let mut issues = Vec::new();
        let groups = Self::parse_collecting(origin, contents, &mut issues);
        ConfigurationError::check(origin, issues)?;
        Ok(groups)
    }

    /// Like [`parse`](Self::parse) but appends issues to `issues` so several
    /// files can be reported together.
    pub fn parse_collecting(origin: &str, contents: &str, issues: &mut Vec<ValidationIssue>) -> Self {
        let items = parse_array(origin, contents, issues);
        let records: Vec<(usize, MetricGroup)> = parse_records(origin, items, issues);
        check_unique_ids(
            origin,
            "metricId",
            records.iter().map(|(idx, mg)| (*idx, mg.metric_id.as_str())),
            issues,
        );
        for (idx, mg) in &records {
            let location = format!("{}.classes", record_location(origin, *idx));
            check_unique_ids(
                &location,
                "classId",
                mg.classes.iter().map(|c| c.class_id.as_str()).enumerate(),
                issues,
            );
        }
        Self(records.into_iter().map(|(_, mg)| mg).collect())
    }

    /// Wraps already-validated groups.
    #[must_use]
    pub const fn from_vec(groups: Vec<MetricGroup>) -> Self {
        Self(groups)
    }

    /// Returns the metric group with `metric_id`.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::NotFound`] if absent.
    pub fn get(&self, metric_id: &str) -> Result<&MetricGroup, MetricsError> {
        self.0
            .iter()
            .find(|mg| mg.metric_id == metric_id)
            .ok_or_else(|| MetricsError::NotFound {
                kind: "MetricGroup",
                id: metric_id.to_string(),
            })
    }

    /// Iterates groups in file order.
    pub fn iter(&self) -> std::slice::Iter<'_, MetricGroup> {
        self.0.iter()
    }

    /// Number of groups.
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

/// One computed or precalculated metric value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metric {
    /// Metric group id.
    pub metric_id: String,
    /// The value.
    pub value: f64,
    /// Class the value belongs to.
    pub class_id: Option<String>,
    /// Sketch the value was computed for.
    pub sketch_id: Option<String>,
    /// Sketch collection group.
    pub group_id: Option<String>,
    /// Planning geography.
    pub geography_id: Option<String>,
}

impl Metric {
    /// A metric carrying only an id and a value.
    #[must_use]
    pub fn new(metric_id: impl Into<String>, value: f64) -> Self {
        Self {
            metric_id: metric_id.into(),
            value,
            class_id: None,
            sketch_id: None,
            group_id: None,
            geography_id: None,
        }
    }

    /// Sets the class id.
    #[must_use]
    pub fn with_class_id(mut self, class_id: impl Into<String>) -> Self {
        self.class_id = Some(class_id.into());
        self
    }

    /// Sets the sketch id.
    #[must_use]
    pub fn with_sketch_id(mut self, sketch_id: impl Into<String>) -> Self {
        self.sketch_id = Some(sketch_id.into());
        self
    }
}
