//! Flattened metric group shape still consumed by older report components.
//!
//! The transform takes already-resolved objective targets as plain values so
//! it never needs to reach back into the project catalogs.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{DataClass, MetricGroup, MetricType};

/// A data class with its resolved goal merged in.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyDataClass {
    /// The class as configured.
    #[serde(flatten)]
    pub class: DataClass,
    /// The class's own objective target, else the group's, else absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal_value: Option<f64>,
}

/// A metric group whose classes carry goal values.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyMetricGroup {
    /// Unique id of the metric.
    pub metric_id: String,
    /// Overlap kind.
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    /// Shared datasource.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datasource_id: Option<String>,
    /// Property splitting the shared datasource.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_key: Option<String>,
    /// Map layer for the group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer_id: Option<String>,
    /// Group-level objective.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub objective_id: Option<String>,
    /// Classes with goals.
    pub classes: Vec<LegacyDataClass>,
}

impl LegacyMetricGroup {
    /// Builds the legacy shape from `group`.
    ///
    /// `group_target` is the target of the group's objective, if any.
    /// `class_targets` maps class-level objective ids to their targets.
    #[must_use]
    pub fn from_metric_group(
        group: &MetricGroup,
        group_target: Option<f64>,
        class_targets: &BTreeMap<String, f64>,
    ) -> Self {
        let classes = group
            .classes
            .iter()
            .map(|class| {
                let own = class
                    .objective_id
                    .as_ref()
                    .and_then(|id| class_targets.get(id).copied());
                LegacyDataClass {
                    class: class.clone(),
                    goal_value: own.or(group_target),
                }
            })
            .collect();

        Self {
            metric_id: group.metric_id.clone(),
            metric_type: group.metric_type,
            datasource_id: group.datasource_id.clone(),
            class_key: group.class_key.clone(),
            layer_id: group.layer_id.clone(),
            objective_id: group.objective_id.clone(),
            classes,
        }
    }
}
