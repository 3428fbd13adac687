//! Precalculated baseline statistics stored on a datasource record.
//!
//! Stats are keyed first by class key (a feature property name, or the raster
//! class key) and then by class value. The reserved `total.total` bucket
//! always holds the whole-dataset baseline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Reserved key and value name for the whole-dataset bucket.
pub const TOTAL_KEY: &str = "total";

/// Name of a single statistic within [`Stats`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StatName {
    /// Number of features, or number of raster cells for categorical rasters.
    Count,
    /// Area in square meters.
    Area,
    /// Sum of raster cell values.
    Sum,
}

/// Aggregate statistics for one class (or the whole dataset).
///
/// All three fields are always serialized so every bucket has the same
/// shape; fields that do not apply are `null`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Stats {
    /// Feature or cell count.
    #[serde(default)]
    pub count: Option<u64>,
    /// Area in square meters.
    #[serde(default)]
    pub area: Option<f64>,
    /// Sum of cell values.
    #[serde(default)]
    pub sum: Option<f64>,
}

impl Stats {
    /// Stats for a vector group of `count` features covering `area` m².
    #[must_use]
    pub const fn vector(count: u64, area: f64) -> Self {
        Self {
            count: Some(count),
            area: Some(area),
            sum: None,
        }
    }

    /// Returns the named statistic as a float, if present.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn get(&self, stat: StatName) -> Option<f64> {
        match stat {
            StatName::Count => self.count.map(|c| c as f64),
            StatName::Area => self.area,
            StatName::Sum => self.sum,
        }
    }
}

/// Stats by class value.
pub type ClassStats = BTreeMap<String, Stats>;

/// Stats by class key, then class value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyStats(BTreeMap<String, ClassStats>);

impl KeyStats {
    /// Creates an empty set of key stats.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Creates key stats holding only the `total.total` bucket.
    #[must_use]
    pub fn with_total(total: Stats) -> Self {
        let mut stats = Self::new();
        stats.set_total(total);
        stats
    }

    /// Replaces the class stats for `class_key`.
    pub fn insert(&mut self, class_key: impl Into<String>, classes: ClassStats) {
        self.0.insert(class_key.into(), classes);
    }

    /// Sets the reserved `total.total` bucket.
    pub fn set_total(&mut self, total: Stats) {
        self.0.insert(
            TOTAL_KEY.to_string(),
            BTreeMap::from([(TOTAL_KEY.to_string(), total)]),
        );
    }

    /// Returns the whole-dataset bucket, if present.
    #[must_use]
    pub fn total(&self) -> Option<&Stats> {
        self.get(TOTAL_KEY, TOTAL_KEY)
    }

    /// Returns the class stats for `class_key`.
    #[must_use]
    pub fn classes(&self, class_key: &str) -> Option<&ClassStats> {
        self.0.get(class_key)
    }

    /// Returns the stats bucket for one class value under one class key.
    #[must_use]
    pub fn get(&self, class_key: &str, class_value: &str) -> Option<&Stats> {
        self.0.get(class_key)?.get(class_value)
    }

    /// Iterates class keys in sorted order, including `total`.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of class keys, including `total`.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no buckets are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
