//! Vector key stats.
//!
//! Areas are spherical (Chamberlain-Duquette on the WGS84 equatorial radius)
//! in square meters.

use std::collections::BTreeMap;
use std::path::Path;

use geo::ChamberlainDuquetteArea;
use geojson::{Feature, FeatureCollection, GeoJson};
use mpa_datasource_models::{ClassStats, KeyStats, Stats};
use serde_json::Value;

use crate::PrecalcError;

/// Reads a `GeoJSON` feature collection from disk.
///
/// # Errors
///
/// Returns [`PrecalcError::Io`] if the file cannot be read,
/// [`PrecalcError::Geojson`] if it is not valid `GeoJSON`, or
/// [`PrecalcError::NotFeatureCollection`] if it holds something else.
pub fn read_feature_collection(path: &Path) -> Result<FeatureCollection, PrecalcError> {
    let contents = std::fs::read_to_string(path)?;
    match contents.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(collection) => Ok(collection),
        _ => Err(PrecalcError::NotFeatureCollection {
            path: path.display().to_string(),
        }),
    }
}

/// Area of one feature in square meters; zero for null geometry.
///
/// # Errors
///
/// Returns [`PrecalcError::Geojson`] if the geometry cannot be converted.
pub fn feature_area(feature: &Feature) -> Result<f64, PrecalcError> {
    let Some(geometry) = &feature.geometry else {
        return Ok(0.0);
    };
    let geometry: geo::Geometry<f64> = geometry.clone().try_into()?;
    Ok(geometry.chamberlain_duquette_unsigned_area())
}

/// Renders a property value as a class value: strings as-is, everything
/// else as its JSON text. Null and absent properties have no class.
#[must_use]
pub fn class_value(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Computes key stats for a feature collection.
///
/// Without class keys the result is a single `total.total` bucket with
/// `count` 1 and the area of the whole collection. With class keys every
/// key gets per-value `{count, area}` buckets and `total.total` holds the
/// feature count and summed area. Features missing a key's property are
/// left out of that key's breakdown but still counted in the total.
///
/// # Errors
///
/// Returns [`PrecalcError::Geojson`] if any geometry cannot be converted.
pub fn gen_vector_key_stats(
    collection: &FeatureCollection,
    class_keys: &[String],
) -> Result<KeyStats, PrecalcError> {
    let areas = collection
        .features
        .iter()
        .map(feature_area)
        .collect::<Result<Vec<_>, _>>()?;
    let total_area: f64 = areas.iter().sum();

    if class_keys.is_empty() {
        return Ok(KeyStats::with_total(Stats::vector(1, total_area)));
    }

    let mut key_stats = KeyStats::new();
    for key in class_keys {
        let mut counts: BTreeMap<String, (u64, f64)> = BTreeMap::new();
        let mut missing = 0_usize;
        for (feature, area) in collection.features.iter().zip(&areas) {
            let Some(value) = class_value(feature.property(key)) else {
                missing += 1;
                continue;
            };
            let entry = counts.entry(value).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += area;
        }
        if missing > 0 {
            log::warn!("{missing} features have no '{key}' property and are left out of its class stats");
        }
        let classes: ClassStats = counts
            .into_iter()
            .map(|(value, (count, area))| (value, Stats::vector(count, area)))
            .collect();
        key_stats.insert(key.clone(), classes);
    }

    key_stats.set_total(Stats::vector(collection.features.len() as u64, total_area));
    Ok(key_stats)
}
