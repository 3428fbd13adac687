#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Datasource record types shared by the registry, the precalculation engine,
//! and the overlap functions.
//!
//! A [`Datasource`] is either [`Internal`](Datasource::Internal) (imported
//! from a local source file and published by this project) or
//! [`External`](Datasource::External) (already published elsewhere and
//! referenced by URL). The variant is decided once when a record is
//! deserialized and is written back as an explicit `kind` field.

pub mod raster;
pub mod stats;
pub mod validation;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use stats::{ClassStats, KeyStats, StatName, Stats, TOTAL_KEY};

/// Basic geospatial type of a datasource.
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
pub enum GeoType {
    /// Features with geometry and properties.
    Vector,
    /// Gridded cell values.
    Raster,
}

/// Published representation of a datasource.
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
pub enum SupportedFormat {
    /// `FlatGeobuf`
    Fgb,
    /// `GeoJSON`
    Geojson,
    /// Cloud-optimized `GeoTIFF`
    Cog,
    /// Pre-subdivided vector tiles (external global layers only)
    Subdivided,
}

impl SupportedFormat {
    /// Formats accepted when importing a vector datasource.
    pub const VECTOR_IMPORT: &[Self] = &[Self::Fgb, Self::Geojson];

    /// Default published vector formats.
    pub const DEFAULT_VECTOR: &[Self] = &[Self::Fgb];

    /// Default published raster formats.
    pub const DEFAULT_RASTER: &[Self] = &[Self::Cog];
}

/// How raster cell values are interpreted.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
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
pub enum MeasurementType {
    /// Cell values are amounts to be summed.
    #[default]
    Quantitative,
    /// Cell values are class codes to be counted.
    Categorical,
}

/// Discriminant written on every persisted record.
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
pub enum DatasourceKind {
    /// Imported and published by this project.
    Internal,
    /// Published elsewhere, referenced by URL.
    External,
}

/// A datasource imported from a local file and published by this project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InternalDatasource {
    /// Unique id of the datasource in the project.
    pub datasource_id: String,
    /// Basic geospatial type.
    #[serde(rename = "geo_type")]
    pub geo_type: GeoType,
    /// Property names (vector) or class encodings (raster) to generate classes for.
    #[serde(default)]
    pub class_keys: Vec<String>,
    /// Published formats.
    #[serde(default)]
    pub formats: Vec<SupportedFormat>,
    /// Precalculated stats by class key by class value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_stats: Option<KeyStats>,
    /// Raster nodata value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_data_value: Option<f64>,
    /// Layer within the source file to extract.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer_name: Option<String>,
    /// Raster band to extract.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub band: Option<u32>,
    /// Raster value interpretation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurement_type: Option<MeasurementType>,
    /// Internal vector datasource masking a quantitative raster sum.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_datasource: Option<String>,
    /// Path to the source data, with filename.
    pub src: String,
    /// Properties kept in the published dataset; all others are removed.
    #[serde(default)]
    pub properties_to_keep: Vec<String>,
    /// Whether multi-geometries are exploded into single geometries.
    /// Absent means explode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explode_multi: Option<bool>,
    /// When the record was first imported.
    pub created: DateTime<Utc>,
    /// When the record was last regenerated.
    pub last_updated: DateTime<Utc>,
}

/// A globally shared datasource published outside this project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExternalDatasource {
    /// Unique id of the datasource in the project.
    pub datasource_id: String,
    /// Basic geospatial type.
    #[serde(rename = "geo_type")]
    pub geo_type: GeoType,
    /// Property names to generate classes for.
    #[serde(default)]
    pub class_keys: Vec<String>,
    /// Published formats.
    #[serde(default)]
    pub formats: Vec<SupportedFormat>,
    /// Precalculated stats by class key by class value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_stats: Option<KeyStats>,
    /// Raster nodata value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_data_value: Option<f64>,
    /// Layer name within the published dataset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer_name: Option<String>,
    /// Base URL of the published dataset.
    pub url: String,
}

/// One named geospatial dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Datasource {
    /// Imported and published by this project.
    Internal(InternalDatasource),
    /// Published elsewhere.
    External(ExternalDatasource),
}

impl Datasource {
    /// Unique id of the datasource.
    #[must_use]
    pub fn datasource_id(&self) -> &str {
        match self {
            Self::Internal(ds) => &ds.datasource_id,
            Self::External(ds) => &ds.datasource_id,
        }
    }

    /// The variant discriminant.
    #[must_use]
    pub const fn kind(&self) -> DatasourceKind {
        match self {
            Self::Internal(_) => DatasourceKind::Internal,
            Self::External(_) => DatasourceKind::External,
        }
    }

    /// Basic geospatial type.
    #[must_use]
    pub const fn geo_type(&self) -> GeoType {
        match self {
            Self::Internal(ds) => ds.geo_type,
            Self::External(ds) => ds.geo_type,
        }
    }

    /// Declared class keys.
    #[must_use]
    pub fn class_keys(&self) -> &[String] {
        match self {
            Self::Internal(ds) => &ds.class_keys,
            Self::External(ds) => &ds.class_keys,
        }
    }

    /// Published formats.
    #[must_use]
    pub fn formats(&self) -> &[SupportedFormat] {
        match self {
            Self::Internal(ds) => &ds.formats,
            Self::External(ds) => &ds.formats,
        }
    }

    /// Precalculated stats, if any.
    #[must_use]
    pub const fn key_stats(&self) -> Option<&KeyStats> {
        match self {
            Self::Internal(ds) => ds.key_stats.as_ref(),
            Self::External(ds) => ds.key_stats.as_ref(),
        }
    }

    /// Configured nodata value, if any.
    #[must_use]
    pub const fn no_data_value(&self) -> Option<f64> {
        match self {
            Self::Internal(ds) => ds.no_data_value,
            Self::External(ds) => ds.no_data_value,
        }
    }

    /// Whether this record was imported by this project.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }

    /// Whether this record references an externally published dataset.
    #[must_use]
    pub const fn is_external(&self) -> bool {
        matches!(self, Self::External(_))
    }

    /// Whether this record is an internal vector datasource.
    #[must_use]
    pub fn is_internal_vector(&self) -> bool {
        self.as_internal_vector().is_some()
    }

    /// Whether this record is an internal raster datasource.
    #[must_use]
    pub fn is_internal_raster(&self) -> bool {
        self.as_internal_raster().is_some()
    }

    /// Narrows to an internal record.
    #[must_use]
    pub const fn as_internal(&self) -> Option<&InternalDatasource> {
        match self {
            Self::Internal(ds) => Some(ds),
            Self::External(_) => None,
        }
    }

    /// Narrows to an external record.
    #[must_use]
    pub const fn as_external(&self) -> Option<&ExternalDatasource> {
        match self {
            Self::External(ds) => Some(ds),
            Self::Internal(_) => None,
        }
    }

    /// Narrows to an internal vector record.
    #[must_use]
    pub fn as_internal_vector(&self) -> Option<&InternalDatasource> {
        self.as_internal()
            .filter(|ds| ds.geo_type == GeoType::Vector)
    }

    /// Narrows to an internal raster record.
    #[must_use]
    pub fn as_internal_raster(&self) -> Option<&InternalDatasource> {
        self.as_internal()
            .filter(|ds| ds.geo_type == GeoType::Raster)
    }
}

impl InternalDatasource {
    /// Raster band to extract, defaulting to the first.
    #[must_use]
    pub fn band_or_default(&self) -> u32 {
        self.band.unwrap_or(1)
    }

    /// Raster measurement type, defaulting to quantitative.
    #[must_use]
    pub fn measurement_type_or_default(&self) -> MeasurementType {
        self.measurement_type.unwrap_or_default()
    }

    /// Whether multi-geometries are exploded on import.
    #[must_use]
    pub fn explode_multi_or_default(&self) -> bool {
        self.explode_multi.unwrap_or(true)
    }
}

/// File name of the `GeoJSON` artifact for a datasource.
#[must_use]
pub fn geojson_filename(datasource_id: &str) -> String {
    format!("{datasource_id}.json")
}

/// File name of the `FlatGeobuf` artifact for a datasource.
#[must_use]
pub fn flatgeobuf_filename(datasource_id: &str) -> String {
    format!("{datasource_id}.fgb")
}

/// File name of the cloud-optimized `GeoTIFF` artifact for a datasource.
#[must_use]
pub fn cog_filename(datasource_id: &str) -> String {
    format!("{datasource_id}.tif")
}

/// File name of the local ESRI ASCII grid used to read raster cells.
#[must_use]
pub fn ascii_grid_filename(datasource_id: &str) -> String {
    format!("{datasource_id}.asc")
}

/// Published file name for one format of a datasource.
#[must_use]
pub fn format_filename(datasource_id: &str, format: SupportedFormat) -> Option<String> {
    match format {
        SupportedFormat::Fgb => Some(flatgeobuf_filename(datasource_id)),
        SupportedFormat::Geojson => Some(geojson_filename(datasource_id)),
        SupportedFormat::Cog => Some(cog_filename(datasource_id)),
        SupportedFormat::Subdivided => None,
    }
}

/// Name of the bucket holding a project's published datasets.
#[must_use]
pub fn bucket_name(package_name: &str) -> String {
    format!("gp-{package_name}-datasets")
}

/// Public base URL of a project's published datasets bucket.
#[must_use]
pub fn bucket_url(package_name: &str, region: &str) -> String {
    format!("https://{}.s3.{region}.amazonaws.com/", bucket_name(package_name))
}

/// Base URL of the local data server used in tests.
#[must_use]
pub fn local_url(port: u16) -> String {
    format!("http://127.0.0.1:{port}/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn internal_vector() -> Datasource {
        serde_json::from_value(json!({
            "kind": "internal",
            "datasourceId": "eez",
            "geo_type": "vector",
            "classKeys": ["region"],
            "formats": ["fgb", "geojson"],
            "src": "data/src/eez.shp",
            "propertiesToKeep": ["region"],
            "created": "2024-01-01T00:00:00Z",
            "lastUpdated": "2024-02-01T00:00:00Z",
        }))
        .unwrap()
    }

    #[test]
    fn predicates_follow_variant_and_geo_type() {
        let ds = internal_vector();
        assert!(ds.is_internal());
        assert!(!ds.is_external());
        assert!(ds.is_internal_vector());
        assert!(!ds.is_internal_raster());
        assert_eq!(ds.kind(), DatasourceKind::Internal);
        assert_eq!(ds.datasource_id(), "eez");
    }

    #[test]
    fn external_record_round_trips_with_kind() {
        let ds: Datasource = serde_json::from_value(json!({
            "kind": "external",
            "datasourceId": "global-clipping-osm-land",
            "geo_type": "vector",
            "url": "https://example.invalid/",
            "formats": ["subdivided"],
            "classKeys": [],
        }))
        .unwrap();
        assert!(ds.is_external());
        assert!(!ds.is_internal_vector());

        let value = serde_json::to_value(&ds).unwrap();
        assert_eq!(value["kind"], "external");
        assert_eq!(value["geo_type"], "vector");
        assert!(value.get("keyStats").is_none());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: Result<Datasource, _> = serde_json::from_value(json!({
            "kind": "external",
            "datasourceId": "x",
            "geo_type": "vector",
            "url": "https://example.invalid/",
            "src": "also-internal.shp",
        }));
        assert!(result.is_err());
    }

    #[test]
    fn import_defaults() {
        let Datasource::Internal(ds) = internal_vector() else {
            panic!("expected internal");
        };
        assert_eq!(ds.band_or_default(), 1);
        assert_eq!(ds.measurement_type_or_default(), MeasurementType::Quantitative);
        assert!(ds.explode_multi_or_default());
    }

    #[test]
    fn derived_names() {
        assert_eq!(geojson_filename("eez"), "eez.json");
        assert_eq!(format_filename("eez", SupportedFormat::Fgb).unwrap(), "eez.fgb");
        assert_eq!(format_filename("eez", SupportedFormat::Subdivided), None);
        assert_eq!(
            bucket_url("my-reports", "us-west-1"),
            "https://gp-my-reports-datasets.s3.us-west-1.amazonaws.com/"
        );
        assert_eq!(local_url(8080), "http://127.0.0.1:8080/");
    }
}
