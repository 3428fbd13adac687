#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Datasource registry.
//!
//! The registry is a single JSON array of [`Datasource`] records. It is read
//! and validated once into a [`Datasources`] collection and only ever
//! rewritten in full by the import pipeline through [`DatasourceStore`].

pub mod defaults;
pub mod validate;

use std::path::{Path, PathBuf};

use mpa_datasource_models::validation::{ConfigurationError, ValidationIssue, check_unique_ids};
use mpa_datasource_models::{Datasource, ExternalDatasource, InternalDatasource};

pub use defaults::{GLOBAL_EEZ_LAND_UNION_ID, GLOBAL_LAND_ID, default_datasources};

/// Errors from registry reads, writes, and lookups.
#[derive(Debug, thiserror::Error)]
pub enum DatasourceError {
    /// No datasource with the requested id exists.
    #[error("Datasource not found: {id}")]
    NotFound {
        /// The requested datasource id.
        id: String,
    },

    /// The datasource exists but is not the requested variant.
    #[error("Datasource {id} is not an {expected} datasource")]
    WrongVariant {
        /// The requested datasource id.
        id: String,
        /// The variant the caller needed.
        expected: &'static str,
    },

    /// The registry file failed validation.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// I/O error (file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A validated set of datasources with unique ids, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Datasources(Vec<Datasource>);

impl Datasources {
    /// Wraps `records` after checking that ids are non-empty and unique.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] listing every empty or duplicate id.
    pub fn new(records: Vec<Datasource>) -> Result<Self, ConfigurationError> {
        let mut issues: Vec<ValidationIssue> = Vec::new();
        check_unique_ids(
            "datasources",
            "datasourceId",
            records.iter().map(Datasource::datasource_id).enumerate(),
            &mut issues,
        );
        ConfigurationError::check("datasources", issues)?;
        Ok(Self(records))
    }

    /// Returns the datasource with `id`.
    ///
    /// # Errors
    ///
    /// Returns [`DatasourceError::NotFound`] if no record has that id.
    pub fn get_by_id(&self, id: &str) -> Result<&Datasource, DatasourceError> {
        self.0
            .iter()
            .find(|ds| ds.datasource_id() == id)
            .ok_or_else(|| DatasourceError::NotFound { id: id.to_string() })
    }

    /// Returns the internal datasource with `id`.
    ///
    /// # Errors
    ///
    /// Returns [`DatasourceError::NotFound`] if absent or
    /// [`DatasourceError::WrongVariant`] if the record is external.
    pub fn get_internal_by_id(&self, id: &str) -> Result<&InternalDatasource, DatasourceError> {
        self.get_by_id(id)?
            .as_internal()
            .ok_or_else(|| wrong_variant(id, "internal"))
    }

    /// Returns the external datasource with `id`.
    ///
    /// # Errors
    ///
    /// Returns [`DatasourceError::NotFound`] if absent or
    /// [`DatasourceError::WrongVariant`] if the record is internal.
    pub fn get_external_by_id(&self, id: &str) -> Result<&ExternalDatasource, DatasourceError> {
        self.get_by_id(id)?
            .as_external()
            .ok_or_else(|| wrong_variant(id, "external"))
    }

    /// Returns the internal vector datasource with `id`.
    ///
    /// # Errors
    ///
    /// Returns [`DatasourceError::NotFound`] if absent or
    /// [`DatasourceError::WrongVariant`] if it is not an internal vector.
    pub fn get_internal_vector_by_id(
        &self,
        id: &str,
    ) -> Result<&InternalDatasource, DatasourceError> {
        self.get_by_id(id)?
            .as_internal_vector()
            .ok_or_else(|| wrong_variant(id, "internal vector"))
    }

    /// Returns the internal raster datasource with `id`.
    ///
    /// # Errors
    ///
    /// Returns [`DatasourceError::NotFound`] if absent or
    /// [`DatasourceError::WrongVariant`] if it is not an internal raster.
    pub fn get_internal_raster_by_id(
        &self,
        id: &str,
    ) -> Result<&InternalDatasource, DatasourceError> {
        self.get_by_id(id)?
            .as_internal_raster()
            .ok_or_else(|| wrong_variant(id, "internal raster"))
    }

    /// Inserts or replaces the record with the same id.
    ///
    /// An existing record is replaced in place. When both the existing and
    /// the new record are internal, the existing `created` timestamp is kept.
    pub fn upsert(&mut self, mut datasource: Datasource) {
        let id = datasource.datasource_id().to_string();
        if let Some(existing) = self.0.iter_mut().find(|ds| ds.datasource_id() == id) {
            log::info!("Updating datasource {id}");
            if let (Datasource::Internal(old), Datasource::Internal(new)) =
                (&*existing, &mut datasource)
            {
                new.created = old.created;
            }
            *existing = datasource;
        } else {
            log::info!("Adding datasource {id}");
            self.0.push(datasource);
        }
    }

    /// Iterates all records in file order.
    pub fn iter(&self) -> std::slice::Iter<'_, Datasource> {
        self.0.iter()
    }

    /// Iterates internal records in file order.
    pub fn internal(&self) -> impl Iterator<Item = &InternalDatasource> {
        self.0.iter().filter_map(Datasource::as_internal)
    }

    /// All records as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Datasource] {
        &self.0
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a Datasources {
    type Item = &'a Datasource;
    type IntoIter = std::slice::Iter<'a, Datasource>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn wrong_variant(id: &str, expected: &'static str) -> DatasourceError {
    DatasourceError::WrongVariant {
        id: id.to_string(),
        expected,
    }
}

/// Reads and writes the registry file at a fixed path.
#[derive(Debug, Clone)]
pub struct DatasourceStore {
    path: PathBuf,
}

impl DatasourceStore {
    /// Creates a store backed by the JSON file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the registry file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads and validates the registry.
    ///
    /// When the file does not exist yet its parent directory is created and
    /// the default external layers are returned.
    ///
    /// # Errors
    ///
    /// Returns [`DatasourceError::Configuration`] if the file is malformed
    /// or any record fails validation, or [`DatasourceError::Io`] if it
    /// cannot be read.
    pub fn read(&self) -> Result<Datasources, DatasourceError> {
        if !self.path.exists() {
            log::debug!(
                "No datasources file at {}, using defaults",
                self.path.display()
            );
            self.ensure_parent_dir()?;
            return Ok(Datasources(default_datasources()));
        }
        let contents = std::fs::read_to_string(&self.path)?;
        let records = validate::parse_datasources(&self.path.display().to_string(), &contents)?;
        Ok(Datasources(records))
    }

    /// Overwrites the registry file with `datasources`, pretty-printed.
    ///
    /// # Errors
    ///
    /// Returns [`DatasourceError::Io`] or [`DatasourceError::Json`] if the
    /// file cannot be written.
    pub fn write(&self, datasources: &Datasources) -> Result<(), DatasourceError> {
        self.ensure_parent_dir()?;
        let json = serde_json::to_string_pretty(datasources.as_slice())?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    /// Reads the registry, upserts `datasource`, and writes it back.
    ///
    /// Returns the registry as written.
    ///
    /// # Errors
    ///
    /// Returns any error from [`read`](Self::read) or [`write`](Self::write).
    pub fn create_or_update(&self, datasource: Datasource) -> Result<Datasources, DatasourceError> {
        let mut datasources = self.read()?;
        datasources.upsert(datasource);
        self.write(&datasources)?;
        Ok(datasources)
    }

    fn ensure_parent_dir(&self) -> std::io::Result<()> {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use mpa_datasource_models::{ClassStats, GeoType, KeyStats, Stats, SupportedFormat};

    use super::*;

    fn temp_store() -> (PathBuf, DatasourceStore) {
        let dir = std::env::temp_dir().join(format!("mpa_datasource_{}", uuid::Uuid::new_v4()));
        let store = DatasourceStore::new(dir.join("config").join("datasources.json"));
        (dir, store)
    }

    fn internal(id: &str, day: u32) -> Datasource {
        Datasource::Internal(InternalDatasource {
            datasource_id: id.to_string(),
            geo_type: GeoType::Vector,
            class_keys: vec!["region".to_string()],
            formats: vec![SupportedFormat::Fgb],
            key_stats: Some(KeyStats::with_total(Stats::vector(2, 400.0))),
            no_data_value: None,
            layer_name: Some(id.to_string()),
            band: None,
            measurement_type: None,
            filter_datasource: None,
            src: format!("data/src/{id}.shp"),
            properties_to_keep: vec!["region".to_string()],
            explode_multi: Some(false),
            created: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            last_updated: Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap(),
        })
    }

    #[test]
    fn missing_file_yields_defaults_and_creates_dir() {
        let (dir, store) = temp_store();
        let datasources = store.read().unwrap();

        assert_eq!(datasources.len(), 2);
        assert!(datasources.get_by_id(GLOBAL_LAND_ID).unwrap().is_external());
        assert!(store.path().parent().unwrap().is_dir());
        assert!(!store.path().exists());

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn write_then_read_round_trips_both_variants() {
        let (dir, store) = temp_store();
        let mut datasources = Datasources(default_datasources());
        let mut with_stats = internal("habitat", 1);
        if let Datasource::Internal(ds) = &mut with_stats {
            let mut classes = ClassStats::new();
            classes.insert("A".to_string(), Stats::vector(1, 100.0));
            classes.insert("B".to_string(), Stats::vector(1, 300.0));
            ds.key_stats.get_or_insert_with(KeyStats::new).insert("region", classes);
        }
        datasources.upsert(with_stats);

        store.write(&datasources).unwrap();
        let reread = store.read().unwrap();
        assert_eq!(reread, datasources);

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\n  {\n    \"kind\": \"external\""));

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn create_or_update_preserves_created() {
        let (dir, store) = temp_store();
        store.create_or_update(internal("habitat", 1)).unwrap();

        let mut replacement = internal("habitat", 20);
        if let Datasource::Internal(ds) = &mut replacement {
            ds.class_keys = vec!["type".to_string()];
            ds.key_stats = None;
        }
        let written = store.create_or_update(replacement).unwrap();

        let ds = written.get_internal_by_id("habitat").unwrap();
        assert_eq!(ds.created, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(
            ds.last_updated,
            Utc.with_ymd_and_hms(2024, 1, 20, 12, 0, 0).unwrap()
        );
        assert_eq!(ds.class_keys, vec!["type".to_string()]);
        assert_eq!(ds.key_stats, None);
        assert_eq!(store.read().unwrap(), written);

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn upsert_replaces_in_place() {
        let mut datasources = Datasources::new(vec![
            internal("a", 1),
            internal("b", 1),
            internal("c", 1),
        ])
        .unwrap();
        datasources.upsert(internal("b", 5));
        datasources.upsert(internal("d", 5));

        let ids: Vec<_> = datasources.iter().map(Datasource::datasource_id).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn lookups_fail_hard() {
        let datasources = Datasources::new(vec![internal("habitat", 1)]).unwrap();
        assert!(matches!(
            datasources.get_by_id("nope"),
            Err(DatasourceError::NotFound { .. })
        ));
        assert!(matches!(
            datasources.get_internal_raster_by_id("habitat"),
            Err(DatasourceError::WrongVariant { expected: "internal raster", .. })
        ));
        assert!(datasources.get_internal_vector_by_id("habitat").is_ok());
        assert!(datasources.get_external_by_id("habitat").is_err());
    }

    #[test]
    fn invalid_file_is_a_configuration_error() {
        let (dir, store) = temp_store();
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "[{\"datasourceId\": 1}, {]").unwrap();

        assert!(matches!(
            store.read(),
            Err(DatasourceError::Configuration(_))
        ));

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn duplicate_ids_rejected_on_construction() {
        let err = Datasources::new(vec![internal("a", 1), internal("a", 2)]).unwrap_err();
        assert_eq!(err.issues.len(), 1);
    }
}
