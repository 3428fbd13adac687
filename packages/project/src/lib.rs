#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Read-only project facade.
//!
//! [`ProjectClient`] is built once per process from the four configuration
//! files and passed by reference to everything that needs project data.
//! Validation happens in [`ProjectClient::load`] and nowhere else.

pub mod config;
pub mod metadata;

use std::collections::BTreeMap;
use std::path::Path;

use mpa_datasource::{
    DatasourceError, DatasourceStore, Datasources, GLOBAL_EEZ_LAND_UNION_ID, GLOBAL_LAND_ID,
};
use mpa_datasource_models::validation::{ConfigurationError, ValidationIssue};
use mpa_datasource_models::{Datasource, InternalDatasource, StatName, TOTAL_KEY};
use mpa_metrics_models::{
    LegacyMetricGroup, LegacyObjective, Metric, MetricGroup, MetricGroups, MetricsError,
    Objective, Objectives,
};

pub use config::ToolConfig;
pub use metadata::{BBox, ProjectMetadata};

/// Errors from loading or querying the project.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    /// Datasource lookup or registry failure.
    #[error(transparent)]
    Datasource(#[from] DatasourceError),

    /// Metric group or objective lookup failure.
    #[error(transparent)]
    Metrics(#[from] MetricsError),

    /// One or more configuration files failed validation.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// A class has no precalculated stat to divide by.
    #[error("Missing {stat} stat for datasource {datasource_id}, class {class_id}: {message}")]
    MissingStats {
        /// The datasource that should carry the stat.
        datasource_id: String,
        /// The class being resolved.
        class_id: String,
        /// The requested stat.
        stat: StatName,
        /// What was missing.
        message: String,
    },

    /// The id is not one of the well-known global layers.
    #[error("Global datasource {0} not found")]
    UnknownGlobalDatasource(String),

    /// The project metadata names no datasource for this clip boundary.
    #[error("Missing clipDatasource for boundary name {0}")]
    MissingClipDatasource(String),

    /// I/O error (file read).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `mpa.toml` parse error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// A fetchable handle to a global external vector layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalVectorDatasource {
    /// Datasource id.
    pub datasource_id: String,
    /// Base URL of the published layer.
    pub url: String,
}

/// Composition root over project metadata and the three catalogs.
#[derive(Debug, Clone)]
pub struct ProjectClient {
    metadata: ProjectMetadata,
    datasources: Datasources,
    metric_groups: MetricGroups,
    objectives: Objectives,
    serve_local: bool,
    local_port: u16,
}

impl ProjectClient {
    /// Reads and validates every configuration file named by `config`.
    ///
    /// Issues from all files are merged into one [`ConfigurationError`].
    /// A missing datasources file falls back to the default global layers,
    /// a missing metrics or objectives file is an empty catalog, and a
    /// missing project file is an issue.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::Configuration`] listing every violation, or
    /// [`ProjectError::Io`] if a present file cannot be read.
    pub fn load(config: &ToolConfig) -> Result<Self, ProjectError> {
        let mut issues: Vec<ValidationIssue> = Vec::new();

        let datasources = match DatasourceStore::new(config.datasources_path()).read() {
            Ok(datasources) => datasources,
            Err(DatasourceError::Configuration(e)) => {
                issues.extend(e.issues);
                Datasources::default()
            }
            Err(e) => return Err(e.into()),
        };

        let metrics_path = config.metrics_path();
        let metric_groups = match read_optional(&metrics_path)? {
            Some(contents) => {
                MetricGroups::parse_collecting(&display(&metrics_path), &contents, &mut issues)
            }
            None => MetricGroups::default(),
        };

        let objectives_path = config.objectives_path();
        let objectives = match read_optional(&objectives_path)? {
            Some(contents) => {
                Objectives::parse_collecting(&display(&objectives_path), &contents, &mut issues)
            }
            None => Objectives::default(),
        };

        let project_path = config.project_path();
        let metadata = match read_optional(&project_path)? {
            Some(contents) => match serde_json::from_str::<ProjectMetadata>(&contents) {
                Ok(metadata) => Some(metadata),
                Err(e) => {
                    issues.push(ValidationIssue::new(display(&project_path), e.to_string()));
                    None
                }
            },
            None => {
                issues.push(ValidationIssue::new(display(&project_path), "file not found"));
                None
            }
        };

        ConfigurationError::check(display(&config.config_dir), issues)?;
        let Some(metadata) = metadata else {
            return Err(ConfigurationError {
                origin: display(&project_path),
                issues: vec![ValidationIssue::new(display(&project_path), "file not found")],
            }
            .into());
        };

        log::debug!(
            "Loaded project with {} datasources, {} metric groups, {} objectives",
            datasources.len(),
            metric_groups.len(),
            objectives.len()
        );

        Ok(Self::new(metadata, datasources, metric_groups, objectives)
            .with_bucket_mode(config.serve_local, config.local_port))
    }

    /// Builds a client from already-validated parts, reading from the cloud
    /// bucket by default.
    #[must_use]
    pub const fn new(
        metadata: ProjectMetadata,
        datasources: Datasources,
        metric_groups: MetricGroups,
        objectives: Objectives,
    ) -> Self {
        Self {
            metadata,
            datasources,
            metric_groups,
            objectives,
            serve_local: false,
            local_port: 8080,
        }
    }

    /// Sets which data URL [`bucket_url`](Self::bucket_url) returns.
    #[must_use]
    pub const fn with_bucket_mode(mut self, serve_local: bool, local_port: u16) -> Self {
        self.serve_local = serve_local;
        self.local_port = local_port;
        self
    }

    /// Project metadata.
    #[must_use]
    pub const fn metadata(&self) -> &ProjectMetadata {
        &self.metadata
    }

    /// All datasources.
    #[must_use]
    pub const fn datasources(&self) -> &Datasources {
        &self.datasources
    }

    /// All metric groups.
    #[must_use]
    pub const fn metric_groups(&self) -> &MetricGroups {
        &self.metric_groups
    }

    /// All objectives.
    #[must_use]
    pub const fn objectives(&self) -> &Objectives {
        &self.objectives
    }

    /// Base URL for published data: the local data server when `local` is
    /// set, otherwise the project's cloud bucket.
    #[must_use]
    pub fn data_bucket_url(&self, local: bool, port: u16) -> String {
        if local {
            mpa_datasource_models::local_url(port)
        } else {
            mpa_datasource_models::bucket_url(&self.metadata.package_name, &self.metadata.region)
        }
    }

    /// Base URL for published data using the configured mode.
    #[must_use]
    pub fn bucket_url(&self) -> String {
        self.data_bucket_url(self.serve_local, self.local_port)
    }

    /// Returns the datasource with `datasource_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::Datasource`] if absent.
    pub fn get_datasource_by_id(&self, datasource_id: &str) -> Result<&Datasource, ProjectError> {
        Ok(self.datasources.get_by_id(datasource_id)?)
    }

    /// Returns the internal vector datasource with `datasource_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::Datasource`] if absent or another variant.
    pub fn get_internal_vector_datasource_by_id(
        &self,
        datasource_id: &str,
    ) -> Result<&InternalDatasource, ProjectError> {
        Ok(self.datasources.get_internal_vector_by_id(datasource_id)?)
    }

    /// Returns the internal raster datasource with `datasource_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::Datasource`] if absent or another variant.
    pub fn get_internal_raster_datasource_by_id(
        &self,
        datasource_id: &str,
    ) -> Result<&InternalDatasource, ProjectError> {
        Ok(self.datasources.get_internal_raster_by_id(datasource_id)?)
    }

    /// Returns a handle to one of the well-known global vector layers.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::UnknownGlobalDatasource`] for any other id,
    /// or [`ProjectError::Datasource`] if the registry lacks the external
    /// record.
    pub fn get_global_vector_datasource_by_id(
        &self,
        datasource_id: &str,
    ) -> Result<GlobalVectorDatasource, ProjectError> {
        match datasource_id {
            GLOBAL_LAND_ID | GLOBAL_EEZ_LAND_UNION_ID => {
                let ds = self.datasources.get_external_by_id(datasource_id)?;
                Ok(GlobalVectorDatasource {
                    datasource_id: ds.datasource_id.clone(),
                    url: ds.url.clone(),
                })
            }
            other => Err(ProjectError::UnknownGlobalDatasource(other.to_string())),
        }
    }

    /// Returns the global land polygon layer.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::Datasource`] if the registry lacks it.
    pub fn get_global_land_vector_datasource(&self) -> Result<GlobalVectorDatasource, ProjectError> {
        self.get_global_vector_datasource_by_id(GLOBAL_LAND_ID)
    }

    /// Returns the global EEZ and land union layer.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::Datasource`] if the registry lacks it.
    pub fn get_global_eez_vector_datasource(&self) -> Result<GlobalVectorDatasource, ProjectError> {
        self.get_global_vector_datasource_by_id(GLOBAL_EEZ_LAND_UNION_ID)
    }

    /// Resolves a named clipping boundary to its datasource.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::MissingClipDatasource`] if the boundary is not
    /// configured, or [`ProjectError::Datasource`] if its datasource is
    /// absent.
    pub fn get_clip_datasource(&self, boundary: &str) -> Result<&Datasource, ProjectError> {
        let datasource_id = self
            .metadata
            .clip_datasources
            .get(boundary)
            .ok_or_else(|| ProjectError::MissingClipDatasource(boundary.to_string()))?;
        self.get_datasource_by_id(datasource_id)
    }

    /// Returns the objective with `objective_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::Metrics`] if absent.
    pub fn get_objective_by_id(&self, objective_id: &str) -> Result<&Objective, ProjectError> {
        Ok(self.objectives.get(objective_id)?)
    }

    /// Returns the objective with `objective_id` in the older shape that
    /// also carries it as `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::Metrics`] if absent.
    pub fn get_legacy_objective_by_id(
        &self,
        objective_id: &str,
    ) -> Result<LegacyObjective, ProjectError> {
        Ok(self.get_objective_by_id(objective_id)?.clone().into())
    }

    /// Returns the metric group with `metric_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::Metrics`] if absent.
    pub fn get_metric_group(&self, metric_id: &str) -> Result<&MetricGroup, ProjectError> {
        Ok(self.metric_groups.get(metric_id)?)
    }

    /// Returns the metric group with per-class goal values merged in.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::Metrics`] if the group or any objective it
    /// references is absent.
    pub fn get_legacy_metric_group(&self, metric_id: &str) -> Result<LegacyMetricGroup, ProjectError> {
        let group = self.get_metric_group(metric_id)?;
        let group_target = group
            .objective_id
            .as_deref()
            .map(|id| self.get_objective_by_id(id).map(|o| o.target))
            .transpose()?;

        let mut class_targets = BTreeMap::new();
        for id in group.classes.iter().filter_map(|c| c.objective_id.as_deref()) {
            class_targets.insert(id.to_string(), self.get_objective_by_id(id)?.target);
        }

        Ok(LegacyMetricGroup::from_metric_group(
            group,
            group_target,
            &class_targets,
        ))
    }

    /// Returns one precalculated denominator metric per class of `group`,
    /// in class order.
    ///
    /// Each class reads `keyStats[class_key][class_value][stat]` from its
    /// resolved datasource, where `class_key` is `class_key` if given, else
    /// the group's or class's own. Without any class key the
    /// `total.total` bucket is used.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::Metrics`] if a class does not resolve to one
    /// datasource, [`ProjectError::Datasource`] if that datasource is
    /// absent, or [`ProjectError::MissingStats`] if it lacks the stat.
    pub fn get_precalc_metrics(
        &self,
        group: &MetricGroup,
        stat: StatName,
        class_key: Option<&str>,
    ) -> Result<Vec<Metric>, ProjectError> {
        group
            .classes
            .iter()
            .map(|class| {
                let datasource_id = group.class_datasource_id(class)?;
                let ds = self.get_datasource_by_id(datasource_id)?;
                let missing = |message: String| ProjectError::MissingStats {
                    datasource_id: datasource_id.to_string(),
                    class_id: class.class_id.clone(),
                    stat,
                    message,
                };

                let key_stats = ds
                    .key_stats()
                    .ok_or_else(|| missing("datasource has no keyStats".to_string()))?;

                let (key, value) = match group.class_key_for(class, class_key) {
                    Some(key) => (key.to_string(), class.stats_class_value()),
                    None => {
                        if class.class_id != datasource_id && class.datasource_id.is_none() {
                            log::warn!(
                                "Missing classKey in metric group {}, class {}, using total stat for precalc denominator",
                                group.metric_id,
                                class.class_id
                            );
                        }
                        (TOTAL_KEY.to_string(), TOTAL_KEY.to_string())
                    }
                };

                let value = key_stats
                    .get(&key, &value)
                    .ok_or_else(|| missing(format!("no keyStats entry {key}.{value}")))?
                    .get(stat)
                    .ok_or_else(|| missing(format!("keyStats entry {key}.{value} has no {stat}")))?;

                Ok(Metric::new(&group.metric_id, value).with_class_id(&class.class_id))
            })
            .collect()
    }
}

fn read_optional(path: &Path) -> Result<Option<String>, ProjectError> {
    if path.exists() {
        Ok(Some(std::fs::read_to_string(path)?))
    } else {
        log::debug!("No file at {}", path.display());
        Ok(None)
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}
