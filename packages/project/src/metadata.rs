//! Per-deployment project metadata.

use std::collections::BTreeMap;
use std::path::Path;

use mpa_datasource_models::validation::{ConfigurationError, ValidationIssue};
use serde::{Deserialize, Serialize};

use crate::ProjectError;

/// Study-area bounding box, 2D or 3D.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BBox {
    /// `[min_x, min_y, max_x, max_y]`
    TwoD([f64; 4]),
    /// `[min_x, min_y, min_z, max_x, max_y, max_z]`
    ThreeD([f64; 6]),
}

impl BBox {
    /// Drops the z range.
    #[must_use]
    pub const fn to_2d(&self) -> [f64; 4] {
        match *self {
            Self::TwoD(b) => b,
            Self::ThreeD([min_x, min_y, _, max_x, max_y, _]) => [min_x, min_y, max_x, max_y],
        }
    }
}

/// Immutable facts about one deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProjectMetadata {
    /// Study-area bounding box.
    pub bbox: BBox,
    /// Study-area size.
    pub area_square_meters: f64,
    /// Clipping boundary name to datasource id.
    #[serde(default)]
    pub clip_datasources: BTreeMap<String, String>,
    /// Package name, used in the published data bucket name.
    pub package_name: String,
    /// Deployment region of the published data bucket.
    pub region: String,
}

impl ProjectMetadata {
    /// Reads and parses a project metadata file on its own, without the
    /// rest of the project configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::Io`] if the file cannot be read or
    /// [`ProjectError::Configuration`] if it is malformed.
    pub fn read(path: &Path) -> Result<Self, ProjectError> {
        let contents = std::fs::read_to_string(path)?;
        serde_json::from_str(&contents).map_err(|e| {
            let origin = path.display().to_string();
            ConfigurationError {
                issues: vec![ValidationIssue::new(origin.clone(), e.to_string())],
                origin,
            }
            .into()
        })
    }

    /// Name of the bucket datasets are published to.
    #[must_use]
    pub fn bucket_name(&self) -> String {
        mpa_datasource_models::bucket_name(&self.package_name)
    }
}
