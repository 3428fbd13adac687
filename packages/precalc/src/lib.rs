#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Datasource import and precalculated key stats.
//!
//! An import converts a source file into the published formats through an
//! [`ImportTool`], derives baseline [`KeyStats`](mpa_datasource_models::KeyStats)
//! from the local artifacts, publishes, and upserts the datasource record.
//! [`reimport_datasources`] repeats this for every internal datasource in
//! the registry, one at a time, counting failures instead of aborting.

pub mod config;
#[cfg(test)]
mod fake;
pub mod grid;
pub mod import;
pub mod progress;
pub mod raster;
pub mod reimport;
pub mod tool;
pub mod vector;

use mpa_datasource::DatasourceError;

pub use config::{ImportConfig, ImportOptions, gen_config};
pub use import::import_datasource;
pub use progress::ReimportProgress;
pub use reimport::{ReimportSummary, reimport_datasources};
pub use tool::{GdalTool, ImportTool};

/// Errors from importing datasources and computing key stats.
#[derive(Debug, thiserror::Error)]
pub enum PrecalcError {
    /// An external command exited unsuccessfully.
    #[error("{command} failed ({status}): {stderr}")]
    Tool {
        /// Program name.
        command: String,
        /// Exit status as reported by the OS.
        status: String,
        /// Captured standard error.
        stderr: String,
    },

    /// A `GeoJSON` artifact could not be parsed or converted.
    #[error("GeoJSON error: {0}")]
    Geojson(#[from] geojson::Error),

    /// A generated `GeoJSON` file is not a feature collection.
    #[error("{path} is not a GeoJSON feature collection")]
    NotFeatureCollection {
        /// Path of the offending file.
        path: String,
    },

    /// An ASCII grid artifact is malformed.
    #[error("Invalid ASCII grid {path}: {message}")]
    Grid {
        /// Path of the grid file.
        path: String,
        /// What was wrong with it.
        message: String,
    },

    /// The import options are inconsistent.
    #[error("Invalid import options: {message}")]
    InvalidOptions {
        /// What was wrong.
        message: String,
    },

    /// A datasource cannot be used in the requested way.
    #[error("Datasource {id} cannot be used: {message}")]
    UnsupportedDatasource {
        /// The datasource id.
        id: String,
        /// Why it cannot be used.
        message: String,
    },

    /// Registry read, write, or lookup failed.
    #[error(transparent)]
    Datasource(#[from] DatasourceError),

    /// I/O error (file read/write, process spawn).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
