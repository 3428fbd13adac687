#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Report overlap functions.
//!
//! Each report metric resolves its metric group through the project facade,
//! fetches the published layer window for every class concurrently, hands
//! each class's data to an [`OverlapEvaluator`], and returns the class-tagged
//! metrics in a deterministic order. Nothing here does geometry math itself.

pub mod functions;
pub mod layer;
pub mod orchestrate;
pub mod sketch;

#[cfg(test)]
mod fake;

use mpa_project::ProjectError;

pub use functions::{OVERLAP_FUNCTIONS, OverlapFunction, ReportResult, find_overlap_function, run_with_timeout};
pub use layer::{LayerFetcher, OverlapEvaluator};
pub use orchestrate::{FetchWindow, OverlapContext, OverlapShape};
pub use sketch::{NullSketch, Sketch, SketchCollection, SketchInput};

/// Errors from running an overlap function.
#[derive(Debug, thiserror::Error)]
pub enum OverlapError {
    /// The function exceeded its wall-clock limit. No metrics are returned.
    #[error("{title} timed out after {seconds}s")]
    Timeout {
        /// Overlap function title.
        title: String,
        /// The limit that was exceeded.
        seconds: u64,
    },

    /// A published layer could not be read.
    #[error("Failed to fetch {url}: {message}")]
    Fetch {
        /// Layer URL.
        url: String,
        /// Underlying failure.
        message: String,
    },

    /// The overlap evaluator failed.
    #[error("Overlap evaluation failed for {metric_id}: {message}")]
    Evaluate {
        /// Metric group id.
        metric_id: String,
        /// Underlying failure.
        message: String,
    },

    /// The metric group does not fit the requested orchestration shape.
    #[error("Metric group {metric_id} cannot be evaluated: {message}")]
    Shape {
        /// Metric group id.
        metric_id: String,
        /// What is missing or inconsistent.
        message: String,
    },

    /// The sketch has no geometry to derive a fetch window from.
    #[error("Sketch {sketch_id} has no geometry")]
    EmptySketch {
        /// Sketch id.
        sketch_id: String,
    },

    /// Metric group, datasource, or class resolution failed.
    #[error(transparent)]
    Project(#[from] ProjectError),
}
