//! Published-layer fetch and overlap evaluation seams.
//!
//! Reading a windowed layer over the network and the overlap math itself
//! are external collaborators. Report functions only see these traits.

use async_trait::async_trait;
use geojson::Feature;
use mpa_datasource_models::raster::Raster;
use mpa_datasource_models::{
    InternalDatasource, SupportedFormat, cog_filename, flatgeobuf_filename, geojson_filename,
};
use mpa_metrics_models::Metric;

use crate::OverlapError;
use crate::sketch::{BBox, SketchInput};

/// Reads published layers restricted to a bounding box.
#[async_trait]
pub trait LayerFetcher: Send + Sync {
    /// Every feature of the vector layer at `url` intersecting `bbox`.
    ///
    /// # Errors
    ///
    /// Returns [`OverlapError::Fetch`] if the layer cannot be read.
    async fn fetch_features(&self, url: &str, bbox: BBox) -> Result<Vec<Feature>, OverlapError>;

    /// The window of the raster at `url` covering `bbox`.
    ///
    /// # Errors
    ///
    /// Returns [`OverlapError::Fetch`] if the raster cannot be read.
    async fn fetch_raster(&self, url: &str, bbox: BBox) -> Result<Raster, OverlapError>;
}

/// Computes overlap metrics, one per sketch.
#[async_trait]
pub trait OverlapEvaluator: Send + Sync {
    /// Area or count overlap of `features` with each sketch.
    ///
    /// # Errors
    ///
    /// Returns [`OverlapError::Evaluate`] on failure.
    async fn overlap_features(
        &self,
        metric_id: &str,
        features: &[Feature],
        sketch: &SketchInput,
    ) -> Result<Vec<Metric>, OverlapError>;

    /// Sum of `raster` values inside each sketch.
    ///
    /// # Errors
    ///
    /// Returns [`OverlapError::Evaluate`] on failure.
    async fn overlap_raster(
        &self,
        metric_id: &str,
        raster: &Raster,
        sketch: &SketchInput,
    ) -> Result<Vec<Metric>, OverlapError>;
}

/// URL of a published vector datasource: the `GeoJSON` file when the
/// datasource publishes one, otherwise its `FlatGeobuf` file.
#[must_use]
pub fn vector_url(base_url: &str, ds: &InternalDatasource) -> String {
    let filename = if ds.formats.contains(&SupportedFormat::Geojson) {
        geojson_filename(&ds.datasource_id)
    } else {
        flatgeobuf_filename(&ds.datasource_id)
    };
    format!("{base_url}{filename}")
}

/// URL of a published raster datasource's COG.
#[must_use]
pub fn raster_url(base_url: &str, datasource_id: &str) -> String {
    format!("{base_url}{}", cog_filename(datasource_id))
}
