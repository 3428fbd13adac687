//! Fixtures and fake collaborators for tests.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use geo::{MultiPolygon, polygon};
use geojson::{Feature, GeoJson};
use mpa_datasource::Datasources;
use mpa_datasource_models::raster::{GeoTransform, Raster};
use mpa_datasource_models::{Datasource, GeoType, InternalDatasource, SupportedFormat};
use mpa_metrics_models::{Metric, MetricGroup, MetricGroups, Objectives};
use mpa_project::{BBox as ProjectBBox, ProjectClient, ProjectMetadata};
use serde_json::{Value, json};

use crate::OverlapError;
use crate::layer::{LayerFetcher, OverlapEvaluator};
use crate::sketch::{BBox, Sketch, SketchInput};

pub fn square(id: &str, x: f64, y: f64) -> Sketch {
    let p = polygon![
        (x: x, y: y),
        (x: x + 1.0, y: y),
        (x: x + 1.0, y: y + 1.0),
        (x: x, y: y + 1.0),
        (x: x, y: y),
    ];
    Sketch::new(id, format!("Sketch {id}"), MultiPolygon(vec![p]))
}

pub fn feature(properties: Value, with_geometry: bool) -> Feature {
    let geometry = if with_geometry {
        json!({"type": "Point", "coordinates": [0.5, 0.5]})
    } else {
        Value::Null
    };
    let value = json!({"type": "Feature", "properties": properties, "geometry": geometry});
    match value.to_string().parse::<GeoJson>().unwrap() {
        GeoJson::Feature(f) => f,
        _ => panic!("expected feature"),
    }
}

pub fn raster(values: Vec<f64>) -> Raster {
    let transform = GeoTransform {
        origin_x: 0.0,
        origin_y: 2.0,
        cell_width: 1.0,
        cell_height: 1.0,
    };
    Raster::new(2, 2, transform, None, values).unwrap()
}

fn internal(id: &str, geo_type: GeoType, formats: &[SupportedFormat], class_keys: &[&str], no_data: Option<f64>) -> Datasource {
    let created = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    Datasource::Internal(InternalDatasource {
        datasource_id: id.to_string(),
        geo_type,
        class_keys: class_keys.iter().map(ToString::to_string).collect(),
        formats: formats.to_vec(),
        key_stats: None,
        no_data_value: no_data,
        layer_name: None,
        band: None,
        measurement_type: None,
        filter_datasource: None,
        src: format!("data/src/{id}"),
        properties_to_keep: Vec::new(),
        explode_multi: None,
        created,
        last_updated: created,
    })
}

pub fn project() -> ProjectClient {
    let datasources = Datasources::new(vec![
        internal("ebsa-a", GeoType::Vector, &[SupportedFormat::Geojson], &[], None),
        internal("ebsa-b", GeoType::Vector, &[SupportedFormat::Fgb], &[], None),
        internal("deepwater", GeoType::Vector, &[SupportedFormat::Fgb], &["Draft name"], None),
        internal("gfw-trawl", GeoType::Raster, &[SupportedFormat::Cog], &[], None),
        internal("gfw-longline", GeoType::Raster, &[SupportedFormat::Cog], &[], Some(-1.0)),
    ])
    .unwrap();

    let groups: Vec<MetricGroup> = serde_json::from_value(json!([
        {
            "metricId": "ebsaAreaOverlap",
            "type": "areaOverlap",
            "classes": [
                {"classId": "b", "display": "EBSA B", "datasourceId": "ebsa-b"},
                {"classId": "a", "display": "EBSA A", "datasourceId": "ebsa-a"}
            ]
        },
        {
            "metricId": "deepwaterRegionAreaOverlap",
            "type": "areaOverlap",
            "datasourceId": "deepwater",
            "classes": [
                {"classId": "South", "display": "South Region"},
                {"classId": "North", "display": "North Region"}
            ]
        },
        {
            "metricId": "gfwValueOverlap",
            "type": "valueOverlap",
            "classes": [
                {"classId": "trawl", "display": "Trawl", "datasourceId": "gfw-trawl"},
                {"classId": "longline", "display": "Longline", "datasourceId": "gfw-longline"}
            ]
        },
        {
            "metricId": "missingDatasource",
            "type": "areaOverlap",
            "classes": [{"classId": "x", "display": "X", "datasourceId": "ghost"}]
        }
    ]))
    .unwrap();

    let metadata = ProjectMetadata {
        bbox: ProjectBBox::TwoD([-10.0, -10.0, 10.0, 10.0]),
        area_square_meters: 1.0e9,
        clip_datasources: BTreeMap::new(),
        package_name: "reports".to_string(),
        region: "us-west-1".to_string(),
    };

    ProjectClient::new(
        metadata,
        datasources,
        MetricGroups::from_vec(groups),
        Objectives::default(),
    )
}

/// Serves registered layers by URL, optionally after a delay, and records
/// every request.
#[derive(Default)]
pub struct FakeFetcher {
    features: BTreeMap<String, Vec<Feature>>,
    rasters: BTreeMap<String, Raster>,
    delays: BTreeMap<String, Duration>,
    calls: Mutex<Vec<(String, BBox)>>,
}

impl FakeFetcher {
    pub fn with_features(mut self, url: &str, features: Vec<Feature>) -> Self {
        self.features.insert(url.to_string(), features);
        self
    }

    pub fn with_raster(mut self, url: &str, raster: Raster) -> Self {
        self.rasters.insert(url.to_string(), raster);
        self
    }

    pub fn with_delay(mut self, url: &str, delay: Duration) -> Self {
        self.delays.insert(url.to_string(), delay);
        self
    }

    pub fn calls(&self) -> Vec<(String, BBox)> {
        self.calls.lock().unwrap().clone()
    }

    async fn request(&self, url: &str, bbox: BBox) {
        self.calls.lock().unwrap().push((url.to_string(), bbox));
        if let Some(delay) = self.delays.get(url) {
            tokio::time::sleep(*delay).await;
        }
    }
}

fn not_found(url: &str) -> OverlapError {
    OverlapError::Fetch {
        url: url.to_string(),
        message: "404 Not Found".to_string(),
    }
}

#[async_trait]
impl LayerFetcher for FakeFetcher {
    async fn fetch_features(&self, url: &str, bbox: BBox) -> Result<Vec<Feature>, OverlapError> {
        self.request(url, bbox).await;
        self.features.get(url).cloned().ok_or_else(|| not_found(url))
    }

    async fn fetch_raster(&self, url: &str, bbox: BBox) -> Result<Raster, OverlapError> {
        self.request(url, bbox).await;
        self.rasters.get(url).cloned().ok_or_else(|| not_found(url))
    }
}

/// Feature count or raster sum, once per sketch.
pub struct FakeEvaluator;

fn sketch_ids(sketch: &SketchInput) -> Vec<String> {
    match sketch {
        SketchInput::Sketch(s) => vec![s.id.clone()],
        SketchInput::Collection(c) => c
            .sketches
            .iter()
            .map(|s| s.id.clone())
            .chain(std::iter::once(c.id.clone()))
            .collect(),
    }
}

#[async_trait]
impl OverlapEvaluator for FakeEvaluator {
    async fn overlap_features(
        &self,
        metric_id: &str,
        features: &[Feature],
        sketch: &SketchInput,
    ) -> Result<Vec<Metric>, OverlapError> {
        #[allow(clippy::cast_precision_loss)]
        let value = features.len() as f64;
        Ok(sketch_ids(sketch)
            .into_iter()
            .map(|id| Metric::new(metric_id, value).with_sketch_id(id))
            .collect())
    }

    async fn overlap_raster(
        &self,
        metric_id: &str,
        raster: &Raster,
        sketch: &SketchInput,
    ) -> Result<Vec<Metric>, OverlapError> {
        let value: f64 = raster.valid_cells().map(|(_, _, v)| v).sum();
        Ok(sketch_ids(sketch)
            .into_iter()
            .map(|id| Metric::new(metric_id, value).with_sketch_id(id))
            .collect())
    }
}
