//! Per-class fan-out and fan-in.

use std::cmp::Ordering;

use futures::future::try_join_all;
use geojson::Feature;
use mpa_metrics_models::{DataClass, Metric, MetricGroup};
use mpa_project::{ProjectClient, ProjectError};
use serde_json::Value;
use strum_macros::Display;

use crate::OverlapError;
use crate::layer::{LayerFetcher, OverlapEvaluator, raster_url, vector_url};
use crate::sketch::{BBox, SketchInput};

/// How a metric group's classes map onto published layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "camelCase")]
pub enum OverlapShape {
    /// Every class has its own vector datasource.
    PerClassVector,
    /// One vector datasource split into classes by a property.
    ClassKeyVector,
    /// Every class has its own raster datasource.
    PerClassRaster,
}

/// Area a layer is fetched for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchWindow {
    /// The sketch's bounding box.
    Sketch,
    /// The whole project bounding box, for boundary-style checks.
    Project,
}

/// The collaborators an overlap function runs against.
#[derive(Clone, Copy)]
pub struct OverlapContext<'a> {
    /// Project facade.
    pub project: &'a ProjectClient,
    /// Published-layer reader.
    pub fetcher: &'a dyn LayerFetcher,
    /// Overlap math.
    pub evaluator: &'a dyn OverlapEvaluator,
}

struct ClassMetric {
    datasource_id: String,
    display: String,
    metric: Metric,
}

impl<'a> OverlapContext<'a> {
    /// Bundles the collaborators.
    #[must_use]
    pub const fn new(
        project: &'a ProjectClient,
        fetcher: &'a dyn LayerFetcher,
        evaluator: &'a dyn OverlapEvaluator,
    ) -> Self {
        Self {
            project,
            fetcher,
            evaluator,
        }
    }

    /// Bounding box to fetch layers for.
    ///
    /// # Errors
    ///
    /// Returns [`OverlapError::EmptySketch`] when the window is the sketch
    /// and it has no geometry.
    pub fn window(&self, window: FetchWindow, sketch: &SketchInput) -> Result<BBox, OverlapError> {
        match window {
            FetchWindow::Project => Ok(self.project.metadata().bbox.to_2d()),
            FetchWindow::Sketch => sketch.bbox().ok_or_else(|| OverlapError::EmptySketch {
                sketch_id: sketch.id().to_string(),
            }),
        }
    }

    /// Computes every class's overlap for `metric_id` and returns the
    /// metrics tagged with the group id and their class id, sorted by class
    /// datasource, then class display name, then sketch id.
    ///
    /// Classes are fetched and evaluated concurrently. Any failure fails
    /// the whole computation.
    ///
    /// # Errors
    ///
    /// Returns the first resolution, fetch, or evaluation error.
    pub async fn run(
        &self,
        metric_id: &str,
        shape: OverlapShape,
        window: FetchWindow,
        sketch: &SketchInput,
    ) -> Result<Vec<Metric>, OverlapError> {
        let group = self.project.get_metric_group(metric_id)?;
        let bbox = self.window(window, sketch)?;

        let per_class = match shape {
            OverlapShape::PerClassVector => self.per_class_vector(group, bbox, sketch).await?,
            OverlapShape::ClassKeyVector => self.class_key_vector(group, bbox, sketch).await?,
            OverlapShape::PerClassRaster => self.per_class_raster(group, bbox, sketch).await?,
        };

        let mut metrics: Vec<ClassMetric> = per_class.into_iter().flatten().collect();
        metrics.sort_by(compare);
        Ok(metrics.into_iter().map(|m| m.metric).collect())
    }

    async fn per_class_vector(
        &self,
        group: &MetricGroup,
        bbox: BBox,
        sketch: &SketchInput,
    ) -> Result<Vec<Vec<ClassMetric>>, OverlapError> {
        let base_url = self.project.bucket_url();
        try_join_all(group.classes.iter().map(|class| {
            let base_url = &base_url;
            async move {
                let datasource_id = group
                    .class_datasource_id(class)
                    .map_err(ProjectError::from)?;
                let ds = self
                    .project
                    .get_internal_vector_datasource_by_id(datasource_id)?;
                let url = vector_url(base_url, ds);
                log::debug!("Fetching {url}");
                let features = self.fetcher.fetch_features(&url, bbox).await?;
                let metrics = self
                    .evaluator
                    .overlap_features(&group.metric_id, &features, sketch)
                    .await?;
                Ok::<_, OverlapError>(tag(group, class, datasource_id, metrics))
            }
        }))
        .await
    }

    async fn class_key_vector(
        &self,
        group: &MetricGroup,
        bbox: BBox,
        sketch: &SketchInput,
    ) -> Result<Vec<Vec<ClassMetric>>, OverlapError> {
        let datasource_id = group
            .datasource_id
            .as_deref()
            .ok_or_else(|| shape_error(group, "missing top-level datasourceId"))?;
        let ds = self
            .project
            .get_internal_vector_datasource_by_id(datasource_id)?;
        let class_key = group
            .class_key
            .as_deref()
            .or_else(|| ds.class_keys.first().map(String::as_str))
            .ok_or_else(|| shape_error(group, "missing classKey on group and datasource"))?;

        let url = vector_url(&self.project.bucket_url(), ds);
        log::debug!("Fetching {url}");
        let features = self.fetcher.fetch_features(&url, bbox).await?;

        try_join_all(group.classes.iter().map(|class| {
            let class_features: Vec<Feature> = features
                .iter()
                .filter(|f| f.geometry.is_some() && property_matches(f.property(class_key), &class.class_id))
                .cloned()
                .collect();
            async move {
                let metrics = self
                    .evaluator
                    .overlap_features(&group.metric_id, &class_features, sketch)
                    .await?;
                Ok::<_, OverlapError>(tag(group, class, datasource_id, metrics))
            }
        }))
        .await
    }

    async fn per_class_raster(
        &self,
        group: &MetricGroup,
        bbox: BBox,
        sketch: &SketchInput,
    ) -> Result<Vec<Vec<ClassMetric>>, OverlapError> {
        let base_url = self.project.bucket_url();
        try_join_all(group.classes.iter().map(|class| {
            let base_url = &base_url;
            async move {
                let datasource_id = group
                    .class_datasource_id(class)
                    .map_err(ProjectError::from)?;
                let ds = self
                    .project
                    .get_internal_raster_datasource_by_id(datasource_id)?;
                let url = raster_url(base_url, datasource_id);
                log::debug!("Fetching {url}");
                let raster = self
                    .fetcher
                    .fetch_raster(&url, bbox)
                    .await?
                    .with_no_data(ds.no_data_value);
                let metrics = self
                    .evaluator
                    .overlap_raster(&group.metric_id, &raster, sketch)
                    .await?;
                Ok::<_, OverlapError>(tag(group, class, datasource_id, metrics))
            }
        }))
        .await
    }
}

fn tag(group: &MetricGroup, class: &DataClass, datasource_id: &str, metrics: Vec<Metric>) -> Vec<ClassMetric> {
    metrics
        .into_iter()
        .map(|mut metric| {
            metric.metric_id.clone_from(&group.metric_id);
            metric.class_id = Some(class.class_id.clone());
            ClassMetric {
                datasource_id: datasource_id.to_string(),
                display: class.display.clone(),
                metric,
            }
        })
        .collect()
}

fn compare(a: &ClassMetric, b: &ClassMetric) -> Ordering {
    a.datasource_id
        .cmp(&b.datasource_id)
        .then_with(|| a.display.cmp(&b.display))
        .then_with(|| a.metric.sketch_id.cmp(&b.metric.sketch_id))
}

fn property_matches(value: Option<&Value>, class_id: &str) -> bool {
    match value {
        Some(Value::String(s)) => s == class_id,
        Some(Value::Null) | None => false,
        Some(other) => other.to_string() == class_id,
    }
}

fn shape_error(group: &MetricGroup, message: &str) -> OverlapError {
    OverlapError::Shape {
        metric_id: group.metric_id.clone(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mpa_datasource::DatasourceError;
    use mpa_datasource_models::raster::{GeoTransform, Raster};
    use serde_json::json;

    use super::*;
    use crate::fake::{FakeEvaluator, FakeFetcher, feature, project, raster, square};

    const BASE: &str = "https://gp-reports-datasets.s3.us-west-1.amazonaws.com/";

    #[tokio::test]
    async fn per_class_vector_tags_and_sorts_by_datasource_then_display() {
        let fetcher = FakeFetcher::default()
            .with_features(&format!("{BASE}ebsa-b.fgb"), vec![feature(json!({}), true)])
            .with_features(
                &format!("{BASE}ebsa-a.json"),
                vec![feature(json!({}), true), feature(json!({}), true)],
            )
            // Finishes last, still sorted first.
            .with_delay(&format!("{BASE}ebsa-a.json"), Duration::from_millis(30));
        let project = project();
        let ctx = OverlapContext::new(&project, &fetcher, &FakeEvaluator);
        let sketch = SketchInput::from(square("s1", 0.0, 0.0));

        let metrics = ctx
            .run("ebsaAreaOverlap", OverlapShape::PerClassVector, FetchWindow::Project, &sketch)
            .await
            .unwrap();

        let summary: Vec<_> = metrics
            .iter()
            .map(|m| (m.metric_id.as_str(), m.class_id.as_deref().unwrap(), m.value))
            .collect();
        assert_eq!(
            summary,
            vec![("ebsaAreaOverlap", "a", 2.0), ("ebsaAreaOverlap", "b", 1.0)]
        );
        for (_, bbox) in fetcher.calls() {
            assert_eq!(bbox, [-10.0, -10.0, 10.0, 10.0]);
        }
    }

    #[tokio::test]
    async fn class_key_vector_splits_one_layer_and_drops_null_geometry() {
        let fetcher = FakeFetcher::default().with_features(
            &format!("{BASE}deepwater.fgb"),
            vec![
                feature(json!({"Draft name": "North"}), true),
                feature(json!({"Draft name": "South"}), true),
                feature(json!({"Draft name": "North"}), true),
                feature(json!({"Draft name": "North"}), false),
                feature(json!({}), true),
            ],
        );
        let project = project();
        let ctx = OverlapContext::new(&project, &fetcher, &FakeEvaluator);
        let sketch = SketchInput::from(square("s1", 1.0, 2.0));

        let metrics = ctx
            .run(
                "deepwaterRegionAreaOverlap",
                OverlapShape::ClassKeyVector,
                FetchWindow::Sketch,
                &sketch,
            )
            .await
            .unwrap();

        let values: Vec<_> = metrics
            .iter()
            .map(|m| (m.class_id.as_deref().unwrap(), m.value))
            .collect();
        assert_eq!(values, vec![("North", 2.0), ("South", 1.0)]);
        assert_eq!(fetcher.calls(), vec![(format!("{BASE}deepwater.fgb"), [1.0, 2.0, 2.0, 3.0])]);
    }

    #[tokio::test]
    async fn per_class_raster_applies_datasource_no_data() {
        let fetcher = FakeFetcher::default()
            .with_raster(&format!("{BASE}gfw-trawl.tif"), raster(vec![1.0, 2.0, 3.0, 4.0]))
            .with_raster(&format!("{BASE}gfw-longline.tif"), raster(vec![10.0, -1.0, 0.5, 0.5]));
        let project = project();
        let ctx = OverlapContext::new(&project, &fetcher, &FakeEvaluator);
        let sketch = SketchInput::from(square("s1", 0.0, 0.0));

        let metrics = ctx
            .run("gfwValueOverlap", OverlapShape::PerClassRaster, FetchWindow::Sketch, &sketch)
            .await
            .unwrap();

        let values: Vec<_> = metrics
            .iter()
            .map(|m| (m.class_id.as_deref().unwrap(), m.value))
            .collect();
        assert_eq!(values, vec![("longline", 11.0), ("trawl", 10.0)]);
    }

    #[tokio::test]
    async fn per_class_raster_keeps_the_grid_no_data_marker() {
        let transform = GeoTransform {
            origin_x: 0.0,
            origin_y: 2.0,
            cell_width: 1.0,
            cell_height: 1.0,
        };
        let longline = Raster::new(2, 2, transform, Some(-9999.0), vec![-9999.0, -1.0, 2.0, 3.0]).unwrap();
        let fetcher = FakeFetcher::default()
            .with_raster(&format!("{BASE}gfw-trawl.tif"), raster(vec![0.0; 4]))
            .with_raster(&format!("{BASE}gfw-longline.tif"), longline);
        let project = project();
        let ctx = OverlapContext::new(&project, &fetcher, &FakeEvaluator);
        let sketch = SketchInput::from(square("s1", 0.0, 0.0));

        let metrics = ctx
            .run("gfwValueOverlap", OverlapShape::PerClassRaster, FetchWindow::Sketch, &sketch)
            .await
            .unwrap();

        let longline = metrics
            .iter()
            .find(|m| m.class_id.as_deref() == Some("longline"))
            .unwrap();
        assert_eq!(longline.value, 5.0);
    }

    #[tokio::test]
    async fn any_class_failure_fails_the_whole_metric() {
        let fetcher = FakeFetcher::default()
            .with_features(&format!("{BASE}ebsa-a.json"), vec![feature(json!({}), true)]);
        let project = project();
        let ctx = OverlapContext::new(&project, &fetcher, &FakeEvaluator);
        let sketch = SketchInput::from(square("s1", 0.0, 0.0));

        let err = ctx
            .run("ebsaAreaOverlap", OverlapShape::PerClassVector, FetchWindow::Project, &sketch)
            .await
            .unwrap_err();
        assert!(matches!(err, OverlapError::Fetch { .. }));
    }

    #[tokio::test]
    async fn unresolvable_groups_are_errors() {
        let fetcher = FakeFetcher::default();
        let project = project();
        let ctx = OverlapContext::new(&project, &fetcher, &FakeEvaluator);
        let sketch = SketchInput::from(square("s1", 0.0, 0.0));

        let err = ctx
            .run("ebsaAreaOverlap", OverlapShape::ClassKeyVector, FetchWindow::Sketch, &sketch)
            .await
            .unwrap_err();
        assert!(matches!(err, OverlapError::Shape { .. }));

        let err = ctx
            .run("missingDatasource", OverlapShape::PerClassVector, FetchWindow::Sketch, &sketch)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OverlapError::Project(ProjectError::Datasource(DatasourceError::NotFound { .. }))
        ));

        let err = ctx
            .run("nope", OverlapShape::PerClassVector, FetchWindow::Sketch, &sketch)
            .await
            .unwrap_err();
        assert!(matches!(err, OverlapError::Project(ProjectError::Metrics(_))));
        assert!(fetcher.calls().is_empty());
    }

    #[test]
    fn property_matching() {
        assert!(property_matches(Some(&json!("reef")), "reef"));
        assert!(property_matches(Some(&json!(3)), "3"));
        assert!(!property_matches(Some(&Value::Null), "null"));
        assert!(!property_matches(None, "reef"));
    }
}
