//! The project's report overlap functions.

use std::future::Future;
use std::time::Duration;

use mpa_metrics_models::Metric;
use serde::Serialize;

use crate::OverlapError;
use crate::orchestrate::{FetchWindow, OverlapContext, OverlapShape};
use crate::sketch::{NullSketch, SketchInput};

/// What a report function returns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportResult {
    /// Class-tagged metrics in deterministic order.
    pub metrics: Vec<Metric>,
    /// The input sketch without geometry.
    pub sketch: NullSketch,
}

/// A named overlap function bound to one metric group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlapFunction {
    /// Function title.
    pub title: &'static str,
    /// Metric group evaluated.
    pub metric_id: &'static str,
    /// How classes map onto layers.
    pub shape: OverlapShape,
    /// Area each layer is fetched for.
    pub window: FetchWindow,
    /// Wall-clock limit.
    pub timeout: Duration,
}

const fn function(
    title: &'static str,
    shape: OverlapShape,
    window: FetchWindow,
    timeout_secs: u64,
) -> OverlapFunction {
    OverlapFunction {
        title,
        metric_id: title,
        shape,
        window,
        timeout: Duration::from_secs(timeout_secs),
    }
}

/// Every report overlap function.
pub const OVERLAP_FUNCTIONS: &[OverlapFunction] = &[
    function("boundaryAreaOverlap", OverlapShape::PerClassVector, FetchWindow::Project, 40),
    function("ebsaAreaOverlap", OverlapShape::PerClassVector, FetchWindow::Project, 40),
    function("ibaAreaOverlap", OverlapShape::PerClassVector, FetchWindow::Project, 40),
    function("deepwaterRegionAreaOverlap", OverlapShape::ClassKeyVector, FetchWindow::Sketch, 40),
    function("sumaAreaOverlap", OverlapShape::ClassKeyVector, FetchWindow::Sketch, 40),
    function("gfwValueOverlap", OverlapShape::PerClassRaster, FetchWindow::Sketch, 120),
    function("ousValueOverlap", OverlapShape::PerClassRaster, FetchWindow::Sketch, 120),
];

/// Looks up an overlap function by title.
#[must_use]
pub fn find_overlap_function(title: &str) -> Option<&'static OverlapFunction> {
    OVERLAP_FUNCTIONS.iter().find(|f| f.title == title)
}

impl OverlapFunction {
    /// Runs the function against `sketch` under its timeout.
    ///
    /// # Errors
    ///
    /// Returns [`OverlapError::Timeout`] if the limit is exceeded, or any
    /// error from the computation.
    pub async fn run(&self, ctx: OverlapContext<'_>, sketch: &SketchInput) -> Result<ReportResult, OverlapError> {
        log::info!("Running {} for sketch {}", self.title, sketch.id());
        run_with_timeout(self.title, self.timeout, async {
            let metrics = ctx.run(self.metric_id, self.shape, self.window, sketch).await?;
            Ok(ReportResult {
                metrics,
                sketch: sketch.to_null_sketch(),
            })
        })
        .await
    }
}

/// Awaits `future` for at most `timeout`. On timeout the computation is
/// dropped and nothing partial is returned.
///
/// # Errors
///
/// Returns [`OverlapError::Timeout`] on expiry, otherwise the future's own
/// result.
pub async fn run_with_timeout<T, F>(title: &str, timeout: Duration, future: F) -> Result<T, OverlapError>
where
    F: Future<Output = Result<T, OverlapError>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => {
            log::error!("{title} timed out after {}s", timeout.as_secs());
            Err(OverlapError::Timeout {
                title: title.to_string(),
                seconds: timeout.as_secs(),
            })
        }
    }
}
