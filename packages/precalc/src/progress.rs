//! Observing a batch reimport while it runs.

use crate::reimport::ReimportSummary;

/// Receives reimport lifecycle events, in order: [`started`](Self::started)
/// once, a `datasource_started`/`datasource_finished` pair per internal
/// datasource, then [`finished`](Self::finished) once.
pub trait ReimportProgress: Send + Sync {
    /// The batch is about to process `total` internal datasources.
    fn started(&self, total: usize);

    /// Datasource `id` is being regenerated.
    fn datasource_started(&self, id: &str);

    /// Datasource `id` is done. `succeeded` is false when its import failed
    /// and the batch moved on.
    fn datasource_finished(&self, id: &str, succeeded: bool);

    /// Every internal datasource has been attempted.
    fn finished(&self, summary: &ReimportSummary);
}
