//! Batch reimport of every internal datasource.

use std::path::Path;

use mpa_datasource::DatasourceStore;

use crate::PrecalcError;
use crate::config::ImportOptions;
use crate::import::import_datasource;
use crate::progress::ReimportProgress;
use crate::tool::ImportTool;

/// Outcome counts of a batch reimport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReimportSummary {
    /// Datasources regenerated and upserted.
    pub updated: usize,
    /// Datasources whose import failed.
    pub failed: usize,
    /// External datasources left alone.
    pub skipped: usize,
}

impl std::fmt::Display for ReimportSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} datasources updated, {} failed, {} skipped",
            self.updated, self.failed, self.skipped
        )
    }
}

/// Regenerates artifacts and key stats for every internal datasource.
///
/// Datasources are processed one at a time in registry order. A failing
/// datasource is logged and counted, and the batch moves on to the next.
///
/// # Errors
///
/// Returns an error only if the registry cannot be read up front.
pub async fn reimport_datasources(
    store: &DatasourceStore,
    tool: &dyn ImportTool,
    dst_path: &Path,
    bucket: Option<&str>,
    progress: Option<&dyn ReimportProgress>,
) -> Result<ReimportSummary, PrecalcError> {
    let datasources = store.read()?;
    let mut summary = ReimportSummary {
        skipped: datasources.iter().filter(|ds| ds.is_external()).count(),
        ..ReimportSummary::default()
    };
    let internal: Vec<_> = datasources.internal().cloned().collect();

    if let Some(progress) = progress {
        progress.started(internal.len());
    }

    for ds in &internal {
        let id = &ds.datasource_id;
        log::info!("{id} reimport started");
        if let Some(progress) = progress {
            progress.datasource_started(id);
        }

        let succeeded = match import_datasource(ImportOptions::from(ds), tool, store, dst_path, bucket).await {
            Ok(_) => {
                log::info!("{id} reimport complete");
                summary.updated += 1;
                true
            }
            Err(e) => {
                log::error!("Updating datasource {id} failed, moving to next: {e}");
                summary.failed += 1;
                false
            }
        };

        if let Some(progress) = progress {
            progress.datasource_finished(id, succeeded);
        }
    }

    if let Some(progress) = progress {
        progress.finished(&summary);
    }
    log::info!("{summary}");
    Ok(summary)
}
