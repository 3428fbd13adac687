#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal output for the `mpa` tool.
//!
//! [`init_logger`] routes `log` output through `indicatif-log-bridge` so log
//! lines are printed above the live bars instead of through them.
//! [`ReimportBar`] renders a batch reimport and [`import_spinner`] a single
//! import.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use mpa_precalc::{ReimportProgress, ReimportSummary};

pub use indicatif::MultiProgress;

const TICK: Duration = Duration::from_millis(100);

/// One bar over the internal datasources of a reimport. The prefix counts
/// failures so far, the message names the datasource in flight.
pub struct ReimportBar {
    bar: ProgressBar,
    failed: AtomicUsize,
}

impl ReimportBar {
    /// Adds a reimport bar to `multi`. It spins until the batch reports how
    /// many datasources it will process.
    #[must_use]
    pub fn new(multi: &MultiProgress) -> Self {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(TICK);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} Reading datasources registry")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        Self {
            bar,
            failed: AtomicUsize::new(0),
        }
    }
}

impl ReimportProgress for ReimportBar {
    fn started(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_prefix("Reimporting");
        self.bar.set_style(
            ProgressStyle::with_template(
                "{prefix:.bold} {wide_bar:.green/dim} {pos}/{len} {msg} [{elapsed_precise}]",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
        );
    }

    fn datasource_started(&self, id: &str) {
        self.bar.set_message(id.to_string());
    }

    fn datasource_finished(&self, _id: &str, succeeded: bool) {
        if !succeeded {
            let failed = self.failed.fetch_add(1, Ordering::Relaxed) + 1;
            self.bar.set_prefix(format!("Reimporting ({failed} failed)"));
        }
        self.bar.inc(1);
    }

    fn finished(&self, summary: &ReimportSummary) {
        self.bar.finish_with_message(summary.to_string());
    }
}

/// A spinner shown while `datasource_id` is imported. Clear it with
/// [`ProgressBar::finish_and_clear`] once the import returns.
#[must_use]
pub fn import_spinner(multi: &MultiProgress, datasource_id: &str) -> ProgressBar {
    let spinner = multi.add(ProgressBar::new_spinner());
    spinner.enable_steady_tick(TICK);
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.yellow} Importing {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(datasource_id.to_string());
    spinner
}

/// Installs the global logger and returns the [`MultiProgress`] every bar
/// must be added to.
///
/// The `mpa` crates log at `info` and everything else at `warn`, unless
/// `RUST_LOG` says otherwise.
///
/// # Errors
///
/// Returns an error if a global logger is already installed.
pub fn init_logger() -> Result<MultiProgress, log::SetLoggerError> {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .filter_level(log::LevelFilter::Warn)
        .filter_module("mpa", log::LevelFilter::Info)
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger).try_init()?;
    log::set_max_level(level);

    Ok(multi)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hidden_bar() -> ReimportBar {
        let multi = MultiProgress::with_draw_target(indicatif::ProgressDrawTarget::hidden());
        ReimportBar::new(&multi)
    }

    #[test]
    fn reimport_bar_tracks_position_and_failures() {
        let bar = hidden_bar();
        bar.started(3);
        for (id, ok) in [("eez", true), ("habitat", false), ("reefs", true)] {
            bar.datasource_started(id);
            bar.datasource_finished(id, ok);
        }

        assert_eq!(bar.bar.length(), Some(3));
        assert_eq!(bar.bar.position(), 3);
        assert_eq!(bar.bar.prefix(), "Reimporting (1 failed)");
        assert_eq!(bar.bar.message(), "reefs");

        bar.finished(&ReimportSummary {
            updated: 2,
            failed: 1,
            skipped: 2,
        });
        assert!(bar.bar.is_finished());
        assert_eq!(bar.bar.message(), "2 datasources updated, 1 failed, 2 skipped");
    }
}
