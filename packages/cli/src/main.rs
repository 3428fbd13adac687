#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `mpa`: import, reimport, and inspect report datasources.
//!
//! Uses `indicatif-log-bridge` (via [`mpa_cli_utils::init_logger`]) so log lines
//! and progress bars never fight for the terminal.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mpa_cli_utils::{MultiProgress, ReimportBar, import_spinner};
use mpa_datasource::DatasourceStore;
use mpa_datasource_models::{GeoType, MeasurementType, StatName, SupportedFormat};
use mpa_precalc::{GdalTool, ImportOptions, import_datasource, reimport_datasources};
use mpa_project::{ProjectClient, ProjectError, ProjectMetadata, ToolConfig};

#[derive(Parser)]
#[command(name = "mpa", about = "MPA report datasource tool")]
struct Cli {
    /// Project root containing `mpa.toml` and the config directory
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,
    /// Datasources registry file (overrides `mpa.toml`)
    #[arg(long, global = true)]
    datasources: Option<PathBuf>,
    /// Output directory for transformed artifacts (overrides `mpa.toml`)
    #[arg(long, global = true)]
    dst: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import one datasource and precalculate its stats
    Import {
        /// Source file
        #[arg(long)]
        src: PathBuf,
        /// Id of the new datasource
        #[arg(long)]
        id: String,
        /// `vector` or `raster`
        #[arg(long)]
        geo_type: GeoType,
        /// Comma-separated properties to generate class stats for
        #[arg(long, value_delimiter = ',')]
        class_keys: Vec<String>,
        /// Comma-separated vector properties to keep
        #[arg(long, value_delimiter = ',')]
        properties: Vec<String>,
        /// Comma-separated formats to publish
        #[arg(long, value_delimiter = ',')]
        formats: Vec<SupportedFormat>,
        /// Layer within the source file (defaults to the file name)
        #[arg(long)]
        layer: Option<String>,
        /// Raster band
        #[arg(long)]
        band: Option<u32>,
        /// Raster nodata value
        #[arg(long, allow_negative_numbers = true)]
        no_data: Option<f64>,
        /// `quantitative` or `categorical`
        #[arg(long)]
        measurement: Option<MeasurementType>,
        /// Internal vector datasource masking a quantitative raster sum
        #[arg(long)]
        filter_datasource: Option<String>,
        /// Keep multi-geometries intact
        #[arg(long)]
        no_explode: bool,
        /// Skip uploading to the datasets bucket
        #[arg(long)]
        no_publish: bool,
    },
    /// Regenerate artifacts and stats for every internal datasource
    Reimport {
        /// Skip uploading to the datasets bucket
        #[arg(long)]
        no_publish: bool,
    },
    /// List all datasources
    Datasources,
    /// Print the precalculated denominators of a metric group
    Precalc {
        /// Metric group id
        #[arg(long)]
        metric: String,
        /// `area`, `count`, or `sum`
        #[arg(long)]
        stat: StatName,
        /// Class key to read stats under
        #[arg(long)]
        class_key: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = mpa_cli_utils::init_logger()?;
    let cli = Cli::parse();

    let mut config = ToolConfig::load(&cli.root)?;
    if let Some(datasources) = cli.datasources {
        config.datasources_path = Some(datasources);
    }
    if let Some(dst) = cli.dst {
        config.dst_path = dst;
    }

    match cli.command {
        Commands::Import {
            src,
            id,
            geo_type,
            class_keys,
            properties,
            formats,
            layer,
            band,
            no_data,
            measurement,
            filter_datasource,
            no_explode,
            no_publish,
        } => {
            let options = ImportOptions {
                datasource_id: id,
                geo_type,
                src,
                class_keys,
                properties_to_keep: properties,
                formats: (!formats.is_empty()).then_some(formats),
                layer_name: layer,
                explode_multi: no_explode.then_some(false),
                band,
                no_data_value: no_data,
                measurement_type: measurement,
                filter_datasource,
            };
            import(&config, &multi, options, !no_publish).await?;
        }
        Commands::Reimport { no_publish } => reimport(&config, &multi, !no_publish).await?,
        Commands::Datasources => list_datasources(&config)?,
        Commands::Precalc {
            metric,
            stat,
            class_key,
        } => {
            let project = ProjectClient::load(&config)?;
            let group = project.get_metric_group(&metric)?;
            let metrics = project.get_precalc_metrics(group, stat, class_key.as_deref())?;
            println!("{:<30} {stat}", "CLASS");
            for m in &metrics {
                println!("{:<30} {}", m.class_id.as_deref().unwrap_or_default(), m.value);
            }
        }
    }

    Ok(())
}

/// Runs one import with a spinner and logs the resulting stats.
async fn import(
    config: &ToolConfig,
    multi: &MultiProgress,
    options: ImportOptions,
    publish: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let bucket = publish_bucket(config, publish)?;
    let spinner = import_spinner(multi, &options.datasource_id);

    let result = import_datasource(
        options,
        &GdalTool,
        &DatasourceStore::new(config.datasources_path()),
        &config.dst_path,
        bucket.as_deref(),
    )
    .await;
    spinner.finish_and_clear();

    let record = result?;
    log::info!(
        "Imported {} ({} formats, {} class keys)",
        record.datasource_id,
        record.formats.len(),
        record.key_stats.as_ref().map_or(0, |k| k.len().saturating_sub(1))
    );
    Ok(())
}

/// Reimports every internal datasource behind a progress bar.
///
/// # Errors
///
/// Returns an error if the registry cannot be read or any datasource
/// failed to reimport.
async fn reimport(
    config: &ToolConfig,
    multi: &MultiProgress,
    publish: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let bucket = publish_bucket(config, publish)?;
    let progress = ReimportBar::new(multi);
    let summary = reimport_datasources(
        &DatasourceStore::new(config.datasources_path()),
        &GdalTool,
        &config.dst_path,
        bucket.as_deref(),
        Some(&progress),
    )
    .await?;

    if summary.failed > 0 {
        return Err(format!("{} datasource(s) failed to reimport", summary.failed).into());
    }
    Ok(())
}

fn list_datasources(config: &ToolConfig) -> Result<(), Box<dyn std::error::Error>> {
    let datasources = DatasourceStore::new(config.datasources_path()).read()?;
    println!("{:<40} {:<10} {:<8} FORMATS", "ID", "KIND", "TYPE");
    println!("{}", "-".repeat(72));
    for ds in &datasources {
        let formats: Vec<&str> = ds.formats().iter().map(AsRef::as_ref).collect();
        println!(
            "{:<40} {:<10} {:<8} {}",
            ds.datasource_id(),
            ds.kind().as_ref(),
            ds.geo_type().as_ref(),
            formats.join(",")
        );
    }
    println!("\n{} datasources", datasources.len());
    Ok(())
}

/// The bucket to publish to, read from the project metadata when
/// publishing is enabled.
fn publish_bucket(config: &ToolConfig, publish: bool) -> Result<Option<String>, ProjectError> {
    if !publish {
        return Ok(None);
    }
    Ok(Some(ProjectMetadata::read(&config.project_path())?.bucket_name()))
}
