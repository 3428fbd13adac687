//! Single datasource import.

use std::path::Path;

use chrono::Utc;
use futures::future::try_join_all;
use mpa_datasource::DatasourceStore;
use mpa_datasource_models::{
    Datasource, GeoType, InternalDatasource, KeyStats, format_filename, geojson_filename,
};

use crate::PrecalcError;
use crate::config::{ImportConfig, ImportOptions, gen_config};
use crate::grid::read_ascii_grid;
use crate::raster::{gen_raster_key_stats, read_filter_mask};
use crate::tool::ImportTool;
use crate::vector::{gen_vector_key_stats, read_feature_collection};

/// Imports one datasource end to end and upserts its registry record.
///
/// Generates artifacts into `dst_path` with `tool`, computes key stats from
/// the local artifacts, uploads every requested format to `bucket` (all
/// formats concurrently; skipped when `bucket` is `None`), then writes the
/// record with fresh timestamps. Re-importing an existing id keeps its
/// `created` timestamp.
///
/// # Errors
///
/// Returns the first failure of any step. The registry is only written
/// when every step succeeded.
pub async fn import_datasource(
    options: ImportOptions,
    tool: &dyn ImportTool,
    store: &DatasourceStore,
    dst_path: &Path,
    bucket: Option<&str>,
) -> Result<InternalDatasource, PrecalcError> {
    let config = gen_config(options, dst_path)?;
    tokio::fs::create_dir_all(&config.dst_path).await?;

    let key_stats = match config.options.geo_type {
        GeoType::Vector => {
            tool.gen_vector(&config).await?;
            let collection = read_feature_collection(&config.geojson_path())?;
            gen_vector_key_stats(&collection, &config.options.class_keys)?
        }
        GeoType::Raster => gen_raster(&config, tool, store).await?,
    };
    log::info!("Stats calculated for {}", config.datasource_id());

    match bucket {
        Some(bucket) => publish(&config, tool, bucket).await?,
        None => log::info!("Publish disabled"),
    }

    let record = to_record(&config, key_stats);
    let datasources = store.create_or_update(Datasource::Internal(record))?;
    Ok(datasources
        .get_internal_by_id(config.datasource_id())?
        .clone())
}

async fn gen_raster(
    config: &ImportConfig,
    tool: &dyn ImportTool,
    store: &DatasourceStore,
) -> Result<KeyStats, PrecalcError> {
    let mask_path = match &config.options.filter_datasource {
        Some(filter_id) => {
            store.read()?.get_internal_vector_by_id(filter_id)?;
            let path = config.dst_path.join(geojson_filename(filter_id));
            if !path.exists() {
                return Err(PrecalcError::UnsupportedDatasource {
                    id: filter_id.clone(),
                    message: format!("no local GeoJSON at {}, import it first", path.display()),
                });
            }
            Some(path)
        }
        None => None,
    };

    tool.gen_raster(config).await?;
    let raster = read_ascii_grid(&config.ascii_grid_path())?.with_no_data(config.options.no_data_value);
    let mask = mask_path.as_deref().map(read_filter_mask).transpose()?;

    Ok(gen_raster_key_stats(
        &raster,
        config.measurement_type,
        &config.options.class_keys,
        mask.as_ref(),
    ))
}

async fn publish(config: &ImportConfig, tool: &dyn ImportTool, bucket: &str) -> Result<(), PrecalcError> {
    let files: Vec<_> = config
        .formats
        .iter()
        .filter_map(|format| format_filename(config.datasource_id(), *format))
        .map(|name| config.dst_path.join(name))
        .collect();
    try_join_all(files.iter().map(|file| tool.publish(file, bucket))).await?;
    Ok(())
}

fn to_record(config: &ImportConfig, key_stats: KeyStats) -> InternalDatasource {
    let now = Utc::now();
    let options = &config.options;
    let is_raster = options.geo_type == GeoType::Raster;

    InternalDatasource {
        datasource_id: options.datasource_id.clone(),
        geo_type: options.geo_type,
        class_keys: options.class_keys.clone(),
        formats: config.formats.clone(),
        key_stats: Some(key_stats),
        no_data_value: options.no_data_value,
        layer_name: if is_raster { None } else { config.layer_name.clone() },
        band: is_raster.then_some(config.band),
        measurement_type: is_raster.then_some(config.measurement_type),
        filter_datasource: options.filter_datasource.clone(),
        src: options.src.to_string_lossy().into_owned(),
        properties_to_keep: config.properties_to_keep.clone(),
        explode_multi: if is_raster { None } else { options.explode_multi },
        created: now,
        last_updated: now,
    }
}
