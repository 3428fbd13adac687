//! External GDAL and AWS CLI invocations.
//!
//! Everything that shells out lives behind [`ImportTool`] so the import
//! pipeline can run against a fake in tests. The argument builders are
//! plain functions and are tested directly.

use std::ffi::OsString;
use std::path::Path;

use async_trait::async_trait;
use mpa_datasource_models::SupportedFormat;
use tokio::process::Command;

use crate::PrecalcError;
use crate::config::ImportConfig;

/// Transforms source data into published artifacts and uploads them.
#[async_trait]
pub trait ImportTool: Send + Sync {
    /// Writes the `GeoJSON` artifact, plus `FlatGeobuf` when requested.
    ///
    /// # Errors
    ///
    /// Returns an error if a conversion fails.
    async fn gen_vector(&self, config: &ImportConfig) -> Result<(), PrecalcError>;

    /// Writes the COG artifact and the ASCII grid of the configured band.
    ///
    /// # Errors
    ///
    /// Returns an error if a conversion fails.
    async fn gen_raster(&self, config: &ImportConfig) -> Result<(), PrecalcError>;

    /// Uploads `file` to the root of `bucket`.
    ///
    /// # Errors
    ///
    /// Returns an error if the upload fails.
    async fn publish(&self, file: &Path, bucket: &str) -> Result<(), PrecalcError>;
}

/// [`ImportTool`] backed by `ogr2ogr`, `gdalwarp`, `gdal_translate`, and
/// `aws` on the `PATH`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GdalTool;

#[async_trait]
impl ImportTool for GdalTool {
    async fn gen_vector(&self, config: &ImportConfig) -> Result<(), PrecalcError> {
        let geojson = config.geojson_path();
        remove_if_exists(&geojson).await?;
        run("ogr2ogr", ogr2ogr_args(config, "GeoJSON", &geojson)).await?;
        log::info!("Wrote {}", geojson.display());

        if config.formats.contains(&SupportedFormat::Fgb) {
            let fgb = config.flatgeobuf_path();
            remove_if_exists(&fgb).await?;
            run("ogr2ogr", ogr2ogr_args(config, "FlatGeobuf", &fgb)).await?;
            log::info!("Wrote {}", fgb.display());
        }
        Ok(())
    }

    async fn gen_raster(&self, config: &ImportConfig) -> Result<(), PrecalcError> {
        let warp = config.warp_path();
        let result = warp_and_translate(config, &warp).await;
        let cleanup = remove_if_exists(&warp).await;
        result?;
        cleanup?;
        log::info!("Wrote {}", config.cog_path().display());
        Ok(())
    }

    async fn publish(&self, file: &Path, bucket: &str) -> Result<(), PrecalcError> {
        run("aws", publish_args(file, bucket)).await?;
        log::info!("Published {} to {bucket}", file.display());
        Ok(())
    }
}

/// OGR SQL selecting the kept properties (or all) from the source layer.
#[must_use]
pub fn ogr_sql(config: &ImportConfig) -> String {
    let columns = if config.properties_to_keep.is_empty() {
        "*".to_string()
    } else {
        config
            .properties_to_keep
            .iter()
            .map(|p| format!("\"{p}\""))
            .collect::<Vec<_>>()
            .join(",")
    };
    let layer = config.layer_name.as_deref().unwrap_or_default();
    format!("SELECT {columns} FROM \"{layer}\"")
}

/// `ogr2ogr` arguments reprojecting the source to EPSG:4326 in `driver`.
#[must_use]
pub fn ogr2ogr_args(config: &ImportConfig, driver: &str, dst: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-t_srs".into(), "EPSG:4326".into(), "-f".into(), driver.into()];
    if config.explode_multi {
        args.push("-explodecollections".into());
    }
    let query: [OsString; 6] = [
        "-dialect".into(),
        "OGRSQL".into(),
        "-sql".into(),
        ogr_sql(config).into(),
        dst.into(),
        config.options.src.clone().into(),
    ];
    args.extend(query);
    args
}

/// `gdalwarp` arguments reprojecting `src` to EPSG:4326.
#[must_use]
pub fn gdalwarp_args(src: &Path, dst: &Path) -> Vec<OsString> {
    vec!["-t_srs".into(), "EPSG:4326".into(), src.into(), dst.into()]
}

/// `gdal_translate` arguments writing a cloud-optimized `GeoTIFF`.
#[must_use]
pub fn cog_args(src: &Path, dst: &Path) -> Vec<OsString> {
    vec![
        "-r".into(),
        "nearest".into(),
        "-of".into(),
        "COG".into(),
        "-stats".into(),
        src.into(),
        dst.into(),
    ]
}

/// `gdal_translate` arguments writing one band as an ESRI ASCII grid.
#[must_use]
pub fn ascii_grid_args(src: &Path, dst: &Path, band: u32) -> Vec<OsString> {
    vec![
        "-of".into(),
        "AAIGrid".into(),
        "-b".into(),
        band.to_string().into(),
        src.into(),
        dst.into(),
    ]
}

/// `aws s3 cp` arguments uploading `file` to the bucket root.
#[must_use]
pub fn publish_args(file: &Path, bucket: &str) -> Vec<OsString> {
    vec![
        "s3".into(),
        "cp".into(),
        file.into(),
        format!("s3://{bucket}/").into(),
    ]
}

/// Reprojects into `warp`, then derives the COG and the ASCII grid from it.
async fn warp_and_translate(config: &ImportConfig, warp: &Path) -> Result<(), PrecalcError> {
    run("gdalwarp", gdalwarp_args(&config.options.src, warp)).await?;
    run("gdal_translate", cog_args(warp, &config.cog_path())).await?;
    run(
        "gdal_translate",
        ascii_grid_args(warp, &config.ascii_grid_path(), config.band),
    )
    .await
}

async fn remove_if_exists(path: &Path) -> Result<(), PrecalcError> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

async fn run(program: &str, args: Vec<OsString>) -> Result<(), PrecalcError> {
    log::debug!("Running {program} {args:?}");
    let output = Command::new(program).args(&args).output().await?;
    if !output.status.success() {
        return Err(PrecalcError::Tool {
            command: program.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ImportOptions, gen_config};
    use crate::fake::temp_dir;

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn vector_args_select_kept_properties() {
        let mut options = ImportOptions::vector("eez", "src/eez.shp");
        options.class_keys = vec!["ZONE".to_string()];
        options.properties_to_keep = vec!["NAME".to_string()];
        let config = gen_config(options, Path::new("dist")).unwrap();

        assert_eq!(ogr_sql(&config), "SELECT \"NAME\",\"ZONE\" FROM \"eez\"");
        assert_eq!(
            strings(&ogr2ogr_args(&config, "GeoJSON", &config.geojson_path())),
            vec![
                "-t_srs",
                "EPSG:4326",
                "-f",
                "GeoJSON",
                "-explodecollections",
                "-dialect",
                "OGRSQL",
                "-sql",
                "SELECT \"NAME\",\"ZONE\" FROM \"eez\"",
                "dist/eez.json",
                "src/eez.shp",
            ]
        );
    }

    #[test]
    fn vector_args_without_explode_or_properties() {
        let mut options = ImportOptions::vector("eez", "src/eez.gpkg");
        options.explode_multi = Some(false);
        options.layer_name = Some("zones".to_string());
        let config = gen_config(options, Path::new("dist")).unwrap();

        assert_eq!(ogr_sql(&config), "SELECT * FROM \"zones\"");
        let args = strings(&ogr2ogr_args(&config, "FlatGeobuf", &config.flatgeobuf_path()));
        assert!(!args.contains(&"-explodecollections".to_string()));
        assert_eq!(args[3], "FlatGeobuf");
    }

    #[test]
    fn raster_and_publish_args() {
        let src = Path::new("src/effort.tif");
        let warp = Path::new("dist/effort_4326.tif");
        assert_eq!(
            strings(&gdalwarp_args(src, warp)),
            vec!["-t_srs", "EPSG:4326", "src/effort.tif", "dist/effort_4326.tif"]
        );
        assert_eq!(
            strings(&cog_args(warp, Path::new("dist/effort.tif"))),
            vec!["-r", "nearest", "-of", "COG", "-stats", "dist/effort_4326.tif", "dist/effort.tif"]
        );
        assert_eq!(
            strings(&ascii_grid_args(warp, Path::new("dist/effort.asc"), 2)),
            vec!["-of", "AAIGrid", "-b", "2", "dist/effort_4326.tif", "dist/effort.asc"]
        );
        assert_eq!(
            strings(&publish_args(Path::new("dist/effort.tif"), "gp-reports-datasets")),
            vec!["s3", "cp", "dist/effort.tif", "s3://gp-reports-datasets/"]
        );
    }

    #[tokio::test]
    async fn failed_raster_generation_removes_the_warp_file() {
        let dir = temp_dir("mpa_gdal");
        std::fs::create_dir_all(&dir).unwrap();
        let config = gen_config(
            ImportOptions::raster("effort", dir.join("missing-source.tif")),
            &dir,
        )
        .unwrap();
        std::fs::write(config.warp_path(), b"stale").unwrap();

        assert!(GdalTool.gen_raster(&config).await.is_err());
        assert!(!config.warp_path().exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
