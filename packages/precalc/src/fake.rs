//! In-memory [`ImportTool`] for tests.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use mpa_datasource_models::SupportedFormat;

use crate::PrecalcError;
use crate::config::ImportConfig;
use crate::tool::ImportTool;

pub const HABITAT_GEOJSON: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {"type": "Feature", "properties": {"type": "reef"},
     "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]]}},
    {"type": "Feature", "properties": {"type": "kelp"},
     "geometry": {"type": "Polygon", "coordinates": [[[2,0],[3,0],[3,1],[2,1],[2,0]]]}},
    {"type": "Feature", "properties": {"type": "reef"},
     "geometry": {"type": "Polygon", "coordinates": [[[4,0],[5,0],[5,1],[4,1],[4,0]]]}}
  ]
}"#;

/// Two by two grid, one nodata cell, values summing to 6.
pub const EFFORT_GRID: &str = "ncols 2\nnrows 2\nxllcorner 0\nyllcorner 0\ncellsize 1\n\
                               NODATA_value -9999\n1 2\n-9999 3\n";

/// Writes fixed artifacts and records uploads. Generation fails for the
/// datasource ids in `failing`.
pub struct FakeTool {
    pub failing: Vec<String>,
    pub geojson: String,
    pub grid: String,
    pub published: Mutex<Vec<(PathBuf, String)>>,
}

impl Default for FakeTool {
    fn default() -> Self {
        Self {
            failing: Vec::new(),
            geojson: HABITAT_GEOJSON.to_string(),
            grid: EFFORT_GRID.to_string(),
            published: Mutex::new(Vec::new()),
        }
    }
}

impl FakeTool {
    pub fn failing(ids: &[&str]) -> Self {
        Self {
            failing: ids.iter().map(ToString::to_string).collect(),
            ..Self::default()
        }
    }

    pub fn published_files(&self) -> Vec<String> {
        let mut files: Vec<String> = self
            .published
            .lock()
            .unwrap()
            .iter()
            .map(|(path, _)| path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        files.sort();
        files
    }

    fn check(&self, config: &ImportConfig) -> Result<(), PrecalcError> {
        if self.failing.iter().any(|id| id == config.datasource_id()) {
            return Err(PrecalcError::Tool {
                command: "ogr2ogr".to_string(),
                status: "exit status: 1".to_string(),
                stderr: format!("Unable to open datasource {}", config.options.src.display()),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ImportTool for FakeTool {
    async fn gen_vector(&self, config: &ImportConfig) -> Result<(), PrecalcError> {
        self.check(config)?;
        tokio::fs::write(config.geojson_path(), &self.geojson).await?;
        if config.formats.contains(&SupportedFormat::Fgb) {
            tokio::fs::write(config.flatgeobuf_path(), b"fgb").await?;
        }
        Ok(())
    }

    async fn gen_raster(&self, config: &ImportConfig) -> Result<(), PrecalcError> {
        self.check(config)?;
        tokio::fs::write(config.ascii_grid_path(), &self.grid).await?;
        tokio::fs::write(config.cog_path(), b"cog").await?;
        Ok(())
    }

    async fn publish(&self, file: &Path, bucket: &str) -> Result<(), PrecalcError> {
        self.published
            .lock()
            .unwrap()
            .push((file.to_path_buf(), bucket.to_string()));
        Ok(())
    }
}

pub fn temp_dir(prefix: &str) -> PathBuf {
    std::env::temp_dir().join(format!("{prefix}_{}", uuid::Uuid::new_v4()))
}
