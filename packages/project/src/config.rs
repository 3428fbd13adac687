//! Tool configuration read from an optional `mpa.toml` at the project root.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ProjectError;

/// Name of the optional configuration file at the project root.
pub const CONFIG_FILE_NAME: &str = "mpa.toml";

/// Environment variable forcing local data URLs when set to `1` or `true`.
pub const SERVE_LOCAL_ENV: &str = "MPA_SERVE_LOCAL";

/// Paths and URL settings shared by the CLI and the project facade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolConfig {
    /// Directory holding `datasources.json`, `metrics.json`,
    /// `objectives.json`, and `project.json`.
    pub config_dir: PathBuf,
    /// Directory receiving transformed datasource artifacts.
    pub dst_path: PathBuf,
    /// Port of the local data server.
    pub local_port: u16,
    /// Whether published data is read from the local data server.
    pub serve_local: bool,
    /// Overrides `<config_dir>/datasources.json`.
    pub datasources_path: Option<PathBuf>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from("config"),
            dst_path: PathBuf::from("data/dist"),
            local_port: 8080,
            serve_local: false,
            datasources_path: None,
        }
    }
}

impl ToolConfig {
    /// Loads `mpa.toml` from `project_root` if present, resolves relative
    /// paths against `project_root`, and applies [`SERVE_LOCAL_ENV`].
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::Io`] if the file exists but cannot be read,
    /// or [`ProjectError::Toml`] if it is malformed.
    pub fn load(project_root: &Path) -> Result<Self, ProjectError> {
        let path = project_root.join(CONFIG_FILE_NAME);
        let config = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            toml::from_str::<Self>(&contents)?
        } else {
            log::debug!("No {CONFIG_FILE_NAME} in {}, using defaults", project_root.display());
            Self::default()
        };
        Ok(config
            .resolve_against(project_root)
            .with_serve_local_env(std::env::var(SERVE_LOCAL_ENV).ok().as_deref()))
    }

    /// Makes every relative path absolute under `root`.
    #[must_use]
    pub fn resolve_against(mut self, root: &Path) -> Self {
        self.config_dir = join_relative(root, self.config_dir);
        self.dst_path = join_relative(root, self.dst_path);
        self.datasources_path = self.datasources_path.map(|p| join_relative(root, p));
        self
    }

    /// Forces local URLs when `value` is `1` or `true`.
    #[must_use]
    pub fn with_serve_local_env(mut self, value: Option<&str>) -> Self {
        if matches!(value, Some("1" | "true")) {
            self.serve_local = true;
        }
        self
    }

    /// Path of the datasources registry.
    #[must_use]
    pub fn datasources_path(&self) -> PathBuf {
        self.datasources_path
            .clone()
            .unwrap_or_else(|| self.config_dir.join("datasources.json"))
    }

    /// Path of the metric groups file.
    #[must_use]
    pub fn metrics_path(&self) -> PathBuf {
        self.config_dir.join("metrics.json")
    }

    /// Path of the objectives file.
    #[must_use]
    pub fn objectives_path(&self) -> PathBuf {
        self.config_dir.join("objectives.json")
    }

    /// Path of the project metadata file.
    #[must_use]
    pub fn project_path(&self) -> PathBuf {
        self.config_dir.join("project.json")
    }
}

fn join_relative(root: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() { path } else { root.join(path) }
}
