use crate::error::{EcsctlError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const CONFIG_DIR_NAME: &str = ".ecsctl";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(rename = "current-cluster", default)]
    current_cluster: Option<String>,

    /// Keys written by other tools or newer versions survive a rewrite.
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

/// The persisted cluster selection, stored as JSON under `~/.ecsctl`.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    config_file: PathBuf,
}

impl ClusterConfig {
    /// Open the store in `dir`, or `~/.ecsctl` when no directory is given.
    pub fn open(dir: Option<&Path>) -> Result<Self> {
        let config_dir = match dir {
            Some(dir) => dir.to_path_buf(),
            None => default_config_dir()?,
        };

        let config = Self {
            config_file: config_dir.join(CONFIG_FILE_NAME),
        };
        config.ensure_exists(&config_dir)?;
        Ok(config)
    }

    pub fn path(&self) -> &Path {
        &self.config_file
    }

    fn config_error(&self, reason: impl std::fmt::Display) -> EcsctlError {
        EcsctlError::Config {
            path: self.config_file.clone(),
            reason: reason.to_string(),
        }
    }

    fn ensure_exists(&self, config_dir: &Path) -> Result<()> {
        fs::create_dir_all(config_dir).map_err(|e| self.config_error(e))?;
        if !self.config_file.exists() {
            debug!("Creating config file {}", self.config_file.display());
            self.save(&ConfigFile::default())?;
        }
        Ok(())
    }

    fn load(&self) -> Result<ConfigFile> {
        let raw = fs::read_to_string(&self.config_file).map_err(|e| self.config_error(e))?;
        serde_json::from_str(&raw).map_err(|e| self.config_error(e))
    }

    fn save(&self, config: &ConfigFile) -> Result<()> {
        let json = serde_json::to_string_pretty(config).map_err(|e| self.config_error(e))?;
        fs::write(&self.config_file, json).map_err(|e| self.config_error(e))?;
        Ok(())
    }

    pub fn get_current_cluster(&self) -> Result<Option<String>> {
        Ok(self.load()?.current_cluster)
    }

    pub fn set_current_cluster(&self, cluster_name: &str) -> Result<()> {
        let mut config = self.load()?;
        config.current_cluster = Some(cluster_name.to_string());
        self.save(&config)
    }

    pub fn clear_current_cluster(&self) -> Result<()> {
        let mut config = self.load()?;
        config.current_cluster = None;
        self.save(&config)
    }

    /// The selected cluster, or `NoClusterSelected` when none is stored.
    pub fn require_current_cluster(&self) -> Result<String> {
        self.get_current_cluster()?
            .ok_or(EcsctlError::NoClusterSelected)
    }
}

fn default_config_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(CONFIG_DIR_NAME))
        .ok_or(EcsctlError::NoHomeDir)
}
