//! Configuration management

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

const APP_DIR_NAME: &str = "u-do";
const SETTINGS_FILE_NAME: &str = "settings.toml";
const TASKS_FILE_NAME: &str = "tasks.json";

/// Where U Do keeps its files
#[derive(Debug, Clone)]
pub struct Config {
    dir: PathBuf,
}

impl Config {
    /// Use the platform config directory
    pub fn load() -> Result<Self> {
        Self::at(Self::config_dir()?)
    }

    /// Use an explicit directory, creating it if needed
    pub fn at(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory {:?}", dir))?;
        Ok(Self { dir })
    }

    /// Get the config directory
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not find config directory")?;
        Ok(config_dir.join(APP_DIR_NAME))
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    pub fn settings_path(&self) -> PathBuf {
        self.dir.join(SETTINGS_FILE_NAME)
    }

    pub fn tasks_path(&self) -> PathBuf {
        self.dir.join(TASKS_FILE_NAME)
    }
}
