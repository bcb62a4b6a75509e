use crate::accumulator::MergeStrategy;
use crate::pivot::PivotRequest;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    pub pivot: Option<PivotRequest>,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    /// CSV exports, merged in this order.
    pub files: Vec<PathBuf>,
    /// Keep only these columns from every file.
    pub columns: Option<Vec<String>>,
    #[serde(default)]
    pub merge_strategy: MergeStrategy,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    pub pivot_image: Option<PathBuf>,
    pub density_image: Option<PathBuf>,
    pub cell_size: u32,
    pub map_zoom: u8,
    pub map_size: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            pivot_image: None,
            density_image: None,
            cell_size: 48,
            map_zoom: 13,
            map_size: 768,
        }
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)
            .with_context(|| "Failed to parse TOML configuration")?;
        Ok(config)
    }
}
