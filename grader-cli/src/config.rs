use std::path::Path;

use anyhow::{Context, Result};
use grader_core::AnalysisConfig;
use serde::Deserialize;

/// Application configuration loaded from an optional TOML file.
/// All fields have sensible defaults; a file only names what it changes.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Pitch, onset and segmentation parameters.
    pub analysis: AnalysisConfig,
    /// HTTP adapter settings.
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP adapter binds to.
    pub listen_addr: String,
    /// Largest accepted request body. Raw audio as JSON is bulky.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8000".to_string(),
            max_body_bytes: 64 * 1024 * 1024,
        }
    }
}

impl AppConfig {
    /// Load config from `path`, or defaults when no path is given.
    /// An explicit path that cannot be read or parsed is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            log::debug!("No config file given, using defaults");
            return Ok(Self::default());
        };
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = Self::parse(&contents)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.analysis.validate()?;
        Ok(config)
    }
}
