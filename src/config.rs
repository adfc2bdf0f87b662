use crate::directory::{DirectoryParser, AUDIO_EXTENSIONS, DEFAULT_SKIP_FOLDERS};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration loaded from ~/.config/audiobookscan/config.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub parser: ParserConfig,
    #[serde(default)]
    pub scan: ScanConfig,
}

/// Configuration for directory name parsing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Split "Title - Subtitle" folder names into title and subtitle
    #[serde(default)]
    pub split_subtitles: bool,

    /// Folder names ignored while reading a path
    #[serde(default = "default_skip_folders")]
    pub skip_folders: Vec<String>,
}

/// Configuration for library scans
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Files decoded at once (default: 4)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// File extensions treated as audio, without the dot
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

fn default_skip_folders() -> Vec<String> {
    DEFAULT_SKIP_FOLDERS.iter().map(|s| s.to_string()).collect()
}

fn default_workers() -> usize {
    4
}

fn default_extensions() -> Vec<String> {
    AUDIO_EXTENSIONS.iter().map(|s| s.to_string()).collect()
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            split_subtitles: false,
            skip_folders: default_skip_folders(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            extensions: default_extensions(),
        }
    }
}

impl Config {
    /// Load configuration from the default path (~/.config/audiobookscan/config.toml)
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;

        toml::from_str(&content).with_context(|| format!("Failed to parse {:?}", path))
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not determine config directory")?;
        Ok(config_dir.join("audiobookscan").join("config.toml"))
    }

    /// Whether to split subtitles; the CLI flag can only turn it on
    pub fn split_subtitles(&self, cli_flag: bool) -> bool {
        cli_flag || self.parser.split_subtitles
    }

    /// Get the worker count, with CLI override taking precedence
    pub fn workers(&self, cli_override: Option<usize>) -> usize {
        cli_override.unwrap_or(self.scan.workers).max(1)
    }

    /// Build a directory parser from the parser section
    pub fn directory_parser(&self, cli_split_subtitles: bool) -> DirectoryParser {
        DirectoryParser::new(
            self.split_subtitles(cli_split_subtitles),
            self.parser.skip_folders.clone(),
        )
    }
}
