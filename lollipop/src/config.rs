// src/config.rs

use crate::helper_functions::project_root;
use anyhow::{Context, Result};
use protein_retriever::api_handler::{DEFAULT_ORGANISM, UNIPROT_REST_URL};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const CONFIG_FILE_NAME: &str = "lollipop.json";

/// Settings read from `lollipop.json`. Every field has a default, so an empty
/// object (or no file at all) is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LollipopConfig {
    pub uniprot_base_url: String,
    pub organism: String,
    pub cache_dir: Option<PathBuf>,
    pub auto_retrieve: bool,
    pub max_rate_limit_attempts: u32,
    pub timeout_secs: Option<u64>,
    pub plot: PlotConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotConfig {
    pub width: u32,
    pub height: u32,
    pub title_font_size: u32,
    /// How many of the tallest lollipops get their protein change printed.
    pub max_labels: usize,
}

impl Default for LollipopConfig {
    fn default() -> Self {
        Self {
            uniprot_base_url: UNIPROT_REST_URL.to_string(),
            organism: DEFAULT_ORGANISM.to_string(),
            cache_dir: None,
            auto_retrieve: true,
            max_rate_limit_attempts: 3,
            timeout_secs: None,
            plot: PlotConfig::default(),
        }
    }
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            width: 1400,
            height: 600,
            title_font_size: 26,
            max_labels: 10,
        }
    }
}

impl LollipopConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// `explicit` if given, else `$PROJECT_ROOT/lollipop.json` when present,
    /// else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            info!("Loading configuration from {}", path.display());
            return Self::from_file(path);
        }

        let candidate = project_root().join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            info!("Loading configuration from {}", candidate.display());
            Self::from_file(&candidate)
        } else {
            Ok(Self::default())
        }
    }
}
