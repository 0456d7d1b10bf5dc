//! Settings management
//!
//! Stores user preferences in ~/.config/modscope/settings.json

use crate::catalog::DEFAULT_DEBOUNCE;
use crate::preview::{PipelineOptions, PREFETCH_THRESHOLD};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Batches larger than this prefetch a partition index
    pub prefetch_threshold: usize,

    /// Quiet time before a search edit rebuilds the tree
    pub search_debounce_ms: u64,

    /// Archive directory used when none is given on the command line
    pub archive_dir: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            prefetch_threshold: PREFETCH_THRESHOLD,
            search_debounce_ms: DEFAULT_DEBOUNCE.as_millis() as u64,
            archive_dir: String::new(),
        }
    }
}

impl Settings {
    /// Get the config directory path (~/.config/modscope)
    fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("modscope");

        Ok(config_dir)
    }

    fn settings_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("settings.json"))
    }

    /// Load settings from disk, or return defaults if not found
    pub fn load() -> Self {
        match Self::settings_path().and_then(|path| Self::load_from(&path)) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Could not load settings: {}. Using defaults.", e);
                Self::default()
            }
        }
    }

    /// Load from a specific file; a missing file gives defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;

        let settings: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {:?}", path))?;

        Ok(settings)
    }

    /// Save to ~/.config/modscope/settings.json
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::settings_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))?;

        Ok(())
    }

    pub fn archive_dir(&self) -> Option<PathBuf> {
        if self.archive_dir.is_empty() {
            None
        } else {
            Some(PathBuf::from(&self.archive_dir))
        }
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            prefetch_threshold: self.prefetch_threshold,
        }
    }
}
