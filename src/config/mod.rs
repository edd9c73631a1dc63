//! Configuration module for Tessera
//!
//! This module handles the persistent application configuration:
//! - Scheduler limits (worker count, join grace period)
//! - Import fallbacks applied when a pipeline leaves them unset
//! - Default output directory for session archives and exports
//!
//! # Config Location
//!
//! The config file is stored in the platform-appropriate location:
//! - **Linux**: `~/.config/tessera/config.toml`
//! - **macOS**: `~/Library/Application Support/tessera/config.toml`
//! - **Windows**: `%APPDATA%\tessera\config.toml`
//!
//! CLI flags always win over file values; the file only supplies defaults.
//!
//! # Example
//!
//! ```ignore
//! use tessera::config::AppConfig;
//!
//! let mut config = AppConfig::load_or_default();
//! config.scheduler.max_workers = Some(4);
//! config.save()?;
//! ```

use crate::error::{Result, TesseraError};
use crate::pipeline::Settings;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application identifier for config directories
pub const APP_ID: &str = "tessera";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

/// Default grace period for joining worker threads, in milliseconds
pub const DEFAULT_JOIN_GRACE_MS: u64 = 2_000;

// ==================== Config Directory ====================

/// Get the application config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID))
}

/// Ensure the config directory exists
pub fn ensure_config_dir() -> Result<PathBuf> {
    let dir = config_dir().ok_or_else(|| {
        TesseraError::Config("Could not determine config directory".to_string())
    })?;

    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| {
            TesseraError::Config(format!("Failed to create config directory: {}", e))
        })?;
    }

    Ok(dir)
}

/// Get the path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join(CONFIG_FILE))
}

// ==================== Scheduler Config ====================

/// Limits for the task scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum number of concurrently running tasks.
    ///
    /// `None` sizes the scheduler from the machine: `max(2, cores - 1)`.
    #[serde(default)]
    pub max_workers: Option<usize>,

    /// How long completion handling and shutdown wait for a worker thread
    /// to finish before detaching it, in milliseconds
    #[serde(default = "default_join_grace_ms")]
    pub join_grace_ms: u64,
}

fn default_join_grace_ms() -> u64 {
    DEFAULT_JOIN_GRACE_MS
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_workers: None,
            join_grace_ms: DEFAULT_JOIN_GRACE_MS,
        }
    }
}

// ==================== Import Defaults ====================

/// Import normalization parameters used when the pipeline's import node
/// does not set them itself
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportDefaults {
    /// Translation subtracted from every vertex before scaling
    #[serde(default)]
    pub offset: [f32; 3],

    /// Uniform scale applied after the offset
    #[serde(default = "default_unit")]
    pub scale: f32,

    /// Sampling rate stamped on imported geometry
    #[serde(default = "default_unit")]
    pub sampling_rate: f32,
}

fn default_unit() -> f32 {
    1.0
}

impl Default for ImportDefaults {
    fn default() -> Self {
        Self {
            offset: [0.0; 3],
            scale: 1.0,
            sampling_rate: 1.0,
        }
    }
}

impl ImportDefaults {
    /// Fill missing import settings in place. Keys the pipeline already
    /// sets are left untouched.
    pub fn apply_to(&self, settings: &mut Settings) {
        settings
            .entry("offset".to_string())
            .or_insert_with(|| serde_json::json!(self.offset));
        settings
            .entry("scale".to_string())
            .or_insert_with(|| self.scale.into());
        settings
            .entry("sampling_rate".to_string())
            .or_insert_with(|| self.sampling_rate.into());
    }
}

// ==================== App Config ====================

/// Top-level application configuration, persisted as TOML
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Scheduler limits
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Import fallbacks
    #[serde(default)]
    pub import: ImportDefaults,

    /// Directory for session archives and exports when neither the CLI
    /// nor the pipeline names one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let path = config_path().ok_or_else(|| {
            TesseraError::Config("Could not determine config path".to_string())
        })?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| TesseraError::Config(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| TesseraError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load configuration, returning defaults on any error
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        let dir = ensure_config_dir()?;
        let path = dir.join(CONFIG_FILE);

        let content = toml::to_string_pretty(self)
            .map_err(|e| TesseraError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(&path, content)
            .map_err(|e| TesseraError::Config(format!("Failed to write config: {}", e)))
    }
}

// ==================== Tests ====================
