//! Engine configuration and defaults.
//!
//! Stored as `fxproject.json` in the config directory resolved by
//! [`crate::paths`]. Every field is optional on disk; missing ones fall back to
//! the constants below.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::entities::project::Dimensions;

/// Config file name inside the config directory
pub const CONFIG_FILE_NAME: &str = "fxproject.json";

/// Maximum commands kept on the undo stack
pub const DEFAULT_HISTORY_LIMIT: usize = 50;
/// Maximum events kept in the bus history log
pub const DEFAULT_EVENT_HISTORY_LIMIT: usize = 1000;

/// Center tolerance as a fraction of the matching canvas axis
pub const DEFAULT_CENTER_TOLERANCE: f64 = 0.01;
/// Center tolerance used when no canvas dimensions are known
pub const FALLBACK_CENTER_TOLERANCE: f64 = 0.05;
/// Smallest radius an ArcPath may be scaled down to
pub const MIN_ARC_RADIUS: f64 = 10.0;
/// Canvas that effect default configs are authored against
pub const REFERENCE_CANVAS: Dimensions = Dimensions::new(1920, 1080);

/// Geometry engine tuning.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CenterConfig {
    pub tolerance: f64,
    pub fallback_tolerance: f64,
    pub min_arc_radius: f64,
    pub reference_canvas: Dimensions,
}

impl Default for CenterConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_CENTER_TOLERANCE,
            fallback_tolerance: FALLBACK_CENTER_TOLERANCE,
            min_arc_radius: MIN_ARC_RADIUS,
            reference_canvas: REFERENCE_CANVAS,
        }
    }
}

/// Top-level engine settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub history_limit: usize,
    pub event_history_limit: usize,
    pub center: CenterConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            event_history_limit: DEFAULT_EVENT_HISTORY_LIMIT,
            center: CenterConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load settings from `path`. A missing file yields defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let json = fs::read_to_string(path).with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: EngineConfig =
            serde_json::from_str(&json).with_context(|| format!("Failed to parse config: {}", path.display()))?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, json).with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }
}
