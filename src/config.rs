//! Editor Configuration
//!
//! Provides persistent controller settings with:
//! - Atomic file writes (temp file + rename)
//! - Schema validation with defaults
//!
//! Storage location is chosen by the embedding application.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{EditorError, EditorResult};
use crate::state::GapPolicy;
use crate::types::TimeSec;

/// Config schema version for migration support
pub const CONFIG_VERSION: u32 = 1;

/// Controller configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EditorConfig {
    /// Schema version for migrations
    #[serde(default = "default_version")]
    pub version: u32,

    /// Frame rate assumed when the media resource cannot report one
    #[serde(default = "default_fallback_frame_rate")]
    pub fallback_frame_rate: f64,

    /// Drift at or above this many seconds triggers an authoritative seek
    #[serde(default = "default_hard_drift_sec")]
    pub hard_drift_sec: TimeSec,

    /// Snap zone radius in timeline pixels
    #[serde(default = "default_snap_threshold_px")]
    pub snap_threshold_px: f64,

    /// Timeline scale used to convert pixels to seconds
    #[serde(default = "default_pixels_per_second")]
    pub pixels_per_second: f64,

    /// Time budget for immediate-lane commands (milliseconds)
    #[serde(default = "default_immediate_budget_ms")]
    pub immediate_budget_ms: u64,

    /// Time budget for sequential-lane commands (milliseconds)
    #[serde(default = "default_sequential_budget_ms")]
    pub sequential_budget_ms: u64,

    /// Maximum recovery attempts before entering the Error phase
    #[serde(default = "default_max_recovery_attempts")]
    pub max_recovery_attempts: u32,

    /// Shortest clip duration an edit may produce (seconds)
    #[serde(default = "default_min_clip_duration")]
    pub min_clip_duration: TimeSec,

    /// Gap behavior applied when a moved clip is released
    #[serde(default)]
    pub gap_policy: GapPolicy,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

fn default_fallback_frame_rate() -> f64 {
    60.0
}

fn default_hard_drift_sec() -> TimeSec {
    0.100
}

fn default_snap_threshold_px() -> f64 {
    10.0
}

fn default_pixels_per_second() -> f64 {
    100.0
}

fn default_immediate_budget_ms() -> u64 {
    8
}

fn default_sequential_budget_ms() -> u64 {
    16
}

fn default_max_recovery_attempts() -> u32 {
    3
}

fn default_min_clip_duration() -> TimeSec {
    0.1
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            fallback_frame_rate: default_fallback_frame_rate(),
            hard_drift_sec: default_hard_drift_sec(),
            snap_threshold_px: default_snap_threshold_px(),
            pixels_per_second: default_pixels_per_second(),
            immediate_budget_ms: default_immediate_budget_ms(),
            sequential_budget_ms: default_sequential_budget_ms(),
            max_recovery_attempts: default_max_recovery_attempts(),
            min_clip_duration: default_min_clip_duration(),
            gap_policy: GapPolicy::default(),
        }
    }
}

impl EditorConfig {
    /// Normalizes and clamps settings so a loaded config is always usable.
    ///
    /// Intentionally tolerant: corrects bad values instead of failing, so
    /// corrupted or old configs don't brick the editor.
    pub fn normalize(&mut self) {
        self.version = CONFIG_VERSION;

        self.fallback_frame_rate = clamp_f64(self.fallback_frame_rate, 1.0, 240.0);
        self.hard_drift_sec = clamp_f64(self.hard_drift_sec, 0.01, 1.0);
        self.snap_threshold_px = clamp_f64(self.snap_threshold_px, 0.0, 200.0);
        self.pixels_per_second = clamp_f64(self.pixels_per_second, 1.0, 10_000.0);
        self.immediate_budget_ms = self.immediate_budget_ms.clamp(1, 1000);
        self.sequential_budget_ms = self.sequential_budget_ms.clamp(1, 1000);
        self.max_recovery_attempts = self.max_recovery_attempts.clamp(1, 10);
        self.min_clip_duration = clamp_f64(self.min_clip_duration, 0.001, 10.0);
    }

    /// Snap zone radius converted into timeline seconds
    pub fn snap_threshold_sec(&self) -> TimeSec {
        self.snap_threshold_px / self.pixels_per_second
    }

    /// Loads config from a JSON file, falling back to defaults on failure
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("failed to load config from {:?}: {}, using defaults", path, e);
                Self::default()
            }
        }
    }

    /// Loads and normalizes config from a JSON file
    pub fn load(path: &Path) -> EditorResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| EditorError::ConfigLoadFailed(e.to_string()))?;
        let mut config: Self = serde_json::from_str(&content)
            .map_err(|e| EditorError::ConfigLoadFailed(e.to_string()))?;
        config.normalize();
        Ok(config)
    }

    /// Saves config atomically (temp file + rename)
    pub fn save(&self, path: &Path) -> EditorResult<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| EditorError::ConfigSaveFailed(e.to_string()))?;

        let tmp_path = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp_path)
                .map_err(|e| EditorError::ConfigSaveFailed(e.to_string()))?;
            file.write_all(json.as_bytes())
                .map_err(|e| EditorError::ConfigSaveFailed(e.to_string()))?;
            file.sync_all()
                .map_err(|e| EditorError::ConfigSaveFailed(e.to_string()))?;
        }
        fs::rename(&tmp_path, path).map_err(|e| EditorError::ConfigSaveFailed(e.to_string()))?;

        info!("config saved to {:?}", path);
        Ok(())
    }
}

fn clamp_f64(value: f64, min: f64, max: f64) -> f64 {
    if !value.is_finite() {
        return min;
    }
    value.clamp(min, max)
}
