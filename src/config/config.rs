//! # Configuration Module
//!
//! This module provides configuration structures and validation for the AR viewer.
//! It serves as the common interface between the `arview` CLI, config files, and the
//! core viewer library.
//!
//! ## Configuration Parameters
//!
//! | Parameter | Type | Range | Description |
//! |-----------|------|-------|-------------|
//! | `api_base_url` | `String` | http(s) URL | Backend collaborator base URL |
//! | `app_version` | `String` | non-empty | Reported with every analytics event |
//! | `camera` | `CameraConstraints` | non-zero size | Probe stream constraints |
//! | `scripts` | `Vec<ScriptSource>` | ≥ 1, unique ids | Engine scripts, in injection order |
//! | `settle_delay_ms` | `u64` | 0-10000 | Wait after injection before checking globals |
//! | `lost_grace_ms` | `u64` | 0-10000 | Target-lost debounce window (0 disables) |
//! | `benign_engine_errors` | `Vec<String>` | any | Engine error substrings that are ignored |
//! | `plane_aspect` | `PlaneAspect` | preset | Aspect of image and video planes |
//!
//! ## Config Files
//!
//! Every field is optional in TOML; missing fields fall back to the defaults.
//!
//! ```rust
//! use marker_ar_viewer::config::config::ViewerConfig;
//!
//! let config = ViewerConfig::from_toml_str(r#"
//!     api_base_url = "https://ar.example.com/api/v1"
//!     lost_grace_ms = 750
//! "#).unwrap();
//!
//! assert_eq!(config.lost_grace_ms, 750);
//! assert_eq!(config.settle_delay_ms, 500);
//! assert!(config.validate().is_ok());
//! ```

use std::{collections::HashSet, path::Path, time::Duration};

use anyhow::{Context, Result};
use ar_scene::presets::PlaneAspect;
use serde::{Deserialize, Serialize};

/// Upper bound shared by the settle delay and the lost-grace window.
const MAX_DELAY_MS: u64 = 10_000;

/// Preferred camera for the probe stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Rear camera
    #[default]
    Environment,
    /// Front camera
    User,
}

impl FacingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FacingMode::Environment => "environment",
            FacingMode::User => "user",
        }
    }
}

/// Video-only constraints for `getUserMedia`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConstraints {
    pub facing_mode: FacingMode,
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl Default for CameraConstraints {
    fn default() -> Self {
        Self {
            facing_mode: FacingMode::Environment,
            ideal_width: 1920,
            ideal_height: 1080,
        }
    }
}

/// One externally hosted script.
///
/// `id` is the element id that guarantees single injection and `global` is the
/// name the script attaches to the global environment once initialised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptSource {
    pub id: String,
    pub url: String,
    pub global: String,
}

impl ScriptSource {
    pub fn new(id: impl Into<String>, url: impl Into<String>, global: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            global: global.into(),
        }
    }
}

/// Configuration structure for the AR viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Base URL of the backend collaborator, e.g. `https://host/api/v1`.
    pub api_base_url: String,

    /// Application version reported in analytics events.
    pub app_version: String,

    pub camera: CameraConstraints,

    /// Scripts injected in order: the 3D renderer first, then the tracking engine.
    pub scripts: Vec<ScriptSource>,

    /// Delay after the last script load before globals are checked.
    ///
    /// The tracking engine attaches its globals asynchronously after its load event.
    pub settle_delay_ms: u64,

    /// Grace window before a target loss is committed. `0` commits immediately.
    pub lost_grace_ms: u64,

    /// Case-insensitive substrings identifying harmless engine runtime errors.
    pub benign_engine_errors: Vec<String>,

    pub plane_aspect: PlaneAspect,
}

impl Default for ViewerConfig {
    /// Defaults match the hosted engine bundle the viewer ships with.
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000/api/v1".to_string(),
            app_version: "1.0.0".to_string(),
            camera: CameraConstraints::default(),
            scripts: vec![
                ScriptSource::new(
                    "three-js",
                    "https://cdn.jsdelivr.net/npm/three@0.150.1/build/three.min.js",
                    "THREE",
                ),
                ScriptSource::new(
                    "mindar-image-three",
                    "https://cdn.jsdelivr.net/npm/mind-ar@1.2.5/dist/mindar-image-three.prod.js",
                    "MINDAR",
                ),
            ],
            settle_delay_ms: 500,
            lost_grace_ms: 500,
            benign_engine_errors: vec![
                "ResizeObserver loop".to_string(),
                "The play() request was interrupted".to_string(),
                "Script error.".to_string(),
                "WebGL: INVALID_OPERATION".to_string(),
            ],
            plane_aspect: PlaneAspect::default(),
        }
    }
}

impl ViewerConfig {
    /// Parse a TOML document. Missing fields take their default values.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).context("Failed to parse viewer config")
    }

    /// Load and validate a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_toml_str(&source)?;
        config
            .validate()
            .map_err(|reason| anyhow::anyhow!("Invalid config {}: {}", path.display(), reason))?;
        Ok(config)
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), String> {
        let base = self.api_base_url.trim();
        if base.is_empty() {
            return Err("API base URL must not be empty".to_string());
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err("API base URL must use http or https".to_string());
        }
        if self.app_version.trim().is_empty() {
            return Err("App version must not be empty".to_string());
        }
        if self.camera.ideal_width == 0 || self.camera.ideal_height == 0 {
            return Err("Camera resolution must be greater than 0".to_string());
        }
        if self.scripts.is_empty() {
            return Err("At least one engine script is required".to_string());
        }
        let mut ids = HashSet::new();
        for script in &self.scripts {
            if script.id.is_empty() || script.url.is_empty() || script.global.is_empty() {
                return Err("Script id, url and global must not be empty".to_string());
            }
            if !ids.insert(script.id.as_str()) {
                return Err(format!("Duplicate script id '{}'", script.id));
            }
        }
        if self.settle_delay_ms > MAX_DELAY_MS {
            return Err("Settle delay must be at most 10000 ms".to_string());
        }
        if self.lost_grace_ms > MAX_DELAY_MS {
            return Err("Lost grace window must be at most 10000 ms".to_string());
        }
        Ok(())
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn lost_grace(&self) -> Duration {
        Duration::from_millis(self.lost_grace_ms)
    }
}
