//! # Configuration Module
//!
//! Viewer configuration: defaults, validation, and TOML loading.

pub mod config;

pub use config::{CameraConstraints, FacingMode, ScriptSource, ViewerConfig};
