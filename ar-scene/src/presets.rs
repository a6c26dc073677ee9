// SPDX-License-Identifier: MIT
//! # Plane and Tracker Presets
//!
//! Fixed sizing and tuning presets used when building a scene.
//!
//! ## Plane Sizing
//!
//! Content planes are measured in marker units: the anchored target image is
//! exactly 1.0 wide, so a plane of width 1.0 covers the marker edge to edge.
//! The height follows from a fixed aspect preset rather than from the content,
//! which keeps the plane stable while media is still loading.
//!
//! ## Tracker Tuning
//!
//! The tracking engine smooths the anchor pose with a one-euro filter and
//! tolerates a number of frames of disagreement before it reports a target as
//! found or lost. `TrackingQuality` picks a point on the jitter/latency curve:
//! - **Low**: little smoothing, reacts within two frames
//! - **Medium**: the engine's own defaults
//! - **High**: heavy smoothing, longer warm-up and miss tolerance

use serde::{Deserialize, Serialize};

use crate::project::TrackingQuality;

/// Aspect ratio of the content plane attached to the anchor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PlaneAspect {
    /// 16:9, matches most phone-recorded video
    #[default]
    #[clap(name = "widescreen")]
    Widescreen,
    /// 4:3
    #[clap(name = "classic")]
    Classic,
    /// 1:1
    #[clap(name = "square")]
    Square,
    /// 9:16
    #[clap(name = "portrait")]
    Portrait,
}

impl PlaneAspect {
    /// Width divided by height.
    pub fn ratio(self) -> f32 {
        match self {
            PlaneAspect::Widescreen => 16.0 / 9.0,
            PlaneAspect::Classic => 4.0 / 3.0,
            PlaneAspect::Square => 1.0,
            PlaneAspect::Portrait => 9.0 / 16.0,
        }
    }

    /// Plane dimensions in marker units for a plane `width` wide.
    pub fn plane_size(self, width: f32) -> (f32, f32) {
        (width, width / self.ratio())
    }
}

/// Filter and tolerance parameters handed to the tracking engine.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackerTuning {
    /// One-euro filter minimum cutoff frequency (lower = smoother, more lag)
    pub filter_min_cf: f32,
    /// One-euro filter speed coefficient
    pub filter_beta: f32,
    /// Consecutive detections required before a target counts as found
    pub warmup_tolerance: u32,
    /// Consecutive misses tolerated before a target counts as lost
    pub miss_tolerance: u32,
}

impl TrackerTuning {
    pub fn for_quality(quality: TrackingQuality) -> Self {
        match quality {
            TrackingQuality::Low => Self {
                filter_min_cf: 0.01,
                filter_beta: 10.0,
                warmup_tolerance: 2,
                miss_tolerance: 2,
            },
            TrackingQuality::Medium => Self::default(),
            TrackingQuality::High => Self {
                filter_min_cf: 0.0001,
                filter_beta: 100.0,
                warmup_tolerance: 8,
                miss_tolerance: 8,
            },
        }
    }
}

impl Default for TrackerTuning {
    fn default() -> Self {
        Self {
            filter_min_cf: 0.001,
            filter_beta: 1000.0,
            warmup_tolerance: 5,
            miss_tolerance: 5,
        }
    }
}
