// SPDX-License-Identifier: MIT
//! # Project Model
//!
//! The project record as served by the backend. The viewer fetches it once per
//! session by short code and never mutates it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of content overlaid on the marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentType {
    #[serde(rename = "image")]
    Image,
    #[serde(rename = "video")]
    Video,
    #[serde(rename = "3d_model")]
    Model3d,
}

impl ContentType {
    /// Wire name as used by the backend.
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Image => "image",
            ContentType::Video => "video",
            ContentType::Model3d => "3d_model",
        }
    }

    /// Human label for info panels (`3d_model` → `3d model`).
    pub fn label(self) -> String {
        self.as_str().replace('_', " ")
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracking quality requested by the project owner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingQuality {
    Low,
    #[default]
    Medium,
    High,
}

impl fmt::Display for TrackingQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackingQuality::Low => write!(f, "low"),
            TrackingQuality::Medium => write!(f, "medium"),
            TrackingQuality::High => write!(f, "high"),
        }
    }
}

/// Publication status. Disabled projects must not be viewable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    #[default]
    Active,
    Disabled,
}

/// Short link attached to a project.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrCode {
    pub short_code: String,
    pub url: String,
}

/// A marker → content experience.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub target_image_url: String,
    pub content_url: String,
    pub content_type: ContentType,
    #[serde(default)]
    pub tracking_quality: TrackingQuality,
    #[serde(default)]
    pub auto_play: bool,
    #[serde(default)]
    pub loop_content: bool,
    #[serde(default)]
    pub view_count: u64,
    #[serde(default)]
    pub status: ProjectStatus,
    #[serde(default)]
    pub qr_code: Option<QrCode>,
}

impl Project {
    /// Minimal active project; remaining fields take their defaults.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        target_image_url: impl Into<String>,
        content_url: impl Into<String>,
        content_type: ContentType,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            target_image_url: target_image_url.into(),
            content_url: content_url.into(),
            content_type,
            tracking_quality: TrackingQuality::default(),
            auto_play: false,
            loop_content: false,
            view_count: 0,
            status: ProjectStatus::Active,
            qr_code: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ProjectStatus::Active
    }
}
