// SPDX-License-Identifier: MIT
//! # Scene Descriptor Builder
//!
//! Pure translation of project metadata into the scene the viewer mounts.
//!
//! ## Scene Shape
//!
//! ```text
//! SceneDescriptor
//! ├── target_image_url + tuning   (what the engine tracks, and how)
//! └── AnchorSpec (target 0)
//!     └── ContentNode
//!         ├── ImagePlane           contentType = image
//!         ├── VideoPlane + VideoSpec  contentType = video
//!         └── AnimatedPlaceholder  contentType = 3d_model
//! ```
//!
//! Video planes never autoplay. Playback is owned by the tracking state
//! machine, which resumes and pauses the element as the target is found and
//! lost; the descriptor only fixes the element's static attributes.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::presets::{PlaneAspect, TrackerTuning};
use crate::project::{ContentType, Project};

/// Width of every content plane, in marker units.
pub const PLANE_WIDTH: f32 = 1.0;

/// Index of the single image target compiled for a project.
pub const PRIMARY_TARGET: u32 = 0;

/// Static attributes of the hidden `<video>` element backing a video plane.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VideoSpec {
    pub src: String,
    pub muted: bool,
    pub looping: bool,
    pub cross_origin: String,
    pub plays_inline: bool,
    /// Always false: the element's own autoplay would race the tracker.
    pub autoplay: bool,
}

impl VideoSpec {
    fn for_project(project: &Project) -> Self {
        Self {
            src: project.content_url.clone(),
            muted: true,
            looping: project.loop_content,
            cross_origin: "anonymous".to_string(),
            plays_inline: true,
            autoplay: false,
        }
    }
}

/// Geometry of the procedural placeholder shown for 3D content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceholderShape {
    Cube,
    TorusKnot,
}

/// The node attached beneath the marker anchor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentNode {
    ImagePlane {
        src: String,
        width: f32,
        height: f32,
    },
    VideoPlane {
        video: VideoSpec,
        width: f32,
        height: f32,
    },
    AnimatedPlaceholder {
        shape: PlaceholderShape,
        color: String,
        size: f32,
        degrees_per_second: f32,
        /// Model the placeholder stands in for, if one was uploaded
        model_src: Option<String>,
    },
}

impl ContentNode {
    pub fn video(&self) -> Option<&VideoSpec> {
        match self {
            ContentNode::VideoPlane { video, .. } => Some(video),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ContentNode::ImagePlane { .. } => "image_plane",
            ContentNode::VideoPlane { .. } => "video_plane",
            ContentNode::AnimatedPlaceholder { .. } => "animated_placeholder",
        }
    }
}

/// Marker anchor the content hangs from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorSpec {
    pub target_index: u32,
}

/// Everything needed to mount one tracking scene.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneDescriptor {
    pub project_id: String,
    pub target_image_url: String,
    pub tuning: TrackerTuning,
    pub anchor: AnchorSpec,
    pub content: ContentNode,
}

impl SceneDescriptor {
    pub fn has_video(&self) -> bool {
        self.content.video().is_some()
    }
}

/// Build the scene descriptor for a project.
///
/// # Errors
///
/// Fails when the project has no target image, or when image/video content
/// has no source URL. 3D content never fails on a missing URL since the
/// placeholder does not load it.
pub fn build_descriptor(project: &Project, aspect: PlaneAspect) -> Result<SceneDescriptor> {
    if project.target_image_url.trim().is_empty() {
        bail!("project {} has no target image", project.id);
    }

    let (width, height) = aspect.plane_size(PLANE_WIDTH);
    let content = match project.content_type {
        ContentType::Image => {
            require_content_url(project)?;
            ContentNode::ImagePlane {
                src: project.content_url.clone(),
                width,
                height,
            }
        }
        ContentType::Video => {
            require_content_url(project)?;
            ContentNode::VideoPlane {
                video: VideoSpec::for_project(project),
                width,
                height,
            }
        }
        ContentType::Model3d => ContentNode::AnimatedPlaceholder {
            shape: PlaceholderShape::TorusKnot,
            color: "#4f46e5".to_string(),
            size: PLANE_WIDTH * 0.5,
            degrees_per_second: 45.0,
            model_src: Some(project.content_url.clone()).filter(|url| !url.trim().is_empty()),
        },
    };

    Ok(SceneDescriptor {
        project_id: project.id.clone(),
        target_image_url: project.target_image_url.clone(),
        tuning: TrackerTuning::for_quality(project.tracking_quality),
        anchor: AnchorSpec {
            target_index: PRIMARY_TARGET,
        },
        content,
    })
}

fn require_content_url(project: &Project) -> Result<()> {
    if project.content_url.trim().is_empty() {
        bail!(
            "project {} has {} content but no content URL",
            project.id,
            project.content_type
        );
    }
    Ok(())
}
