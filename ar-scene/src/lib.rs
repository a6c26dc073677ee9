// SPDX-License-Identifier: MIT
//! # ar-scene: Marker-Anchored Scene Descriptors
//!
//! This crate turns read-only project metadata into a declarative description of
//! the scene the AR viewer mounts: one marker anchor and one content node beneath it.
//! It performs no I/O and touches no rendering context, so every decision about
//! what gets built can be tested without a browser.
//!
//! ## Key Components
//!
//! - [`project`]: The project record served by the backend (content type, URLs, playback flags)
//! - [`presets`]: Plane aspect presets and tracking-quality → engine filter tuning
//! - [`descriptor`]: The `Project → SceneDescriptor` builder
//!
//! ## Usage Example
//!
//! ```rust
//! use ar_scene::descriptor::{build_descriptor, ContentNode};
//! use ar_scene::presets::PlaneAspect;
//! use ar_scene::project::{ContentType, Project};
//!
//! let project = Project::new(
//!     "p-1",
//!     "Poster",
//!     "https://cdn.example/target.jpg",
//!     "https://cdn.example/clip.mp4",
//!     ContentType::Video,
//! );
//! let scene = build_descriptor(&project, PlaneAspect::Widescreen)?;
//! assert!(matches!(scene.content, ContentNode::VideoPlane { .. }));
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod descriptor;
pub mod presets;
pub mod project;
