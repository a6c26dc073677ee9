//! # Platform Seams
//!
//! The browser and the third-party tracking engine, expressed as traits.
//!
//! The viewer never talks to a camera, a script loader, or a renderer directly.
//! Everything it consumes from the host goes through the traits in this module,
//! grouped in a cloneable [`Platform`] bundle:
//!
//! | Trait | Host capability |
//! |-------|-----------------|
//! | [`ScriptHost`] | dynamic script injection and global lookup |
//! | [`MediaDevices`] / [`MediaStream`] | `getUserMedia` and its tracks |
//! | [`RenderHost`] | the scene container, engine construction, `<video>` creation |
//! | [`TrackingEngine`] | anchors, content attachment, found/lost listeners, render loop |
//! | [`MediaElement`] | playback control of the video backing a plane |
//! | [`FullscreenHost`] | the Fullscreen API |
//!
//! ## Engine Signals
//!
//! Engines report through an [`EngineEventSink`] handed to them when a listener is
//! registered. Every signal is stamped with the [`SceneId`] of the scene that
//! registered the listener, so the viewer can drop signals from scenes that were
//! already disposed. Bridges that receive the engine's `postMessage` traffic can
//! forward the raw JSON with [`EngineEventSink::emit_json`].
//!
//! `platform::simulated` provides an in-memory implementation of every seam.

use std::{fmt, sync::Arc};

use anyhow::{Context, Result};
use ar_scene::descriptor::{ContentNode, VideoSpec};
use ar_scene::presets::TrackerTuning;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::config::CameraConstraints;

pub mod simulated;

/// Identifies one mounted scene for the lifetime of a viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SceneId(pub u64);

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scene#{}", self.0)
    }
}

/// Handle to an anchor created by a tracking engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnchorHandle(pub u32);

/// Event raised by the tracking engine.
///
/// Serialized form matches the engine bridge: `{"type":"targetFound"}`,
/// `{"type":"targetLost"}`, `{"type":"runtimeError","message":"..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EngineSignal {
    TargetFound,
    TargetLost,
    RuntimeError { message: String },
}

/// An engine signal stamped with the scene whose listener produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneSignal {
    pub scene: SceneId,
    pub signal: EngineSignal,
}

/// Sender side of the viewer's single engine-signal dispatcher.
#[derive(Debug, Clone)]
pub struct EngineEventSink {
    scene: SceneId,
    tx: mpsc::UnboundedSender<SceneSignal>,
}

impl EngineEventSink {
    pub fn new(scene: SceneId, tx: mpsc::UnboundedSender<SceneSignal>) -> Self {
        Self { scene, tx }
    }

    pub fn scene(&self) -> SceneId {
        self.scene
    }

    /// Send a signal. Returns false once the viewer has gone away.
    pub fn emit(&self, signal: EngineSignal) -> bool {
        self.tx
            .send(SceneSignal {
                scene: self.scene,
                signal,
            })
            .is_ok()
    }

    /// Decode a bridge message and send it.
    pub fn emit_json(&self, raw: &str) -> Result<bool> {
        let signal: EngineSignal =
            serde_json::from_str(raw).context("Failed to decode engine signal")?;
        Ok(self.emit(signal))
    }
}

/// Script injection and global lookup.
#[async_trait]
pub trait ScriptHost: Send + Sync {
    /// Whether `name` is defined on the global object.
    fn has_global(&self, name: &str) -> bool;
    /// Whether a script element with this id is already in the document.
    fn has_script_element(&self, id: &str) -> bool;
    /// Insert a script element and resolve once its load event fires.
    async fn inject_script(&self, id: &str, url: &str) -> Result<()>;
}

/// Camera access.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn get_user_media(&self, constraints: &CameraConstraints) -> Result<Box<dyn MediaStream>>;
}

/// A live camera stream.
pub trait MediaStream: Send {
    /// Number of tracks still producing frames.
    fn live_tracks(&self) -> usize;
    fn stop_tracks(&mut self);
}

/// Options the engine is constructed with.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    pub target_image_url: String,
    pub tuning: TrackerTuning,
}

/// The document the scene renders into.
pub trait RenderHost: Send + Sync {
    /// Whether the scene container element is attached to the document.
    fn container_mounted(&self) -> bool;
    /// Whether the tracking-engine constructor is available.
    fn engine_available(&self) -> bool;
    fn create_engine(&self, options: &EngineOptions) -> Result<Box<dyn TrackingEngine>>;
    /// Create a detached `<video>` element with the given static attributes.
    fn create_video(&self, spec: &VideoSpec) -> Result<Box<dyn MediaElement>>;
}

/// A marker-tracking engine bound to one container.
#[async_trait]
pub trait TrackingEngine: Send {
    fn add_anchor(&mut self, target_index: u32) -> Result<AnchorHandle>;
    fn attach_content(&mut self, anchor: AnchorHandle, content: &ContentNode) -> Result<()>;
    /// Register found/lost listeners on the anchor.
    fn subscribe(&mut self, anchor: AnchorHandle, sink: EngineEventSink) -> Result<()>;
    fn unsubscribe(&mut self, anchor: AnchorHandle);
    /// Acquire the engine's own camera stream and start the render loop.
    async fn start(&mut self) -> Result<()>;
    /// Stop the render loop and the engine's camera tracks.
    fn stop(&mut self);
    /// Release the renderer and GPU resources.
    fn dispose(&mut self);
}

/// The `<video>` element behind a video plane.
#[async_trait]
pub trait MediaElement: Send {
    async fn load_metadata(&mut self) -> Result<()>;
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self);
    fn is_paused(&self) -> bool;
    fn set_muted(&mut self, muted: bool);
    fn is_muted(&self) -> bool;
    fn is_looping(&self) -> bool;
    /// Playback position in seconds.
    fn current_time(&self) -> f64;
    /// Clear the source and remove the element from the document.
    fn detach(&mut self);
}

/// The Fullscreen API.
#[async_trait]
pub trait FullscreenHost: Send + Sync {
    fn is_fullscreen(&self) -> bool;
    async fn request(&self) -> Result<()>;
    async fn exit(&self) -> Result<()>;
}

/// Navigator facts used to describe the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigatorInfo {
    pub user_agent: String,
    pub platform: String,
}

/// Everything the viewer consumes from its host.
#[derive(Clone)]
pub struct Platform {
    pub scripts: Arc<dyn ScriptHost>,
    pub media: Arc<dyn MediaDevices>,
    pub render: Arc<dyn RenderHost>,
    pub fullscreen: Arc<dyn FullscreenHost>,
    pub navigator: NavigatorInfo,
}

impl fmt::Debug for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Platform")
            .field("navigator", &self.navigator)
            .finish_non_exhaustive()
    }
}
