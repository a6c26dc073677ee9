//! # Scene Mounting
//!
//! Turns a [`SceneDescriptor`] into a live [`TrackingScene`] on the render host.
//!
//! ## Mount Order
//!
//! 1. Dispose the previously mounted scene, if any
//! 2. Check that the container is attached and the engine is available
//! 3. Create the engine with the project's tracker tuning
//! 4. Add the marker anchor
//! 5. For video content, create the `<video>` element and wait for its metadata
//! 6. Attach the content node beneath the anchor
//! 7. Register found/lost listeners, stamped with this scene's id
//! 8. Start the engine (camera + render loop)
//!
//! A [`TrackingScene`] tears itself down when dropped, so a failure at any step
//! after the engine exists still releases the engine, its camera and the video.
//!
//! [`SceneSlot`] holds at most one scene: mounting always disposes the previous one
//! first, so two scenes are never mounted together.

use std::fmt;

use ar_scene::descriptor::SceneDescriptor;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::{ViewerError, ViewerResult};
use crate::platform::{
    AnchorHandle, EngineEventSink, EngineOptions, MediaElement, RenderHost, SceneId, SceneSignal,
    TrackingEngine,
};

/// A mounted anchor, its content and the engine driving them.
pub struct TrackingScene {
    id: SceneId,
    engine: Box<dyn TrackingEngine>,
    anchor: AnchorHandle,
    content_kind: &'static str,
    media: Option<Box<dyn MediaElement>>,
    disposed: bool,
}

impl fmt::Debug for TrackingScene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackingScene")
            .field("id", &self.id)
            .field("anchor", &self.anchor)
            .field("content_kind", &self.content_kind)
            .field("has_media", &self.media.is_some())
            .field("disposed", &self.disposed)
            .finish()
    }
}

impl TrackingScene {
    pub fn id(&self) -> SceneId {
        self.id
    }

    pub fn content_kind(&self) -> &'static str {
        self.content_kind
    }

    pub fn media(&self) -> Option<&dyn MediaElement> {
        self.media.as_deref()
    }

    pub fn media_mut(&mut self) -> Option<&mut (dyn MediaElement + 'static)> {
        self.media.as_deref_mut()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Stop the render loop and camera, remove the listeners, pause and detach
    /// the video, then release the renderer. Runs once; later calls do nothing.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        self.engine.stop();
        self.engine.unsubscribe(self.anchor);
        if let Some(media) = self.media.as_mut() {
            media.pause();
            media.detach();
        }
        self.engine.dispose();
        debug!(scene = %self.id, "scene disposed");
    }
}

impl Drop for TrackingScene {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Holder for the single mounted scene.
#[derive(Debug, Default)]
pub struct SceneSlot {
    current: Option<TrackingScene>,
    last_id: u64,
}

impl SceneSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&TrackingScene> {
        self.current.as_ref()
    }

    pub fn current_mut(&mut self) -> Option<&mut TrackingScene> {
        self.current.as_mut()
    }

    pub fn current_id(&self) -> Option<SceneId> {
        self.current.as_ref().map(TrackingScene::id)
    }

    pub fn is_mounted(&self) -> bool {
        self.current.is_some()
    }

    /// Dispose the mounted scene. Returns whether there was one.
    pub fn dispose(&mut self) -> bool {
        match self.current.take() {
            Some(mut scene) => {
                scene.dispose();
                true
            }
            None => false,
        }
    }

    /// Mount a new scene, disposing the current one first.
    ///
    /// Engine signals from the new scene are delivered to `signals`.
    pub async fn mount(
        &mut self,
        render: &dyn RenderHost,
        descriptor: &SceneDescriptor,
        signals: mpsc::UnboundedSender<SceneSignal>,
    ) -> ViewerResult<SceneId> {
        self.dispose();

        if !render.container_mounted() {
            return Err(ViewerError::scene_build("scene container is not mounted")
                .with_operation("mount_scene"));
        }
        if !render.engine_available() {
            return Err(ViewerError::scene_build("tracking engine is not available")
                .with_operation("mount_scene"));
        }

        self.last_id += 1;
        let id = SceneId(self.last_id);
        let build_error = move |step: &'static str| {
            move |e: anyhow::Error| {
                ViewerError::scene_build(e.to_string())
                    .with_operation(step)
                    .with_metadata("scene", id.to_string())
            }
        };

        let mut engine = render
            .create_engine(&EngineOptions {
                target_image_url: descriptor.target_image_url.clone(),
                tuning: descriptor.tuning,
            })
            .map_err(build_error("create_engine"))?;
        let anchor = match engine.add_anchor(descriptor.anchor.target_index) {
            Ok(anchor) => anchor,
            Err(e) => {
                engine.dispose();
                return Err(build_error("add_anchor")(e));
            }
        };

        let mut scene = TrackingScene {
            id,
            engine,
            anchor,
            content_kind: descriptor.content.kind(),
            media: None,
            disposed: false,
        };

        if let Some(spec) = descriptor.content.video() {
            let media = scene.media.insert(
                render
                    .create_video(spec)
                    .map_err(build_error("create_video"))?,
            );
            media
                .load_metadata()
                .await
                .map_err(build_error("load_video_metadata"))?;
        }

        scene
            .engine
            .attach_content(anchor, &descriptor.content)
            .map_err(build_error("attach_content"))?;
        scene
            .engine
            .subscribe(anchor, EngineEventSink::new(id, signals))
            .map_err(build_error("subscribe"))?;
        scene
            .engine
            .start()
            .await
            .map_err(build_error("start_engine"))?;

        info!(scene = %id, content = scene.content_kind, "scene mounted");
        self.current = Some(scene);
        Ok(id)
    }
}
