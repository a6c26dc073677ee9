//! # Permission & Session Manager
//!
//! Camera permission and the AR session envelope.
//!
//! ## Session Lifecycle
//!
//! ```text
//! request_camera_and_start ──grant──▶ ViewerSession { id, started_at, device }
//!          │                                   │
//!          └──deny──▶ CameraPermission error   └── end_session ──▶ ar_end { trackingDuration }
//! ```
//!
//! The probe stream obtained from `getUserMedia` only proves access. It is released
//! as soon as it is granted, because the tracking engine opens its own stream when
//! the scene starts. The probe lives inside a [`CameraGuard`] so its tracks are
//! stopped on every path out of the request, including early returns and panics.
//!
//! At most one session is live per manager. `end_session` is idempotent.

use std::sync::Arc;
use std::time::Duration;

use ar_backend::ArEventType;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analytics::{AnalyticsReporter, extra};
use crate::config::CameraConstraints;
use crate::device::DeviceInfo;
use crate::error::{ViewerError, ViewerResult};
use crate::platform::{MediaDevices, MediaStream};
use crate::scene::SceneSlot;

/// `session_<unix millis>_<9 random chars>`
pub fn generate_session_id() -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("session_{}_{}", Utc::now().timestamp_millis(), &random[..9])
}

/// One continuous interaction, from camera grant to exit.
#[derive(Debug, Clone)]
pub struct ViewerSession {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub device: DeviceInfo,
    started: Instant,
}

impl ViewerSession {
    fn new(session_id: String, device: DeviceInfo) -> Self {
        Self {
            session_id,
            started_at: Utc::now(),
            device,
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Owns a camera stream and stops its tracks when released or dropped.
pub struct CameraGuard {
    stream: Option<Box<dyn MediaStream>>,
}

impl CameraGuard {
    pub fn new(stream: Box<dyn MediaStream>) -> Self {
        Self {
            stream: Some(stream),
        }
    }

    pub fn live_tracks(&self) -> usize {
        self.stream.as_ref().map_or(0, |s| s.live_tracks())
    }

    /// Stop every track. Safe to call more than once.
    pub fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop_tracks();
        }
    }
}

impl Drop for CameraGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// Acquires camera access and manages the single live [`ViewerSession`].
pub struct SessionManager {
    media: Arc<dyn MediaDevices>,
    constraints: CameraConstraints,
    analytics: AnalyticsReporter,
    project_id: String,
    /// Id for the next session; also used for events sent before a grant.
    next_session_id: String,
    active: Option<ViewerSession>,
}

impl SessionManager {
    pub fn new(
        media: Arc<dyn MediaDevices>,
        constraints: CameraConstraints,
        analytics: AnalyticsReporter,
        project_id: impl Into<String>,
    ) -> Self {
        Self {
            media,
            constraints,
            analytics,
            project_id: project_id.into(),
            next_session_id: generate_session_id(),
            active: None,
        }
    }

    pub fn active(&self) -> Option<&ViewerSession> {
        self.active.as_ref()
    }

    pub fn session_id(&self) -> &str {
        self.active
            .as_ref()
            .map_or(&self.next_session_id, |s| &s.session_id)
    }

    /// Request camera access, release the probe stream and open a session.
    ///
    /// `getUserMedia` is called exactly once. A denial is reported as an `ar_end`
    /// event carrying `error: "camera_permission_denied"`.
    pub async fn request_camera_and_start(&mut self) -> ViewerResult<&ViewerSession> {
        let stream = match self.media.get_user_media(&self.constraints).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "camera access denied");
                self.report(
                    ArEventType::ArEnd,
                    extra([("error", json!("camera_permission_denied"))]),
                );
                return Err(ViewerError::camera_permission(e.to_string())
                    .with_operation("getUserMedia")
                    .with_metadata("facing_mode", self.constraints.facing_mode.as_str()));
            }
        };

        let mut probe = CameraGuard::new(stream);
        debug!(tracks = probe.live_tracks(), "camera granted, releasing probe stream");
        probe.release();

        let device = self.analytics.device().clone();
        let next_id = &self.next_session_id;
        let session = self
            .active
            .get_or_insert_with(|| ViewerSession::new(next_id.clone(), device));
        info!(session_id = %session.session_id, "AR session started");
        Ok(session)
    }

    /// Send an analytics event for the current session.
    pub fn report(&self, event_type: ArEventType, extra: Map<String, Value>) {
        self.analytics
            .report(&self.project_id, self.session_id(), event_type, extra);
    }

    /// Dispose the mounted scene and close the session.
    ///
    /// Emits `ar_end` with the elapsed seconds when a session was live and returns
    /// that duration. Calling it again is a no-op that returns `None`.
    pub fn end_session(&mut self, scene: &mut SceneSlot) -> Option<Duration> {
        if scene.dispose() {
            debug!("scene cleared on session end");
        }

        let session = self.active.take()?;
        let elapsed = session.elapsed();
        self.analytics.report(
            &self.project_id,
            &session.session_id,
            ArEventType::ArEnd,
            extra([("trackingDuration", json!(elapsed.as_secs()))]),
        );
        self.next_session_id = generate_session_id();
        info!(
            session_id = %session.session_id,
            seconds = elapsed.as_secs(),
            "AR session ended"
        );
        Some(elapsed)
    }
}
