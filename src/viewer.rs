//! # AR Viewer
//!
//! Orchestrates project fetch, library loading, the camera session, the scene and
//! the tracking state machine for one viewer instance.
//!
//! ## Architecture
//!
//! ```text
//!  ProjectSource ──▶ ┌──────────────┐ ◀── ViewerCommand (user actions)
//!  ScriptHost    ──▶ │   ArViewer   │
//!  MediaDevices  ──▶ │  state  ◀────┼── TrackingMachine (single source of truth)
//!  RenderHost    ──▶ │  scene slot  │ ◀── SceneSignal (engine found/lost/error)
//!                    └──────┬───────┘
//!                           └──▶ AnalyticsReporter (fire-and-forget)
//! ```
//!
//! Every state change goes through [`TrackingMachine::handle`]. The viewer only
//! performs the effects the machine returns, so no callback ever mutates state
//! directly. Engine signals arrive on one channel, stamped with the scene that
//! registered the listener; signals from a scene that is no longer mounted are
//! dropped.
//!
//! ## Failures
//!
//! Public operations never return fatal errors. Library, camera, scene and engine
//! failures are logged and turned into `ViewerState::Error` with a user message and
//! one recovery action. The `Err` side of each operation is reserved for calling
//! an operation the current state does not allow.
//!
//! ## Teardown
//!
//! `Back`, failures, `shutdown` and `Drop` all run the same teardown: stop the
//! engine's camera tracks and render loop, remove the anchor listeners, pause and
//! detach the video, and close the session. Each step runs regardless of the
//! others and the whole operation is idempotent.

use std::sync::Arc;
use std::time::Duration;

use ar_backend::{ArEventType, BackendClient};
use ar_scene::descriptor::build_descriptor;
use ar_scene::project::Project;
use async_trait::async_trait;
use serde_json::{Map, json};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::analytics::{AnalyticsReporter, AnalyticsSink, DiscardSink, extra};
use crate::config::ViewerConfig;
use crate::core::script_registry::ScriptRegistry;
use crate::device::DeviceInfo;
use crate::error::{RecoveryAction, ViewerError, ViewerResult, classify};
use crate::info::InfoPanel;
use crate::loader;
use crate::platform::{EngineSignal, Platform, SceneSignal};
use crate::scene::SceneSlot;
use crate::session::{SessionManager, ViewerSession};
use crate::tracking::{Effect, LostTimer, TrackingMachine, Transition, ViewerEvent, ViewerState};

/// Where the viewer gets its project from.
#[async_trait]
pub trait ProjectSource: Send + Sync {
    async fn project_by_short_code(&self, short_code: &str) -> ViewerResult<Project>;
}

#[async_trait]
impl ProjectSource for BackendClient {
    async fn project_by_short_code(&self, short_code: &str) -> ViewerResult<Project> {
        BackendClient::project_by_short_code(self, short_code)
            .await
            .map_err(|e| ViewerError::project_unavailable(short_code, e.to_string()))
    }
}

/// A fixed project, for local files and tests.
#[derive(Debug, Clone)]
pub struct StaticProject(pub Project);

#[async_trait]
impl ProjectSource for StaticProject {
    async fn project_by_short_code(&self, _short_code: &str) -> ViewerResult<Project> {
        Ok(self.0.clone())
    }
}

/// User actions, for driving a viewer through [`ArViewer::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerCommand {
    StartAr,
    Back,
    ToggleMute,
    ToggleInfo,
    ToggleFullscreen,
    TogglePlayback,
    Retry,
    Reload,
    Shutdown,
}

/// Builder for [`ArViewer`].
pub struct ArViewerBuilder {
    short_code: String,
    config: ViewerConfig,
    platform: Option<Platform>,
    projects: Option<Arc<dyn ProjectSource>>,
    analytics: Arc<dyn AnalyticsSink>,
    registry: Option<Arc<ScriptRegistry>>,
}

impl ArViewerBuilder {
    pub fn config(mut self, config: ViewerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn project_source(mut self, projects: Arc<dyn ProjectSource>) -> Self {
        self.projects = Some(projects);
        self
    }

    /// Send analytics to the backend client, which also serves the project.
    pub fn backend(mut self, client: BackendClient) -> Self {
        let client = Arc::new(client);
        self.analytics = client.clone();
        self.projects = Some(client);
        self
    }

    pub fn analytics(mut self, sink: Arc<dyn AnalyticsSink>) -> Self {
        self.analytics = sink;
        self
    }

    /// Use a private script registry instead of the process-wide one.
    pub fn script_registry(mut self, registry: Arc<ScriptRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self) -> ViewerResult<ArViewer> {
        self.config.validate().map_err(|reason| {
            ViewerError::config("viewer", "", reason).with_operation("build_viewer")
        })?;
        let platform = self
            .platform
            .ok_or_else(|| ViewerError::config("platform", "none", "a platform is required"))?;
        let projects = self.projects.ok_or_else(|| {
            ViewerError::config("project_source", "none", "a project source is required")
        })?;

        let device = DeviceInfo::from_user_agent(
            &platform.navigator.user_agent,
            &platform.navigator.platform,
        );
        let analytics = AnalyticsReporter::new(self.analytics, device, &self.config.app_version);
        let lost_timer = LostTimer::new(self.config.lost_grace());
        let (signals_tx, signals_rx) = mpsc::unbounded_channel();

        Ok(ArViewer {
            short_code: self.short_code,
            platform,
            projects,
            registry: self.registry.unwrap_or_else(ScriptRegistry::global),
            analytics,
            machine: TrackingMachine::new(lost_timer.enabled()),
            lost_timer,
            config: self.config,
            project: None,
            sessions: None,
            scene: SceneSlot::new(),
            signals_tx,
            signals_rx,
            muted: true,
            info_open: false,
            start_requested: None,
        })
    }
}

/// One AR viewer instance.
pub struct ArViewer {
    short_code: String,
    config: ViewerConfig,
    platform: Platform,
    projects: Arc<dyn ProjectSource>,
    registry: Arc<ScriptRegistry>,
    analytics: AnalyticsReporter,
    project: Option<Project>,
    sessions: Option<SessionManager>,
    scene: SceneSlot,
    machine: TrackingMachine,
    lost_timer: LostTimer,
    signals_tx: mpsc::UnboundedSender<SceneSignal>,
    signals_rx: mpsc::UnboundedReceiver<SceneSignal>,
    muted: bool,
    info_open: bool,
    start_requested: Option<Instant>,
}

impl ArViewer {
    pub fn builder(short_code: impl Into<String>) -> ArViewerBuilder {
        ArViewerBuilder {
            short_code: short_code.into(),
            config: ViewerConfig::default(),
            platform: None,
            projects: None,
            analytics: Arc::new(DiscardSink),
            registry: None,
        }
    }

    pub fn state(&self) -> &ViewerState {
        self.machine.state()
    }

    pub fn short_code(&self) -> &str {
        &self.short_code
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn project(&self) -> Option<&Project> {
        self.project.as_ref()
    }

    pub fn session(&self) -> Option<&ViewerSession> {
        self.sessions.as_ref().and_then(SessionManager::active)
    }

    pub fn scene(&self) -> &SceneSlot {
        &self.scene
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn is_info_open(&self) -> bool {
        self.info_open
    }

    /// Panel contents while the info panel is open.
    pub fn info_panel(&self) -> Option<InfoPanel> {
        self.project
            .as_ref()
            .filter(|_| self.info_open)
            .map(InfoPanel::for_project)
    }

    /// Time until the armed lost commit fires.
    pub fn lost_deadline(&self) -> Option<Duration> {
        self.lost_timer
            .deadline()
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Fetch the project and load the engine libraries: `loading → permission`.
    pub async fn initialize(&mut self) -> ViewerResult<()> {
        self.require(matches!(self.state(), ViewerState::Loading), "initialize")?;

        match self.load().await {
            Ok(()) => {
                self.apply(ViewerEvent::LibrariesLoaded);
            }
            Err(e) => self.fail(e),
        }
        Ok(())
    }

    async fn load(&mut self) -> ViewerResult<()> {
        let project = self
            .projects
            .project_by_short_code(&self.short_code)
            .await?;
        if !project.is_active() {
            return Err(ViewerError::project_unavailable(
                &self.short_code,
                "project is disabled",
            ));
        }
        info!(project_id = %project.id, content = %project.content_type, "project loaded");

        self.sessions = Some(SessionManager::new(
            Arc::clone(&self.platform.media),
            self.config.camera.clone(),
            self.analytics.clone(),
            &project.id,
        ));
        self.project = Some(project);

        loader::ensure_libraries_loaded(
            self.platform.scripts.as_ref(),
            &self.registry,
            &self.config.scripts,
            self.config.settle_delay(),
        )
        .await?;
        Ok(())
    }

    /// Request the camera and mount the scene: `permission → scanning`.
    pub async fn start_ar(&mut self) -> ViewerResult<()> {
        self.require(matches!(self.state(), ViewerState::Permission), "start AR")?;
        let state = self.state().name();
        let (Some(project), Some(sessions)) = (self.project.as_ref(), self.sessions.as_mut()) else {
            return Err(ViewerError::state(state, "start AR without a project"));
        };
        self.start_requested = Some(Instant::now());

        let granted = sessions.request_camera_and_start().await.map(|_| ());
        if let Err(e) = granted {
            self.fail(e);
            return Ok(());
        }

        let mounted = match build_descriptor(project, self.config.plane_aspect) {
            Ok(descriptor) => {
                self.scene
                    .mount(
                        self.platform.render.as_ref(),
                        &descriptor,
                        self.signals_tx.clone(),
                    )
                    .await
            }
            Err(e) => Err(ViewerError::scene_build(e.to_string()).with_operation("build_descriptor")),
        };
        if let Err(e) = mounted {
            self.fail(e);
            return Ok(());
        }

        let muted = self.muted;
        if let Some(media) = self.scene.current_mut().and_then(|s| s.media_mut()) {
            if media.is_muted() != muted {
                media.set_muted(muted);
            }
        }

        self.apply(ViewerEvent::SessionStarted);

        let load_ms = self
            .start_requested
            .map_or(0, |at| at.elapsed().as_millis() as u64);
        self.report(ArEventType::ArStart, extra([("loadDuration", json!(load_ms))]));
        Ok(())
    }

    /// Leave the session and return to the permission screen.
    pub fn back(&mut self) -> ViewerResult<()> {
        self.require(self.state().is_active(), "go back")?;
        self.apply(ViewerEvent::Back);
        Ok(())
    }

    /// Flip the mute flag and apply it to the live video at once.
    pub fn toggle_mute(&mut self) -> bool {
        self.muted = !self.muted;
        let muted = self.muted;
        if let Some(media) = self.scene.current_mut().and_then(|s| s.media_mut()) {
            media.set_muted(muted);
        }
        let action = if muted { "mute" } else { "unmute" };
        self.report_interaction(action);
        muted
    }

    /// Play or pause the video by hand. Returns whether it is now playing.
    pub fn toggle_playback(&mut self) -> ViewerResult<bool> {
        let state = self.state().name();
        let Some(media) = self.scene.current_mut().and_then(|s| s.media_mut()) else {
            return Err(ViewerError::state(state, "toggle playback without video content"));
        };

        let playing = if media.is_paused() {
            if let Err(e) = media.play() {
                warn!(error = %e, "manual play failed");
            }
            !media.is_paused()
        } else {
            media.pause();
            false
        };
        self.report_interaction(if playing { "play" } else { "pause" });
        Ok(playing)
    }

    pub fn toggle_info(&mut self) -> bool {
        self.info_open = !self.info_open;
        if self.info_open {
            self.report_interaction("view_info");
        }
        self.info_open
    }

    /// Enter or leave fullscreen. Failures are logged only.
    pub async fn toggle_fullscreen(&mut self) -> bool {
        let fullscreen = &self.platform.fullscreen;
        let result = if fullscreen.is_fullscreen() {
            fullscreen.exit().await
        } else {
            fullscreen.request().await
        };
        if let Err(e) = result {
            warn!(error = %e, "fullscreen toggle failed");
        }
        fullscreen.is_fullscreen()
    }

    /// Return to the permission screen after a camera denial.
    pub fn retry(&mut self) -> ViewerResult<()> {
        let retryable = self
            .state()
            .failure()
            .is_some_and(|f| f.recovery == RecoveryAction::Retry);
        self.require(retryable, "retry")?;
        self.apply(ViewerEvent::Retry);
        Ok(())
    }

    /// Reset to `loading` and run the full load again.
    pub async fn reload(&mut self) -> ViewerResult<()> {
        self.require(matches!(self.state(), ViewerState::Error(_)), "reload")?;
        self.apply(ViewerEvent::Reload);
        self.project = None;
        self.sessions = None;
        self.info_open = false;
        self.initialize().await
    }

    /// Route one engine signal through the state machine.
    pub fn handle_engine_signal(&mut self, signal: SceneSignal) {
        if self.scene.current_id() != Some(signal.scene) {
            debug!(scene = %signal.scene, ?signal.signal, "dropping signal from unmounted scene");
            return;
        }

        match signal.signal {
            EngineSignal::TargetFound => {
                self.apply(ViewerEvent::TargetFound);
            }
            EngineSignal::TargetLost => {
                self.apply(ViewerEvent::TargetLost);
            }
            EngineSignal::RuntimeError { message } => {
                if classify::is_benign_engine_error(&message, &self.config.benign_engine_errors) {
                    warn!(%message, "ignoring benign tracking engine error");
                } else {
                    self.fail(ViewerError::tracking_engine(message));
                }
            }
        }
    }

    /// Handle every queued engine signal, then any expired grace window.
    pub fn process_pending(&mut self) {
        while let Ok(signal) = self.signals_rx.try_recv() {
            self.handle_engine_signal(signal);
        }
        self.poll_timers();
    }

    /// Commit a lost target whose grace window has run out.
    pub fn poll_timers(&mut self) {
        if let Some(generation) = self.lost_timer.take_due() {
            self.apply(ViewerEvent::GraceElapsed(generation));
        }
    }

    /// Perform one user command.
    pub async fn execute(&mut self, command: ViewerCommand) -> ViewerResult<()> {
        match command {
            ViewerCommand::StartAr => self.start_ar().await,
            ViewerCommand::Back => self.back(),
            ViewerCommand::ToggleMute => {
                self.toggle_mute();
                Ok(())
            }
            ViewerCommand::ToggleInfo => {
                self.toggle_info();
                Ok(())
            }
            ViewerCommand::ToggleFullscreen => {
                self.toggle_fullscreen().await;
                Ok(())
            }
            ViewerCommand::TogglePlayback => self.toggle_playback().map(|_| ()),
            ViewerCommand::Retry => self.retry(),
            ViewerCommand::Reload => self.reload().await,
            ViewerCommand::Shutdown => {
                self.shutdown();
                Ok(())
            }
        }
    }

    /// Serve commands, engine signals and the grace timer until the command
    /// channel closes or `Shutdown` arrives, then tear down.
    pub async fn run(&mut self, mut commands: mpsc::UnboundedReceiver<ViewerCommand>) {
        loop {
            tokio::select! {
                Some(signal) = self.signals_rx.recv() => self.handle_engine_signal(signal),
                _ = self.lost_timer.expired() => self.poll_timers(),
                command = commands.recv() => match command {
                    None | Some(ViewerCommand::Shutdown) => break,
                    Some(command) => {
                        if let Err(e) = self.execute(command).await {
                            warn!(error = %e, ?command, "command rejected");
                        }
                    }
                },
            }
        }
        self.shutdown();
    }

    /// Tear everything down. Safe to call any number of times.
    pub fn shutdown(&mut self) {
        self.teardown();
    }

    fn require(&self, allowed: bool, operation: &str) -> ViewerResult<()> {
        if allowed {
            Ok(())
        } else {
            Err(ViewerError::state(self.state().name(), operation))
        }
    }

    fn fail(&mut self, error: ViewerError) {
        if classify::is_fatal(&error) {
            error!(category = error.category(), %error, "viewer failure");
            self.apply(ViewerEvent::Failed(error.failure()));
        } else {
            warn!(category = error.category(), %error, "non-fatal viewer error");
        }
    }

    fn apply(&mut self, event: ViewerEvent) -> Transition {
        let transition = self.machine.handle(event);
        for effect in &transition.effects {
            self.perform(*effect);
        }
        if transition.changed() {
            info!(from = transition.from.name(), to = transition.to.name(), "viewer state");
        }
        transition
    }

    fn perform(&mut self, effect: Effect) {
        match effect {
            Effect::ResumePlayback => {
                let auto_play = self.project.as_ref().is_some_and(|p| p.auto_play);
                if let Some(media) = self.scene.current_mut().and_then(|s| s.media_mut()) {
                    if auto_play && media.is_paused() {
                        if let Err(e) = media.play() {
                            warn!(error = %e, "video play failed");
                        }
                    }
                }
            }
            Effect::PausePlayback => {
                if let Some(media) = self.scene.current_mut().and_then(|s| s.media_mut()) {
                    if !media.is_paused() {
                        media.pause();
                    }
                }
            }
            Effect::ReportTrackingLost => self.report(ArEventType::TrackingLost, Map::new()),
            Effect::ArmLostTimer { generation } => self.lost_timer.arm(generation),
            Effect::CancelLostTimer => self.lost_timer.cancel(),
            Effect::Teardown => self.teardown(),
        }
    }

    fn teardown(&mut self) {
        self.lost_timer.cancel();
        let scene_disposed = self.scene.dispose();
        let session_ended = self
            .sessions
            .as_mut()
            .and_then(|s| s.end_session(&mut self.scene));
        if scene_disposed || session_ended.is_some() {
            debug!(scene_disposed, session_ended = session_ended.is_some(), "teardown");
        }
    }

    fn report(&self, event_type: ArEventType, extra: Map<String, serde_json::Value>) {
        if let Some(sessions) = &self.sessions {
            sessions.report(event_type, extra);
        }
    }

    fn report_interaction(&self, action: &str) {
        self.report(
            ArEventType::ContentInteraction,
            extra([("action", json!(action))]),
        );
    }
}

impl Drop for ArViewer {
    fn drop(&mut self) {
        self.teardown();
    }
}
