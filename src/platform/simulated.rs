//! In-memory browser used by the `arview simulate` harness and by tests.
//!
//! A [`SimulatedBrowser`] implements every platform seam against one shared state
//! and doubles as the inspection handle: it counts camera tracks, `getUserMedia`
//! calls, injected scripts and mounted scenes, records every media command, and
//! exposes fault switches for the failure paths.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use anyhow::{Result, bail};
use ar_scene::descriptor::{ContentNode, VideoSpec};
use async_trait::async_trait;
use tracing::debug;

use super::{
    AnchorHandle, EngineEventSink, EngineOptions, EngineSignal, FullscreenHost, MediaDevices,
    MediaElement, MediaStream, NavigatorInfo, Platform, RenderHost, ScriptHost, TrackingEngine,
};
use crate::config::{CameraConstraints, ViewerConfig};

const IPHONE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_2_1 like Mac OS X) \
     AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Mobile/15E148 Safari/604.1";

/// A command issued to a simulated `<video>` element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MediaCall {
    Play,
    Pause,
    Mute(bool),
    Detach,
}

/// Snapshot of a simulated `<video>` element.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoSnapshot {
    pub src: String,
    pub paused: bool,
    pub muted: bool,
    pub looping: bool,
    pub position: f64,
    pub detached: bool,
}

#[derive(Debug, Default)]
struct EngineRecord {
    options: Option<EngineOptions>,
    anchors: u32,
    content: Option<&'static str>,
    listeners: HashMap<u32, EngineEventSink>,
    /// Every sink ever registered, kept to replay late events from disposed engines.
    history: Vec<EngineEventSink>,
    running: bool,
    holds_camera: bool,
    disposed: bool,
}

#[derive(Debug)]
struct SimState {
    globals: HashSet<String>,
    script_globals: HashMap<String, String>,
    engine_global: String,
    script_elements: Vec<String>,
    failing_scripts: HashSet<String>,
    global_delay: Duration,
    camera_denied: bool,
    user_media_calls: usize,
    live_tracks: usize,
    container_mounted: bool,
    engine_start_fails: bool,
    engines: Vec<EngineRecord>,
    videos: Vec<VideoSnapshot>,
    media_log: Vec<MediaCall>,
    fullscreen: bool,
    fullscreen_fails: bool,
}

/// Shared in-memory browser and inspection handle.
#[derive(Debug, Clone)]
pub struct SimulatedBrowser {
    state: Arc<Mutex<SimState>>,
    navigator: NavigatorInfo,
}

impl Default for SimulatedBrowser {
    fn default() -> Self {
        Self::for_config(&ViewerConfig::default())
    }
}

impl SimulatedBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// A browser that serves the scripts listed in `config`.
    ///
    /// Each script defines its configured global once loaded; the last script is
    /// treated as the tracking engine.
    pub fn for_config(config: &ViewerConfig) -> Self {
        let script_globals = config
            .scripts
            .iter()
            .map(|s| (s.id.clone(), s.global.clone()))
            .collect();
        let engine_global = config
            .scripts
            .last()
            .map(|s| s.global.clone())
            .unwrap_or_default();

        Self {
            state: Arc::new(Mutex::new(SimState {
                globals: HashSet::new(),
                script_globals,
                engine_global,
                script_elements: Vec::new(),
                failing_scripts: HashSet::new(),
                global_delay: Duration::ZERO,
                camera_denied: false,
                user_media_calls: 0,
                live_tracks: 0,
                container_mounted: true,
                engine_start_fails: false,
                engines: Vec::new(),
                videos: Vec::new(),
                media_log: Vec::new(),
                fullscreen: false,
                fullscreen_fails: false,
            })),
            navigator: NavigatorInfo {
                user_agent: IPHONE_USER_AGENT.to_string(),
                platform: "iPhone".to_string(),
            },
        }
    }

    pub fn with_navigator(mut self, user_agent: &str, platform: &str) -> Self {
        self.navigator = NavigatorInfo {
            user_agent: user_agent.to_string(),
            platform: platform.to_string(),
        };
        self
    }

    /// Bundle this browser as the viewer's platform.
    pub fn platform(&self) -> Platform {
        Platform {
            scripts: Arc::new(self.clone()),
            media: Arc::new(self.clone()),
            render: Arc::new(self.clone()),
            fullscreen: Arc::new(self.clone()),
            navigator: self.navigator.clone(),
        }
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // Fault injection

    /// Make the script with this id fail to load.
    pub fn fail_script(&self, id: &str) {
        self.state().failing_scripts.insert(id.to_string());
    }

    /// Delay between a script's load event and its global appearing.
    pub fn set_global_delay(&self, delay: Duration) {
        self.state().global_delay = delay;
    }

    /// Define a global as if a previous page had already loaded it.
    pub fn define_global(&self, name: &str) {
        self.state().globals.insert(name.to_string());
    }

    pub fn deny_camera(&self, denied: bool) {
        self.state().camera_denied = denied;
    }

    pub fn fail_engine_start(&self, fails: bool) {
        self.state().engine_start_fails = fails;
    }

    pub fn set_container_mounted(&self, mounted: bool) {
        self.state().container_mounted = mounted;
    }

    pub fn fail_fullscreen(&self, fails: bool) {
        self.state().fullscreen_fails = fails;
    }

    // Engine events

    /// Deliver a signal to every listener of every live engine. Returns the
    /// number of listeners reached.
    pub fn emit(&self, signal: EngineSignal) -> usize {
        let state = self.state();
        state
            .engines
            .iter()
            .filter(|e| !e.disposed)
            .flat_map(|e| e.listeners.values())
            .filter(|sink| sink.emit(signal.clone()))
            .count()
    }

    /// Replay a signal through the first listener engine `index` ever had, even
    /// if that engine has since been disposed.
    pub fn emit_stale(&self, index: usize, signal: EngineSignal) -> bool {
        let state = self.state();
        state
            .engines
            .get(index)
            .and_then(|e| e.history.first())
            .is_some_and(|sink| sink.emit(signal))
    }

    /// Advance the position of every playing video.
    pub fn advance_playback(&self, seconds: f64) {
        let mut state = self.state();
        for video in state.videos.iter_mut().filter(|v| !v.paused && !v.detached) {
            video.position += seconds;
        }
    }

    // Inspection

    pub fn live_camera_tracks(&self) -> usize {
        self.state().live_tracks
    }

    pub fn user_media_calls(&self) -> usize {
        self.state().user_media_calls
    }

    /// Script element ids in injection order.
    pub fn injected_scripts(&self) -> Vec<String> {
        self.state().script_elements.clone()
    }

    pub fn engines_created(&self) -> usize {
        self.state().engines.len()
    }

    /// Engines with content attached that have not been disposed.
    pub fn mounted_scenes(&self) -> usize {
        self.state()
            .engines
            .iter()
            .filter(|e| e.content.is_some() && !e.disposed)
            .count()
    }

    /// Registered found/lost listeners across all live engines.
    pub fn active_listeners(&self) -> usize {
        self.state()
            .engines
            .iter()
            .filter(|e| !e.disposed)
            .map(|e| e.listeners.len())
            .sum()
    }

    pub fn running_engines(&self) -> usize {
        self.state().engines.iter().filter(|e| e.running).count()
    }

    pub fn last_engine_options(&self) -> Option<EngineOptions> {
        self.state().engines.last().and_then(|e| e.options.clone())
    }

    pub fn last_content_kind(&self) -> Option<&'static str> {
        self.state().engines.last().and_then(|e| e.content)
    }

    /// The most recently created video element.
    pub fn video(&self) -> Option<VideoSnapshot> {
        self.state().videos.last().cloned()
    }

    pub fn media_log(&self) -> Vec<MediaCall> {
        self.state().media_log.clone()
    }

    pub fn is_fullscreen(&self) -> bool {
        self.state().fullscreen
    }
}

#[async_trait]
impl ScriptHost for SimulatedBrowser {
    fn has_global(&self, name: &str) -> bool {
        self.state().globals.contains(name)
    }

    fn has_script_element(&self, id: &str) -> bool {
        self.state().script_elements.iter().any(|s| s == id)
    }

    async fn inject_script(&self, id: &str, url: &str) -> Result<()> {
        let (fails, global, delay) = {
            let mut state = self.state();
            let fails = state.failing_scripts.contains(id);
            if !fails {
                state.script_elements.push(id.to_string());
            }
            (fails, state.script_globals.get(id).cloned(), state.global_delay)
        };

        // The load event fires on a later turn of the event loop.
        tokio::task::yield_now().await;

        if fails {
            bail!("script {} failed to load from {}", id, url);
        }
        debug!(script = id, "simulated script loaded");

        if let Some(global) = global {
            if delay.is_zero() {
                self.state().globals.insert(global);
            } else {
                let state = Arc::clone(&self.state);
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    state
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .globals
                        .insert(global);
                });
            }
        }
        Ok(())
    }
}

struct SimStream {
    state: Arc<Mutex<SimState>>,
    live: usize,
}

impl MediaStream for SimStream {
    fn live_tracks(&self) -> usize {
        self.live
    }

    fn stop_tracks(&mut self) {
        if self.live > 0 {
            let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
            state.live_tracks -= self.live;
            self.live = 0;
        }
    }
}

#[async_trait]
impl MediaDevices for SimulatedBrowser {
    async fn get_user_media(
        &self,
        constraints: &CameraConstraints,
    ) -> Result<Box<dyn MediaStream>> {
        let mut state = self.state();
        state.user_media_calls += 1;
        if state.camera_denied {
            bail!("NotAllowedError: Permission denied");
        }
        debug!(
            facing = constraints.facing_mode.as_str(),
            width = constraints.ideal_width,
            height = constraints.ideal_height,
            "simulated camera granted"
        );
        state.live_tracks += 1;
        Ok(Box::new(SimStream {
            state: Arc::clone(&self.state),
            live: 1,
        }))
    }
}

impl RenderHost for SimulatedBrowser {
    fn container_mounted(&self) -> bool {
        self.state().container_mounted
    }

    fn engine_available(&self) -> bool {
        let state = self.state();
        state.globals.contains(&state.engine_global)
    }

    fn create_engine(&self, options: &EngineOptions) -> Result<Box<dyn TrackingEngine>> {
        let mut state = self.state();
        state.engines.push(EngineRecord {
            options: Some(options.clone()),
            ..EngineRecord::default()
        });
        Ok(Box::new(SimEngine {
            state: Arc::clone(&self.state),
            index: state.engines.len() - 1,
        }))
    }

    fn create_video(&self, spec: &VideoSpec) -> Result<Box<dyn MediaElement>> {
        let mut state = self.state();
        state.videos.push(VideoSnapshot {
            src: spec.src.clone(),
            paused: true,
            muted: spec.muted,
            looping: spec.looping,
            position: 0.0,
            detached: false,
        });
        Ok(Box::new(SimVideo {
            state: Arc::clone(&self.state),
            index: state.videos.len() - 1,
        }))
    }
}

struct SimEngine {
    state: Arc<Mutex<SimState>>,
    index: usize,
}

impl SimEngine {
    fn with_record<T>(&self, f: impl FnOnce(&mut EngineRecord, &mut usize) -> T) -> T {
        let mut guard = self.state.lock().unwrap_or_else(|p| p.into_inner());
        let state = &mut *guard;
        f(&mut state.engines[self.index], &mut state.live_tracks)
    }
}

#[async_trait]
impl TrackingEngine for SimEngine {
    fn add_anchor(&mut self, target_index: u32) -> Result<AnchorHandle> {
        self.with_record(|record, _| {
            if record.disposed {
                bail!("engine disposed");
            }
            record.anchors += 1;
            Ok(AnchorHandle(target_index))
        })
    }

    fn attach_content(&mut self, _anchor: AnchorHandle, content: &ContentNode) -> Result<()> {
        self.with_record(|record, _| {
            record.content = Some(content.kind());
            Ok(())
        })
    }

    fn subscribe(&mut self, anchor: AnchorHandle, sink: EngineEventSink) -> Result<()> {
        self.with_record(|record, _| {
            record.history.push(sink.clone());
            record.listeners.insert(anchor.0, sink);
            Ok(())
        })
    }

    fn unsubscribe(&mut self, anchor: AnchorHandle) {
        self.with_record(|record, _| {
            record.listeners.remove(&anchor.0);
        })
    }

    async fn start(&mut self) -> Result<()> {
        let fails = self
            .state
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .engine_start_fails;
        tokio::task::yield_now().await;
        if fails {
            bail!("NotReadableError: could not start video source");
        }
        self.with_record(|record, live_tracks| {
            if !record.holds_camera {
                record.holds_camera = true;
                *live_tracks += 1;
            }
            record.running = true;
        });
        Ok(())
    }

    fn stop(&mut self) {
        self.with_record(|record, live_tracks| {
            if record.holds_camera {
                record.holds_camera = false;
                *live_tracks -= 1;
            }
            record.running = false;
        })
    }

    fn dispose(&mut self) {
        self.stop();
        self.with_record(|record, _| {
            record.listeners.clear();
            record.disposed = true;
        })
    }
}

struct SimVideo {
    state: Arc<Mutex<SimState>>,
    index: usize,
}

impl SimVideo {
    fn with_video<T>(&self, f: impl FnOnce(&mut VideoSnapshot, &mut Vec<MediaCall>) -> T) -> T {
        let mut guard = self.state.lock().unwrap_or_else(|p| p.into_inner());
        let state = &mut *guard;
        f(&mut state.videos[self.index], &mut state.media_log)
    }
}

#[async_trait]
impl MediaElement for SimVideo {
    async fn load_metadata(&mut self) -> Result<()> {
        tokio::task::yield_now().await;
        if self.with_video(|video, _| video.src.is_empty()) {
            bail!("MEDIA_ERR_SRC_NOT_SUPPORTED");
        }
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        self.with_video(|video, log| {
            if video.detached {
                bail!("The play() request was interrupted because the media was removed");
            }
            video.paused = false;
            log.push(MediaCall::Play);
            Ok(())
        })
    }

    fn pause(&mut self) {
        self.with_video(|video, log| {
            video.paused = true;
            log.push(MediaCall::Pause);
        })
    }

    fn is_paused(&self) -> bool {
        self.with_video(|video, _| video.paused)
    }

    fn set_muted(&mut self, muted: bool) {
        self.with_video(|video, log| {
            video.muted = muted;
            log.push(MediaCall::Mute(muted));
        })
    }

    fn is_muted(&self) -> bool {
        self.with_video(|video, _| video.muted)
    }

    fn is_looping(&self) -> bool {
        self.with_video(|video, _| video.looping)
    }

    fn current_time(&self) -> f64 {
        self.with_video(|video, _| video.position)
    }

    fn detach(&mut self) {
        self.with_video(|video, log| {
            if !video.detached {
                video.detached = true;
                video.src.clear();
                log.push(MediaCall::Detach);
            }
        })
    }
}

#[async_trait]
impl FullscreenHost for SimulatedBrowser {
    fn is_fullscreen(&self) -> bool {
        self.state().fullscreen
    }

    async fn request(&self) -> Result<()> {
        let mut state = self.state();
        if state.fullscreen_fails {
            bail!("Fullscreen request denied");
        }
        state.fullscreen = true;
        Ok(())
    }

    async fn exit(&self) -> Result<()> {
        self.state().fullscreen = false;
        Ok(())
    }
}
