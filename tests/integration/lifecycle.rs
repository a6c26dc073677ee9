//! Loading, session start, teardown and the user controls.

use std::sync::Arc;
use std::time::Duration;

use ar_backend::ArEventType;
use marker_ar_viewer::core::script_registry::ScriptRegistry;
use marker_ar_viewer::platform::EngineSignal;
use marker_ar_viewer::platform::simulated::{MediaCall, SimulatedBrowser};
use marker_ar_viewer::viewer::StaticProject;
use marker_ar_viewer::{ArViewer, ViewerCommand, ViewerState};
use serde_json::json;
use tokio::sync::mpsc;

use crate::common::{
    SHORT_CODE, flush_analytics, harness, image_project, scanning, test_config, video_project,
};

#[tokio::test(start_paused = true)]
async fn test_initialize_loads_libraries_in_order() {
    let mut h = harness(image_project());
    assert_eq!(h.viewer.state(), &ViewerState::Loading);

    h.viewer.initialize().await.unwrap();

    assert_eq!(h.viewer.state(), &ViewerState::Permission);
    assert_eq!(
        h.browser.injected_scripts(),
        vec!["three-js".to_string(), "mindar-image-three".to_string()]
    );
    assert_eq!(h.browser.user_media_calls(), 0);
    assert_eq!(h.viewer.project().map(|p| p.id.as_str()), Some("proj-image"));
}

#[tokio::test(start_paused = true)]
async fn test_initialize_only_from_loading() {
    let mut h = harness(image_project());
    h.viewer.initialize().await.unwrap();

    assert!(h.viewer.initialize().await.is_err());
    assert_eq!(h.browser.injected_scripts().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_shared_registry_injects_once() {
    let registry = Arc::new(ScriptRegistry::new());
    let browser = SimulatedBrowser::for_config(&test_config());

    for _ in 0..2 {
        let mut viewer = ArViewer::builder(SHORT_CODE)
            .config(test_config())
            .platform(browser.platform())
            .project_source(Arc::new(StaticProject(image_project())))
            .script_registry(Arc::clone(&registry))
            .build()
            .unwrap();
        viewer.initialize().await.unwrap();
        assert_eq!(viewer.state(), &ViewerState::Permission);
    }

    assert_eq!(browser.injected_scripts().len(), 2);
    assert_eq!(registry.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_start_ar_mounts_scene() {
    let h = scanning(image_project()).await;

    assert_eq!(h.viewer.state(), &ViewerState::Scanning);
    assert_eq!(h.browser.user_media_calls(), 1);
    // The probe stream is released; only the engine's own stream stays live.
    assert_eq!(h.browser.live_camera_tracks(), 1);
    assert_eq!(h.browser.mounted_scenes(), 1);
    assert_eq!(h.browser.active_listeners(), 1);
    assert_eq!(h.browser.running_engines(), 1);
    assert_eq!(h.browser.last_content_kind(), Some("image_plane"));

    let options = h.browser.last_engine_options().unwrap();
    assert_eq!(options.target_image_url, "https://cdn.example/targets/card.mind");
    assert!(h.viewer.session().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_start_ar_reports_load_duration() {
    let h = scanning(image_project()).await;
    flush_analytics().await;

    let starts = h.sink.of_type(ArEventType::ArStart);
    assert_eq!(starts.len(), 1);
    assert!(starts[0].extra.contains_key("loadDuration"));
    assert_eq!(starts[0].os_type, "iOS");

    let session_id = &h.viewer.session().unwrap().session_id;
    assert_eq!(&starts[0].session_id, session_id);
    assert!(h.sink.events().iter().all(|(project, _)| project == "proj-image"));
}

#[tokio::test(start_paused = true)]
async fn test_start_ar_rejected_before_initialize() {
    let mut h = harness(image_project());

    assert!(h.viewer.start_ar().await.is_err());
    assert_eq!(h.browser.user_media_calls(), 0);
    assert_eq!(h.viewer.state(), &ViewerState::Loading);
}

#[tokio::test(start_paused = true)]
async fn test_back_releases_everything() {
    let mut h = scanning(video_project()).await;
    h.browser.emit(EngineSignal::TargetFound);
    h.viewer.process_pending();
    assert_eq!(h.viewer.state(), &ViewerState::Tracking);

    tokio::time::advance(Duration::from_secs(3)).await;
    h.viewer.back().unwrap();

    assert_eq!(h.viewer.state(), &ViewerState::Permission);
    assert_eq!(h.browser.live_camera_tracks(), 0);
    assert_eq!(h.browser.mounted_scenes(), 0);
    assert_eq!(h.browser.active_listeners(), 0);
    assert_eq!(h.browser.running_engines(), 0);
    assert!(h.viewer.session().is_none());
    assert!(!h.viewer.scene().is_mounted());

    let video = h.browser.video().unwrap();
    assert!(video.paused);
    assert!(video.detached);
    assert_eq!(h.browser.media_log().last(), Some(&MediaCall::Detach));

    flush_analytics().await;
    let ends = h.sink.of_type(ArEventType::ArEnd);
    assert_eq!(ends.len(), 1);
    assert_eq!(ends[0].extra.get("trackingDuration"), Some(&json!(3)));
}

#[tokio::test(start_paused = true)]
async fn test_back_rejected_outside_session() {
    let mut h = harness(image_project());
    h.viewer.initialize().await.unwrap();

    assert!(h.viewer.back().is_err());
    assert_eq!(h.viewer.state(), &ViewerState::Permission);
}

#[tokio::test(start_paused = true)]
async fn test_restart_after_back_builds_fresh_scene() {
    let mut h = scanning(image_project()).await;
    let first_session = h.viewer.session().unwrap().session_id.clone();
    let first_scene = h.viewer.scene().current_id();

    h.viewer.back().unwrap();
    h.viewer.start_ar().await.unwrap();

    assert_eq!(h.viewer.state(), &ViewerState::Scanning);
    assert_eq!(h.browser.user_media_calls(), 2);
    assert_eq!(h.browser.engines_created(), 2);
    assert_eq!(h.browser.mounted_scenes(), 1);
    assert_eq!(h.browser.live_camera_tracks(), 1);
    assert_ne!(h.viewer.scene().current_id(), first_scene);
    assert_ne!(h.viewer.session().unwrap().session_id, first_session);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_is_idempotent() {
    let mut h = scanning(video_project()).await;

    h.viewer.shutdown();
    h.viewer.shutdown();

    assert_eq!(h.browser.live_camera_tracks(), 0);
    assert_eq!(h.browser.mounted_scenes(), 0);
    let detaches = h
        .browser
        .media_log()
        .iter()
        .filter(|c| **c == MediaCall::Detach)
        .count();
    assert_eq!(detaches, 1);

    flush_analytics().await;
    assert_eq!(h.sink.of_type(ArEventType::ArEnd).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_drop_releases_camera() {
    let h = scanning(video_project()).await;
    let browser = h.browser.clone();
    assert_eq!(browser.live_camera_tracks(), 1);

    drop(h);

    assert_eq!(browser.live_camera_tracks(), 0);
    assert_eq!(browser.running_engines(), 0);
    assert!(browser.video().unwrap().detached);
}

#[tokio::test(start_paused = true)]
async fn test_video_starts_muted_and_toggles() {
    let mut h = scanning(video_project()).await;
    assert!(h.viewer.is_muted());
    assert!(h.browser.video().unwrap().muted);

    assert!(!h.viewer.toggle_mute());
    assert!(!h.browser.video().unwrap().muted);
    assert_eq!(h.browser.media_log().last(), Some(&MediaCall::Mute(false)));

    flush_analytics().await;
    let interactions = h.sink.of_type(ArEventType::ContentInteraction);
    assert_eq!(interactions.len(), 1);
    assert_eq!(interactions[0].extra.get("action"), Some(&json!("unmute")));
}

#[tokio::test(start_paused = true)]
async fn test_mute_toggles_while_tracking() {
    let mut h = scanning(video_project()).await;
    h.browser.emit(EngineSignal::TargetFound);
    h.viewer.process_pending();
    assert_eq!(h.viewer.state(), &ViewerState::Tracking);
    assert!(!h.browser.video().unwrap().paused);

    assert!(!h.viewer.toggle_mute());
    let video = h.browser.video().unwrap();
    assert!(!video.muted);
    assert!(!video.paused);

    assert!(h.viewer.toggle_mute());
    let video = h.browser.video().unwrap();
    assert!(video.muted);
    assert!(!video.paused);
    assert_eq!(h.viewer.state(), &ViewerState::Tracking);
    assert_eq!(
        h.browser.media_log(),
        vec![MediaCall::Play, MediaCall::Mute(false), MediaCall::Mute(true)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_mute_preference_survives_restart() {
    let mut h = scanning(video_project()).await;
    h.viewer.toggle_mute();
    h.viewer.back().unwrap();

    h.viewer.start_ar().await.unwrap();

    assert!(!h.viewer.is_muted());
    assert!(!h.browser.video().unwrap().muted);
}

#[tokio::test(start_paused = true)]
async fn test_toggle_playback() {
    let mut h = scanning(video_project()).await;

    assert!(h.viewer.toggle_playback().unwrap());
    assert!(!h.browser.video().unwrap().paused);
    assert!(!h.viewer.toggle_playback().unwrap());
    assert!(h.browser.video().unwrap().paused);
}

#[tokio::test(start_paused = true)]
async fn test_toggle_playback_without_video() {
    let mut h = scanning(image_project()).await;

    assert!(h.viewer.toggle_playback().is_err());
    assert!(h.browser.media_log().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_info_panel() {
    let mut h = scanning(video_project()).await;
    assert!(h.viewer.info_panel().is_none());

    assert!(h.viewer.toggle_info());
    let panel = h.viewer.info_panel().unwrap();
    assert_eq!(panel.name, "Launch Poster");
    assert_eq!(panel.content_type, "video");

    assert!(!h.viewer.toggle_info());
    assert!(h.viewer.info_panel().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_fullscreen_toggle() {
    let mut h = scanning(image_project()).await;

    assert!(h.viewer.toggle_fullscreen().await);
    assert!(h.browser.is_fullscreen());
    assert!(!h.viewer.toggle_fullscreen().await);

    h.browser.fail_fullscreen(true);
    assert!(!h.viewer.toggle_fullscreen().await);
    assert_eq!(h.viewer.state(), &ViewerState::Scanning);
}

#[tokio::test(start_paused = true)]
async fn test_run_serves_commands_and_signals() {
    let mut h = harness(video_project());
    h.viewer.initialize().await.unwrap();

    let (tx, rx) = mpsc::unbounded_channel();
    let browser = h.browser.clone();
    let driver = async move {
        tx.send(ViewerCommand::StartAr).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        browser.emit(EngineSignal::TargetFound);
        tokio::time::sleep(Duration::from_millis(10)).await;
        browser.emit(EngineSignal::TargetLost);
        tokio::time::sleep(Duration::from_millis(600)).await;
        tx.send(ViewerCommand::Shutdown).unwrap();
    };

    tokio::join!(h.viewer.run(rx), driver);

    assert_eq!(
        h.browser.media_log(),
        vec![MediaCall::Play, MediaCall::Pause, MediaCall::Pause, MediaCall::Detach]
    );
    assert_eq!(h.browser.live_camera_tracks(), 0);

    flush_analytics().await;
    assert_eq!(h.sink.of_type(ArEventType::TrackingLost).len(), 1);
}
