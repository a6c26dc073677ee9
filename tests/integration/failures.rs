//! Failure paths: every fatal error lands in `error` with resources released.

use std::time::Duration;

use ar_backend::ArEventType;
use marker_ar_viewer::platform::EngineSignal;
use marker_ar_viewer::{RecoveryAction, ViewerState};
use serde_json::json;

use crate::common::{
    RecordingSink, disabled_project, flush_analytics, harness, harness_with, image_project,
    scanning, test_config, video_project,
};

fn failure(state: &ViewerState) -> (&'static str, RecoveryAction) {
    let failure = state.failure().expect("viewer should be in the error state");
    (failure.category, failure.recovery)
}

#[tokio::test(start_paused = true)]
async fn test_camera_denied_offers_retry() {
    let mut h = harness(video_project());
    h.viewer.initialize().await.unwrap();
    h.browser.deny_camera(true);

    h.viewer.start_ar().await.unwrap();

    assert_eq!(
        failure(h.viewer.state()),
        ("camera_permission", RecoveryAction::Retry)
    );
    let message = &h.viewer.state().failure().unwrap().message;
    assert!(message.contains("camera permission"));
    assert_eq!(h.browser.user_media_calls(), 1);
    assert_eq!(h.browser.live_camera_tracks(), 0);
    assert_eq!(h.browser.engines_created(), 0);
    assert!(h.viewer.session().is_none());

    flush_analytics().await;
    let ends = h.sink.of_type(ArEventType::ArEnd);
    assert_eq!(ends.len(), 1);
    assert_eq!(ends[0].extra.get("error"), Some(&json!("camera_permission_denied")));
}

#[tokio::test(start_paused = true)]
async fn test_retry_after_camera_denied() {
    let mut h = harness(image_project());
    h.viewer.initialize().await.unwrap();
    h.browser.deny_camera(true);
    h.viewer.start_ar().await.unwrap();

    h.viewer.retry().unwrap();
    assert_eq!(h.viewer.state(), &ViewerState::Permission);

    h.browser.deny_camera(false);
    h.viewer.start_ar().await.unwrap();
    assert_eq!(h.viewer.state(), &ViewerState::Scanning);
    assert_eq!(h.browser.user_media_calls(), 2);
    // Scripts are not injected again.
    assert_eq!(h.browser.injected_scripts().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_script_failure_needs_reload() {
    let mut h = harness(image_project());
    h.browser.fail_script("mindar-image-three");

    h.viewer.initialize().await.unwrap();

    assert_eq!(
        failure(h.viewer.state()),
        ("library_load", RecoveryAction::Reload)
    );
    assert_eq!(h.browser.injected_scripts(), vec!["three-js".to_string()]);
    assert_eq!(h.browser.user_media_calls(), 0);

    assert!(h.viewer.retry().is_err());
    assert!(h.viewer.start_ar().await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_reload_recovers_late_globals() {
    let mut h = harness(image_project());
    h.browser.set_global_delay(Duration::from_millis(100));

    h.viewer.initialize().await.unwrap();
    assert_eq!(
        failure(h.viewer.state()),
        ("library_load", RecoveryAction::Reload)
    );

    tokio::time::sleep(Duration::from_millis(200)).await;
    h.viewer.reload().await.unwrap();

    assert_eq!(h.viewer.state(), &ViewerState::Permission);
    assert_eq!(h.browser.injected_scripts().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_reload_only_from_error() {
    let mut h = harness(image_project());
    h.viewer.initialize().await.unwrap();

    assert!(h.viewer.reload().await.is_err());
    assert_eq!(h.viewer.state(), &ViewerState::Permission);
}

#[tokio::test(start_paused = true)]
async fn test_disabled_project_never_touches_camera_or_scripts() {
    let mut h = harness(disabled_project());

    h.viewer.initialize().await.unwrap();

    assert_eq!(
        failure(h.viewer.state()),
        ("project_unavailable", RecoveryAction::Reload)
    );
    assert!(h.browser.injected_scripts().is_empty());
    assert_eq!(h.browser.user_media_calls(), 0);
    assert!(h.viewer.start_ar().await.is_err());
    assert_eq!(h.browser.user_media_calls(), 0);

    flush_analytics().await;
    assert!(h.sink.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_engine_start_failure_releases_camera() {
    let mut h = harness(video_project());
    h.viewer.initialize().await.unwrap();
    h.browser.fail_engine_start(true);

    h.viewer.start_ar().await.unwrap();

    assert_eq!(
        failure(h.viewer.state()),
        ("scene_build", RecoveryAction::Reload)
    );
    assert_eq!(h.browser.live_camera_tracks(), 0);
    assert_eq!(h.browser.mounted_scenes(), 0);
    assert_eq!(h.browser.running_engines(), 0);
    assert!(h.browser.video().unwrap().detached);
    assert!(h.viewer.session().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_unmounted_container_fails_scene_build() {
    let mut h = harness(image_project());
    h.viewer.initialize().await.unwrap();
    h.browser.set_container_mounted(false);

    h.viewer.start_ar().await.unwrap();

    assert_eq!(
        failure(h.viewer.state()),
        ("scene_build", RecoveryAction::Reload)
    );
    assert_eq!(h.browser.engines_created(), 0);
    assert_eq!(h.browser.live_camera_tracks(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_benign_engine_errors_are_ignored() {
    let mut h = scanning(video_project()).await;
    h.browser.emit(EngineSignal::TargetFound);

    for message in [
        "ResizeObserver loop limit exceeded",
        "The play() request was interrupted by a call to pause()",
        "webgl: invalid_operation: drawElements",
    ] {
        h.browser.emit(EngineSignal::RuntimeError {
            message: message.to_string(),
        });
    }
    h.viewer.process_pending();

    assert_eq!(h.viewer.state(), &ViewerState::Tracking);
    assert_eq!(h.browser.live_camera_tracks(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_fatal_engine_error_tears_down() {
    let mut h = scanning(video_project()).await;
    h.browser.emit(EngineSignal::TargetFound);
    h.browser.emit(EngineSignal::TargetLost);
    h.browser.emit(EngineSignal::RuntimeError {
        message: "WebGL context lost".to_string(),
    });
    h.viewer.process_pending();

    assert_eq!(
        failure(h.viewer.state()),
        ("tracking_engine", RecoveryAction::Reload)
    );
    assert!(h.viewer.lost_deadline().is_none());
    assert_eq!(h.browser.live_camera_tracks(), 0);
    assert_eq!(h.browser.mounted_scenes(), 0);
    assert_eq!(h.browser.active_listeners(), 0);

    tokio::time::advance(Duration::from_secs(1)).await;
    h.viewer.poll_timers();
    flush_analytics().await;
    assert!(h.sink.of_type(ArEventType::TrackingLost).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_first_failure_wins() {
    let mut h = scanning(image_project()).await;
    h.browser.emit(EngineSignal::RuntimeError {
        message: "first".to_string(),
    });
    h.browser.emit(EngineSignal::RuntimeError {
        message: "second".to_string(),
    });
    h.viewer.process_pending();

    assert_eq!(
        failure(h.viewer.state()),
        ("tracking_engine", RecoveryAction::Reload)
    );
    // The second error arrives after teardown and is dropped with its scene.
    assert_eq!(h.browser.active_listeners(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_slow_analytics_does_not_delay_tracking() {
    let sink = RecordingSink::slow(Duration::from_secs(30));
    let mut h = harness_with(video_project(), test_config(), sink);
    h.viewer.initialize().await.unwrap();
    h.viewer.start_ar().await.unwrap();

    h.browser.emit(EngineSignal::TargetFound);
    h.viewer.process_pending();
    assert_eq!(h.viewer.state(), &ViewerState::Tracking);
    assert!(!h.browser.video().unwrap().paused);

    // ar_start is still in flight.
    flush_analytics().await;
    assert!(h.sink.events().is_empty());

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(h.sink.of_type(ArEventType::ArStart).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failing_analytics_is_not_fatal() {
    let mut h = harness_with(video_project(), test_config(), RecordingSink::failing());
    h.viewer.initialize().await.unwrap();
    h.viewer.start_ar().await.unwrap();
    flush_analytics().await;

    h.browser.emit(EngineSignal::TargetFound);
    h.viewer.process_pending();
    h.viewer.toggle_mute();
    flush_analytics().await;

    assert_eq!(h.viewer.state(), &ViewerState::Tracking);
    assert_eq!(h.sink.events().len(), 2);
}
