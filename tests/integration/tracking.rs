//! Target found/lost handling, the lost grace window and playback.

use std::time::Duration;

use ar_backend::ArEventType;
use marker_ar_viewer::ViewerState;
use marker_ar_viewer::platform::EngineSignal;
use marker_ar_viewer::platform::simulated::MediaCall;
use tokio::time::advance;

use crate::common::{
    RecordingSink, flush_analytics, harness_with, image_project, scanning, test_config,
    video_project,
};

fn pauses(log: &[MediaCall]) -> usize {
    log.iter().filter(|c| **c == MediaCall::Pause).count()
}

#[tokio::test(start_paused = true)]
async fn test_found_resumes_looping_video() {
    let mut h = scanning(video_project()).await;
    assert!(h.browser.video().unwrap().paused);

    h.browser.emit(EngineSignal::TargetFound);
    h.viewer.process_pending();

    assert_eq!(h.viewer.state(), &ViewerState::Tracking);
    let video = h.browser.video().unwrap();
    assert!(!video.paused);
    assert!(video.looping);
    assert_eq!(h.browser.media_log(), vec![MediaCall::Play]);
}

#[tokio::test(start_paused = true)]
async fn test_found_without_autoplay_leaves_video_paused() {
    let mut project = video_project();
    project.auto_play = false;
    let mut h = scanning(project).await;

    h.browser.emit(EngineSignal::TargetFound);
    h.viewer.process_pending();

    assert_eq!(h.viewer.state(), &ViewerState::Tracking);
    assert!(h.browser.video().unwrap().paused);
    assert!(h.browser.media_log().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_image_content_tracks_without_media() {
    let mut h = scanning(image_project()).await;

    h.browser.emit(EngineSignal::TargetFound);
    h.viewer.process_pending();
    h.browser.emit(EngineSignal::TargetLost);
    h.viewer.process_pending();
    advance(Duration::from_millis(500)).await;
    h.viewer.poll_timers();

    assert_eq!(h.viewer.state(), &ViewerState::Scanning);
    assert!(h.browser.media_log().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_brief_loss_does_not_pause() {
    let mut h = scanning(video_project()).await;
    h.browser.emit(EngineSignal::TargetFound);
    h.viewer.process_pending();

    h.browser.emit(EngineSignal::TargetLost);
    h.viewer.process_pending();
    assert!(h.viewer.lost_deadline().is_some());

    advance(Duration::from_millis(300)).await;
    h.browser.emit(EngineSignal::TargetFound);
    h.viewer.process_pending();
    assert!(h.viewer.lost_deadline().is_none());

    advance(Duration::from_millis(600)).await;
    h.viewer.process_pending();

    assert_eq!(h.viewer.state(), &ViewerState::Tracking);
    assert_eq!(pauses(&h.browser.media_log()), 0);
    assert!(!h.browser.video().unwrap().paused);

    flush_analytics().await;
    assert!(h.sink.of_type(ArEventType::TrackingLost).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_sustained_loss_pauses_and_keeps_position() {
    let mut h = scanning(video_project()).await;
    h.browser.emit(EngineSignal::TargetFound);
    h.viewer.process_pending();
    h.browser.advance_playback(2.0);

    h.browser.emit(EngineSignal::TargetLost);
    h.viewer.process_pending();
    assert_eq!(h.viewer.state(), &ViewerState::Tracking);

    advance(Duration::from_millis(499)).await;
    h.viewer.poll_timers();
    assert_eq!(h.viewer.state(), &ViewerState::Tracking);

    advance(Duration::from_millis(1)).await;
    h.viewer.poll_timers();
    assert_eq!(h.viewer.state(), &ViewerState::Scanning);

    let video = h.browser.video().unwrap();
    assert!(video.paused);
    assert_eq!(video.position, 2.0);

    h.browser.advance_playback(1.0);
    assert_eq!(h.browser.video().unwrap().position, 2.0);

    // Found again resumes from where it paused.
    h.browser.emit(EngineSignal::TargetFound);
    h.viewer.process_pending();
    h.browser.advance_playback(1.0);
    assert_eq!(h.viewer.state(), &ViewerState::Tracking);
    assert_eq!(h.browser.video().unwrap().position, 3.0);
    assert_eq!(
        h.browser.media_log(),
        vec![MediaCall::Play, MediaCall::Pause, MediaCall::Play]
    );

    flush_analytics().await;
    assert_eq!(h.sink.of_type(ArEventType::TrackingLost).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_lost_commits_once() {
    let mut h = scanning(video_project()).await;
    h.browser.emit(EngineSignal::TargetFound);
    h.viewer.process_pending();

    h.browser.emit(EngineSignal::TargetLost);
    h.viewer.process_pending();
    advance(Duration::from_millis(200)).await;
    h.browser.emit(EngineSignal::TargetLost);
    h.viewer.process_pending();

    // The second lost does not extend the window.
    advance(Duration::from_millis(300)).await;
    h.viewer.poll_timers();
    assert_eq!(h.viewer.state(), &ViewerState::Scanning);

    advance(Duration::from_secs(1)).await;
    h.viewer.poll_timers();
    assert_eq!(pauses(&h.browser.media_log()), 1);

    flush_analytics().await;
    assert_eq!(h.sink.of_type(ArEventType::TrackingLost).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_zero_grace_commits_immediately() {
    let mut config = test_config();
    config.lost_grace_ms = 0;
    let mut h = harness_with(video_project(), config, RecordingSink::new());
    h.viewer.initialize().await.unwrap();
    h.viewer.start_ar().await.unwrap();

    h.browser.emit(EngineSignal::TargetFound);
    h.browser.emit(EngineSignal::TargetLost);
    h.viewer.process_pending();

    assert_eq!(h.viewer.state(), &ViewerState::Scanning);
    assert!(h.viewer.lost_deadline().is_none());
    assert_eq!(h.browser.media_log(), vec![MediaCall::Play, MediaCall::Pause]);
}

#[tokio::test(start_paused = true)]
async fn test_lost_while_scanning_is_ignored() {
    let mut h = scanning(video_project()).await;

    h.browser.emit(EngineSignal::TargetLost);
    h.viewer.process_pending();
    advance(Duration::from_secs(1)).await;
    h.viewer.poll_timers();

    assert_eq!(h.viewer.state(), &ViewerState::Scanning);
    assert!(h.browser.media_log().is_empty());
    flush_analytics().await;
    assert!(h.sink.of_type(ArEventType::TrackingLost).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_back_during_grace_cancels_commit() {
    let mut h = scanning(video_project()).await;
    h.browser.emit(EngineSignal::TargetFound);
    h.browser.emit(EngineSignal::TargetLost);
    h.viewer.process_pending();

    h.viewer.back().unwrap();
    assert!(h.viewer.lost_deadline().is_none());

    advance(Duration::from_secs(1)).await;
    h.viewer.poll_timers();
    assert_eq!(h.viewer.state(), &ViewerState::Permission);

    flush_analytics().await;
    assert!(h.sink.of_type(ArEventType::TrackingLost).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_signals_from_previous_scene_are_dropped() {
    let mut h = scanning(video_project()).await;
    h.viewer.back().unwrap();
    h.viewer.start_ar().await.unwrap();

    assert!(h.browser.emit_stale(0, EngineSignal::TargetFound));
    h.viewer.process_pending();

    assert_eq!(h.viewer.state(), &ViewerState::Scanning);
    assert!(h.browser.video().unwrap().paused);
}

#[tokio::test(start_paused = true)]
async fn test_signals_after_back_reach_nothing() {
    let mut h = scanning(video_project()).await;
    h.viewer.back().unwrap();

    assert_eq!(h.browser.emit(EngineSignal::TargetFound), 0);
    h.browser.emit_stale(0, EngineSignal::TargetFound);
    h.viewer.process_pending();

    assert_eq!(h.viewer.state(), &ViewerState::Permission);
}
