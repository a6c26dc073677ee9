//! Shared fixtures for the viewer integration tests.
//!
//! Every viewer built here gets its own script registry and a zero settle delay,
//! so tests never see each other's injected scripts and never wait on real time.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, bail};
use ar_backend::{ArEvent, ArEventType};
use ar_scene::project::{ContentType, Project, ProjectStatus};
use async_trait::async_trait;
use marker_ar_viewer::analytics::AnalyticsSink;
use marker_ar_viewer::core::script_registry::ScriptRegistry;
use marker_ar_viewer::platform::simulated::SimulatedBrowser;
use marker_ar_viewer::viewer::StaticProject;
use marker_ar_viewer::{ArViewer, ViewerConfig};

pub const SHORT_CODE: &str = "abc123";

pub fn video_project() -> Project {
    let mut project = Project::new(
        "proj-video",
        "Launch Poster",
        "https://cdn.example/targets/poster.mind",
        "https://cdn.example/media/trailer.mp4",
        ContentType::Video,
    );
    project.auto_play = true;
    project.loop_content = true;
    project
}

pub fn image_project() -> Project {
    Project::new(
        "proj-image",
        "Gallery Card",
        "https://cdn.example/targets/card.mind",
        "https://cdn.example/media/card.png",
        ContentType::Image,
    )
}

pub fn disabled_project() -> Project {
    let mut project = image_project();
    project.status = ProjectStatus::Disabled;
    project
}

pub fn test_config() -> ViewerConfig {
    ViewerConfig {
        settle_delay_ms: 0,
        ..ViewerConfig::default()
    }
}

/// Analytics sink that records every event it is handed.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<(String, ArEvent)>>,
    delay: Duration,
    fail: bool,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A sink that takes `delay` to answer each event.
    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Self::default()
        })
    }

    /// A sink whose every delivery fails.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    pub fn events(&self) -> Vec<(String, ArEvent)> {
        self.events.lock().unwrap().clone()
    }

    pub fn of_type(&self, event_type: ArEventType) -> Vec<ArEvent> {
        self.events()
            .into_iter()
            .filter(|(_, e)| e.event_type == event_type)
            .map(|(_, e)| e)
            .collect()
    }
}

#[async_trait]
impl AnalyticsSink for RecordingSink {
    async fn track(&self, project_id: &str, event: &ArEvent) -> Result<()> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.events
            .lock()
            .unwrap()
            .push((project_id.to_string(), event.clone()));
        if self.fail {
            bail!("503 Service Unavailable");
        }
        Ok(())
    }
}

/// A browser and a viewer bound to it.
pub struct Harness {
    pub browser: SimulatedBrowser,
    pub viewer: ArViewer,
    pub sink: Arc<RecordingSink>,
}

pub fn harness(project: Project) -> Harness {
    harness_with(project, test_config(), RecordingSink::new())
}

pub fn harness_with(project: Project, config: ViewerConfig, sink: Arc<RecordingSink>) -> Harness {
    let browser = SimulatedBrowser::for_config(&config);
    let viewer = ArViewer::builder(SHORT_CODE)
        .config(config)
        .platform(browser.platform())
        .project_source(Arc::new(StaticProject(project)))
        .analytics(sink.clone())
        .script_registry(Arc::new(ScriptRegistry::new()))
        .build()
        .unwrap();
    Harness {
        browser,
        viewer,
        sink,
    }
}

/// Initialize and start AR, leaving the viewer in `scanning`.
pub async fn scanning(project: Project) -> Harness {
    let mut h = harness(project);
    h.viewer.initialize().await.unwrap();
    h.viewer.start_ar().await.unwrap();
    h
}

/// Let spawned analytics tasks run to completion.
pub async fn flush_analytics() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
