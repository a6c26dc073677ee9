//! # Marker AR Viewer Library
//!
//! The client side of a marker → content AR experience: load the tracking engine,
//! acquire the camera, mount a scene for the project's content, and drive playback
//! from the engine's target found/lost events.
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//! - `loader`: Injects the renderer and tracking-engine scripts exactly once per process
//! - `session`: Camera permission, the probe stream, and the AR session envelope
//! - `scene`: Mounts a `SceneDescriptor` (from `ar-scene`) on the render host
//! - `tracking`: The viewer state machine and the lost-target grace timer
//! - `viewer`: `ArViewer`, which wires all of the above together
//! - `platform`: The browser and engine as traits, plus an in-memory simulation
//! - `config`, `error`: Configuration and the classified error type
//!
//! ## States
//!
//! `loading → permission → scanning ⇄ tracking`, with `error` reachable from
//! anywhere. See [`tracking::state`] for the full transition table.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use marker_ar_viewer::platform::EngineSignal;
//! use marker_ar_viewer::platform::simulated::SimulatedBrowser;
//! use marker_ar_viewer::viewer::StaticProject;
//! use marker_ar_viewer::{ArViewer, ViewerConfig, ViewerState};
//! use ar_scene::project::{ContentType, Project};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let project = Project::new(
//!     "p-1",
//!     "Poster",
//!     "https://cdn.example/target.jpg",
//!     "https://cdn.example/image.png",
//!     ContentType::Image,
//! );
//! let browser = SimulatedBrowser::new();
//! let mut config = ViewerConfig::default();
//! config.settle_delay_ms = 0;
//!
//! let mut viewer = ArViewer::builder("abc123")
//!     .config(config)
//!     .platform(browser.platform())
//!     .project_source(Arc::new(StaticProject(project)))
//!     .build()?;
//!
//! viewer.initialize().await?;
//! viewer.start_ar().await?;
//! assert_eq!(viewer.state(), &ViewerState::Scanning);
//!
//! browser.emit(EngineSignal::TargetFound);
//! viewer.process_pending();
//! assert_eq!(viewer.state(), &ViewerState::Tracking);
//!
//! viewer.shutdown();
//! assert_eq!(browser.live_camera_tracks(), 0);
//! # Ok(())
//! # }
//! ```

pub mod analytics;
pub mod config;
pub mod core;
pub mod device;
pub mod error;
pub mod info;
pub mod loader;
pub mod platform;
pub mod scene;
pub mod session;
pub mod tracking;
pub mod viewer;

/// Re-export error types for convenience
pub use error::{
    HasRecoverySuggestion, HasSeverity, Recoverable, RecoveryAction, ViewerError, ViewerFailure,
    ViewerResult,
};

pub use config::ViewerConfig;
pub use tracking::ViewerState;
pub use viewer::{ArViewer, ArViewerBuilder, ProjectSource, ViewerCommand};

use ar_backend::{BackendClient, StaticToken};
use std::sync::Arc;

/// Backend client for `config.api_base_url`, authenticated with `token` if given.
pub fn connect_backend(config: &ViewerConfig, token: Option<String>) -> ViewerResult<BackendClient> {
    let client = BackendClient::new(&config.api_base_url).map_err(|e| {
        ViewerError::config("api_base_url", &config.api_base_url, e.to_string())
            .with_operation("connect_backend")
    })?;
    Ok(match token {
        Some(token) => client.with_token_provider(Arc::new(StaticToken(token))),
        None => client,
    })
}
