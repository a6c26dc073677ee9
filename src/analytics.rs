//! # Analytics Reporting
//!
//! Best-effort delivery of AR session telemetry.
//!
//! Every event is sent on its own spawned task. The caller never awaits delivery,
//! so a slow or failing endpoint cannot hold up a state transition. Failures are
//! logged as `AnalyticsDelivery` warnings and dropped; nothing is retried.

use std::sync::Arc;

use anyhow::Result;
use ar_backend::{ArEvent, ArEventType, BackendClient};
use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::device::DeviceInfo;
use crate::error::ViewerError;

/// Destination for telemetry events.
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn track(&self, project_id: &str, event: &ArEvent) -> Result<()>;
}

#[async_trait]
impl AnalyticsSink for BackendClient {
    async fn track(&self, project_id: &str, event: &ArEvent) -> Result<()> {
        self.track_ar_event(project_id, event).await?;
        Ok(())
    }
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

#[async_trait]
impl AnalyticsSink for DiscardSink {
    async fn track(&self, _project_id: &str, _event: &ArEvent) -> Result<()> {
        Ok(())
    }
}

/// Stamps events with device and app details and sends them fire-and-forget.
#[derive(Clone)]
pub struct AnalyticsReporter {
    sink: Arc<dyn AnalyticsSink>,
    device: DeviceInfo,
    app_version: String,
}

impl std::fmt::Debug for AnalyticsReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyticsReporter")
            .field("device", &self.device)
            .field("app_version", &self.app_version)
            .finish_non_exhaustive()
    }
}

impl AnalyticsReporter {
    pub fn new(sink: Arc<dyn AnalyticsSink>, device: DeviceInfo, app_version: impl Into<String>) -> Self {
        Self {
            sink,
            device,
            app_version: app_version.into(),
        }
    }

    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    /// Build the full event body.
    pub fn event(&self, session_id: &str, event_type: ArEventType, extra: Map<String, Value>) -> ArEvent {
        let mut event = ArEvent::new(session_id, event_type);
        event.device_model = self.device.device_model.clone();
        event.os_type = self.device.os_type.clone();
        event.os_version = self.device.os_version.clone();
        event.app_version = self.app_version.clone();
        event.extra = extra;
        event
    }

    /// Send an event without waiting for it.
    ///
    /// Returns the delivery task, or `None` when called outside a tokio runtime
    /// (e.g. from a destructor during process exit), in which case the event is dropped.
    pub fn report(
        &self,
        project_id: &str,
        session_id: &str,
        event_type: ArEventType,
        extra: Map<String, Value>,
    ) -> Option<JoinHandle<()>> {
        let event = self.event(session_id, event_type, extra);
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(event = event_type.as_str(), "no runtime, analytics event dropped");
            return None;
        };

        let sink = Arc::clone(&self.sink);
        let project_id = project_id.to_string();
        Some(runtime.spawn(async move {
            match sink.track(&project_id, &event).await {
                Ok(()) => debug!(event = event.event_type.as_str(), "analytics event delivered"),
                Err(e) => {
                    let error = ViewerError::analytics_delivery(event.event_type.as_str(), e.to_string())
                        .with_metadata("project_id", project_id);
                    warn!(%error, "analytics delivery failed");
                }
            }
        }))
    }
}

/// Build an `extra` map from key/value pairs.
pub fn extra<const N: usize>(pairs: [(&str, Value); N]) -> Map<String, Value> {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}
