// SPDX-License-Identifier: MIT
//! AR session telemetry payloads.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Telemetry event kinds accepted by `track-ar-event`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArEventType {
    ArStart,
    ArEnd,
    TrackingLost,
    ContentInteraction,
}

impl ArEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            ArEventType::ArStart => "ar_start",
            ArEventType::ArEnd => "ar_end",
            ArEventType::TrackingLost => "tracking_lost",
            ArEventType::ContentInteraction => "content_interaction",
        }
    }
}

/// Body of a `track-ar-event` request.
///
/// Fields outside the fixed set (`loadDuration`, `trackingDuration`, `error`,
/// `action`, ...) travel in `extra` and are flattened into the JSON object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArEvent {
    pub session_id: String,
    pub event_type: ArEventType,
    pub device_model: String,
    pub os_type: String,
    pub os_version: String,
    pub app_version: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ArEvent {
    pub fn new(session_id: impl Into<String>, event_type: ArEventType) -> Self {
        Self {
            session_id: session_id.into(),
            event_type,
            device_model: String::new(),
            os_type: "other".to_string(),
            os_version: "unknown".to_string(),
            app_version: String::new(),
            extra: Map::new(),
        }
    }

    /// Attach an extra field.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}
