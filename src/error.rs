//! # Viewer Error Handling
//!
//! Hierarchical error types for the AR viewer, with classification traits that
//! decide how each failure surfaces in the UI.
//!
//! ## Architecture
//!
//! - **Error Types**: One variant per failure family, each carrying an `ErrorContext`
//! - **Error Traits**: Severity, recovery action, and recovery suggestion
//! - **Failure View**: `ViewerError::failure()` produces the `ViewerFailure` that
//!   the `error` viewer state displays
//!
//! ## Error Classification
//!
//! | Error | Fatal | User recovery |
//! |-------|-------|---------------|
//! | `LibraryLoad` | yes | reload |
//! | `CameraPermission` | for the session | grant permission and retry |
//! | `SceneBuild` | yes | reload |
//! | `TrackingEngine` | unless benign | reload |
//! | `AnalyticsDelivery` | never | none, logged only |
//! | `ProjectUnavailable` | yes | reload |
//!
//! Benign tracking-engine noise is recognised by `classify::is_benign_engine_error`
//! and never reaches the state machine.
//!
//! ## Usage
//!
//! ```rust
//! use marker_ar_viewer::error::{RecoveryAction, Recoverable, ViewerError};
//!
//! let error = ViewerError::camera_permission("NotAllowedError: Permission denied")
//!     .with_operation("getUserMedia");
//! assert_eq!(error.recovery_action(), RecoveryAction::Retry);
//! assert!(error.failure().message.contains("camera"));
//! ```

use std::{collections::HashMap, error::Error as StdError, fmt, time::SystemTime};

use serde::Serialize;

/// Severity levels for errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// Noise that is logged and otherwise ignored
    Debug,
    /// Failures that never affect the viewer state
    Warning,
    /// Failures that end the current session
    Error,
    /// Failures that require a full reload
    Fatal,
}

/// The single recovery affordance offered next to an error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryAction {
    /// Reload the whole viewer (page reload)
    Reload,
    /// Retry from the permission screen
    Retry,
    /// Nothing to offer; the failure is not user-visible
    None,
}

/// Metadata about when and where an error occurred
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// When the error occurred
    pub timestamp: SystemTime,
    /// The operation being performed when the error occurred
    pub operation: Option<String>,
    /// Additional context about the error
    pub context: Option<String>,
    /// Suggested recovery action, shown to the user when present
    pub recovery_suggestion: Option<String>,
    /// Additional metadata as key-value pairs
    pub metadata: HashMap<String, String>,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            timestamp: SystemTime::now(),
            operation: None,
            context: None,
            recovery_suggestion: None,
            metadata: HashMap::new(),
        }
    }
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Base error type for the AR viewer
#[derive(Debug)]
pub enum ViewerError {
    /// A tracking-engine or renderer script failed to fetch, parse, or initialise
    LibraryLoad {
        script: String,
        reason: String,
        context: ErrorContext,
    },
    /// Camera access was denied or no camera is available
    CameraPermission {
        reason: String,
        context: ErrorContext,
    },
    /// The scene could not be built or mounted
    SceneBuild {
        reason: String,
        context: ErrorContext,
    },
    /// The tracking engine raised an error at runtime
    TrackingEngine {
        message: String,
        context: ErrorContext,
    },
    /// A telemetry event could not be delivered
    AnalyticsDelivery {
        event: String,
        reason: String,
        context: ErrorContext,
    },
    /// The project could not be fetched or is no longer active
    ProjectUnavailable {
        short_code: String,
        reason: String,
        context: ErrorContext,
    },
    /// Configuration validation errors
    Config {
        field: String,
        value: String,
        reason: String,
        context: ErrorContext,
    },
    /// An operation was attempted in a state that does not allow it
    State {
        current_state: String,
        attempted_operation: String,
        context: ErrorContext,
    },
}

impl ViewerError {
    pub fn library_load(script: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::LibraryLoad {
            script: script.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn camera_permission(reason: impl Into<String>) -> Self {
        Self::CameraPermission {
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn scene_build(reason: impl Into<String>) -> Self {
        Self::SceneBuild {
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn tracking_engine(message: impl Into<String>) -> Self {
        Self::TrackingEngine {
            message: message.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn analytics_delivery(event: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::AnalyticsDelivery {
            event: event.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn project_unavailable(short_code: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ProjectUnavailable {
            short_code: short_code.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn config(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Config {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn state(current_state: impl Into<String>, attempted_operation: impl Into<String>) -> Self {
        Self::State {
            current_state: current_state.into(),
            attempted_operation: attempted_operation.into(),
            context: ErrorContext::new(),
        }
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context_mut().context = Some(context.into());
        self
    }

    /// Add operation context
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.context_mut().operation = Some(operation.into());
        self
    }

    /// Add recovery suggestion
    pub fn with_recovery_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context_mut().recovery_suggestion = Some(suggestion.into());
        self
    }

    /// Add metadata
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context_mut().metadata.insert(key.into(), value.into());
        self
    }

    /// Get the error context
    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::LibraryLoad { context, .. } => context,
            Self::CameraPermission { context, .. } => context,
            Self::SceneBuild { context, .. } => context,
            Self::TrackingEngine { context, .. } => context,
            Self::AnalyticsDelivery { context, .. } => context,
            Self::ProjectUnavailable { context, .. } => context,
            Self::Config { context, .. } => context,
            Self::State { context, .. } => context,
        }
    }

    fn context_mut(&mut self) -> &mut ErrorContext {
        match self {
            Self::LibraryLoad { context, .. } => context,
            Self::CameraPermission { context, .. } => context,
            Self::SceneBuild { context, .. } => context,
            Self::TrackingEngine { context, .. } => context,
            Self::AnalyticsDelivery { context, .. } => context,
            Self::ProjectUnavailable { context, .. } => context,
            Self::Config { context, .. } => context,
            Self::State { context, .. } => context,
        }
    }

    /// Get the error category as a string
    pub fn category(&self) -> &'static str {
        match self {
            Self::LibraryLoad { .. } => "library_load",
            Self::CameraPermission { .. } => "camera_permission",
            Self::SceneBuild { .. } => "scene_build",
            Self::TrackingEngine { .. } => "tracking_engine",
            Self::AnalyticsDelivery { .. } => "analytics_delivery",
            Self::ProjectUnavailable { .. } => "project_unavailable",
            Self::Config { .. } => "config",
            Self::State { .. } => "state",
        }
    }

    /// Message shown to the user in the `error` state.
    pub fn user_message(&self) -> String {
        match self {
            Self::LibraryLoad { .. } => {
                "Failed to load the AR engine. Please reload the page.".to_string()
            }
            Self::CameraPermission { .. } => {
                "Could not access the camera. Please allow camera permission and try again."
                    .to_string()
            }
            Self::SceneBuild { .. } => {
                "Failed to prepare the AR scene. Please reload the page.".to_string()
            }
            Self::TrackingEngine { .. } => {
                "The AR tracker stopped unexpectedly. Please reload the page.".to_string()
            }
            Self::ProjectUnavailable { .. } => {
                "AR experience not found or no longer active. Check that the link is correct."
                    .to_string()
            }
            Self::AnalyticsDelivery { .. } | Self::Config { .. } | Self::State { .. } => {
                self.to_string()
            }
        }
    }

    /// The view of this error that the `error` state renders.
    pub fn failure(&self) -> ViewerFailure {
        let message = match self.recovery_suggestion() {
            Some(suggestion) => format!("{} {}", self.user_message(), suggestion),
            None => self.user_message(),
        };
        ViewerFailure {
            category: self.category(),
            message,
            recovery: self.recovery_action(),
        }
    }
}

/// What the `error` viewer state shows: an explanation plus one recovery action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewerFailure {
    pub category: &'static str,
    pub message: String,
    pub recovery: RecoveryAction,
}

impl fmt::Display for ViewerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewerError::LibraryLoad { script, reason, .. } => {
                write!(f, "Failed to load script '{}': {}", script, reason)
            }
            ViewerError::CameraPermission { reason, .. } => {
                write!(f, "Camera access failed: {}", reason)
            }
            ViewerError::SceneBuild { reason, .. } => {
                write!(f, "Failed to build tracking scene: {}", reason)
            }
            ViewerError::TrackingEngine { message, .. } => {
                write!(f, "Tracking engine error: {}", message)
            }
            ViewerError::AnalyticsDelivery { event, reason, .. } => {
                write!(f, "Failed to deliver '{}' event: {}", event, reason)
            }
            ViewerError::ProjectUnavailable {
                short_code, reason, ..
            } => {
                write!(f, "Project '{}' unavailable: {}", short_code, reason)
            }
            ViewerError::Config {
                field,
                value,
                reason,
                ..
            } => {
                write!(
                    f,
                    "Configuration error in '{}': {} (value: {})",
                    field, reason, value
                )
            }
            ViewerError::State {
                current_state,
                attempted_operation,
                ..
            } => {
                write!(
                    f,
                    "Cannot {} while the viewer is {}",
                    attempted_operation, current_state
                )
            }
        }
    }
}

impl StdError for ViewerError {}

/// Result type alias using the viewer error type
pub type ViewerResult<T> = Result<T, ViewerError>;

/// Trait for errors that can be recovered from by the user
pub trait Recoverable {
    /// Check if this error can be recovered from without a reload
    fn is_recoverable(&self) -> bool;

    /// The single recovery action offered for this error
    fn recovery_action(&self) -> RecoveryAction;
}

impl Recoverable for ViewerError {
    fn is_recoverable(&self) -> bool {
        matches!(
            self.recovery_action(),
            RecoveryAction::Retry | RecoveryAction::None
        )
    }

    fn recovery_action(&self) -> RecoveryAction {
        match self {
            Self::CameraPermission { .. } => RecoveryAction::Retry,
            Self::AnalyticsDelivery { .. } | Self::State { .. } => RecoveryAction::None,
            Self::LibraryLoad { .. }
            | Self::SceneBuild { .. }
            | Self::TrackingEngine { .. }
            | Self::ProjectUnavailable { .. }
            | Self::Config { .. } => RecoveryAction::Reload,
        }
    }
}

/// Trait for errors with severity levels
pub trait HasSeverity {
    fn severity(&self) -> ErrorSeverity;
}

impl HasSeverity for ViewerError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::AnalyticsDelivery { .. } | Self::State { .. } => ErrorSeverity::Warning,
            Self::CameraPermission { .. } => ErrorSeverity::Error,
            _ => ErrorSeverity::Fatal,
        }
    }
}

/// Trait for errors that provide recovery suggestions
pub trait HasRecoverySuggestion {
    fn recovery_suggestion(&self) -> Option<&str>;
}

impl HasRecoverySuggestion for ViewerError {
    fn recovery_suggestion(&self) -> Option<&str> {
        self.context().recovery_suggestion.as_deref()
    }
}

/// Error classification utilities
pub mod classify {
    use super::*;

    /// Check if an error must move the viewer into the `error` state
    pub fn is_fatal(error: &ViewerError) -> bool {
        error.severity() >= ErrorSeverity::Error
    }

    /// Check if an error is only ever logged
    pub fn is_silent(error: &ViewerError) -> bool {
        error.recovery_action() == RecoveryAction::None
    }

    /// Check whether a tracking-engine runtime message matches known third-party noise.
    ///
    /// Matching is a case-insensitive substring test against `patterns`.
    pub fn is_benign_engine_error(message: &str, patterns: &[String]) -> bool {
        let message = message.to_ascii_lowercase();
        patterns
            .iter()
            .filter(|p| !p.is_empty())
            .any(|p| message.contains(&p.to_ascii_lowercase()))
    }
}
