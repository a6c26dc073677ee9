// SPDX-License-Identifier: MIT
//! # AR Backend Client
//!
//! Typed access to the two backend endpoints the AR viewer depends on:
//!
//! | Operation | Method | Path |
//! |-----------|--------|------|
//! | project by short code | `GET` | `{base}/ar/{shortCode}` |
//! | track AR event | `POST` | `{base}/ar/projects/{projectId}/events` |
//!
//! Every response is wrapped in the backend's envelope:
//!
//! ```json
//! { "success": true, "data": { ... }, "message": "optional" }
//! ```
//!
//! A non-2xx status or `success: false` is reported as
//! [`BackendError::Rejected`] carrying the server's message.
//!
//! Authentication is not handled here. Callers that have a signed-in user
//! plug a [`TokenProvider`] in and the client attaches its bearer token.
//!
//! ## Usage Patterns
//!
//! ```rust,no_run
//! use ar_backend::{ArEvent, ArEventType, BackendClient};
//!
//! # async fn example() -> Result<(), ar_backend::BackendError> {
//! let client = BackendClient::new("https://api.example/api/v1")?;
//! let project = client.project_by_short_code("abc123").await?;
//!
//! let event = ArEvent::new("session_1", ArEventType::ArStart);
//! client.track_ar_event(&project.id, &event).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod events;

pub use client::{BackendClient, NoAuth, StaticToken, TokenProvider};
pub use error::BackendError;
pub use events::{ArEvent, ArEventType};
