//! Integration tests driving a full viewer against the simulated browser
//!
//! Each test builds its own browser, script registry and analytics sink, and
//! runs on a paused tokio clock so grace windows are advanced explicitly.

#[path = "../common/mod.rs"]
mod common;

mod failures;
mod lifecycle;
mod tracking;
