//! # Tracking Module
//!
//! The viewer state machine and the lost-target debounce timer.

pub mod debounce;
pub mod state;

pub use debounce::LostTimer;
pub use state::{Effect, TrackingMachine, Transition, ViewerEvent, ViewerState};
