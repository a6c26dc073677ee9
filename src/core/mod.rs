//! # Core Infrastructure Module
//!
//! Process-wide infrastructure shared by every viewer instance.

pub mod script_registry;
