//! # Script Registry Module
//!
//! Process-wide record of which engine scripts have finished loading.
//!
//! ## Overview
//!
//! Third-party engine scripts must be injected at most once per page lifetime, no
//! matter how many times a viewer is mounted and unmounted:
//! - **Problem**: Remounting the viewer would inject the tracking engine again and
//!   attach a second copy of its globals
//! - **Solution**: A set of loaded script ids, created empty at process start and
//!   consulted before every injection attempt
//! - **Lifecycle**: Append-only. An id is added after its script's load event and
//!   never removed
//!
//! ## Sharing
//!
//! ```text
//! ┌──────────────┐
//! │  Viewer A    │──┐
//! └──────────────┘  │    ┌──────────────────┐
//!                   ├───▶│  ScriptRegistry  │   global(): one per process
//! ┌──────────────┐  │    │  {three-js, ...} │
//! │  Viewer B    │──┘    └──────────────────┘
//! └──────────────┘
//! ```
//!
//! Viewers take an `Arc<ScriptRegistry>`, so tests can hand each viewer a fresh
//! registry instead of the process-wide one.
//!
//! ## Example
//!
//! ```rust
//! use marker_ar_viewer::core::script_registry::ScriptRegistry;
//!
//! let registry = ScriptRegistry::new();
//! assert!(registry.mark_loaded("three-js"));
//! assert!(!registry.mark_loaded("three-js"));
//! assert!(registry.is_loaded("three-js"));
//! ```

use std::collections::HashSet;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard};

static GLOBAL: LazyLock<Arc<ScriptRegistry>> = LazyLock::new(|| Arc::new(ScriptRegistry::new()));

/// Append-only set of loaded script ids.
#[derive(Debug, Default)]
pub struct ScriptRegistry {
    /// Ids whose load event has fired
    loaded: Mutex<HashSet<String>>,
}

impl ScriptRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by every viewer in this process.
    pub fn global() -> Arc<ScriptRegistry> {
        Arc::clone(&GLOBAL)
    }

    fn ids(&self) -> MutexGuard<'_, HashSet<String>> {
        self.loaded.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_loaded(&self, id: &str) -> bool {
        self.ids().contains(id)
    }

    /// Record `id` as loaded. Returns false if it was already recorded.
    pub fn mark_loaded(&self, id: &str) -> bool {
        self.ids().insert(id.to_string())
    }

    /// Whether every id in `ids` has been recorded.
    pub fn all_loaded<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> bool {
        let loaded = self.ids();
        ids.into_iter().all(|id| loaded.contains(id))
    }

    pub fn len(&self) -> usize {
        self.ids().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids().is_empty()
    }
}
