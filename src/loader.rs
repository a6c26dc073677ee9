//! # Library Loader
//!
//! Makes sure the 3D renderer and the marker-tracking engine are loaded and
//! initialised exactly once per process.
//!
//! ## Load Sequence
//!
//! 1. If every configured global is already defined, return immediately.
//! 2. Inject each script in order, skipping ids that the [`ScriptRegistry`] or the
//!    document already know about. Each injection resolves on the script's load event.
//! 3. Wait the configured settle delay. The tracking engine attaches its globals
//!    asynchronously after its load event fires.
//! 4. Check every global. A missing global is a load failure.
//!
//! Any failure is returned as `ViewerError::LibraryLoad`, which is fatal for the
//! viewer. Nothing is retried here.

use std::time::Duration;

use tracing::{debug, info};

use crate::config::ScriptSource;
use crate::core::script_registry::ScriptRegistry;
use crate::error::{ViewerError, ViewerResult};
use crate::platform::ScriptHost;

/// What `ensure_libraries_loaded` had to do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOutcome {
    /// Script ids injected by this call, in order
    pub injected: Vec<String>,
    /// True when every global was already present and nothing was awaited
    pub already_present: bool,
}

/// Ensure every script in `scripts` is loaded and its global is defined.
pub async fn ensure_libraries_loaded(
    host: &dyn ScriptHost,
    registry: &ScriptRegistry,
    scripts: &[ScriptSource],
    settle_delay: Duration,
) -> ViewerResult<LoadOutcome> {
    if scripts.iter().all(|s| host.has_global(&s.global)) {
        for script in scripts {
            registry.mark_loaded(&script.id);
        }
        debug!("engine libraries already present");
        return Ok(LoadOutcome {
            injected: Vec::new(),
            already_present: true,
        });
    }

    let mut outcome = LoadOutcome::default();
    for script in scripts {
        if registry.is_loaded(&script.id) || host.has_script_element(&script.id) {
            debug!(script = %script.id, "script already injected, skipping");
            continue;
        }

        debug!(script = %script.id, url = %script.url, "injecting script");
        host.inject_script(&script.id, &script.url)
            .await
            .map_err(|e| {
                ViewerError::library_load(&script.id, e.to_string())
                    .with_operation("inject_script")
                    .with_metadata("url", &script.url)
            })?;
        registry.mark_loaded(&script.id);
        outcome.injected.push(script.id.clone());
    }

    tokio::time::sleep(settle_delay).await;

    if let Some(missing) = scripts.iter().find(|s| !host.has_global(&s.global)) {
        return Err(ViewerError::library_load(
            &missing.id,
            format!("global '{}' not defined after load", missing.global),
        )
        .with_operation("verify_globals"));
    }

    info!(injected = outcome.injected.len(), "engine libraries ready");
    Ok(outcome)
}
