//! # Tracking State Machine
//!
//! The single source of truth for what the viewer shows.
//!
//! ## States
//!
//! ```text
//!            LibrariesLoaded       SessionStarted        TargetFound
//!  Loading ────────────────▶ Permission ─────────▶ Scanning ◀─────────▶ Tracking
//!     ▲                         ▲  ▲                  │   TargetLost        │
//!     │                         │  └──── Back ────────┴─────────────────────┘
//!     │ Reload                  │ Retry (camera denial only)
//!     └──────── Error ──────────┘
//!                 ▲
//!                 └── Failed, from any state
//! ```
//!
//! ## Lost-target Grace Window
//!
//! With a non-zero grace window, `TargetLost` in `Tracking` does not leave
//! `Tracking`. It arms a lost commit with a fresh generation number and asks the
//! caller to schedule `GraceElapsed(generation)`. A `TargetFound` before then
//! cancels the commit, and a `GraceElapsed` whose generation no longer matches is
//! ignored. Only a matching `GraceElapsed` moves to `Scanning` and pauses playback.
//!
//! ## Totality
//!
//! [`TrackingMachine::handle`] accepts every event in every state. Each pair either
//! transitions or is one of the no-ops listed in the table on
//! [`TrackingMachine::handle`]; nothing panics and nothing is queued.

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::error::{RecoveryAction, ViewerFailure};

/// What the viewer currently shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ViewerState {
    Loading,
    Permission,
    Scanning,
    Tracking,
    Error(ViewerFailure),
}

impl ViewerState {
    pub fn name(&self) -> &'static str {
        match self {
            ViewerState::Loading => "loading",
            ViewerState::Permission => "permission",
            ViewerState::Scanning => "scanning",
            ViewerState::Tracking => "tracking",
            ViewerState::Error(_) => "error",
        }
    }

    /// Scanning or tracking: a scene is mounted and the camera is live.
    pub fn is_active(&self) -> bool {
        matches!(self, ViewerState::Scanning | ViewerState::Tracking)
    }

    pub fn failure(&self) -> Option<&ViewerFailure> {
        match self {
            ViewerState::Error(failure) => Some(failure),
            _ => None,
        }
    }
}

impl fmt::Display for ViewerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewerState::Error(failure) => write!(f, "error ({})", failure.message),
            other => f.write_str(other.name()),
        }
    }
}

/// Inputs to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerEvent {
    /// Engine libraries are loaded and the project is viewable
    LibrariesLoaded,
    /// Camera granted and scene mounted
    SessionStarted,
    TargetFound,
    TargetLost,
    /// The grace window armed with this generation has run out
    GraceElapsed(u64),
    /// User pressed back/exit
    Back,
    /// User chose the retry affordance
    Retry,
    /// User chose the reload affordance
    Reload,
    /// An unrecoverable failure occurred
    Failed(ViewerFailure),
}

impl ViewerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ViewerEvent::LibrariesLoaded => "libraries_loaded",
            ViewerEvent::SessionStarted => "session_started",
            ViewerEvent::TargetFound => "target_found",
            ViewerEvent::TargetLost => "target_lost",
            ViewerEvent::GraceElapsed(_) => "grace_elapsed",
            ViewerEvent::Back => "back",
            ViewerEvent::Retry => "retry",
            ViewerEvent::Reload => "reload",
            ViewerEvent::Failed(_) => "failed",
        }
    }
}

/// Side effects the caller must perform after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Entered `Tracking`: resume video playback if the content autoplays
    ResumePlayback,
    /// Left `Tracking` for `Scanning`: pause video without seeking
    PausePlayback,
    /// Report a committed target loss
    ReportTrackingLost,
    /// Schedule `GraceElapsed(generation)` after the grace window
    ArmLostTimer { generation: u64 },
    /// Drop any scheduled `GraceElapsed`
    CancelLostTimer,
    /// Stop camera, render loop, listeners and video, and end the session
    Teardown,
}

/// Result of feeding one event to the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: ViewerState,
    pub to: ViewerState,
    pub effects: Vec<Effect>,
}

impl Transition {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }

    pub fn has(&self, effect: Effect) -> bool {
        self.effects.contains(&effect)
    }
}

/// The viewer's state plus the pending lost commit, if any.
#[derive(Debug, Clone)]
pub struct TrackingMachine {
    state: ViewerState,
    debounce_lost: bool,
    pending_lost: Option<u64>,
    generation: u64,
}

impl TrackingMachine {
    /// Start in `Loading`. With `debounce_lost` false a `TargetLost` commits at once.
    pub fn new(debounce_lost: bool) -> Self {
        Self {
            state: ViewerState::Loading,
            debounce_lost,
            pending_lost: None,
            generation: 0,
        }
    }

    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    /// Generation of the armed lost commit.
    pub fn pending_lost(&self) -> Option<u64> {
        self.pending_lost
    }

    /// Feed one event.
    ///
    /// | State | Event | Next | Effects |
    /// |-------|-------|------|---------|
    /// | Loading | LibrariesLoaded | Permission | |
    /// | Permission | SessionStarted | Scanning | |
    /// | Scanning | TargetFound | Tracking | ResumePlayback |
    /// | Tracking | TargetLost (no debounce) | Scanning | PausePlayback, ReportTrackingLost |
    /// | Tracking | TargetLost (debounce, none pending) | Tracking | ArmLostTimer |
    /// | Tracking | TargetFound (pending) | Tracking | CancelLostTimer |
    /// | Tracking | GraceElapsed(pending gen) | Scanning | PausePlayback, ReportTrackingLost |
    /// | Scanning, Tracking | Back | Permission | CancelLostTimer, Teardown |
    /// | Error(retry) | Retry | Permission | |
    /// | Error | Reload | Loading | Teardown |
    /// | not Error | Failed | Error | CancelLostTimer, Teardown |
    ///
    /// Every other pair is a no-op: the state is unchanged and there are no effects.
    /// That covers repeated found/lost, a second `TargetLost` while one is pending,
    /// stale `GraceElapsed`, `Back` outside a session, `Retry` after a failure that
    /// needs a reload, and `Failed` while already in `Error` (the first failure wins).
    pub fn handle(&mut self, event: ViewerEvent) -> Transition {
        let from = self.state.clone();
        let mut effects = Vec::new();

        let next = match (&self.state, &event) {
            (ViewerState::Loading, ViewerEvent::LibrariesLoaded) => Some(ViewerState::Permission),
            (ViewerState::Permission, ViewerEvent::SessionStarted) => Some(ViewerState::Scanning),
            (ViewerState::Scanning, ViewerEvent::TargetFound) => {
                effects.push(Effect::ResumePlayback);
                Some(ViewerState::Tracking)
            }
            (ViewerState::Tracking, ViewerEvent::TargetFound) => {
                if self.pending_lost.take().is_some() {
                    effects.push(Effect::CancelLostTimer);
                }
                None
            }
            (ViewerState::Tracking, ViewerEvent::TargetLost) => {
                if !self.debounce_lost {
                    effects.extend([Effect::PausePlayback, Effect::ReportTrackingLost]);
                    Some(ViewerState::Scanning)
                } else if self.pending_lost.is_none() {
                    self.generation += 1;
                    self.pending_lost = Some(self.generation);
                    effects.push(Effect::ArmLostTimer {
                        generation: self.generation,
                    });
                    None
                } else {
                    None
                }
            }
            (ViewerState::Tracking, ViewerEvent::GraceElapsed(generation))
                if self.pending_lost == Some(*generation) =>
            {
                self.pending_lost = None;
                effects.extend([Effect::PausePlayback, Effect::ReportTrackingLost]);
                Some(ViewerState::Scanning)
            }
            (ViewerState::Scanning | ViewerState::Tracking, ViewerEvent::Back) => {
                effects.extend([Effect::CancelLostTimer, Effect::Teardown]);
                Some(ViewerState::Permission)
            }
            (ViewerState::Error(failure), ViewerEvent::Retry)
                if failure.recovery == RecoveryAction::Retry =>
            {
                Some(ViewerState::Permission)
            }
            (ViewerState::Error(_), ViewerEvent::Reload) => {
                effects.push(Effect::Teardown);
                Some(ViewerState::Loading)
            }
            (ViewerState::Error(_), ViewerEvent::Failed(_)) => None,
            (_, ViewerEvent::Failed(failure)) => {
                effects.extend([Effect::CancelLostTimer, Effect::Teardown]);
                Some(ViewerState::Error(failure.clone()))
            }
            _ => None,
        };

        if let Some(next) = next {
            if !matches!(next, ViewerState::Tracking) {
                self.pending_lost = None;
            }
            self.state = next;
        }

        let transition = Transition {
            from,
            to: self.state.clone(),
            effects,
        };
        if transition.changed() {
            debug!(
                event = event.name(),
                from = transition.from.name(),
                to = transition.to.name(),
                "viewer state transition"
            );
        } else {
            debug!(event = event.name(), state = transition.to.name(), "no-op event");
        }
        transition
    }
}
