//! Deadline for the armed lost commit.
//!
//! The timer holds at most one deadline. Arming replaces it, cancelling clears it,
//! and the generation travels with the deadline so a late expiry can be matched
//! against the state machine's pending commit.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct LostTimer {
    grace: Duration,
    armed: Option<(u64, Instant)>,
}

impl LostTimer {
    pub fn new(grace: Duration) -> Self {
        Self { grace, armed: None }
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Whether a lost event should be debounced at all.
    pub fn enabled(&self) -> bool {
        !self.grace.is_zero()
    }

    pub fn arm(&mut self, generation: u64) {
        self.armed = Some((generation, Instant::now() + self.grace));
    }

    pub fn cancel(&mut self) {
        self.armed = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.armed.map(|(_, at)| at)
    }

    /// Take the generation if its deadline has passed.
    pub fn take_due(&mut self) -> Option<u64> {
        match self.armed {
            Some((generation, at)) if at <= Instant::now() => {
                self.armed = None;
                Some(generation)
            }
            _ => None,
        }
    }

    /// Resolve once the armed deadline passes. Never resolves while disarmed.
    pub async fn expired(&self) {
        match self.armed {
            Some((_, at)) => tokio::time::sleep_until(at).await,
            None => std::future::pending().await,
        }
    }
}
