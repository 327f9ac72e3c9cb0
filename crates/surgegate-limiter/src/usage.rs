//! Rolling usage counters, drained once per control cycle.

use std::time::{Duration, Instant};

use serde::Serialize;

/// Admission outcomes since the last drain.
#[derive(Debug, Clone)]
pub struct UsageWindow {
    ok: u64,
    blocked: u64,
    since: Instant,
}

impl UsageWindow {
    pub fn new(now: Instant) -> Self {
        Self {
            ok: 0,
            blocked: 0,
            since: now,
        }
    }

    pub fn record(&mut self, allowed: bool) {
        if allowed {
            self.ok += 1;
        } else {
            self.blocked += 1;
        }
    }

    /// Read the current counts without resetting them.
    pub fn peek(&self, now: Instant) -> WindowSample {
        WindowSample {
            ok: self.ok,
            blocked: self.blocked,
            elapsed: now.saturating_duration_since(self.since),
        }
    }

    /// Return the counts and start a fresh window at `now`.
    pub fn drain(&mut self, now: Instant) -> WindowSample {
        let sample = self.peek(now);
        *self = Self::new(now);
        sample
    }
}

/// Counts observed over one window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindowSample {
    pub ok: u64,
    pub blocked: u64,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl WindowSample {
    pub fn total(&self) -> u64 {
        self.ok + self.blocked
    }

    /// Admitted requests per second. Windows shorter than a second are
    /// treated as one second long.
    pub fn ok_rps(&self) -> f64 {
        self.ok as f64 / self.elapsed.as_secs_f64().max(1.0)
    }

    /// Fraction of requests denied; zero with no traffic.
    pub fn blocked_ratio(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.blocked as f64 / total as f64,
        }
    }
}
