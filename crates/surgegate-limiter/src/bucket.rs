//! Token bucket with lazy, continuous refill.
//!
//! Unlike a fixed-interval bucket, tokens accrue fractionally with elapsed
//! time: `tokens = min(burst, tokens + rps * Δt)`. The policy is passed in
//! on every call so a changed policy takes effect on the next refill.

use std::time::Instant;

use surgegate_core::Policy;

/// Token state for a single key.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// A bucket filled to the policy's burst.
    pub fn full(policy: &Policy, now: Instant) -> Self {
        Self {
            tokens: policy.burst as f64,
            last_refill: now,
        }
    }

    /// Add tokens for the time since the last refill, capped at `burst`.
    ///
    /// A `now` earlier than the last refill adds nothing.
    pub fn refill(&mut self, policy: &Policy, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        if now > self.last_refill {
            self.last_refill = now;
        }
        self.tokens = (self.tokens + policy.rps * elapsed).min(policy.burst as f64);
    }

    /// Consume one token if a whole token is available.
    pub fn try_take(&mut self) -> bool {
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Drop excess tokens after a policy shrinks its burst.
    pub fn cap(&mut self, burst: u32) {
        self.tokens = self.tokens.min(burst as f64);
    }

    /// Tokens currently in the bucket.
    pub fn tokens(&self) -> f64 {
        self.tokens
    }
}
