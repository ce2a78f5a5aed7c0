//! Failed-attempt bookkeeping for the login flow.
//!
//! Flow Overview:
//! 1) Count consecutive failures for the primary form and, independently, for the
//!    two-factor form.
//! 2) Require a captcha token once primary failures reach `captcha_threshold`.
//! 3) Lock both forms for `lockout_duration` once either counter reaches
//!    `lockout_threshold`.
//!
//! The ledger never reads the clock itself; callers pass `now`, and expiry is only
//! observed when `check_locked` runs.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::config::{LedgerConfig, MAX_LOCKOUT_DURATION};

/// Which form an attempt was made on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttemptStage {
    Primary,
    TwoFactor,
}

/// What the caller must do after a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LedgerDecision {
    pub locked: bool,
    pub lock_until: Option<Instant>,
    pub captcha_now_required: bool,
}

#[derive(Clone, Debug)]
pub struct AttemptLedger {
    config: LedgerConfig,
    primary_failures: u32,
    two_factor_failures: u32,
    captcha_required: bool,
    locked_until: Option<Instant>,
}

impl AttemptLedger {
    #[must_use]
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            config,
            primary_failures: 0,
            two_factor_failures: 0,
            captcha_required: false,
            locked_until: None,
        }
    }

    #[must_use]
    pub fn primary_failures(&self) -> u32 {
        self.primary_failures
    }

    #[must_use]
    pub fn two_factor_failures(&self) -> u32 {
        self.two_factor_failures
    }

    #[must_use]
    pub fn captcha_required(&self) -> bool {
        self.captcha_required
    }

    #[must_use]
    pub fn locked_until(&self) -> Option<Instant> {
        self.locked_until
    }

    /// Counts a failed attempt and escalates when a threshold is reached.
    pub fn record_failure(&mut self, stage: AttemptStage, now: Instant) -> LedgerDecision {
        let failures = match stage {
            AttemptStage::Primary => {
                self.primary_failures = self.primary_failures.saturating_add(1);
                if self.primary_failures >= self.config.captcha_threshold() {
                    self.captcha_required = true;
                }
                self.primary_failures
            }
            AttemptStage::TwoFactor => {
                self.two_factor_failures = self.two_factor_failures.saturating_add(1);
                self.two_factor_failures
            }
        };

        let locked = failures >= self.config.lockout_threshold();
        if locked {
            self.locked_until = Some(lock_deadline(now, self.config.lockout_duration()));
            warn!(
                ?stage,
                failures,
                lockout_secs = self.config.lockout_duration().as_secs(),
                "attempt limit reached, locking"
            );
        } else {
            debug!(?stage, failures, "attempt failed");
        }

        LedgerDecision {
            locked,
            lock_until: self.locked_until.filter(|_| locked),
            captcha_now_required: self.captcha_required,
        }
    }

    /// Resets the counter for `stage`. Only a primary success lifts the captcha
    /// requirement.
    pub fn record_success(&mut self, stage: AttemptStage) {
        match stage {
            AttemptStage::Primary => {
                self.primary_failures = 0;
                self.captcha_required = false;
            }
            AttemptStage::TwoFactor => self.two_factor_failures = 0,
        }
    }

    /// Returns true while a lockout is active. An expired lockout is cleared here
    /// together with both counters; `captcha_required` survives.
    pub fn check_locked(&mut self, now: Instant) -> bool {
        match self.locked_until {
            Some(until) if now < until => true,
            Some(_) => {
                debug!("lockout expired");
                self.locked_until = None;
                self.primary_failures = 0;
                self.two_factor_failures = 0;
                false
            }
            None => false,
        }
    }

    /// Time left on the current lockout, without clearing it.
    #[must_use]
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.locked_until
            .filter(|until| now < *until)
            .map(|until| until - now)
    }
}

// Saturates instead of overflowing the clock; a lock that cannot be represented
// falls back to the longest supported window.
fn lock_deadline(now: Instant, duration: Duration) -> Instant {
    now.checked_add(duration)
        .or_else(|| now.checked_add(MAX_LOCKOUT_DURATION))
        .unwrap_or(now)
}
