//! Session idle state machine.
//!
//! Pure bookkeeping: no timers, no I/O. Every method takes `now` so the
//! caller decides which clock drives it.
//!
//! ```text
//! Active  --(idle >= timeout - warning)--> Warning
//! Warning --(activity | extend)----------> Active
//! Warning --(idle >= timeout)------------> Expired
//! Active  --(idle >= timeout)------------> Expired   (missed warning)
//! ```

use super::activity::ActivityEvent;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Session phase. Expired is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Active,
    Warning,
    Expired,
}

/// Result of evaluating idle time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleCheck {
    /// Nothing to do.
    Idle,
    /// Active session crossed the warning threshold.
    WarningDue { remaining: Duration },
    /// Idle budget exhausted; the session must be logged out.
    TimedOut,
}

/// What happened to an observed activity event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityOutcome {
    /// Session already expired.
    Rejected,
    /// Low-signal event while the warning is up.
    Ignored,
    /// Idle timer reset.
    Refreshed,
    /// Warning dismissed, back to Active.
    Resumed,
    /// Arrived after the idle budget ran out.
    Overdue,
}

#[derive(Debug, Clone)]
pub struct SessionState {
    last_activity: Instant,
    phase: Phase,
    timeout: Duration,
    warning_lead: Duration,
}

impl SessionState {
    /// Creates an Active session with activity at `now`.
    ///
    /// `warning_lead` is clamped below `timeout`; configs are validated
    /// before they get here.
    pub fn new(timeout: Duration, warning_lead: Duration, now: Instant) -> Self {
        Self {
            last_activity: now,
            phase: Phase::Active,
            timeout,
            warning_lead: warning_lead.min(timeout.saturating_sub(Duration::from_secs(1))),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity)
    }

    /// Idle time left before the session times out.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.timeout.saturating_sub(self.idle_for(now))
    }

    /// Instant at which the session times out absent further activity.
    pub fn deadline(&self) -> Instant {
        self.last_activity + self.timeout
    }

    /// Idle time at which the warning is shown.
    pub fn warning_threshold(&self) -> Duration {
        self.timeout - self.warning_lead
    }

    /// Evaluates idle time without changing state.
    pub fn evaluate(&self, now: Instant) -> IdleCheck {
        if self.phase == Phase::Expired {
            return IdleCheck::Idle;
        }

        let idle = self.idle_for(now);
        if idle >= self.timeout {
            IdleCheck::TimedOut
        } else if idle >= self.warning_threshold() && self.phase == Phase::Active {
            IdleCheck::WarningDue {
                remaining: self.timeout - idle,
            }
        } else {
            IdleCheck::Idle
        }
    }

    /// Active -> Warning. Returns false if already warning or expired.
    pub fn begin_warning(&mut self) -> bool {
        if self.phase != Phase::Active {
            return false;
        }
        self.phase = Phase::Warning;
        true
    }

    /// Applies an observed activity event.
    pub fn record_activity(&mut self, event: &ActivityEvent, now: Instant) -> ActivityOutcome {
        match self.phase {
            Phase::Expired => ActivityOutcome::Rejected,
            Phase::Warning if event.is_low_signal() => ActivityOutcome::Ignored,
            _ if self.idle_for(now) >= self.timeout => ActivityOutcome::Overdue,
            phase => {
                self.last_activity = now;
                self.phase = Phase::Active;
                if phase == Phase::Warning {
                    ActivityOutcome::Resumed
                } else {
                    ActivityOutcome::Refreshed
                }
            }
        }
    }

    /// Explicit extension: resets idle time and returns to Active.
    ///
    /// Returns the phase it left, or `None` if already expired.
    pub fn extend(&mut self, now: Instant) -> Option<Phase> {
        if self.phase == Phase::Expired {
            return None;
        }
        let previous = self.phase;
        self.last_activity = now;
        self.phase = Phase::Active;
        Some(previous)
    }

    /// Moves to Expired. Returns true on the first call.
    pub fn expire(&mut self) -> bool {
        if self.phase == Phase::Expired {
            return false;
        }
        self.phase = Phase::Expired;
        true
    }

    /// Resets the idle clock on monitor start.
    pub fn restart(&mut self, now: Instant) {
        if self.phase != Phase::Expired {
            self.last_activity = now;
            self.phase = Phase::Active;
        }
    }
}

/// Formats remaining time as `M:SS`, rounding partial seconds up.
pub fn format_countdown(remaining: Duration) -> String {
    let secs = remaining.as_millis().div_ceil(1000) as u64;
    format!("{}:{:02}", secs / 60, secs % 60)
}
