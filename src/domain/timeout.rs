use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimerState {
    Active,
    Warning,
    Expired,
}

/// Inactivity window with an advance warning.
///
/// `display_delay` is how long the expiry notice stays up before sign-out runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    pub timeout: Duration,
    pub warning_lead: Duration,
    pub display_delay: Duration,
}

impl TimeoutPolicy {
    pub const fn new(timeout: Duration, warning_lead: Duration, display_delay: Duration) -> Self {
        Self {
            timeout,
            warning_lead,
            display_delay,
        }
    }

    /// Global sign-out after 3 idle minutes, warned 30 seconds ahead.
    pub const fn auto_logout() -> Self {
        Self::new(
            Duration::from_secs(180),
            Duration::from_secs(30),
            Duration::from_secs(2),
        )
    }

    /// Admin area re-authentication, checked lazily on entry.
    pub const fn admin_gate() -> Self {
        Self::new(Duration::from_secs(600), Duration::ZERO, Duration::ZERO)
    }

    pub fn warning_after(&self) -> Duration {
        self.timeout.saturating_sub(self.warning_lead)
    }

    pub fn state_at(&self, idle: Duration) -> TimerState {
        if idle >= self.timeout {
            TimerState::Expired
        } else if idle >= self.warning_after() {
            TimerState::Warning
        } else {
            TimerState::Active
        }
    }

    pub fn remaining(&self, idle: Duration) -> Duration {
        self.timeout.saturating_sub(idle)
    }

    /// Lazy form used by grant-based gates: a grant is live while the time elapsed since it
    /// was issued is below the window. Grants stamped in the future are treated as corrupt.
    pub fn grant_is_live(&self, granted_at_ms: i64, now_ms: i64) -> bool {
        let elapsed = now_ms - granted_at_ms;
        elapsed >= 0 && (elapsed as u128) < self.timeout.as_millis()
    }
}
