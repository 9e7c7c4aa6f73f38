//! Inactivity timelock
//!
//! The heir may claim once `now >= last_activity + TIMELOCK`. Every owner
//! withdrawal (including zero-value pings) moves `last_activity` to "now".

use serde::{Deserialize, Serialize};

/// Seconds since the Unix epoch
pub type Timestamp = u64;

pub const SECONDS_PER_DAY: u64 = 86_400;

/// System-wide inactivity window: 30 days.
pub const TIMELOCK: Timelock = Timelock::days(30);

/// Timelock duration in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timelock(u64);

impl Timelock {
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    pub const fn days(days: u64) -> Self {
        Self(days * SECONDS_PER_DAY)
    }

    pub const fn secs(&self) -> u64 {
        self.0
    }

    pub fn as_days(&self) -> f64 {
        self.0 as f64 / SECONDS_PER_DAY as f64
    }

    /// First instant at which a claim is allowed. Saturates at `u64::MAX`.
    pub fn expires_at(&self, last_activity: Timestamp) -> Timestamp {
        last_activity.saturating_add(self.0)
    }

    pub fn is_expired(&self, last_activity: Timestamp, now: Timestamp) -> bool {
        now >= self.expires_at(last_activity)
    }
}

/// Where an instance stands relative to its timelock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelockStatus {
    /// When the heir may first claim
    pub claimable_at: Timestamp,
    /// Seconds until `claimable_at` (zero or negative once expired)
    pub seconds_remaining: i64,
    /// Whether a claim would pass the timelock check now
    pub expired: bool,
}

impl TimelockStatus {
    pub fn calculate(now: Timestamp, last_activity: Timestamp, timelock: Timelock) -> Self {
        let claimable_at = timelock.expires_at(last_activity);
        let diff = claimable_at as i128 - now as i128;
        let seconds_remaining = diff.clamp(i64::MIN as i128, i64::MAX as i128) as i64;

        Self {
            claimable_at,
            seconds_remaining,
            expired: now >= claimable_at,
        }
    }

    /// Approximate days remaining (negative once expired)
    pub fn days_remaining(&self) -> f64 {
        self.seconds_remaining as f64 / SECONDS_PER_DAY as f64
    }
}
