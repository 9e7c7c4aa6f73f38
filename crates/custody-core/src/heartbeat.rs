//! Deadman heartbeat evaluation for custody instances.
//!
//! Pure logic with no I/O and no clock of its own. Takes a record and the current
//! time, returns a recommendation. The caller (watch service, daemon) decides
//! whether to act on it.
//!
//! # How It Works
//!
//! Every owner withdrawal resets `last_activity`. The heartbeat evaluates how
//! much of the timelock has elapsed since then and recommends action:
//!
//! ```text
//! |--- Healthy ---|--- CheckinRecommended ---|--- CheckinRequired ---|--- Expired
//! 0%             50%                        90%                    100%
//! ```
//!
//! Thresholds are configurable.

use crate::address::Address;
use crate::custody::CustodyRecord;
use crate::timelock::{TimelockStatus, Timestamp, TIMELOCK};
use serde::{Deserialize, Serialize};

/// When to recommend a ping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Fraction of timelock elapsed before recommending a ping (0.0–1.0).
    /// Default: 0.5 (halfway point).
    pub checkin_threshold: f64,

    /// Fraction of timelock elapsed before a ping is critical (0.0–1.0).
    /// Default: 0.9.
    pub critical_threshold: f64,

    /// How often the caller should re-evaluate (seconds).
    /// Advisory only; this module never polls.
    /// Default: 3600 (1 hour).
    pub poll_interval_secs: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            checkin_threshold: 0.5,
            critical_threshold: 0.9,
            poll_interval_secs: 3600,
        }
    }
}

impl HeartbeatConfig {
    /// Validate that thresholds are sensible.
    pub fn validate(&self) -> Result<(), HeartbeatError> {
        if self.checkin_threshold <= 0.0 || self.checkin_threshold >= 1.0 {
            return Err(HeartbeatError::InvalidThreshold(
                "checkin_threshold must be between 0.0 and 1.0 exclusive".into(),
            ));
        }
        if self.critical_threshold <= self.checkin_threshold || self.critical_threshold >= 1.0 {
            return Err(HeartbeatError::InvalidThreshold(
                "critical_threshold must be between checkin_threshold and 1.0 exclusive".into(),
            ));
        }
        Ok(())
    }
}

/// What the heartbeat recommends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HeartbeatAction {
    /// Timelock is far from expiry. No action needed.
    Healthy,
    /// Passed the check-in threshold. Owner should ping soon.
    CheckinRecommended,
    /// Passed the critical threshold. Owner must ping now.
    CheckinRequired,
    /// Timelock expired. Heir can claim until the owner pings again.
    Expired,
}

impl HeartbeatAction {
    /// Lower is more urgent
    fn priority(self) -> u8 {
        match self {
            HeartbeatAction::Expired => 0,
            HeartbeatAction::CheckinRequired => 1,
            HeartbeatAction::CheckinRecommended => 2,
            HeartbeatAction::Healthy => 3,
        }
    }

    pub fn needs_checkin(self) -> bool {
        !matches!(self, HeartbeatAction::Healthy)
    }
}

/// Full heartbeat status for one instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatStatus {
    /// Current owner (identifies the instance in batch results)
    pub owner: Address,
    /// Timelock status (seconds remaining, expired, etc.)
    pub timelock_status: TimelockStatus,
    /// Fraction of timelock elapsed (0.0–1.0+).
    pub elapsed_fraction: f64,
    /// Recommended action.
    pub action: HeartbeatAction,
    /// Expired and an heir is designated, so a claim would succeed
    pub claimable: bool,
}

/// Errors from heartbeat evaluation.
#[derive(Debug, thiserror::Error)]
pub enum HeartbeatError {
    #[error("Invalid threshold: {0}")]
    InvalidThreshold(String),
}

/// Evaluate the heartbeat status of a custody record at time `now`.
pub fn evaluate_heartbeat(
    record: &CustodyRecord,
    now: Timestamp,
    config: &HeartbeatConfig,
) -> HeartbeatStatus {
    let timelock_status = TimelockStatus::calculate(now, record.last_activity, TIMELOCK);

    let elapsed = now.saturating_sub(record.last_activity);
    let elapsed_fraction = elapsed as f64 / TIMELOCK.secs() as f64;

    let action = if timelock_status.expired {
        HeartbeatAction::Expired
    } else if elapsed_fraction >= config.critical_threshold {
        HeartbeatAction::CheckinRequired
    } else if elapsed_fraction >= config.checkin_threshold {
        HeartbeatAction::CheckinRecommended
    } else {
        HeartbeatAction::Healthy
    };

    HeartbeatStatus {
        owner: record.owner,
        timelock_status,
        elapsed_fraction,
        action,
        claimable: timelock_status.expired && record.has_heir(),
    }
}

/// Batch evaluate several instances.
///
/// Returns statuses sorted by urgency (most urgent first), ties broken by
/// elapsed fraction (highest first).
pub fn evaluate_batch(
    records: &[CustodyRecord],
    now: Timestamp,
    config: &HeartbeatConfig,
) -> Vec<HeartbeatStatus> {
    let mut statuses: Vec<HeartbeatStatus> = records
        .iter()
        .map(|record| evaluate_heartbeat(record, now, config))
        .collect();

    statuses.sort_by(|a, b| {
        a.action.priority().cmp(&b.action.priority()).then(
            a.elapsed_fraction
                .partial_cmp(&b.elapsed_fraction)
                .unwrap_or(std::cmp::Ordering::Equal)
                .reverse(),
        )
    });

    statuses
}
