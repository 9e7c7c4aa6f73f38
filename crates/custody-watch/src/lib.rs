//! Custody Watch Service
//!
//! Monitors a custody instance for activity, ownership changes and an
//! approaching timelock.
//!
//! # Features
//!
//! - Periodic polling through a [`SharedCustody`] handle
//! - Reports every event the instance logged since the previous poll
//! - Warns the owner before the heir can claim, and the heir once they can
//! - Persistent state tracking across restarts
//! - Broadcast channel for UI and notifier integration
//!
//! # Example
//!
//! ```
//! use custody_core::{Address, Custody, SharedCustody, SimulatedLedger};
//! use custody_watch::{WatchConfig, WatchService};
//!
//! # let dir = tempfile::tempdir().unwrap();
//! let owner: Address = "0x1000000000000000000000000000000000000001".parse().unwrap();
//! let heir: Address = "0x2000000000000000000000000000000000000002".parse().unwrap();
//! let custody = Custody::deploy(owner, heir, SimulatedLedger::new(1_700_000_000)).unwrap();
//!
//! let config = WatchConfig {
//!     state_path: dir.path().join("watch_state.json"),
//!     ..WatchConfig::default()
//! };
//! let mut service = WatchService::new(SharedCustody::new(custody), config).unwrap();
//!
//! let events = service.poll().unwrap();
//! assert!(events.is_empty());
//! ```

pub mod events;
pub mod state;

pub use events::WatchEvent;
pub use state::WatchState;

use custody_core::{
    evaluate_heartbeat, CustodyRecord, HeartbeatConfig, HeartbeatError, Ledger, RecordedEvent,
    SharedCustody, Timestamp, SECONDS_PER_DAY,
};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Errors from the watch service
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("State error: {0}")]
    State(#[from] state::StateError),

    #[error("Invalid heartbeat config: {0}")]
    Config(#[from] HeartbeatError),

    #[error("Poll interval too short (minimum {min} seconds)")]
    PollTooFrequent { min: u64 },
}

/// Configuration for the watch service
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Path to state file
    pub state_path: PathBuf,
    /// Default poll interval in seconds
    pub poll_interval_secs: u64,
    /// Minimum allowed poll interval (rate limiting)
    pub min_poll_interval_secs: u64,
    /// Emit TimelockWarning when fewer seconds than this remain
    pub warning_threshold_secs: u64,
    /// Thresholds for the check-in recommendation
    pub heartbeat: HeartbeatConfig,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            state_path: PathBuf::from("watch_state.json"),
            poll_interval_secs: 3600,
            min_poll_interval_secs: 60,
            warning_threshold_secs: 7 * SECONDS_PER_DAY,
            heartbeat: HeartbeatConfig::default(),
        }
    }
}

impl WatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Custody monitoring service
pub struct WatchService<L> {
    custody: SharedCustody<L>,
    config: WatchConfig,
    state: WatchState,
    events_tx: broadcast::Sender<WatchEvent>,
}

impl<L: Ledger> WatchService<L> {
    /// Create a new watch service, resuming from the state file if present
    pub fn new(custody: SharedCustody<L>, config: WatchConfig) -> Result<Self, WatchError> {
        config.heartbeat.validate()?;

        let state = match WatchState::load(&config.state_path) {
            Ok(state) => state,
            Err(e) => {
                log::warn!(
                    "Ignoring unreadable watch state {}: {}",
                    config.state_path.display(),
                    e
                );
                WatchState::new()
            }
        };
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            custody,
            config,
            state,
            events_tx,
        })
    }

    /// Receive every event produced by later polls
    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.events_tx.subscribe()
    }

    /// Poll the instance and return events
    ///
    /// This is the main entry point for checking custody state changes.
    pub fn poll(&mut self) -> Result<Vec<WatchEvent>, WatchError> {
        // Record, clock and new events from one critical section
        let since = self.state.last_event_seq;
        let (record, now, logged) = self.custody.with(|c| {
            (
                c.record().clone(),
                c.ledger().now(),
                c.events_since(since).to_vec(),
            )
        });

        // Rate limiting
        if let Some(elapsed) = self.state.since_last_poll(now) {
            if elapsed < self.config.min_poll_interval_secs {
                return Err(WatchError::PollTooFrequent {
                    min: self.config.min_poll_interval_secs,
                });
            }
        }

        let last_seq = logged.last().map(|e| e.seq).unwrap_or(since);
        let mut events: Vec<WatchEvent> = logged.into_iter().map(custody_event).collect();

        if let Some(old_owner) = self.state.last_owner {
            if old_owner != record.owner {
                events.push(WatchEvent::OwnershipChanged {
                    old_owner,
                    new_owner: record.owner,
                });
            }
        }

        events.extend(self.timelock_event(&record, now));

        self.state.update_poll(now, last_seq, record.owner);
        self.save_state()?;
        log::info!(
            "Polled custody at {}: {} event(s), last seq {}",
            now,
            events.len(),
            last_seq
        );

        for event in &events {
            log::debug!("Watch event: {}", event.name());
            // No subscribers is not an error
            let _ = self.events_tx.send(event.clone());
        }

        Ok(events)
    }

    fn timelock_event(&self, record: &CustodyRecord, now: Timestamp) -> Option<WatchEvent> {
        let status = evaluate_heartbeat(record, now, &self.config.heartbeat);

        if status.claimable {
            return Some(WatchEvent::ClaimAvailable {
                heir: record.heir,
                since: status.timelock_status.claimable_at,
            });
        }

        let remaining = status.timelock_status.seconds_remaining;
        let threshold = i64::try_from(self.config.warning_threshold_secs).unwrap_or(i64::MAX);
        if remaining > 0 && remaining <= threshold {
            return Some(WatchEvent::TimelockWarning {
                owner: record.owner,
                seconds_remaining: remaining,
                days_remaining: status.timelock_status.days_remaining(),
                action: status.action,
            });
        }

        None
    }

    /// Save state to disk
    fn save_state(&self) -> Result<(), WatchError> {
        self.state.save(&self.config.state_path)?;
        Ok(())
    }

    /// Get the current state (for inspection)
    pub fn state(&self) -> &WatchState {
        &self.state
    }
}

fn custody_event(recorded: RecordedEvent) -> WatchEvent {
    WatchEvent::Custody {
        seq: recorded.seq,
        timestamp: recorded.timestamp,
        event: recorded.event,
    }
}
