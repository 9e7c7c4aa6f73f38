//! Watch events emitted by the monitoring service

use custody_core::{Address, CustodyEvent, HeartbeatAction, Timestamp};
use serde::{Deserialize, Serialize};

/// Events emitted by the WatchService when custody state changes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WatchEvent {
    /// An event logged by the instance since the previous poll
    Custody {
        /// Position in the instance's event log
        seq: u64,
        /// Ledger time when it was logged
        timestamp: Timestamp,
        event: CustodyEvent,
    },

    /// The owner differs from the one seen on the previous poll
    OwnershipChanged {
        old_owner: Address,
        new_owner: Address,
    },

    /// Timelock is approaching expiry
    TimelockWarning {
        /// Current owner, who has to ping
        owner: Address,
        /// Seconds until the heir can claim
        seconds_remaining: i64,
        /// Approximate days remaining
        days_remaining: f64,
        /// Heartbeat recommendation at the time of the poll
        action: HeartbeatAction,
    },

    /// Timelock expired and the designated heir can claim
    ClaimAvailable {
        heir: Address,
        /// When the instance became claimable
        since: Timestamp,
    },
}

impl WatchEvent {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            WatchEvent::Custody { event, .. } => event.name(),
            WatchEvent::OwnershipChanged { .. } => "OwnershipChanged",
            WatchEvent::TimelockWarning { .. } => "TimelockWarning",
            WatchEvent::ClaimAvailable { .. } => "ClaimAvailable",
        }
    }

    /// Whether someone should be told about this event
    pub fn is_alert(&self) -> bool {
        !matches!(self, WatchEvent::Custody { .. })
    }
}
