//! Custody events
//!
//! Append-only record of state changes for external observers. Nothing in
//! the state machine reads the log back.

use crate::address::Address;
use crate::amount::Amount;
use crate::error::CustodyError;
use crate::timelock::Timestamp;
use serde::{Deserialize, Serialize};

/// A state change emitted by a successful operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CustodyEvent {
    /// Owner withdrew funds (also emitted for zero-value pings)
    Withdrawal { to: Address, amount: Amount },

    /// Owner designated a new heir
    HeirUpdated { old_heir: Address, new_heir: Address },

    /// Owner proved liveness; the timelock restarts from `timestamp`
    ActivityUpdated { timestamp: Timestamp },

    /// Heir claimed ownership after the timelock expired
    OwnershipTransferred {
        old_owner: Address,
        new_owner: Address,
    },
}

impl CustodyEvent {
    /// Event name as observers know it
    pub fn name(&self) -> &'static str {
        match self {
            CustodyEvent::Withdrawal { .. } => "Withdrawal",
            CustodyEvent::HeirUpdated { .. } => "HeirUpdated",
            CustodyEvent::ActivityUpdated { .. } => "ActivityUpdated",
            CustodyEvent::OwnershipTransferred { .. } => "OwnershipTransferred",
        }
    }
}

/// A logged event with its position and emission time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedEvent {
    /// 1-based, contiguous
    pub seq: u64,
    pub timestamp: Timestamp,
    pub event: CustodyEvent,
}

/// Append-only event log
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    entries: Vec<RecordedEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a log from persisted entries, checking `seq` runs 1, 2, 3, …
    pub fn from_entries(entries: Vec<RecordedEvent>) -> Result<Self, CustodyError> {
        for (idx, entry) in entries.iter().enumerate() {
            let expected = idx as u64 + 1;
            if entry.seq != expected {
                return Err(CustodyError::CorruptRecord(format!(
                    "event sequence gap: expected {}, found {}",
                    expected, entry.seq
                )));
            }
        }
        Ok(Self { entries })
    }

    /// Append an event, returning its sequence number
    pub fn append(&mut self, timestamp: Timestamp, event: CustodyEvent) -> u64 {
        let seq = self.last_seq() + 1;
        self.entries.push(RecordedEvent {
            seq,
            timestamp,
            event,
        });
        seq
    }

    /// Events with `seq` strictly greater than `seq`
    pub fn since(&self, seq: u64) -> &[RecordedEvent] {
        let start = (seq as usize).min(self.entries.len());
        &self.entries[start..]
    }

    pub fn last_seq(&self) -> u64 {
        self.entries.len() as u64
    }

    pub fn entries(&self) -> &[RecordedEvent] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<RecordedEvent> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address::from_bytes([b; 20])
    }

    #[test]
    fn test_append_assigns_sequence() {
        let mut log = EventLog::new();
        assert!(log.is_empty());

        let s1 = log.append(100, CustodyEvent::ActivityUpdated { timestamp: 100 });
        let s2 = log.append(
            100,
            CustodyEvent::Withdrawal {
                to: addr(1),
                amount: Amount::ZERO,
            },
        );

        assert_eq!((s1, s2), (1, 2));
        assert_eq!(log.last_seq(), 2);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_since() {
        let mut log = EventLog::new();
        for ts in 0..5 {
            log.append(ts, CustodyEvent::ActivityUpdated { timestamp: ts });
        }

        assert_eq!(log.since(0).len(), 5);
        assert_eq!(log.since(3).len(), 2);
        assert_eq!(log.since(3)[0].seq, 4);
        assert!(log.since(5).is_empty());
        assert!(log.since(99).is_empty());
    }

    #[test]
    fn test_from_entries_rejects_gaps() {
        let mut log = EventLog::new();
        log.append(1, CustodyEvent::ActivityUpdated { timestamp: 1 });
        log.append(2, CustodyEvent::ActivityUpdated { timestamp: 2 });

        let entries = log.clone().into_entries();
        assert_eq!(EventLog::from_entries(entries.clone()).unwrap(), log);

        let gapped = vec![entries[1].clone()];
        assert!(matches!(
            EventLog::from_entries(gapped),
            Err(CustodyError::CorruptRecord(_))
        ));
    }

    #[test]
    fn test_event_names() {
        let e = CustodyEvent::OwnershipTransferred {
            old_owner: addr(1),
            new_owner: addr(2),
        };
        assert_eq!(e.name(), "OwnershipTransferred");
        assert_eq!(
            CustodyEvent::HeirUpdated {
                old_heir: Address::ZERO,
                new_heir: addr(3)
            }
            .name(),
            "HeirUpdated"
        );
    }

    #[test]
    fn test_event_json_shape() {
        let e = CustodyEvent::HeirUpdated {
            old_heir: Address::ZERO,
            new_heir: addr(0xab),
        };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["type"], "heir_updated");
        assert_eq!(json["old_heir"], Address::ZERO.to_string());

        let restored: CustodyEvent = serde_json::from_value(json).unwrap();
        assert_eq!(restored, e);
    }
}
