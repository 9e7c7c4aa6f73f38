//! Thread-safe custody handle
//!
//! Multi-threaded hosts share one instance through [`SharedCustody`]. Every
//! operation runs inside a single critical section over the whole instance, so
//! no caller observes a half-applied operation and operations apply in lock
//! order.

use crate::address::Address;
use crate::amount::Amount;
use crate::custody::{Custody, CustodyRecord};
use crate::error::CustodyError;
use crate::events::RecordedEvent;
use crate::ledger::Ledger;
use crate::timelock::{TimelockStatus, Timestamp};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Consistent point-in-time view of an instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustodySnapshot {
    pub record: CustodyRecord,
    /// Ledger time when the snapshot was taken
    pub now: Timestamp,
    pub last_event_seq: u64,
}

impl CustodySnapshot {
    pub fn timelock_status(&self) -> TimelockStatus {
        self.record.timelock_status(self.now)
    }
}

/// Cloneable, lock-guarded handle to one custody instance
#[derive(Debug)]
pub struct SharedCustody<L> {
    inner: Arc<Mutex<Custody<L>>>,
}

impl<L> Clone for SharedCustody<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L: Ledger> SharedCustody<L> {
    pub fn new(custody: Custody<L>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(custody)),
        }
    }

    /// Run `f` with exclusive access to the instance
    pub fn with<R>(&self, f: impl FnOnce(&mut Custody<L>) -> R) -> R {
        let mut guard = self.lock();
        f(&mut guard)
    }

    pub fn receive_funds(&self, from: Address, amount: Amount) -> Result<(), CustodyError> {
        self.with(|c| c.receive_funds(from, amount))
    }

    pub fn withdraw(&self, caller: Address, amount: Amount) -> Result<(), CustodyError> {
        self.with(|c| c.withdraw(caller, amount))
    }

    pub fn ping(&self, caller: Address) -> Result<(), CustodyError> {
        self.with(|c| c.ping(caller))
    }

    pub fn set_heir(&self, caller: Address, new_heir: Address) -> Result<(), CustodyError> {
        self.with(|c| c.set_heir(caller, new_heir))
    }

    pub fn claim_inheritance(&self, caller: Address) -> Result<(), CustodyError> {
        self.with(|c| c.claim_inheritance(caller))
    }

    pub fn snapshot(&self) -> CustodySnapshot {
        self.with(|c| CustodySnapshot {
            record: c.record().clone(),
            now: c.ledger().now(),
            last_event_seq: c.last_event_seq(),
        })
    }

    /// Copies of the events logged after `seq`
    pub fn events_since(&self, seq: u64) -> Vec<RecordedEvent> {
        self.with(|c| c.events_since(seq).to_vec())
    }

    /// Take the instance back if this is the last handle
    pub fn try_unwrap(self) -> Result<Custody<L>, Self> {
        Arc::try_unwrap(self.inner)
            .map(|m| m.into_inner().unwrap_or_else(PoisonError::into_inner))
            .map_err(|inner| Self { inner })
    }

    // Operations write nothing until every check has passed, so a guard
    // poisoned by a panicking caller still protects a consistent record.
    fn lock(&self) -> MutexGuard<'_, Custody<L>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
