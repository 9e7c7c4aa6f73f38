//! Ledger seam
//!
//! The state machine needs two things from its host: the current time and a
//! way to pay out native currency. [`SimulatedLedger`] provides both in memory
//! with a manually advanced clock.

use crate::address::Address;
use crate::amount::Amount;
use crate::timelock::{Timestamp, SECONDS_PER_DAY};
use std::collections::{HashMap, HashSet};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Why a payout did not happen
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("Recipient {0} rejected the transfer")]
    Rejected(Address),

    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
}

/// Runtime services consumed by [`crate::Custody`].
///
/// `transfer` must either move the full amount or fail without effect.
pub trait Ledger {
    /// Current time in seconds since the Unix epoch
    fn now(&self) -> Timestamp;

    /// Move `amount` of native currency out of custody to `to`
    fn transfer(&mut self, to: Address, amount: Amount) -> Result<(), TransferError>;
}

impl<L: Ledger + ?Sized> Ledger for Box<L> {
    fn now(&self) -> Timestamp {
        (**self).now()
    }

    fn transfer(&mut self, to: Address, amount: Amount) -> Result<(), TransferError> {
        (**self).transfer(to, amount)
    }
}

/// In-memory ledger with a manual clock.
///
/// Credits every payout to the recipient's balance. Transfers to addresses
/// marked with [`SimulatedLedger::reject_transfers_to`] fail.
#[derive(Debug, Clone, Default)]
pub struct SimulatedLedger {
    now: Timestamp,
    credited: HashMap<Address, Amount>,
    rejecting: HashSet<Address>,
    transfers: Vec<(Address, Amount)>,
}

impl SimulatedLedger {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: start,
            ..Default::default()
        }
    }

    pub fn set_time(&mut self, now: Timestamp) {
        self.now = now;
    }

    pub fn advance(&mut self, secs: u64) {
        self.now = self.now.saturating_add(secs);
    }

    pub fn advance_days(&mut self, days: u64) {
        self.advance(days.saturating_mul(SECONDS_PER_DAY));
    }

    pub fn reject_transfers_to(&mut self, to: Address) {
        self.rejecting.insert(to);
    }

    pub fn accept_transfers_to(&mut self, to: &Address) {
        self.rejecting.remove(to);
    }

    /// Total paid out to `to` so far
    pub fn credited(&self, to: &Address) -> Amount {
        self.credited.get(to).copied().unwrap_or(Amount::ZERO)
    }

    /// Every successful payout, in order
    pub fn transfers(&self) -> &[(Address, Amount)] {
        &self.transfers
    }
}

impl Ledger for SimulatedLedger {
    fn now(&self) -> Timestamp {
        self.now
    }

    fn transfer(&mut self, to: Address, amount: Amount) -> Result<(), TransferError> {
        if self.rejecting.contains(&to) {
            return Err(TransferError::Rejected(to));
        }
        let credited = self
            .credited(&to)
            .checked_add(amount)
            .ok_or_else(|| TransferError::Unavailable("recipient balance overflow".into()))?;
        self.credited.insert(to, credited);
        self.transfers.push((to, amount));
        Ok(())
    }
}

/// Wall-clock time in seconds since the Unix epoch
pub fn current_timestamp() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
