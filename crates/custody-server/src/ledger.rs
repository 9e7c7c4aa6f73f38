//! Wall-clock ledger for the server.
//!
//! Time comes from the system clock. Withdrawals are recorded as payouts and
//! committed to the `payouts` table together with the custody record, so the
//! payout instruction exists exactly when the balance was debited.

use custody_core::{Address, Amount, Ledger, Timestamp, TransferError};
use serde::{Deserialize, Serialize};

/// A value transfer out of custody awaiting settlement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub timestamp: Timestamp,
    pub recipient: Address,
    pub amount: Amount,
}

#[derive(Debug, Default)]
pub struct ServerLedger {
    /// Fixed time instead of the system clock
    pinned_now: Option<Timestamp>,
    pending: Vec<Payout>,
}

impl ServerLedger {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn pinned(now: Timestamp) -> Self {
        Self {
            pinned_now: Some(now),
            pending: Vec::new(),
        }
    }

    /// Payouts made since the last call
    pub fn take_payouts(&mut self) -> Vec<Payout> {
        std::mem::take(&mut self.pending)
    }
}

impl Ledger for ServerLedger {
    fn now(&self) -> Timestamp {
        self.pinned_now
            .unwrap_or_else(|| u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0))
    }

    fn transfer(&mut self, to: Address, amount: Amount) -> Result<(), TransferError> {
        let timestamp = self.now();
        self.pending.push(Payout {
            timestamp,
            recipient: to,
            amount,
        });
        Ok(())
    }
}

/// Human-readable UTC time for a ledger timestamp
pub fn format_timestamp(ts: Timestamp) -> String {
    i64::try_from(ts)
        .ok()
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| ts.to_string())
}
