//! Custody operation errors
//!
//! Every variant aborts the operation with no state change.

use crate::amount::Amount;
use crate::ledger::TransferError;
use crate::timelock::Timestamp;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CustodyError {
    #[error("Caller is not the owner")]
    NotOwner,

    #[error("Caller is not the designated heir")]
    NotHeir,

    #[error("Heir must not be the zero address")]
    InvalidHeirAddress,

    #[error("Owner must not be the zero address")]
    InvalidOwnerAddress,

    #[error("Insufficient balance: requested {requested} wei, available {available} wei")]
    InsufficientBalance { requested: Amount, available: Amount },

    #[error("Timelock not expired: claimable at {claimable_at}, now {now}")]
    TimelockNotExpired {
        claimable_at: Timestamp,
        now: Timestamp,
    },

    #[error("Transfer failed: {0}")]
    TransferFailed(#[from] TransferError),

    #[error("Balance would overflow")]
    BalanceOverflow,

    #[error("Corrupt custody record: {0}")]
    CorruptRecord(String),
}

impl CustodyError {
    /// Short stable identifier for logs and callers
    pub fn code(&self) -> &'static str {
        match self {
            CustodyError::NotOwner => "NotOwner",
            CustodyError::NotHeir => "NotHeir",
            CustodyError::InvalidHeirAddress => "InvalidHeirAddress",
            CustodyError::InvalidOwnerAddress => "InvalidOwnerAddress",
            CustodyError::InsufficientBalance { .. } => "InsufficientBalance",
            CustodyError::TimelockNotExpired { .. } => "TimelockNotExpired",
            CustodyError::TransferFailed(_) => "TransferFailed",
            CustodyError::BalanceOverflow => "BalanceOverflow",
            CustodyError::CorruptRecord(_) => "CorruptRecord",
        }
    }

    /// Rejected because the caller is not who the operation requires
    pub fn is_caller_mismatch(&self) -> bool {
        matches!(self, CustodyError::NotOwner | CustodyError::NotHeir)
    }
}
