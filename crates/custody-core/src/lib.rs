//! Dead-man's-switch custody
//!
//! A single owner controls a fund balance. If the owner stays inactive for
//! longer than [`TIMELOCK`], the designated heir may claim ownership.
//!
//! # Concepts
//!
//! - **Owner**: may withdraw funds and designate the heir
//! - **Heir**: may claim ownership once the timelock has elapsed
//! - **Activity ping**: a zero-value withdrawal that resets the timelock
//! - **Claim**: heir becomes owner, heir slot is cleared, clock restarts
//!
//! # Timeline
//!
//! ```text
//! last_activity                      last_activity + 30 days
//!      |------------ owner only ------------|---- heir may claim ---->
//!      ^ withdraw (any amount, even 0) moves this marker to "now"
//! ```
//!
//! # Example
//!
//! ```
//! use custody_core::{Address, Amount, Custody, SimulatedLedger, TIMELOCK};
//!
//! let owner: Address = "0x1111111111111111111111111111111111111111".parse().unwrap();
//! let heir: Address = "0x2222222222222222222222222222222222222222".parse().unwrap();
//!
//! let mut custody = Custody::deploy(owner, heir, SimulatedLedger::new(1_700_000_000)).unwrap();
//! custody.receive_funds(owner, Amount::ether(1)).unwrap();
//!
//! custody.ledger_mut().advance(TIMELOCK.secs());
//! custody.claim_inheritance(heir).unwrap();
//! assert_eq!(custody.owner(), heir);
//! assert!(custody.heir().is_zero());
//! ```

/// Implements `Serialize`/`Deserialize` through the type's `Display`/`FromStr`.
///
/// Keeps addresses readable and amounts exact in JSON and TOML (which has no
/// 128-bit integers).
macro_rules! string_serde {
    ($type:ty) => {
        impl serde::Serialize for $type {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> serde::Deserialize<'de> for $type {
            fn deserialize<D>(deserializer: D) -> Result<$type, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = <String as serde::Deserialize>::deserialize(deserializer)?;
                <$type as std::str::FromStr>::from_str(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

pub mod address;
pub mod amount;
pub mod custody;
pub mod error;
pub mod events;
pub mod heartbeat;
pub mod ledger;
pub mod shared;
pub mod timelock;

#[cfg(test)]
mod test_utils;

pub use address::{Address, AddressError};
pub use amount::{Amount, AmountError};
pub use custody::{Custody, CustodyRecord};
pub use error::CustodyError;
pub use events::{CustodyEvent, EventLog, RecordedEvent};
pub use heartbeat::{
    evaluate_batch, evaluate_heartbeat, HeartbeatAction, HeartbeatConfig, HeartbeatError,
    HeartbeatStatus,
};
pub use ledger::{current_timestamp, Ledger, SimulatedLedger, TransferError};
pub use shared::{CustodySnapshot, SharedCustody};
pub use timelock::{Timelock, TimelockStatus, Timestamp, SECONDS_PER_DAY, TIMELOCK};
