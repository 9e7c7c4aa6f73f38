//! Shared test utilities for custody-core tests.
//!
//! Deterministic addresses and pre-deployed instances on a simulated ledger.

use crate::address::Address;
use crate::amount::Amount;
use crate::custody::Custody;
use crate::ledger::SimulatedLedger;
use crate::timelock::Timestamp;

/// Deployment time used by every fixture
pub const START: Timestamp = 1_700_000_000;

/// Deterministic address from a seed byte: `[0x01, 0, …, 0, seed]`.
pub fn test_address(seed: u8) -> Address {
    let mut bytes = [0u8; Address::LEN];
    bytes[0] = 0x01;
    bytes[Address::LEN - 1] = seed;
    Address::from_bytes(bytes)
}

pub fn owner() -> Address {
    test_address(1)
}

pub fn heir() -> Address {
    test_address(2)
}

pub fn other() -> Address {
    test_address(3)
}

/// Instance deployed by `owner()` with `heir()` at `START`
pub fn deploy_test_custody() -> Custody<SimulatedLedger> {
    Custody::deploy(owner(), heir(), SimulatedLedger::new(START)).unwrap()
}

/// Same as [`deploy_test_custody`] with `amount` deposited by the owner
pub fn deploy_funded(amount: Amount) -> Custody<SimulatedLedger> {
    let mut custody = deploy_test_custody();
    custody.receive_funds(owner(), amount).unwrap();
    custody
}
