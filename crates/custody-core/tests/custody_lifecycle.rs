//! End-to-end lifecycle of a custody instance on a simulated ledger.
//!
//! 1. Deploy with an heir, fund, withdraw
//! 2. Owner goes silent, heir claims after the timelock
//! 3. A last-minute ping keeps the heir out
//! 4. Randomized withdrawal amounts and silence periods

use custody_core::{
    Address, Amount, Custody, CustodyError, CustodyEvent, Ledger, SimulatedLedger, SECONDS_PER_DAY,
    TIMELOCK,
};
use rand::Rng;

const START: u64 = 1_700_000_000;
const ONE_MONTH: u64 = 30 * 24 * 60 * 60;

fn addr(seed: u8) -> Address {
    let mut bytes = [0u8; 20];
    bytes[0] = 0x01;
    bytes[19] = seed;
    Address::from_bytes(bytes)
}

fn owner() -> Address {
    addr(1)
}

fn heir() -> Address {
    addr(2)
}

fn other() -> Address {
    addr(3)
}

fn deploy() -> Custody<SimulatedLedger> {
    Custody::deploy(owner(), heir(), SimulatedLedger::new(START)).unwrap()
}

#[test]
fn test_timelock_matches_one_month() {
    assert_eq!(TIMELOCK.secs(), ONE_MONTH);
}

#[test]
fn test_deposit_then_partial_withdrawal() {
    let mut custody = deploy();
    custody
        .receive_funds(owner(), Amount::parse_ether("1.0").unwrap())
        .unwrap();

    let half = Amount::parse_ether("0.5").unwrap();
    custody.withdraw(owner(), half).unwrap();

    assert_eq!(custody.balance(), half);
    assert_eq!(custody.ledger().credited(&owner()), half);
    assert!(custody.events().iter().any(|e| e.event
        == CustodyEvent::Withdrawal {
            to: owner(),
            amount: half
        }));
}

#[test]
fn test_heir_claims_after_owner_goes_silent() {
    let mut custody = deploy();
    custody.ledger_mut().advance(ONE_MONTH + SECONDS_PER_DAY);

    custody.claim_inheritance(heir()).unwrap();

    assert_eq!(custody.owner(), heir());
    assert_eq!(custody.heir(), Address::ZERO);
    assert_eq!(
        custody.events().last().unwrap().event,
        CustodyEvent::OwnershipTransferred {
            old_owner: owner(),
            new_owner: heir()
        }
    );
}

#[test]
fn test_ping_one_day_before_deadline_blocks_claim() {
    let mut custody = deploy();

    custody.ledger_mut().advance(ONE_MONTH - SECONDS_PER_DAY);
    custody.withdraw(owner(), Amount::ZERO).unwrap();

    // Day 31 measured from deployment
    custody.ledger_mut().advance(2 * SECONDS_PER_DAY);
    let err = custody.claim_inheritance(heir()).unwrap_err();
    assert!(matches!(err, CustodyError::TimelockNotExpired { .. }));
    assert_eq!(custody.owner(), owner());
}

#[test]
fn test_ping_after_expiry_still_resets_clock() {
    let mut custody = deploy();
    custody.ledger_mut().advance(ONE_MONTH + SECONDS_PER_DAY);
    assert!(custody.is_claimable());

    custody.withdraw(owner(), Amount::ZERO).unwrap();

    assert!(!custody.is_claimable());
    assert_eq!(
        custody.claim_inheritance(heir()).unwrap_err().code(),
        "TimelockNotExpired"
    );
}

#[test]
fn test_claimed_instance_keeps_going() {
    let mut custody = deploy();
    custody.receive_funds(other(), Amount::ether(4)).unwrap();
    custody.ledger_mut().advance(ONE_MONTH + SECONDS_PER_DAY);
    custody.claim_inheritance(heir()).unwrap();

    // New owner controls the full balance and designates a successor
    custody.withdraw(heir(), Amount::ether(1)).unwrap();
    custody.set_heir(heir(), other()).unwrap();
    assert_eq!(custody.balance(), Amount::ether(3));
    assert_eq!(custody.ledger().credited(&heir()), Amount::ether(1));

    let names: Vec<&str> = custody.events().iter().map(|e| e.event.name()).collect();
    assert_eq!(
        names,
        vec![
            "OwnershipTransferred",
            "Withdrawal",
            "ActivityUpdated",
            "HeirUpdated"
        ]
    );
    let seqs: Vec<u64> = custody.events().iter().map(|e| e.seq).collect();
    assert_eq!(seqs, vec![1, 2, 3, 4]);
}

#[test]
fn test_multiple_rapid_deposits() {
    let mut custody = deploy();
    let deposit = Amount::parse_ether("0.1").unwrap();
    for _ in 0..5 {
        custody.receive_funds(owner(), deposit).unwrap();
    }
    assert_eq!(custody.balance(), Amount::parse_ether("0.5").unwrap());
}

#[test]
fn test_random_withdrawal_amounts() {
    let mut rng = rand::thread_rng();
    let mut custody = deploy();
    custody.receive_funds(owner(), Amount::ether(10)).unwrap();

    for _ in 0..20 {
        let balance = custody.balance();
        let percent: u128 = rng.gen_range(1..=150);
        let amount = Amount::from_wei(balance.wei() * percent / 100);

        if amount <= balance {
            custody.withdraw(owner(), amount).unwrap();
            assert_eq!(custody.balance(), balance.checked_sub(amount).unwrap());
            assert_eq!(
                custody.events()[custody.events().len() - 2].event,
                CustodyEvent::Withdrawal {
                    to: owner(),
                    amount
                }
            );
        } else {
            let err = custody.withdraw(owner(), amount).unwrap_err();
            assert_eq!(err.code(), "InsufficientBalance");
            assert_eq!(custody.balance(), balance);
        }
    }

    let paid = custody.ledger().credited(&owner());
    assert_eq!(
        paid.checked_add(custody.balance()).unwrap(),
        Amount::ether(10)
    );
}

#[test]
fn test_random_silence_periods() {
    let mut rng = rand::thread_rng();

    for _ in 0..20 {
        let mut custody = deploy();
        let silence = rng.gen_range(0..=60 * SECONDS_PER_DAY);
        custody.ledger_mut().advance(silence);

        let result = custody.claim_inheritance(heir());
        if silence >= ONE_MONTH {
            assert!(result.is_ok(), "claim after {} s should succeed", silence);
            assert_eq!(custody.owner(), heir());
        } else {
            assert!(
                matches!(result, Err(CustodyError::TimelockNotExpired { .. })),
                "claim after {} s should fail",
                silence
            );
            assert_eq!(custody.owner(), owner());
        }
    }
}

#[test]
fn test_repeated_pings_advance_activity_monotonically() {
    let mut custody = deploy();
    let mut last = custody.last_activity();

    for step in 1..=5u64 {
        custody.ledger_mut().advance(step * 3_600);
        custody.withdraw(owner(), Amount::ZERO).unwrap();

        assert!(custody.last_activity() > last);
        assert_eq!(custody.last_activity(), custody.ledger().now());
        assert_eq!(custody.claimable_at(), custody.last_activity() + ONE_MONTH);
        last = custody.last_activity();
    }
    assert_eq!(custody.balance(), Amount::ZERO);
}
