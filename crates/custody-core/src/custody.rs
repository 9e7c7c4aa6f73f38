//! Custody state machine
//!
//! Holds the [`CustodyRecord`] and applies the four operations. Each operation
//! checks every precondition (and performs the payout, if any) before writing a
//! single field, so a failed call leaves the record and the event log untouched.

use crate::address::Address;
use crate::amount::Amount;
use crate::error::CustodyError;
use crate::events::{CustodyEvent, EventLog, RecordedEvent};
use crate::ledger::Ledger;
use crate::timelock::{TimelockStatus, Timestamp, TIMELOCK};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// Persistent state of one custody instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustodyRecord {
    /// Never zero
    pub owner: Address,
    /// `Address::ZERO` when no heir is designated
    pub heir: Address,
    /// Last owner proof of life; never decreases
    pub last_activity: Timestamp,
    /// Native currency held in custody
    pub balance: Amount,
}

impl CustodyRecord {
    pub fn has_heir(&self) -> bool {
        !self.heir.is_zero()
    }

    /// First instant at which the heir may claim
    pub fn claimable_at(&self) -> Timestamp {
        TIMELOCK.expires_at(self.last_activity)
    }

    pub fn timelock_status(&self, now: Timestamp) -> TimelockStatus {
        TimelockStatus::calculate(now, self.last_activity, TIMELOCK)
    }
}

/// A custody instance bound to the ledger that supplies time and payouts
#[derive(Debug)]
pub struct Custody<L> {
    record: CustodyRecord,
    log: EventLog,
    ledger: L,
}

impl<L: Ledger> Custody<L> {
    /// Create the instance: `deployer` becomes owner, the clock starts now.
    pub fn deploy(
        deployer: Address,
        initial_heir: Address,
        ledger: L,
    ) -> Result<Self, CustodyError> {
        if deployer.is_zero() {
            return Err(CustodyError::InvalidOwnerAddress);
        }
        if initial_heir.is_zero() {
            return Err(CustodyError::InvalidHeirAddress);
        }

        let record = CustodyRecord {
            owner: deployer,
            heir: initial_heir,
            last_activity: ledger.now(),
            balance: Amount::ZERO,
        };
        info!(
            "Custody deployed: owner {} heir {} at {}",
            record.owner, record.heir, record.last_activity
        );

        Ok(Self {
            record,
            log: EventLog::new(),
            ledger,
        })
    }

    /// Rebuild an instance from persisted state
    pub fn restore(
        record: CustodyRecord,
        events: Vec<RecordedEvent>,
        ledger: L,
    ) -> Result<Self, CustodyError> {
        if record.owner.is_zero() {
            return Err(CustodyError::CorruptRecord("owner is the zero address".into()));
        }
        let log = EventLog::from_entries(events)?;
        Ok(Self {
            record,
            log,
            ledger,
        })
    }

    /// Accept an inbound transfer from anyone. Not proof of life.
    pub fn receive_funds(&mut self, from: Address, amount: Amount) -> Result<(), CustodyError> {
        let balance = self
            .record
            .balance
            .checked_add(amount)
            .ok_or(CustodyError::BalanceOverflow)?;
        self.record.balance = balance;
        debug!("Received {} wei from {}", amount, from);
        Ok(())
    }

    /// Owner withdraws `amount` (zero allowed) and resets the timelock.
    ///
    /// Emits `Withdrawal` followed by `ActivityUpdated`.
    pub fn withdraw(&mut self, caller: Address, amount: Amount) -> Result<(), CustodyError> {
        self.ensure_owner(caller, "withdraw")?;

        let available = self.record.balance;
        let remaining = available.checked_sub(amount).ok_or_else(|| {
            debug!("withdraw rejected: {} wei requested, {} available", amount, available);
            CustodyError::InsufficientBalance {
                requested: amount,
                available,
            }
        })?;

        let owner = self.record.owner;
        if !amount.is_zero() {
            self.ledger.transfer(owner, amount).map_err(|e| {
                warn!("withdraw of {} wei to {} failed: {}", amount, owner, e);
                CustodyError::from(e)
            })?;
        }

        self.record.balance = remaining;
        let ts = self.touch();
        self.log.append(ts, CustodyEvent::Withdrawal { to: owner, amount });
        self.log
            .append(ts, CustodyEvent::ActivityUpdated { timestamp: ts });

        info!(
            "Owner {} withdrew {} wei; activity at {}, claimable from {}",
            owner,
            amount,
            ts,
            self.record.claimable_at()
        );
        Ok(())
    }

    /// Zero-value withdrawal: proof of life without moving funds
    pub fn ping(&mut self, caller: Address) -> Result<(), CustodyError> {
        self.withdraw(caller, Amount::ZERO)
    }

    /// Owner designates a new heir. Does not reset the timelock.
    pub fn set_heir(&mut self, caller: Address, new_heir: Address) -> Result<(), CustodyError> {
        self.ensure_owner(caller, "set_heir")?;
        if new_heir.is_zero() {
            debug!("set_heir rejected: zero address");
            return Err(CustodyError::InvalidHeirAddress);
        }

        let old_heir = self.record.heir;
        self.record.heir = new_heir;
        let now = self.ledger.now();
        self.log
            .append(now, CustodyEvent::HeirUpdated { old_heir, new_heir });

        info!("Heir updated: {} -> {}", old_heir, new_heir);
        Ok(())
    }

    /// Heir takes ownership once the timelock has elapsed.
    ///
    /// The timelock is checked before the caller, so an early claim fails with
    /// `TimelockNotExpired` whoever makes it. On success the heir slot is
    /// cleared and the new owner's clock starts now.
    pub fn claim_inheritance(&mut self, caller: Address) -> Result<(), CustodyError> {
        let now = self.ledger.now();
        let claimable_at = self.record.claimable_at();
        if now < claimable_at {
            debug!(
                "claim by {} rejected: claimable at {}, now {}",
                caller, claimable_at, now
            );
            return Err(CustodyError::TimelockNotExpired { claimable_at, now });
        }
        if !self.record.has_heir() || caller != self.record.heir {
            debug!("claim rejected: {} is not the heir", caller);
            return Err(CustodyError::NotHeir);
        }

        let old_owner = self.record.owner;
        let new_owner = self.record.heir;
        self.record.owner = new_owner;
        self.record.heir = Address::ZERO;
        let ts = self.touch();
        self.log.append(
            ts,
            CustodyEvent::OwnershipTransferred {
                old_owner,
                new_owner,
            },
        );

        info!("Inheritance claimed: {} -> {}", old_owner, new_owner);
        Ok(())
    }

    pub fn owner(&self) -> Address {
        self.record.owner
    }

    /// `Address::ZERO` when unset
    pub fn heir(&self) -> Address {
        self.record.heir
    }

    pub fn last_activity(&self) -> Timestamp {
        self.record.last_activity
    }

    pub fn balance(&self) -> Amount {
        self.record.balance
    }

    pub fn claimable_at(&self) -> Timestamp {
        self.record.claimable_at()
    }

    /// Whether the timelock has elapsed at the ledger's current time
    pub fn is_claimable(&self) -> bool {
        self.ledger.now() >= self.record.claimable_at()
    }

    pub fn timelock_status(&self) -> TimelockStatus {
        self.record.timelock_status(self.ledger.now())
    }

    pub fn record(&self) -> &CustodyRecord {
        &self.record
    }

    pub fn events(&self) -> &[RecordedEvent] {
        self.log.entries()
    }

    /// Events logged after sequence number `seq`
    pub fn events_since(&self, seq: u64) -> &[RecordedEvent] {
        self.log.since(seq)
    }

    pub fn last_event_seq(&self) -> u64 {
        self.log.last_seq()
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }

    pub fn into_parts(self) -> (CustodyRecord, Vec<RecordedEvent>, L) {
        (self.record, self.log.into_entries(), self.ledger)
    }

    fn ensure_owner(&self, caller: Address, op: &str) -> Result<(), CustodyError> {
        if caller != self.record.owner {
            debug!("{} rejected: {} is not the owner", op, caller);
            return Err(CustodyError::NotOwner);
        }
        Ok(())
    }

    /// Move `last_activity` to now. A clock behind the record leaves it as is.
    fn touch(&mut self) -> Timestamp {
        let ts = self.ledger.now().max(self.record.last_activity);
        self.record.last_activity = ts;
        ts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{SimulatedLedger, TransferError};
    use crate::test_utils::{deploy_funded, deploy_test_custody, heir, other, owner, START};
    use crate::timelock::SECONDS_PER_DAY;

    #[test]
    fn test_deploy_sets_owner_and_heir() {
        let custody = deploy_test_custody();
        assert_eq!(custody.owner(), owner());
        assert_eq!(custody.heir(), heir());
        assert_eq!(custody.last_activity(), START);
        assert_eq!(custody.balance(), Amount::ZERO);
        assert!(custody.events().is_empty());
    }

    #[test]
    fn test_deploy_rejects_zero_heir() {
        let err = Custody::deploy(owner(), Address::ZERO, SimulatedLedger::new(START)).unwrap_err();
        assert_eq!(err, CustodyError::InvalidHeirAddress);
    }

    #[test]
    fn test_deploy_rejects_zero_owner() {
        let err = Custody::deploy(Address::ZERO, heir(), SimulatedLedger::new(START)).unwrap_err();
        assert_eq!(err, CustodyError::InvalidOwnerAddress);
    }

    #[test]
    fn test_owner_may_name_itself_heir() {
        let custody = Custody::deploy(owner(), owner(), SimulatedLedger::new(START)).unwrap();
        assert_eq!(custody.heir(), owner());
    }

    #[test]
    fn test_receive_funds_from_anyone() {
        let mut custody = deploy_test_custody();
        custody.receive_funds(owner(), Amount::ether(1)).unwrap();
        custody.receive_funds(other(), Amount::ether(2)).unwrap();
        custody.receive_funds(heir(), Amount::ZERO).unwrap();

        assert_eq!(custody.balance(), Amount::ether(3));
    }

    #[test]
    fn test_receive_funds_does_not_reset_timelock() {
        let mut custody = deploy_test_custody();
        custody.ledger_mut().advance_days(10);
        custody.receive_funds(owner(), Amount::ether(1)).unwrap();

        assert_eq!(custody.last_activity(), START);
        assert!(custody.events().is_empty());
    }

    #[test]
    fn test_receive_funds_overflow() {
        let mut custody = deploy_test_custody();
        custody
            .receive_funds(other(), Amount::from_wei(u128::MAX))
            .unwrap();
        let err = custody
            .receive_funds(other(), Amount::from_wei(1))
            .unwrap_err();
        assert_eq!(err, CustodyError::BalanceOverflow);
        assert_eq!(custody.balance(), Amount::from_wei(u128::MAX));
    }

    #[test]
    fn test_withdraw_pays_owner_and_emits_events() {
        let mut custody = deploy_funded(Amount::ether(1));
        custody.ledger_mut().advance(60);

        let half = Amount::parse_ether("0.5").unwrap();
        custody.withdraw(owner(), half).unwrap();

        assert_eq!(custody.balance(), half);
        assert_eq!(custody.ledger().credited(&owner()), half);
        assert_eq!(custody.last_activity(), START + 60);

        let events: Vec<&CustodyEvent> = custody.events().iter().map(|e| &e.event).collect();
        assert_eq!(
            events,
            vec![
                &CustodyEvent::Withdrawal {
                    to: owner(),
                    amount: half
                },
                &CustodyEvent::ActivityUpdated {
                    timestamp: START + 60
                },
            ]
        );
    }

    #[test]
    fn test_withdraw_entire_balance() {
        let mut custody = deploy_funded(Amount::ether(2));
        custody.withdraw(owner(), Amount::ether(2)).unwrap();
        assert_eq!(custody.balance(), Amount::ZERO);
    }

    #[test]
    fn test_zero_withdraw_is_a_ping() {
        let mut custody = deploy_test_custody();
        custody.ledger_mut().advance(1);

        custody.withdraw(owner(), Amount::ZERO).unwrap();

        assert_eq!(custody.last_activity(), START + 1);
        assert!(custody.ledger().transfers().is_empty());
        assert_eq!(custody.events().len(), 2);
        assert_eq!(
            custody.events()[0].event,
            CustodyEvent::Withdrawal {
                to: owner(),
                amount: Amount::ZERO
            }
        );
        assert_eq!(custody.events()[1].event.name(), "ActivityUpdated");
    }

    #[test]
    fn test_withdraw_by_non_owner() {
        let mut custody = deploy_funded(Amount::ether(1));
        let before = custody.record().clone();

        let err = custody.withdraw(other(), Amount::ether(1)).unwrap_err();
        assert_eq!(err, CustodyError::NotOwner);
        assert_eq!(custody.record(), &before);
        assert!(custody.events().is_empty());

        // The heir has no withdrawal rights either
        assert_eq!(
            custody.withdraw(heir(), Amount::ZERO),
            Err(CustodyError::NotOwner)
        );
    }

    #[test]
    fn test_withdraw_more_than_balance() {
        let mut custody = deploy_test_custody();
        let err = custody.withdraw(owner(), Amount::ether(1)).unwrap_err();
        assert_eq!(
            err,
            CustodyError::InsufficientBalance {
                requested: Amount::ether(1),
                available: Amount::ZERO
            }
        );
        assert!(custody.events().is_empty());
    }

    #[test]
    fn test_failed_transfer_reverts_everything() {
        let mut custody = deploy_funded(Amount::ether(1));
        custody.ledger_mut().reject_transfers_to(owner());
        custody.ledger_mut().advance_days(3);
        let before = custody.record().clone();

        let err = custody.withdraw(owner(), Amount::ether(1)).unwrap_err();
        assert_eq!(err, CustodyError::TransferFailed(TransferError::Rejected(owner())));
        assert_eq!(custody.record(), &before);
        assert_eq!(custody.last_activity(), START);
        assert!(custody.events().is_empty());
    }

    #[test]
    fn test_zero_withdraw_skips_transfer_even_if_rejecting() {
        let mut custody = deploy_test_custody();
        custody.ledger_mut().reject_transfers_to(owner());
        custody.ledger_mut().advance(5);

        assert!(custody.ping(owner()).is_ok());
        assert_eq!(custody.last_activity(), START + 5);
    }

    #[test]
    fn test_last_activity_never_decreases() {
        let mut custody = deploy_test_custody();
        custody.ledger_mut().set_time(START - 1_000);

        custody.ping(owner()).unwrap();
        assert_eq!(custody.last_activity(), START);
        assert_eq!(
            custody.events()[1].event,
            CustodyEvent::ActivityUpdated { timestamp: START }
        );
    }

    #[test]
    fn test_set_heir() {
        let mut custody = deploy_test_custody();
        custody.ledger_mut().advance_days(2);

        custody.set_heir(owner(), other()).unwrap();

        assert_eq!(custody.heir(), other());
        assert_eq!(custody.last_activity(), START, "set_heir is not proof of life");
        assert_eq!(
            custody.events()[0].event,
            CustodyEvent::HeirUpdated {
                old_heir: heir(),
                new_heir: other()
            }
        );
    }

    #[test]
    fn test_set_heir_rejects_zero() {
        let mut custody = deploy_test_custody();
        assert_eq!(
            custody.set_heir(owner(), Address::ZERO),
            Err(CustodyError::InvalidHeirAddress)
        );
        assert_eq!(custody.heir(), heir());
    }

    #[test]
    fn test_set_heir_by_non_owner() {
        let mut custody = deploy_test_custody();
        assert_eq!(
            custody.set_heir(heir(), other()),
            Err(CustodyError::NotOwner)
        );
        // Caller check comes first
        assert_eq!(
            custody.set_heir(other(), Address::ZERO),
            Err(CustodyError::NotOwner)
        );
    }

    #[test]
    fn test_rapid_heir_updates() {
        let mut custody = deploy_test_custody();
        let heirs: Vec<Address> = (10..14).map(|b| Address::from_bytes([b; 20])).collect();
        for h in &heirs {
            custody.set_heir(owner(), *h).unwrap();
        }
        assert_eq!(custody.heir(), heirs[3]);
        assert_eq!(custody.events().len(), 4);
    }

    #[test]
    fn test_claim_before_timelock() {
        let mut custody = deploy_test_custody();
        custody.ledger_mut().advance(TIMELOCK.secs() - 1);

        let err = custody.claim_inheritance(heir()).unwrap_err();
        assert_eq!(
            err,
            CustodyError::TimelockNotExpired {
                claimable_at: START + TIMELOCK.secs(),
                now: START + TIMELOCK.secs() - 1
            }
        );
        assert_eq!(custody.owner(), owner());
    }

    #[test]
    fn test_early_claim_fails_on_timelock_regardless_of_caller() {
        let mut custody = deploy_test_custody();
        for caller in [owner(), heir(), other(), Address::ZERO] {
            let err = custody.claim_inheritance(caller).unwrap_err();
            assert_eq!(err.code(), "TimelockNotExpired");
        }
    }

    #[test]
    fn test_claim_exactly_at_expiry() {
        let mut custody = deploy_test_custody();
        custody.ledger_mut().advance(TIMELOCK.secs());
        assert!(custody.is_claimable());
        custody.claim_inheritance(heir()).unwrap();
        assert_eq!(custody.owner(), heir());
    }

    #[test]
    fn test_claim_after_timelock() {
        let mut custody = deploy_funded(Amount::ether(1));
        custody.ledger_mut().advance_days(31);
        let claim_time = custody.ledger().now();

        custody.claim_inheritance(heir()).unwrap();

        assert_eq!(custody.owner(), heir());
        assert!(custody.heir().is_zero());
        assert_eq!(custody.last_activity(), claim_time);
        assert_eq!(custody.balance(), Amount::ether(1));
        assert_eq!(
            custody.events().last().map(|e| &e.event),
            Some(&CustodyEvent::OwnershipTransferred {
                old_owner: owner(),
                new_owner: heir()
            })
        );
    }

    #[test]
    fn test_claim_by_non_heir_after_timelock() {
        let mut custody = deploy_test_custody();
        custody.ledger_mut().advance_days(31);

        assert_eq!(custody.claim_inheritance(other()), Err(CustodyError::NotHeir));
        assert_eq!(custody.claim_inheritance(owner()), Err(CustodyError::NotHeir));
        assert_eq!(custody.owner(), owner());
    }

    #[test]
    fn test_claim_with_no_heir_is_blocked() {
        let mut custody = deploy_test_custody();
        custody.ledger_mut().advance_days(31);
        custody.claim_inheritance(heir()).unwrap();

        // Heir slot is now empty; even the zero address cannot claim
        custody.ledger_mut().advance_days(31);
        assert_eq!(
            custody.claim_inheritance(Address::ZERO),
            Err(CustodyError::NotHeir)
        );
    }

    #[test]
    fn test_new_owner_sets_heir_after_claim() {
        let mut custody = deploy_test_custody();
        custody.ledger_mut().advance_days(31);
        custody.claim_inheritance(heir()).unwrap();

        custody.set_heir(heir(), other()).unwrap();

        assert_eq!(custody.heir(), other());
        assert_eq!(
            custody.events().last().map(|e| &e.event),
            Some(&CustodyEvent::HeirUpdated {
                old_heir: Address::ZERO,
                new_heir: other()
            })
        );
        // Former owner lost all rights
        assert_eq!(
            custody.withdraw(owner(), Amount::ZERO),
            Err(CustodyError::NotOwner)
        );
    }

    #[test]
    fn test_new_owner_clock_starts_at_claim() {
        let mut custody = deploy_test_custody();
        custody.ledger_mut().advance_days(31);
        custody.claim_inheritance(heir()).unwrap();
        custody.set_heir(heir(), other()).unwrap();

        custody.ledger_mut().advance_days(29);
        assert!(custody.claim_inheritance(other()).is_err());

        custody.ledger_mut().advance_days(1);
        custody.claim_inheritance(other()).unwrap();
        assert_eq!(custody.owner(), other());
    }

    #[test]
    fn test_ping_pushes_claimable_time_forward() {
        let mut custody = deploy_test_custody();
        let mut previous = custody.claimable_at();

        for _ in 0..3 {
            custody.ledger_mut().advance_days(20);
            custody.ping(owner()).unwrap();
            let claimable = custody.claimable_at();
            assert_eq!(claimable, custody.last_activity() + TIMELOCK.secs());
            assert_eq!(claimable - previous, 20 * SECONDS_PER_DAY);
            previous = claimable;
        }
        assert_eq!(custody.balance(), Amount::ZERO);
    }

    #[test]
    fn test_restore_roundtrip() {
        let mut custody = deploy_funded(Amount::ether(1));
        custody.ping(owner()).unwrap();
        let (record, events, ledger) = custody.into_parts();

        let restored = Custody::restore(record.clone(), events, ledger).unwrap();
        assert_eq!(restored.record(), &record);
        assert_eq!(restored.last_event_seq(), 2);
    }

    #[test]
    fn test_restore_rejects_zero_owner() {
        let record = CustodyRecord {
            owner: Address::ZERO,
            heir: heir(),
            last_activity: START,
            balance: Amount::ZERO,
        };
        let err = Custody::restore(record, Vec::new(), SimulatedLedger::new(START)).unwrap_err();
        assert!(matches!(err, CustodyError::CorruptRecord(_)));
    }

    #[test]
    fn test_record_serde_roundtrip() {
        let custody = deploy_funded(Amount::parse_ether("1.25").unwrap());
        let json = serde_json::to_string(custody.record()).unwrap();
        let restored: CustodyRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(&restored, custody.record());
    }
}
