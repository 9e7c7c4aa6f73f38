//! Operation commands: apply one custody operation to the persisted instance.
//!
//! Each command takes the database write lock, loads the instance, applies
//! the operation, and commits the new record, the events it logged, and any
//! payout before releasing it. Concurrent commands from other processes wait
//! for the lock. A rejected operation writes nothing.

use crate::config::ServerConfig;
use crate::db;
use crate::ledger::{format_timestamp, ServerLedger};
use anyhow::{Context, Result};
use custody_core::{evaluate_heartbeat, Address, Amount, Custody, CustodyError, Ledger};
use rusqlite::{Connection, TransactionBehavior};

/// A single custody operation requested on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create the instance; heir from `--heir`, else the configured heir
    Deploy { heir: Option<Address> },
    Deposit { from: Address, amount: Amount },
    Withdraw { caller: Address, amount: Amount },
    /// Zero-value withdrawal
    Ping { caller: Address },
    SetHeir { caller: Address, new_heir: Address },
    Claim { caller: Address },
    Status,
}

impl Command {
    /// Parse `<command> [args…]`.
    pub fn parse(args: &[String]) -> Result<Self> {
        let (name, rest) = args.split_first().context("Missing command name")?;

        let command = match name.as_str() {
            "deploy" => {
                let heir = match rest {
                    [] => None,
                    [flag, value] if flag == "--heir" => Some(parse_address("heir", value)?),
                    _ => anyhow::bail!("Usage: deploy [--heir <ADDRESS>]"),
                };
                Command::Deploy { heir }
            }
            "deposit" => match rest {
                [from, amount] => Command::Deposit {
                    from: parse_address("sender", from)?,
                    amount: parse_amount(amount)?,
                },
                _ => anyhow::bail!("Usage: deposit <FROM> <AMOUNT_ETH>"),
            },
            "withdraw" => match rest {
                [caller, amount] => Command::Withdraw {
                    caller: parse_address("caller", caller)?,
                    amount: parse_amount(amount)?,
                },
                _ => anyhow::bail!("Usage: withdraw <CALLER> <AMOUNT_ETH>"),
            },
            "ping" => match rest {
                [caller] => Command::Ping {
                    caller: parse_address("caller", caller)?,
                },
                _ => anyhow::bail!("Usage: ping <CALLER>"),
            },
            "set-heir" => match rest {
                [caller, new_heir] => Command::SetHeir {
                    caller: parse_address("caller", caller)?,
                    new_heir: parse_address("heir", new_heir)?,
                },
                _ => anyhow::bail!("Usage: set-heir <CALLER> <NEW_HEIR>"),
            },
            "claim" => match rest {
                [caller] => Command::Claim {
                    caller: parse_address("caller", caller)?,
                },
                _ => anyhow::bail!("Usage: claim <CALLER>"),
            },
            "status" => {
                anyhow::ensure!(rest.is_empty(), "Usage: status");
                Command::Status
            }
            other => anyhow::bail!("Unknown command: {}", other),
        };
        Ok(command)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Deploy { .. } => "deploy",
            Command::Deposit { .. } => "deposit",
            Command::Withdraw { .. } => "withdraw",
            Command::Ping { .. } => "ping",
            Command::SetHeir { .. } => "set-heir",
            Command::Claim { .. } => "claim",
            Command::Status => "status",
        }
    }

    /// Address the operation is performed as, if it names one
    pub fn caller(&self) -> Option<Address> {
        match *self {
            Command::Deposit { from, .. } => Some(from),
            Command::Withdraw { caller, .. }
            | Command::Ping { caller }
            | Command::SetHeir { caller, .. }
            | Command::Claim { caller } => Some(caller),
            Command::Deploy { .. } | Command::Status => None,
        }
    }
}

fn parse_address(what: &str, value: &str) -> Result<Address> {
    value
        .parse()
        .with_context(|| format!("Invalid {} address: {}", what, value))
}

fn parse_amount(value: &str) -> Result<Amount> {
    Amount::parse_ether(value).with_context(|| format!("Invalid amount: {}", value))
}

/// Open the database under the data directory, creating both if needed.
pub fn open_store(config: &ServerConfig) -> Result<Connection> {
    std::fs::create_dir_all(&config.server.data_dir).with_context(|| {
        format!(
            "Failed to create data dir: {}",
            config.server.data_dir.display()
        )
    })?;
    let path = config.db_path();
    db::open_db(&path).with_context(|| format!("Failed to open database {}", path.display()))
}

/// Rebuild the persisted instance, if it has been deployed.
pub fn load_custody(
    conn: &Connection,
    ledger: ServerLedger,
) -> Result<Option<Custody<ServerLedger>>> {
    let record = match db::load_record(conn).context("Failed to load custody record")? {
        Some(record) => record,
        None => return Ok(None),
    };
    let events = db::event_list(conn).context("Failed to load event history")?;
    let custody = Custody::restore(record, events, ledger).context("Stored custody is corrupt")?;
    Ok(Some(custody))
}

/// Run `command` against the persisted instance and return it afterwards.
pub fn execute(
    conn: &mut Connection,
    config: &ServerConfig,
    command: &Command,
    ledger: ServerLedger,
) -> Result<Custody<ServerLedger>> {
    // Held from load to commit; dropping it on any error rolls back
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .context("Failed to lock the custody database")?;

    if let Command::Deploy { heir } = command {
        anyhow::ensure!(
            db::load_record(&tx)?.is_none(),
            "A custody instance is already deployed in {}",
            config.server.data_dir.display()
        );
        let deployer = config.custody.deployer()?;
        let heir = match heir {
            Some(heir) => *heir,
            None => config.custody.initial_heir()?,
        };
        let custody = Custody::deploy(deployer, heir, ledger).context("deploy rejected")?;
        db::save_custody(&tx, custody.record(), &[], &[])
            .context("Failed to persist new instance")?;
        tx.commit().context("Failed to commit new instance")?;
        return Ok(custody);
    }

    let mut custody = load_custody(&tx, ledger)?
        .context("No custody instance deployed; run `custody-server deploy` first")?;
    let before = custody.last_event_seq();

    let applied = match *command {
        Command::Deposit { from, amount } => custody.receive_funds(from, amount),
        Command::Withdraw { caller, amount } => custody.withdraw(caller, amount),
        Command::Ping { caller } => custody.ping(caller),
        Command::SetHeir { caller, new_heir } => custody.set_heir(caller, new_heir),
        Command::Claim { caller } => custody.claim_inheritance(caller),
        Command::Status | Command::Deploy { .. } => return Ok(custody),
    };
    if let Err(e) = applied {
        return Err(rejection(command, e));
    }

    let payouts = custody.ledger_mut().take_payouts();
    db::save_custody(&tx, custody.record(), custody.events_since(before), &payouts)
        .context("Failed to persist custody state")?;
    tx.commit().context("Failed to commit custody state")?;

    log::info!(
        "{} applied; {} new event(s), {} payout(s)",
        command.name(),
        custody.last_event_seq() - before,
        payouts.len()
    );
    Ok(custody)
}

/// Log a rejected operation and wrap the error for the terminal.
fn rejection(command: &Command, err: CustodyError) -> anyhow::Error {
    log::warn!("{} rejected [{}]: {}", command.name(), err.code(), err);
    let message = match command.caller() {
        Some(caller) if err.is_caller_mismatch() => {
            let name = command.name();
            format!("{} rejected: {} is not permitted to {}", name, caller, name)
        }
        _ => format!("{} rejected", command.name()),
    };
    anyhow::Error::new(err).context(message)
}

/// Multi-line status summary for the terminal
pub fn status_report(custody: &Custody<ServerLedger>, config: &ServerConfig) -> String {
    let record = custody.record();
    let now = custody.ledger().now();
    let heartbeat = evaluate_heartbeat(record, now, &config.heartbeat_config());
    let remaining = if heartbeat.timelock_status.expired {
        "expired".to_string()
    } else {
        format!("{:.1} days", heartbeat.timelock_status.days_remaining())
    };
    let heir = if record.has_heir() {
        record.heir.to_string()
    } else {
        "none".to_string()
    };

    format!(
        "Owner:          {}\n\
         Heir:           {}\n\
         Balance:        {} ETH\n\
         Last activity:  {}\n\
         Claimable at:   {}\n\
         Time remaining: {}\n\
         Heartbeat:      {:?}\n\
         Events logged:  {}",
        record.owner,
        heir,
        record.balance.to_ether_string(),
        format_timestamp(record.last_activity),
        format_timestamp(record.claimable_at()),
        remaining,
        heartbeat.action,
        custody.last_event_seq()
    )
}
