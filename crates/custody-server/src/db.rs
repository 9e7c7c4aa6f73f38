//! SQLite persistence layer.
//!
//! Stores all durable state so the server survives restarts.
//! Uses a simple key-value `config` table for the custody record,
//! an append-only `events` table for its history, and a `payouts`
//! table for value that left custody.

use crate::ledger::Payout;
use custody_core::{Address, Amount, CustodyEvent, CustodyRecord, RecordedEvent};
use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult, Transaction};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Key of the custody record in the `config` table
const RECORD_KEY: &str = "custody_record";

/// How long a writer waits for another process to release the database
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Stored JSON is invalid: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Stored row is invalid: {0}")]
    Corrupt(String),
}

/// Open (or create) the database at `path` and run migrations.
pub fn open_db(path: &Path) -> SqlResult<Connection> {
    let conn = Connection::open(path)?;

    // WAL mode for better concurrent read performance
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS config (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS events (
            seq       INTEGER PRIMARY KEY,
            timestamp INTEGER NOT NULL,
            kind      TEXT NOT NULL,
            payload   TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS payouts (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp  INTEGER NOT NULL,
            recipient  TEXT NOT NULL,
            amount_wei TEXT NOT NULL
        );
        ",
    )?;

    Ok(conn)
}

// ============================================================================
// Config helpers (key-value)
// ============================================================================

/// Get a config value by key.
pub fn config_get(conn: &Connection, key: &str) -> SqlResult<Option<String>> {
    conn.query_row(
        "SELECT value FROM config WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

/// Set a config value (upsert).
pub fn config_set(conn: &Connection, key: &str, value: &str) -> SqlResult<()> {
    conn.execute(
        "INSERT INTO config (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

// ============================================================================
// Custody state
// ============================================================================

/// Load the custody record, if one has been deployed.
pub fn load_record(conn: &Connection) -> Result<Option<CustodyRecord>, DbError> {
    match config_get(conn, RECORD_KEY)? {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

/// Full event history in sequence order.
pub fn event_list(conn: &Connection) -> Result<Vec<RecordedEvent>, DbError> {
    let mut stmt = conn.prepare("SELECT seq, timestamp, payload FROM events ORDER BY seq")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;

    let mut events = Vec::new();
    for row in rows {
        let (seq, timestamp, payload) = row?;
        let event: CustodyEvent = serde_json::from_str(&payload)?;
        events.push(RecordedEvent {
            seq: seq as u64,
            timestamp: timestamp as u64,
            event,
        });
    }
    Ok(events)
}

/// All payouts, oldest first.
pub fn payout_list(conn: &Connection) -> Result<Vec<Payout>, DbError> {
    let mut stmt =
        conn.prepare("SELECT timestamp, recipient, amount_wei FROM payouts ORDER BY id")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;

    let mut payouts = Vec::new();
    for row in rows {
        let (timestamp, recipient, amount) = row?;
        payouts.push(Payout {
            timestamp: timestamp as u64,
            recipient: recipient
                .parse::<Address>()
                .map_err(|e| DbError::Corrupt(format!("recipient {}: {}", recipient, e)))?,
            amount: amount
                .parse::<Amount>()
                .map_err(|e| DbError::Corrupt(format!("amount {}: {}", amount, e)))?,
        });
    }
    Ok(payouts)
}

/// Write the record, newly logged events, and payouts inside `tx`.
///
/// The caller commits. The record must have been loaded inside the same
/// transaction, otherwise a concurrent writer's update can be overwritten.
pub fn save_custody(
    tx: &Transaction<'_>,
    record: &CustodyRecord,
    new_events: &[RecordedEvent],
    payouts: &[Payout],
) -> Result<(), DbError> {
    let record_json = serde_json::to_string(record)?;
    config_set(tx, RECORD_KEY, &record_json)?;

    for entry in new_events {
        tx.execute(
            "INSERT INTO events (seq, timestamp, kind, payload) VALUES (?1, ?2, ?3, ?4)",
            params![
                entry.seq as i64,
                entry.timestamp as i64,
                entry.event.name(),
                serde_json::to_string(&entry.event)?
            ],
        )?;
    }

    for payout in payouts {
        tx.execute(
            "INSERT INTO payouts (timestamp, recipient, amount_wei) VALUES (?1, ?2, ?3)",
            params![
                payout.timestamp as i64,
                payout.recipient.to_string(),
                payout.amount.wei().to_string()
            ],
        )?;
    }

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
