//! Persistent state for the watch service
//!
//! Tracks the last poll, the last event already reported, and the last known
//! owner so restarts neither repeat nor miss changes.

use custody_core::{Address, Timestamp};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use thiserror::Error;

/// Errors from state operations
#[derive(Error, Debug)]
pub enum StateError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Watch progress for one custody instance
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct WatchState {
    /// Ledger time of the last successful poll
    pub last_poll: Option<Timestamp>,
    /// Highest event sequence already reported (0 = none)
    #[serde(default)]
    pub last_event_seq: u64,
    /// Owner seen on the last poll
    pub last_owner: Option<Address>,
}

impl WatchState {
    /// Create empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Load state from file, or create empty if not exists
    pub fn load(path: &Path) -> Result<Self, StateError> {
        if path.exists() {
            let contents = fs::read_to_string(path)?;
            let state: WatchState = serde_json::from_str(&contents)?;
            Ok(state)
        } else {
            Ok(Self::new())
        }
    }

    /// Save state to file
    ///
    /// Writes a sibling temp file and renames it over `path`, so a crash
    /// leaves either the old state or the new one.
    pub fn save(&self, path: &Path) -> Result<(), StateError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;

        let temp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// Seconds since the last poll, if any
    pub fn since_last_poll(&self, now: Timestamp) -> Option<u64> {
        self.last_poll.map(|last| now.saturating_sub(last))
    }

    /// Update last poll info
    pub fn update_poll(&mut self, timestamp: Timestamp, last_event_seq: u64, owner: Address) {
        self.last_poll = Some(timestamp);
        self.last_event_seq = last_event_seq;
        self.last_owner = Some(owner);
    }
}
