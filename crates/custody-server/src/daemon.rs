//! The daemon loop: periodically reloads the custody instance and reports what changed.

use crate::commands;
use crate::config::ServerConfig;
use crate::ledger::{format_timestamp, ServerLedger};
use anyhow::{Context, Result};
use custody_core::{evaluate_heartbeat, SharedCustody};
use custody_watch::{WatchEvent, WatchService};

/// Run the daemon loop. Blocks forever (until shutdown signal).
pub async fn run(config: ServerConfig) -> Result<()> {
    log::info!("Custody server starting…");
    log::info!(
        "  Interval:   {} seconds ({:.1} hours)",
        config.server.check_interval_secs,
        config.server.check_interval_secs as f64 / 3600.0
    );
    log::info!("  Data dir:   {}", config.server.data_dir.display());
    log::info!("  Warn at:    {} days remaining", config.watch.warning_days);

    let interval = config.watch_config().poll_interval();

    // Run first check immediately, then loop
    let mut first = true;
    loop {
        if !first {
            log::info!("Sleeping {} seconds until next check…", interval.as_secs());
            tokio::time::sleep(interval).await;
        }
        first = false;

        match run_check_cycle(&config).await {
            Ok(events) => log::info!("Check cycle completed: {} event(s).", events.len()),
            Err(e) => log::error!("Check cycle failed: {:#}", e),
        }
    }
}

/// Execute a single check cycle off the async runtime.
pub async fn run_check_cycle(config: &ServerConfig) -> Result<Vec<WatchEvent>> {
    let config = config.clone();
    tokio::task::spawn_blocking(move || check_once(&config, ServerLedger::new()))
        .await
        .context("Check cycle task panicked")?
}

/// Reload the instance from disk, poll it once, and log every event.
pub fn check_once(config: &ServerConfig, ledger: ServerLedger) -> Result<Vec<WatchEvent>> {
    log::info!("Starting check cycle…");

    let conn = commands::open_store(config)?;
    let custody = match commands::load_custody(&conn, ledger)? {
        Some(custody) => custody,
        None => {
            log::info!("No custody instance deployed yet; nothing to watch.");
            return Ok(Vec::new());
        }
    };
    // Release the database before polling so CLI commands are not blocked
    drop(conn);

    let shared = SharedCustody::new(custody);
    let mut watch = WatchService::new(shared.clone(), config.watch_config())
        .context("Failed to create WatchService")?;
    let events = watch.poll().context("Watch poll failed")?;

    let snapshot = shared.snapshot();
    let heartbeat = evaluate_heartbeat(
        &snapshot.record,
        snapshot.now,
        &config.heartbeat_config(),
    );
    log::info!(
        "Owner {}  |  balance {} ETH  |  claimable at {}  |  {:?}",
        snapshot.record.owner,
        snapshot.record.balance.to_ether_string(),
        format_timestamp(snapshot.record.claimable_at()),
        heartbeat.action
    );

    for event in &events {
        match event {
            WatchEvent::Custody {
                seq,
                timestamp,
                event,
            } => {
                log::info!(
                    "[#{}] {} at {}: {:?}",
                    seq,
                    event.name(),
                    format_timestamp(*timestamp),
                    event
                );
            }
            WatchEvent::OwnershipChanged {
                old_owner,
                new_owner,
            } => {
                log::warn!("Ownership changed: {} -> {}", old_owner, new_owner);
            }
            WatchEvent::TimelockWarning {
                owner,
                days_remaining,
                action,
                ..
            } => {
                log::warn!(
                    "Timelock warning: ~{:.1} days remaining; owner {} should ping ({:?})",
                    days_remaining,
                    owner,
                    action
                );
            }
            WatchEvent::ClaimAvailable { heir, since } => {
                log::warn!(
                    "CRITICAL: timelock expired at {}; heir {} can claim",
                    format_timestamp(*since),
                    heir
                );
            }
        }
    }

    Ok(events)
}
