//! Custody Server: headless daemon and command line for a dead-man's-switch custody instance
//!
//! Holds one instance in SQLite under the data directory. Commands apply a
//! single operation and exit; without a command the server runs the watch
//! loop until interrupted.
//!
//! # Usage
//!
//! ```bash
//! custody-server --config /path/to/custody-server.toml deploy
//! custody-server withdraw 0x… 0.5   # Owner withdraws 0.5 ETH
//! custody-server --check            # Run one check cycle and exit
//! custody-server --validate         # Validate config and exit
//! ```

mod commands;
mod config;
mod daemon;
mod db;
mod ledger;

use anyhow::{Context, Result};
use std::path::PathBuf;

fn main() -> Result<()> {
    // Parse CLI args (minimal, no clap dependency needed)
    let args: Vec<String> = std::env::args().collect();

    let mut config_path = PathBuf::from("/config/custody-server.toml");
    let mut one_shot = false;
    let mut validate_only = false;
    let mut command_args: Vec<String> = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                i += 1;
                if i < args.len() {
                    config_path = PathBuf::from(&args[i]);
                } else {
                    anyhow::bail!("--config requires a path argument");
                }
            }
            "--check" | "--once" => {
                one_shot = true;
            }
            "--validate" => {
                validate_only = true;
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--version" | "-V" => {
                println!("custody-server {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            other if other.starts_with('-') => {
                anyhow::bail!("Unknown argument: {}", other);
            }
            _ => {
                // Everything from the command name on belongs to the command
                command_args = args[i..].to_vec();
                break;
            }
        }
        i += 1;
    }

    let command = if command_args.is_empty() {
        None
    } else {
        Some(commands::Command::parse(&command_args)?)
    };

    // Load config
    let mut server_config = config::ServerConfig::from_file(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    // Apply env overrides
    server_config.apply_env_overrides();

    // Validate
    server_config
        .validate()
        .context("Configuration validation failed")?;

    // Init logger
    std::env::set_var("RUST_LOG", &server_config.server.log_level);
    env_logger::init();

    if validate_only {
        println!("✅ Configuration is valid.");
        println!("  Data dir:       {}", server_config.server.data_dir.display());
        println!("  Deployer:       {}", server_config.custody.deployer()?);
        println!("  Initial heir:   {}", server_config.custody.initial_heir()?);
        println!(
            "  Check interval: {} secs",
            server_config.server.check_interval_secs
        );
        println!("  Warning:        {} days", server_config.watch.warning_days);
        return Ok(());
    }

    if let Some(command) = command {
        let mut conn = commands::open_store(&server_config)?;
        let custody = commands::execute(
            &mut conn,
            &server_config,
            &command,
            ledger::ServerLedger::new(),
        )?;
        if command != commands::Command::Status {
            println!("✅ {} succeeded.", command.name());
        }
        println!("{}", commands::status_report(&custody, &server_config));
        return Ok(());
    }

    // Build tokio runtime
    let rt = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;

    if one_shot {
        log::info!("Running single check cycle…");
        rt.block_on(daemon::run_check_cycle(&server_config))?;
        log::info!("Done.");
    } else {
        // Install Ctrl-C handler for graceful shutdown
        let shutdown = rt.block_on(async {
            tokio::select! {
                result = daemon::run(server_config) => result,
                _ = tokio::signal::ctrl_c() => {
                    log::info!("Received shutdown signal. Exiting…");
                    Ok(())
                }
            }
        });

        if let Err(e) = shutdown {
            log::error!("Server error: {:#}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}

fn print_help() {
    println!(
        r#"Custody Server - dead-man's-switch custody daemon

USAGE:
    custody-server [OPTIONS] [COMMAND [ARGS]]

OPTIONS:
    -c, --config <PATH>   Config file path (default: /config/custody-server.toml)
    --check, --once       Run a single check cycle and exit
    --validate            Validate config file and exit
    -h, --help            Show this help message
    -V, --version         Show version

COMMANDS (without one, the server runs the watch loop):
    deploy [--heir <ADDRESS>]          Create the instance owned by the deployer
    deposit <FROM> <AMOUNT_ETH>        Credit funds received from anyone
    withdraw <CALLER> <AMOUNT_ETH>     Owner withdraws and resets the timelock
    ping <CALLER>                      Owner proof of life (zero withdrawal)
    set-heir <CALLER> <NEW_HEIR>       Owner designates a new heir
    claim <CALLER>                     Heir takes ownership after 30 days of silence
    status                             Show owner, heir, balance and timelock

ENVIRONMENT VARIABLES (override config file):
    CUSTODY_DATA_DIR         Data directory path
    CUSTODY_CHECK_INTERVAL   Check interval in seconds
    CUSTODY_LOG_LEVEL        Log level (error/warn/info/debug/trace)
    CUSTODY_DEPLOYER         Deployer address (first owner)
    HEIR_ADDRESS             Initial heir address (defaults to the deployer)

EXAMPLES:
    # Run as daemon with config file
    custody-server --config /path/to/config.toml

    # Deploy, naming the heir explicitly
    custody-server --config config.toml deploy --heir 0x70997970c51812dc3a010c7d01b50e0d17dc79c8

    # Single check (useful for cron jobs)
    custody-server --config config.toml --check
"#
    );
}
