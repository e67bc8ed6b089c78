//! txmanager CLI
//!
//! Sends a single transaction through the delivery engine and waits for it.
//!
//! # Architecture Overview
//!
//! ```text
//!   CLI args + config file            TXMANAGER_PRIVATE_KEY
//!            │                                │
//!            ▼                                ▼
//!   ┌─────────────────┐              ┌─────────────────┐
//!   │ config (TOML,   │              │ blockchain      │
//!   │ validation)     │              │ wallet (signer) │
//!   └────────┬────────┘              └────────┬────────┘
//!            │                                │
//!            ▼                                ▼
//!   ┌──────────────────────────────────────────────────┐
//!   │ txmanager: nonce → sign → broadcast → bump/poll  │──▶ JSON-RPC node(s)
//!   └────────────────────────┬─────────────────────────┘
//!                            ▼
//!                  confirm / error feeds → report
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use alloy::primitives::{Address, Bytes, U256};
use clap::{Parser, Subcommand};

use txmanager::blockchain::{BlockchainClient, Transaction, TransactionSigner, Wallet};
use txmanager::config::{load_config, Config};
use txmanager::lifecycle::Shutdown;
use txmanager::observability::{logging, metrics};
use txmanager::TxManager;

#[derive(Parser)]
#[command(name = "txmanager")]
#[command(about = "Deliver EVM transactions until they are confirmed", long_about = None)]
struct Cli {
    /// TOML configuration file; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration and print the effective values
    CheckConfig,
    /// Send a transaction and wait until it is confirmed or given up on
    Send {
        /// Recipient; omit to deploy `--data` as contract code
        #[arg(long)]
        to: Option<Address>,

        /// Value in wei
        #[arg(long, default_value = "0")]
        value: U256,

        /// Hex encoded call data
        #[arg(long, default_value = "0x")]
        data: Bytes,

        /// Gas limit; estimated when 0
        #[arg(long, default_value_t = 0)]
        gas_limit: u64,

        /// Label logged and reported on confirmation
        #[arg(long, default_value = "")]
        info: String,

        /// Highest gas price in wei fee bumps may reach
        #[arg(long)]
        price_limit: Option<u128>,

        /// Re-estimate the gas limit on every fee bump
        #[arg(long)]
        recalc_gas: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    logging::init_logging(&config.observability)?;

    match cli.command {
        Commands::CheckConfig => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Send {
            to,
            value,
            data,
            gas_limit,
            info,
            price_limit,
            recalc_gas,
        } => {
            let tx = Transaction {
                to,
                value,
                input: data,
                gas_limit,
                ..Default::default()
            };
            let confirmed = send(config, tx, recalc_gas, info, price_limit).await?;
            if !confirmed {
                std::process::exit(1);
            }
        }
    }
    Ok(())
}

async fn send(
    config: Config,
    tx: Transaction,
    recalc_gas: bool,
    info: String,
    price_limit: Option<u128>,
) -> Result<bool, Box<dyn std::error::Error>> {
    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr);
    }

    let client = Arc::new(BlockchainClient::new(config.chain.clone()).await?);
    let wallet = Arc::new(Wallet::from_env(config.chain.chain_id)?);
    tracing::info!(
        address = %wallet.address(),
        period_secs = config.txmanager.period_secs,
        confirm_height = config.txmanager.confirm_height,
        "Sending transaction"
    );
    let manager = TxManager::new(config.txmanager.clone(), client, wallet)?;

    let shutdown = Shutdown::new();
    let mut interrupted = shutdown.subscribe();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => shutdown.trigger(),
            Err(e) => {
                tracing::error!(error = %e, "Cannot listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        }
    });

    tokio::select! {
        result = manager.sync_send_tx(tx, recalc_gas, info, price_limit) => {
            let delivery = result?;
            println!("{}", serde_json::to_string_pretty(&delivery.report())?);
            Ok(delivery.is_confirmed())
        }
        _ = interrupted.recv() => {
            tracing::warn!("Interrupted; the broadcast transaction may still be mined");
            Ok(false)
        }
    }
}
