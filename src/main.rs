//! Solana swap panel backed by the Jupiter aggregator.
//! High-level architecture:
//! - Wallet state (balances, spot prices, fees) via Solana RPC + Jupiter price API
//! - Quotes and swap transactions via Jupiter Swap API
//! - Quote details priced against spot prices
//! - Transaction submission through a wallet adapter

mod config;
mod display;
mod error;
mod locale;
mod model;
mod panel;
mod pricing;
mod provider;
mod quote;
mod rpc;
mod swap_client;
mod wallet_adapter;
mod wallet_state;

use anyhow::Result;
use config::PanelConfig;
use panel::SwapPanel;
use structopt::StructOpt;
use tokio::signal;

#[derive(StructOpt, Debug)]
#[structopt(name = "swap_panel")]
struct Cli {
    /// Path to config file
    #[structopt(short, long, default_value = "swap.toml")]
    config: String,

    /// Network id to select after loading, e.g. solana-devnet
    #[structopt(long)]
    network: Option<String>,

    /// Wallet address to use instead of the configured one
    #[structopt(long)]
    account: Option<String>,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(StructOpt, Debug)]
enum Command {
    /// Fetch one quote and print its details
    Quote {
        /// Overrides the configured amount
        #[structopt(short, long)]
        amount: Option<String>,
    },
    /// Print balances, spot prices and fee estimates
    Wallet,
    /// Refresh wallet state and quote until interrupted
    Watch,
    /// Fetch a quote and submit the best route through the wallet adapter
    Swap {
        #[structopt(short, long)]
        amount: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Cli::from_args();
    let mut cfg = PanelConfig::from_file(&args.config)?;
    if let Command::Quote { amount: Some(amount) } | Command::Swap { amount: Some(amount) } = &args.cmd {
        cfg.amount = amount.clone();
    }

    let panel = SwapPanel::new(cfg)?;
    panel.mount().await;
    if let Some(id) = &args.network {
        panel.select_network(id).await?;
    }
    if let Some(address) = &args.account {
        panel.select_account(address).await?;
    }

    match args.cmd {
        Command::Quote { .. } => {
            panel.refresh_quote().await;
            println!("{}", panel.quote_summary().await);
        }
        Command::Wallet => {
            print!("{}", panel.wallet_summary().await);
        }
        Command::Watch => {
            tokio::select! {
                res = panel.run() => res?,
                _ = signal::ctrl_c() => {
                    log::info!("Shutdown signal received");
                }
            }
        }
        Command::Swap { .. } => {
            panel.refresh_quote().await;
            println!("{}", panel.quote_summary().await);
            let signatures = panel.swap().await;
            if signatures.is_empty() {
                println!("No transaction submitted");
            }
            for sig in signatures {
                println!("Submitted {}", sig);
            }
        }
    }

    panel.shutdown().await;
    Ok(())
}
