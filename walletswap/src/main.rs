//! walletswap - Connect a browser-style wallet and buy a token with another.
//!
//! A purchase is an ERC-20 approval for a Uniswap V2 style router followed by
//! `swapExactTokensForTokens`, both signed by the user's wallet.
//!
//! Architecture:
//! - `wallet` owns the session: connect, disconnect, provider notifications
//! - `swap` runs approve-then-swap against a ready session snapshot
//! - `controller` serializes user actions and notifications on one task
//! - `cli` and `server` are thin front ends over the controller

mod cli;
mod config;
mod contracts;
mod controller;
mod error;
mod models;
mod server;
mod swap;
mod wallet;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{execute, Cli};

fn init_tracing(verbose: bool) {
    let default = if verbose { "walletswap=debug" } else { "walletswap=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    execute(cli).await
}
