//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// walletswap - Connect a wallet and buy tokens through a DEX router
#[derive(Parser, Debug)]
#[command(name = "walletswap")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to <config dir>/walletswap/config.json)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Chain node used for reads and receipts
    #[arg(long, global = true)]
    pub rpc_url: Option<String>,

    /// Wallet endpoint that holds the keys and signs
    #[arg(long, global = true)]
    pub wallet_url: Option<String>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect and report the session state
    Status,

    /// Approve and swap the input token for the output token
    Buy {
        /// Amount of the input token, in whole units (e.g. 100 or 12.5)
        amount: String,
    },

    /// Show input and output token balances of the connected account
    Balance,

    /// Print the effective configuration
    Config,

    /// Start the HTTP/WebSocket server for a browser front end
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "58231")]
        port: u16,
    },
}
