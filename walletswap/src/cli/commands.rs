//! CLI command execution.
//!
//! Each command runs its own session controller against the configured wallet
//! endpoint and prints status messages as the controller publishes them.

use std::future::Future;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::ChainConfig;
use crate::contracts::format_amount;
use crate::controller::{ActionError, Controller, ControllerHandle};
use crate::models::{SessionView, StatusEvent};
use crate::server;
use crate::wallet::JsonRpcConnector;

use super::args::{Cli, Commands};

/// Execute the parsed CLI command.
pub async fn execute(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Config => print_config(&config),
        Commands::Status => show_status(config).await,
        Commands::Buy { amount } => buy(config, &amount).await,
        Commands::Balance => show_balances(config).await,
        Commands::Serve { port } => serve(config, port).await,
    }
}

fn load_config(cli: &Cli) -> Result<ChainConfig> {
    let mut config =
        ChainConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    if let Some(url) = &cli.rpc_url {
        config.rpc_url.clone_from(url);
    }
    if let Some(url) = &cli.wallet_url {
        config.wallet_url.clone_from(url);
    }
    config.validate().context("Invalid configuration")?;

    debug!(
        chain_id = config.chain_id,
        rpc = %config.rpc_url,
        wallet = %config.wallet_url,
        "configuration loaded"
    );
    Ok(config)
}

fn spawn_controller(config: ChainConfig) -> (ControllerHandle, JoinHandle<()>) {
    let connector = Arc::new(JsonRpcConnector::new(&config));
    Controller::spawn(Arc::new(config), connector)
}

/// Drop the handle and wait for the controller to tear the session down.
async fn shutdown(handle: ControllerHandle, task: JoinHandle<()>) -> Result<()> {
    drop(handle);
    task.await.context("Session controller panicked")
}

/// Drive `action` to completion while echoing status messages to stdout.
async fn with_progress<T>(
    handle: &ControllerHandle,
    action: impl Future<Output = Result<T, ActionError>>,
) -> Result<T, ActionError> {
    let mut statuses = handle.subscribe();
    tokio::pin!(action);

    let result = loop {
        tokio::select! {
            result = &mut action => break result,
            event = statuses.recv() => match event {
                Ok(event) => print_status(&event),
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break (&mut action).await,
            },
        }
    };

    // Messages published just before the reply.
    loop {
        match statuses.try_recv() {
            Ok(event) => print_status(&event),
            Err(TryRecvError::Lagged(_)) => {}
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
    result
}

fn print_status(event: &StatusEvent) {
    match event.purchase_id {
        Some(id) => println!("[{}] {} ({id})", event.at.format("%H:%M:%S"), event.message),
        None => println!("[{}] {}", event.at.format("%H:%M:%S"), event.message),
    }
}

/// Connect and require the session to be on the configured network.
async fn connect_ready(handle: &ControllerHandle, config: &ChainConfig) -> Result<SessionView> {
    let view = with_progress(handle, handle.connect()).await?;
    if !view.ready {
        bail!(
            "Wallet is on chain {}. Switch it to {} ({}) and try again.",
            view.chain_id.unwrap_or_default(),
            config.chain_name,
            config.chain_id
        );
    }
    Ok(view)
}

fn print_config(config: &ChainConfig) -> Result<()> {
    let json = serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;
    println!("{json}");
    if let Some(path) = ChainConfig::default_path() {
        println!();
        println!("Default config path: {}", path.display());
    }
    Ok(())
}

async fn show_status(config: ChainConfig) -> Result<()> {
    let target = format!("{} ({})", config.chain_name, config.chain_id);
    let (handle, task) = spawn_controller(config);

    let result = with_progress(&handle, handle.connect()).await;
    let outcome = match result {
        Ok(view) => {
            println!();
            println!("Status:  {}", view.status);
            if let Some(account) = &view.account {
                println!("Account: {account}");
            }
            if let Some(chain_id) = view.chain_id {
                println!("Chain:   {chain_id}");
            }
            println!("Target:  {target}");
            println!("Ready:   {}", if view.ready { "yes" } else { "no" });
            Ok(())
        }
        Err(err) => Err(err).context("Failed to connect wallet"),
    };

    shutdown(handle, task).await?;
    outcome
}

async fn buy(config: ChainConfig, amount: &str) -> Result<()> {
    let symbol_in = config.token_in.symbol.clone();
    let symbol_out = config.token_out.symbol.clone();
    let (handle, task) = spawn_controller(config.clone());

    let outcome = async {
        connect_ready(&handle, &config).await?;
        let receipt = with_progress(&handle, handle.submit_purchase(amount))
            .await
            .with_context(|| format!("Failed to buy {symbol_out} with {amount} {symbol_in}"))?;

        println!();
        println!("Purchase {}", receipt.purchase_id);
        println!("  Spent:    {} {symbol_in}", receipt.amount);
        println!("  Approval: {}", receipt.approval_tx);
        println!("  Swap:     {}", receipt.swap_tx);
        Ok::<_, anyhow::Error>(())
    }
    .await;

    shutdown(handle, task).await?;
    outcome
}

async fn show_balances(config: ChainConfig) -> Result<()> {
    let (handle, task) = spawn_controller(config.clone());

    let outcome = async {
        let view = connect_ready(&handle, &config).await?;
        let balances = handle.balances().await.context("Failed to read balances")?;

        println!();
        println!("Account: {}", view.account.unwrap_or_default());
        for (token, balance) in [
            (&config.token_in, balances.token_in),
            (&config.token_out, balances.token_out),
        ] {
            println!(
                "  {:>8} {}",
                token.symbol,
                format_amount(balance, token.decimals)
            );
        }
        Ok::<_, anyhow::Error>(())
    }
    .await;

    shutdown(handle, task).await?;
    outcome
}

async fn serve(config: ChainConfig, port: u16) -> Result<()> {
    let (handle, _task) = spawn_controller(config);
    server::start_server(port, handle).await
}
