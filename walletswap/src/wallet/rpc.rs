//! JSON-RPC over HTTP provider.
//!
//! Accounts, chain id and signing go to the wallet endpoint (a desktop wallet
//! such as Frame, or a development node with unlocked accounts). Reads and
//! receipts go to the chain node. HTTP has no push channel, so notifications are
//! produced by a watcher task that polls the wallet while connected.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy_primitives::{Address, Bytes, TxHash};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{RawChainId, WalletEvent};
use super::provider::{Capabilities, Connector, TransactionRequest, TxReceipt, WalletProvider};
use crate::config::ChainConfig;
use crate::error::{WalletError, USER_REJECTED_CODE};

/// Consecutive failed polls after which the watcher reports a disconnect.
const MAX_POLL_FAILURES: u32 = 3;

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    error: Option<RpcErrorObject>,
}

/// Minimal JSON-RPC 2.0 client.
#[derive(Debug, Clone)]
struct RpcClient {
    http: reqwest::Client,
    url: String,
    next_id: Arc<AtomicU64>,
}

impl RpcClient {
    fn new(http: reqwest::Client, url: &str) -> Self {
        Self {
            http,
            url: url.to_string(),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    async fn request<R: DeserializeOwned>(
        &self,
        method: &'static str,
        params: Value,
    ) -> Result<R, WalletError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        debug!(method, id, url = %self.url, "rpc request");
        let resp = self.http.post(&self.url).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(WalletError::Transport(format!(
                "{method}: {} returned {}",
                self.url,
                resp.status()
            )));
        }

        let response: RpcResponse = resp.json().await?;
        if let Some(error) = response.error {
            if error.code == USER_REJECTED_CODE {
                return Err(WalletError::UserRejected);
            }
            return Err(WalletError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        serde_json::from_value(response.result).map_err(|err| WalletError::UnexpectedResponse {
            method,
            detail: err.to_string(),
        })
    }
}

/// Provider backed by a wallet endpoint and a chain node.
#[derive(Debug)]
pub struct JsonRpcProvider {
    wallet: RpcClient,
    node: RpcClient,
    event_poll_interval: Duration,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl JsonRpcProvider {
    pub fn new(wallet_url: &str, rpc_url: &str, event_poll_interval: Duration) -> Self {
        let http = reqwest::Client::new();
        Self {
            wallet: RpcClient::new(http.clone(), wallet_url),
            node: RpcClient::new(http, rpc_url),
            event_poll_interval,
            watcher: Mutex::new(None),
        }
    }

    /// Ask the wallet to expose its accounts, prompting the user if needed.
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
        self.wallet.request("eth_requestAccounts", json!([])).await
    }

    fn stop_watcher(&self) {
        let handle = match self.watcher.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

impl Drop for JsonRpcProvider {
    fn drop(&mut self) {
        self.stop_watcher();
    }
}

#[async_trait]
impl WalletProvider for JsonRpcProvider {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_event_subscription: true,
            supports_explicit_teardown: true,
        }
    }

    async fn accounts(&self) -> Result<Vec<Address>, WalletError> {
        self.wallet.request("eth_accounts", json!([])).await
    }

    async fn chain_id(&self) -> Result<u64, WalletError> {
        let raw: RawChainId = self.wallet.request("eth_chainId", json!([])).await?;
        raw.normalize().map_err(|err| WalletError::UnexpectedResponse {
            method: "eth_chainId",
            detail: err.to_string(),
        })
    }

    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<TxHash, WalletError> {
        self.wallet.request("eth_sendTransaction", json!([tx])).await
    }

    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<TxReceipt>, WalletError> {
        self.node
            .request("eth_getTransactionReceipt", json!([hash]))
            .await
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, WalletError> {
        self.node
            .request("eth_call", json!([{ "to": to, "data": data }, "latest"]))
            .await
    }

    fn subscribe(&self) -> Option<mpsc::Receiver<WalletEvent>> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let handle = tokio::spawn(watch_wallet(
            self.wallet.clone(),
            self.event_poll_interval,
            tx,
        ));

        let previous = match self.watcher.lock() {
            Ok(mut guard) => guard.replace(handle),
            Err(poisoned) => poisoned.into_inner().replace(handle),
        };
        if let Some(previous) = previous {
            previous.abort();
        }
        Some(rx)
    }

    async fn disconnect(&self) -> Result<(), WalletError> {
        self.stop_watcher();
        Ok(())
    }
}

/// Poll the wallet and turn changes into notifications.
async fn watch_wallet(wallet: RpcClient, interval: Duration, events: mpsc::Sender<WalletEvent>) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let mut last_chain: Option<RawChainId> = None;
    let mut last_accounts: Option<Vec<Address>> = None;
    let mut failures = 0u32;

    loop {
        ticker.tick().await;

        let polled = tokio::try_join!(
            wallet.request::<RawChainId>("eth_chainId", json!([])),
            wallet.request::<Vec<Address>>("eth_accounts", json!([])),
        );

        let mut pending = Vec::new();
        match polled {
            Ok((chain, accounts)) => {
                failures = 0;
                if last_chain.as_ref().is_some_and(|last| last != &chain) {
                    pending.push(WalletEvent::ChainChanged(chain.clone()));
                }
                if last_accounts.as_ref().is_some_and(|last| last != &accounts) {
                    pending.push(WalletEvent::AccountsChanged(accounts.clone()));
                }
                last_chain = Some(chain);
                last_accounts = Some(accounts);
            }
            Err(err) => {
                failures += 1;
                warn!(%err, failures, "wallet poll failed");
                if failures >= MAX_POLL_FAILURES {
                    pending.push(WalletEvent::Disconnected {
                        code: None,
                        reason: Some(err.to_string()),
                    });
                }
            }
        }

        for event in pending {
            let is_disconnect = matches!(event, WalletEvent::Disconnected { .. });
            if events.send(event).await.is_err() || is_disconnect {
                return;
            }
        }
    }
}

/// Connects to the configured wallet endpoint.
#[derive(Debug, Clone)]
pub struct JsonRpcConnector {
    wallet_url: String,
    rpc_url: String,
    event_poll_interval: Duration,
}

impl JsonRpcConnector {
    pub fn new(config: &ChainConfig) -> Self {
        Self {
            wallet_url: config.wallet_url.clone(),
            rpc_url: config.rpc_url.clone(),
            event_poll_interval: config.event_poll_interval(),
        }
    }
}

#[async_trait]
impl Connector for JsonRpcConnector {
    fn name(&self) -> &str {
        &self.wallet_url
    }

    async fn connect(&self) -> Result<Arc<dyn WalletProvider>, WalletError> {
        let provider = JsonRpcProvider::new(&self.wallet_url, &self.rpc_url, self.event_poll_interval);
        let accounts = provider.request_accounts().await?;
        info!(wallet = %self.wallet_url, accounts = accounts.len(), "wallet approved connection");
        Ok(Arc::new(provider))
    }
}
