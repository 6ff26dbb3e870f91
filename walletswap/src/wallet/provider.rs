//! Capability-described provider abstraction.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, Bytes, TxHash, U64};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

use super::events::WalletEvent;
use crate::error::WalletError;

/// Consecutive failed receipt polls after which the wait gives up.
pub const MAX_RECEIPT_POLL_FAILURES: u32 = 5;

/// Optional provider features, read once when a connection is established.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    /// The provider can deliver [`WalletEvent`]s through [`WalletProvider::subscribe`].
    pub supports_event_subscription: bool,
    /// [`WalletProvider::disconnect`] actually tears down a transport.
    pub supports_explicit_teardown: bool,
}

/// A transaction for the wallet to sign and broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas: Option<U64>,
}

/// The parts of a transaction receipt the purchase flow looks at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub transaction_hash: TxHash,
    pub block_number: Option<U64>,
    /// `1` success, `0` reverted. Absent on pre-Byzantium chains.
    pub status: Option<U64>,
}

impl TxReceipt {
    pub const fn is_included(&self) -> bool {
        self.block_number.is_some()
    }

    pub fn succeeded(&self) -> bool {
        self.status != Some(U64::ZERO)
    }
}

/// An EIP-1193 style provider: accounts, network, signing and receipts.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    fn capabilities(&self) -> Capabilities;

    /// Accounts the wallet exposes, active account first.
    async fn accounts(&self) -> Result<Vec<Address>, WalletError>;

    async fn chain_id(&self) -> Result<u64, WalletError>;

    /// Have the wallet sign and broadcast `tx`.
    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<TxHash, WalletError>;

    /// `None` while the transaction is still pending.
    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<TxReceipt>, WalletError>;

    /// Read-only contract call against the latest block.
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, WalletError>;

    /// Start delivering notifications. Returns `None` without
    /// `supports_event_subscription`.
    fn subscribe(&self) -> Option<mpsc::Receiver<WalletEvent>>;

    /// Tear down the transport. A no-op without `supports_explicit_teardown`.
    async fn disconnect(&self) -> Result<(), WalletError>;
}

/// Stand-in for the wallet-selection UI.
#[async_trait]
pub trait Connector: Send + Sync {
    fn name(&self) -> &str;

    /// Wait for the user to choose and approve a wallet.
    async fn connect(&self) -> Result<Arc<dyn WalletProvider>, WalletError>;
}

/// Poll for a receipt until the transaction is included in a block.
///
/// Returns `Ok(None)` if `timeout` elapses first; without a timeout this waits
/// as long as the network takes. A failed poll is retried on the next tick;
/// the error is returned only after [`MAX_RECEIPT_POLL_FAILURES`] in a row.
pub async fn wait_for_inclusion(
    provider: &dyn WalletProvider,
    hash: TxHash,
    poll_interval: Duration,
    timeout: Option<Duration>,
) -> Result<Option<TxReceipt>, WalletError> {
    let poll = async {
        let mut failures = 0;
        loop {
            match provider.transaction_receipt(hash).await {
                Ok(Some(receipt)) if receipt.is_included() => {
                    return Ok::<_, WalletError>(receipt);
                }
                Ok(_) => failures = 0,
                Err(err) => {
                    failures += 1;
                    warn!(%hash, %err, failures, "receipt poll failed");
                    if failures >= MAX_RECEIPT_POLL_FAILURES {
                        return Err(err);
                    }
                }
            }
            tokio::time::sleep(poll_interval).await;
        }
    };

    match timeout {
        Some(limit) => match tokio::time::timeout(limit, poll).await {
            Ok(result) => result.map(Some),
            Err(_elapsed) => Ok(None),
        },
        None => poll.await.map(Some),
    }
}
