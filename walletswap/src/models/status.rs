//! User-visible status states and their broadcast channel.

use alloy_primitives::TxHash;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

const STATUS_CHANNEL_CAPACITY: usize = 256;

/// The fixed set of states the presentation layer renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Status {
    /// No session.
    Disconnected,
    /// Waiting for the user to pick and approve a wallet.
    Connecting,
    /// Connected, but purchases are blocked until the wallet switches networks.
    ConnectedWrongNetwork {
        account: String,
        chain_id: u64,
        expected_chain_id: u64,
        expected_chain_name: String,
    },
    /// Connected to the target network; purchases are allowed.
    ConnectedReady {
        account: String,
        chain_id: u64,
    },
    /// The approval is submitted or waiting for inclusion.
    Approving {
        amount: String,
        symbol: String,
    },
    /// The approval is mined and the swap is in progress.
    Swapping {
        approval_tx: TxHash,
    },
    /// The swap is mined and succeeded.
    Confirmed {
        swap_tx: TxHash,
    },
    /// An action stopped; rendered as `Failed: {reason}`.
    Failed {
        reason: String,
    },
}

impl Status {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::ConnectedWrongNetwork { .. } => "connected_wrong_network",
            Self::ConnectedReady { .. } => "connected_ready",
            Self::Approving { .. } => "approving",
            Self::Swapping { .. } => "swapping",
            Self::Confirmed { .. } => "confirmed",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn failed(reason: impl std::fmt::Display) -> Self {
        Self::Failed {
            reason: reason.to_string(),
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Opening wallet connection..."),
            Self::ConnectedWrongNetwork {
                chain_id,
                expected_chain_id,
                expected_chain_name,
                ..
            } => write!(
                f,
                "Connected on chain {chain_id}. Please switch your wallet to {expected_chain_name} ({expected_chain_id})."
            ),
            Self::ConnectedReady { account, chain_id } => {
                write!(f, "Ready. {account} connected on chain {chain_id}.")
            }
            Self::Approving { amount, symbol } => {
                write!(f, "Requesting approval to spend {amount} {symbol}...")
            }
            Self::Swapping { .. } => write!(f, "Executing swap..."),
            Self::Confirmed { swap_tx } => {
                write!(f, "Swap confirmed ({swap_tx}). Check your wallet.")
            }
            Self::Failed { reason } => write!(f, "Failed: {reason}"),
        }
    }
}

/// A status change as delivered to subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct StatusEvent {
    pub at: DateTime<Utc>,
    /// Set for steps of a purchase.
    pub purchase_id: Option<Uuid>,
    pub message: String,
    #[serde(flatten)]
    pub status: Status,
}

/// Fan-out of status changes to any number of presentation adapters.
#[derive(Debug, Clone)]
pub struct StatusBus {
    tx: broadcast::Sender<StatusEvent>,
}

impl Default for StatusBus {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(STATUS_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, status: Status) {
        self.send(None, status);
    }

    pub fn publish_for(&self, purchase_id: Uuid, status: Status) {
        self.send(Some(purchase_id), status);
    }

    fn send(&self, purchase_id: Option<Uuid>, status: Status) {
        tracing::debug!(state = status.label(), ?purchase_id, "status changed");
        // No subscribers is fine.
        let _ = self.tx.send(StatusEvent {
            at: Utc::now(),
            purchase_id,
            message: status.to_string(),
            status,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrong_network_message_names_target() {
        let status = Status::ConnectedWrongNetwork {
            account: "0xabc".into(),
            chain_id: 1,
            expected_chain_id: 137,
            expected_chain_name: "Polygon".into(),
        };
        assert_eq!(
            status.to_string(),
            "Connected on chain 1. Please switch your wallet to Polygon (137)."
        );
    }

    #[test]
    fn serializes_flat_with_state_tag() {
        let bus = StatusBus::new();
        let mut rx = bus.subscribe();
        bus.publish(Status::ConnectedReady {
            account: "0xabc".into(),
            chain_id: 137,
        });

        let event = rx.try_recv().unwrap();
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["state"], "connected_ready");
        assert_eq!(json["chain_id"], 137);
        assert_eq!(json["message"], "Ready. 0xabc connected on chain 137.");
        assert!(json["purchase_id"].is_null());
    }

    #[test]
    fn publishing_without_subscribers_is_harmless() {
        StatusBus::new().publish(Status::Disconnected);
    }
}
