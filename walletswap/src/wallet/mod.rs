//! Wallet session management.
//!
//! A [`Connector`] stands in for the wallet-selection UI and hands back a
//! [`WalletProvider`]. The [`SessionManager`] owns the resulting session and
//! keeps it in sync with the events the provider emits.

mod events;
mod manager;
mod provider;
mod rpc;

#[cfg(test)]
pub mod testing;

pub use events::{RawChainId, WalletEvent};
pub use manager::SessionManager;
pub use provider::{
    wait_for_inclusion, Capabilities, Connector, TransactionRequest, TxReceipt, WalletProvider,
};
pub use rpc::JsonRpcConnector;
