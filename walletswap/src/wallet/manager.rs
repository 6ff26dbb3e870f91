//! Wallet session lifecycle: connect, disconnect and event handling.

use std::sync::Arc;

use alloy_primitives::Address;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{RawChainId, WalletEvent};
use super::provider::{Connector, WalletProvider};
use crate::config::ChainConfig;
use crate::error::{ConnectError, PurchaseError};
use crate::models::{Connection, ReadySession, Session, SessionView, Status, StatusBus};

/// Owns the single active [`Session`] and is the only thing that mutates it.
pub struct SessionManager {
    config: Arc<ChainConfig>,
    connector: Arc<dyn Connector>,
    session: Session,
    events: Option<mpsc::Receiver<WalletEvent>>,
    status: StatusBus,
}

impl SessionManager {
    pub fn new(config: Arc<ChainConfig>, connector: Arc<dyn Connector>, status: StatusBus) -> Self {
        Self {
            config,
            connector,
            session: Session::new(),
            events: None,
            status,
        }
    }

    pub const fn session(&self) -> &Session {
        &self.session
    }

    pub fn view(&self) -> SessionView {
        self.session.view(self.config.chain_id)
    }

    /// Connected and on the configured network.
    pub fn is_ready_for_transaction(&self) -> bool {
        self.session.is_ready_for(self.config.chain_id)
    }

    /// Read-only view for the orchestrator, if the session passes the gate.
    pub fn ready_session(&self) -> Result<ReadySession, PurchaseError> {
        let connection = self.session.connection().ok_or(PurchaseError::NotConnected)?;
        if connection.chain_id != self.config.chain_id {
            return Err(PurchaseError::WrongNetwork {
                expected: self.config.chain_id,
                actual: connection.chain_id,
            });
        }
        Ok(ReadySession::from(connection))
    }

    /// Open a wallet connection, replacing any existing session.
    pub async fn connect(&mut self) -> Result<SessionView, ConnectError> {
        if self.session.connection().is_some() {
            self.disconnect().await;
        }

        self.session.begin_connecting();
        self.status.publish(Status::Connecting);
        info!(
            connector = self.connector.name(),
            service = %self.config.connection_service_id,
            "opening wallet connection"
        );

        let provider = match self.connector.connect().await {
            Ok(provider) => provider,
            Err(err) => return Err(self.abort_connect(err.into())),
        };

        let (account, chain_id) = match derive_identity(provider.as_ref()).await {
            Ok(identity) => identity,
            Err(err) => {
                teardown(provider.as_ref()).await;
                return Err(self.abort_connect(err));
            }
        };

        let capabilities = provider.capabilities();
        self.events = if capabilities.supports_event_subscription {
            provider.subscribe()
        } else {
            None
        };

        info!(account = %account, chain_id, ?capabilities, "wallet connected");
        self.session.establish(Connection {
            provider,
            capabilities,
            account,
            chain_id,
        });
        self.publish_connection_status();
        Ok(self.view())
    }

    fn abort_connect(&mut self, err: ConnectError) -> ConnectError {
        warn!(%err, "wallet connection failed");
        self.events = None;
        self.session.clear();
        self.status.publish(Status::failed(&err));
        self.status.publish(Status::Disconnected);
        err
    }

    /// Clear the session. Transport teardown is best-effort; the session always
    /// ends up disconnected.
    pub async fn disconnect(&mut self) {
        self.events = None;
        if let Some(connection) = self.session.clear() {
            if connection.capabilities.supports_explicit_teardown {
                teardown(connection.provider.as_ref()).await;
            }
            info!(account = %connection.account, "wallet disconnected");
        }
        self.status.publish(Status::Disconnected);
    }

    /// Next provider notification. Pending forever while nothing is subscribed,
    /// so it can sit in a `select!` next to other work.
    pub async fn next_event(&mut self) -> WalletEvent {
        let Some(events) = self.events.as_mut() else {
            return std::future::pending().await;
        };
        match events.recv().await {
            Some(event) => event,
            None => {
                self.events = None;
                WalletEvent::Disconnected {
                    code: None,
                    reason: Some("provider event stream closed".to_string()),
                }
            }
        }
    }

    pub async fn handle_event(&mut self, event: WalletEvent) {
        if self.session.connection().is_none() {
            debug!(event = event.name(), "ignoring wallet event without a session");
            return;
        }
        match event {
            WalletEvent::AccountsChanged(accounts) => self.on_account_changed(&accounts).await,
            WalletEvent::ChainChanged(raw) => self.on_chain_changed(&raw),
            WalletEvent::Disconnected { code, reason } => {
                info!(?code, ?reason, "wallet reported disconnect");
                self.on_disconnected().await;
            }
        }
    }

    /// The first account becomes active; an empty list means the wallet locked.
    pub async fn on_account_changed(&mut self, accounts: &[Address]) {
        match accounts.first() {
            Some(account) => {
                info!(account = %account, "active account changed");
                self.session.set_account(*account);
                self.publish_connection_status();
            }
            None => {
                info!("wallet exposes no accounts anymore");
                self.disconnect().await;
            }
        }
    }

    pub fn on_chain_changed(&mut self, raw: &RawChainId) {
        let chain_id = match raw.normalize() {
            Ok(chain_id) => chain_id,
            Err(err) => {
                warn!(%err, ?raw, "ignoring malformed chain change");
                return;
            }
        };
        info!(chain_id, ready = chain_id == self.config.chain_id, "network changed");
        self.session.set_chain_id(chain_id);
        self.publish_connection_status();
    }

    pub async fn on_disconnected(&mut self) {
        self.disconnect().await;
    }

    fn publish_connection_status(&self) {
        let Some(connection) = self.session.connection() else {
            return;
        };
        let account = connection.account.to_string().to_lowercase();
        let status = if self.is_ready_for_transaction() {
            Status::ConnectedReady {
                account,
                chain_id: connection.chain_id,
            }
        } else {
            Status::ConnectedWrongNetwork {
                account,
                chain_id: connection.chain_id,
                expected_chain_id: self.config.chain_id,
                expected_chain_name: self.config.chain_name.clone(),
            }
        };
        self.status.publish(status);
    }
}

async fn derive_identity(provider: &dyn WalletProvider) -> Result<(Address, u64), ConnectError> {
    let accounts = provider.accounts().await?;
    let account = *accounts.first().ok_or(ConnectError::ConnectionRejected)?;
    let chain_id = provider.chain_id().await?;
    Ok((account, chain_id))
}

async fn teardown(provider: &dyn WalletProvider) {
    if let Err(err) = provider.disconnect().await {
        warn!(%err, "wallet teardown failed");
    }
}
