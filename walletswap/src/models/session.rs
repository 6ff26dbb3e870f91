//! Session model representing the current wallet connection.

use std::sync::Arc;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::wallet::{Capabilities, WalletProvider};

/// Connection status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// No wallet attached.
    Disconnected,
    /// Waiting for the user to pick and approve a wallet.
    Connecting,
    /// A wallet is attached and an account is known.
    Connected,
}

impl SessionStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An established wallet connection. Owns the provider while connected.
#[derive(Clone)]
pub struct Connection {
    pub provider: Arc<dyn WalletProvider>,
    /// Determined once when the connection was established.
    pub capabilities: Capabilities,
    pub account: Address,
    pub chain_id: u64,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("capabilities", &self.capabilities)
            .field("account", &self.account)
            .field("chain_id", &self.chain_id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
enum State {
    #[default]
    Disconnected,
    Connecting,
    Connected(Connection),
}

/// The single active wallet session.
///
/// `account` and `chain_id` exist only inside the `Connected` state, so they are
/// defined exactly when the status is `Connected`.
#[derive(Debug, Default)]
pub struct Session {
    state: State,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn status(&self) -> SessionStatus {
        match self.state {
            State::Disconnected => SessionStatus::Disconnected,
            State::Connecting => SessionStatus::Connecting,
            State::Connected(_) => SessionStatus::Connected,
        }
    }

    pub const fn connection(&self) -> Option<&Connection> {
        match &self.state {
            State::Connected(connection) => Some(connection),
            _ => None,
        }
    }

    pub fn account(&self) -> Option<Address> {
        self.connection().map(|c| c.account)
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.connection().map(|c| c.chain_id)
    }

    /// True iff connected and on `target_chain_id`. Evaluated on every call.
    pub fn is_ready_for(&self, target_chain_id: u64) -> bool {
        self.chain_id() == Some(target_chain_id)
    }

    pub(crate) fn begin_connecting(&mut self) {
        self.state = State::Connecting;
    }

    pub(crate) fn establish(&mut self, connection: Connection) {
        self.state = State::Connected(connection);
    }

    pub(crate) fn set_account(&mut self, account: Address) {
        if let State::Connected(connection) = &mut self.state {
            connection.account = account;
        }
    }

    pub(crate) fn set_chain_id(&mut self, chain_id: u64) {
        if let State::Connected(connection) = &mut self.state {
            connection.chain_id = chain_id;
        }
    }

    /// Clear everything, handing back the connection if there was one.
    pub(crate) fn clear(&mut self) -> Option<Connection> {
        match std::mem::take(&mut self.state) {
            State::Connected(connection) => Some(connection),
            State::Disconnected | State::Connecting => None,
        }
    }

    pub fn view(&self, target_chain_id: u64) -> SessionView {
        SessionView {
            status: self.status(),
            account: self.account().map(|a| a.to_string().to_lowercase()),
            chain_id: self.chain_id(),
            ready: self.is_ready_for(target_chain_id),
            purchases_in_flight: 0,
        }
    }
}

/// Serializable snapshot of a session for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    pub status: SessionStatus,
    /// Lowercase hex address.
    pub account: Option<String>,
    pub chain_id: Option<u64>,
    pub ready: bool,
    pub purchases_in_flight: usize,
}

/// Read-only view of a session that passed the readiness gate.
#[derive(Clone)]
pub struct ReadySession {
    pub provider: Arc<dyn WalletProvider>,
    pub account: Address,
    pub chain_id: u64,
}

impl From<&Connection> for ReadySession {
    fn from(connection: &Connection) -> Self {
        Self {
            provider: Arc::clone(&connection.provider),
            account: connection.account,
            chain_id: connection.chain_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::testing::MockWallet;

    fn connection(chain_id: u64) -> Connection {
        let wallet = MockWallet::new(chain_id);
        Connection {
            capabilities: wallet.capabilities(),
            account: wallet.account(),
            provider: wallet,
            chain_id,
        }
    }

    #[test]
    fn fields_defined_only_when_connected() {
        let mut session = Session::new();
        assert_eq!(session.status(), SessionStatus::Disconnected);
        assert!(session.account().is_none() && session.chain_id().is_none());

        session.begin_connecting();
        assert_eq!(session.status(), SessionStatus::Connecting);
        assert!(session.account().is_none() && session.chain_id().is_none());

        session.establish(connection(137));
        assert_eq!(session.status(), SessionStatus::Connected);
        assert!(session.account().is_some() && session.chain_id() == Some(137));

        assert!(session.clear().is_some());
        assert_eq!(session.status(), SessionStatus::Disconnected);
        assert!(session.account().is_none() && session.chain_id().is_none());
    }

    #[test]
    fn readiness_over_every_state() {
        let target = 137;
        for chain_id in [1, 137, 80_002] {
            let mut disconnected = Session::new();
            assert!(!disconnected.is_ready_for(target));

            disconnected.begin_connecting();
            assert!(!disconnected.is_ready_for(target));

            let mut connected = Session::new();
            connected.establish(connection(chain_id));
            assert_eq!(connected.is_ready_for(target), chain_id == target);
        }
    }

    #[test]
    fn mutations_ignored_when_not_connected() {
        let mut session = Session::new();
        session.set_chain_id(137);
        session.set_account(Address::repeat_byte(1));
        assert_eq!(session.status(), SessionStatus::Disconnected);
        assert!(session.chain_id().is_none());
    }

    #[test]
    fn view_reports_lowercase_account() {
        let mut session = Session::new();
        let conn = connection(137);
        let expected = conn.account.to_string().to_lowercase();
        session.establish(conn);

        let view = session.view(137);
        assert_eq!(view.account.as_deref(), Some(expected.as_str()));
        assert!(view.ready);
        assert_eq!(view.status, SessionStatus::Connected);
    }
}
