//! Error taxonomy for wallet sessions and purchases.

use alloy_primitives::TxHash;
use thiserror::Error;

use crate::contracts::AmountError;

/// JSON-RPC error code a wallet returns when the user declines a request (EIP-1193).
pub const USER_REJECTED_CODE: i64 = 4001;

/// Failure talking to a wallet provider or chain node.
#[derive(Debug, Error)]
pub enum WalletError {
    /// Nothing answered at the configured wallet endpoint.
    #[error("no compatible wallet provider available: {0}")]
    Unavailable(String),

    /// The user declined the request in the wallet UI.
    #[error("request rejected in wallet")]
    UserRejected,

    /// The provider answered with a JSON-RPC error.
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// HTTP or decoding failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The provider answered with something that is not what the method returns.
    #[error("unexpected response to {method}: {detail}")]
    UnexpectedResponse { method: &'static str, detail: String },
}

impl WalletError {
    pub const fn is_user_rejection(&self) -> bool {
        matches!(self, Self::UserRejected)
    }
}

impl From<reqwest::Error> for WalletError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            Self::Unavailable(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Failure of the connect action.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The user has no compatible wallet.
    #[error("no compatible wallet found: {0}")]
    NoProviderAvailable(String),

    /// The user declined the connection, or the wallet exposed no account.
    #[error("wallet connection was rejected")]
    ConnectionRejected,

    /// Any other provider failure while establishing the session.
    #[error(transparent)]
    Transport(WalletError),
}

impl From<WalletError> for ConnectError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::Unavailable(reason) => Self::NoProviderAvailable(reason),
            WalletError::UserRejected => Self::ConnectionRejected,
            other => Self::Transport(other),
        }
    }
}

/// Failure of a purchase. Every variant halts the remaining steps.
#[derive(Debug, Error)]
pub enum PurchaseError {
    /// No session, or the session lacks an account or chain id.
    #[error("wallet is not connected")]
    NotConnected,

    /// Connected, but not to the configured network.
    #[error("wallet is on chain {actual}, expected chain {expected}")]
    WrongNetwork { expected: u64, actual: u64 },

    /// The entered amount does not convert to positive base units.
    #[error("invalid amount: {0}")]
    InvalidAmount(#[from] AmountError),

    /// The user declined to sign the `approve` transaction.
    #[error("token approval was rejected in the wallet")]
    ApprovalRejected,

    /// The approval was mined with a failed status.
    #[error("token approval reverted on-chain (tx {0})")]
    ApprovalReverted(TxHash),

    /// `approval_timeout_secs` elapsed before the approval was mined.
    /// The transaction may still land later.
    #[error("token approval was not included in time (tx {0})")]
    ApprovalTimedOut(TxHash),

    /// The user declined to sign the swap. The approval already stands.
    #[error("swap was rejected in the wallet")]
    SwapRejected,

    /// The swap was mined with a failed status, e.g. past its deadline.
    #[error("swap reverted on-chain (tx {0})")]
    SwapReverted(TxHash),

    /// `swap_timeout_secs` elapsed before the swap was mined.
    #[error("swap was not included in time (tx {0})")]
    SwapTimedOut(TxHash),

    /// The wallet or node failed for a reason other than the user.
    #[error(transparent)]
    Transport(#[from] WalletError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_error_maps_wallet_failures() {
        assert!(matches!(
            ConnectError::from(WalletError::UserRejected),
            ConnectError::ConnectionRejected
        ));
        assert!(matches!(
            ConnectError::from(WalletError::Unavailable("refused".into())),
            ConnectError::NoProviderAvailable(_)
        ));
        assert!(matches!(
            ConnectError::from(WalletError::Transport("eof".into())),
            ConnectError::Transport(_)
        ));
    }

    #[test]
    fn purchase_error_messages_are_readable() {
        let err = PurchaseError::WrongNetwork {
            expected: 137,
            actual: 1,
        };
        assert_eq!(err.to_string(), "wallet is on chain 1, expected chain 137");
    }
}
