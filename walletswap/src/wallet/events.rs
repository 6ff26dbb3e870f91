//! Typed provider notifications.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainIdError {
    #[error("chain id is empty")]
    Empty,
    #[error("'{0}' is not a chain id")]
    Invalid(String),
}

/// A chain id exactly as a provider reported it: a `0x` hex string, a decimal
/// string, or a JSON number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawChainId {
    Number(u64),
    Text(String),
}

impl RawChainId {
    /// Normalize to a single integer representation.
    pub fn normalize(&self) -> Result<u64, ChainIdError> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Text(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return Err(ChainIdError::Empty);
                }
                let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
                    Some(hex) => u64::from_str_radix(hex, 16),
                    None => text.parse::<u64>(),
                };
                parsed.map_err(|_| ChainIdError::Invalid(text.to_string()))
            }
        }
    }
}

impl From<u64> for RawChainId {
    fn from(n: u64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for RawChainId {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// Notifications a connected provider emits out of band.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    /// `accountsChanged`: the first entry is the active account.
    AccountsChanged(Vec<Address>),
    /// `chainChanged`, not yet normalized.
    ChainChanged(RawChainId),
    /// `disconnect`.
    Disconnected {
        code: Option<i64>,
        reason: Option<String>,
    },
}

impl WalletEvent {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AccountsChanged(_) => "accountsChanged",
            Self::ChainChanged(_) => "chainChanged",
            Self::Disconnected { .. } => "disconnect",
        }
    }
}
