//! Chain configuration: the target network and the three contracts involved.
//!
//! Defaults reproduce the production deployment (USDT -> ENOC through QuickSwap on
//! Polygon). A JSON file may override any field once at start-up; nothing is
//! reloaded at runtime.

use std::path::{Path, PathBuf};
use std::time::Duration;

use alloy_primitives::{address, Address};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::MinimumOutput;

const CONFIG_DIR: &str = "walletswap";
const CONFIG_FILE: &str = "config.json";

/// Largest decimals value whose scale factor still fits in a `U256`.
const MAX_DECIMALS: u8 = 77;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// One ERC-20 token taking part in the swap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConfig {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
}

/// Static description of the target network and contracts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Network the session must be on before a purchase is allowed.
    pub chain_id: u64,
    /// Display name of the target network.
    pub chain_name: String,
    /// Chain node used for reads and receipts.
    pub rpc_url: String,
    /// Wallet endpoint that owns the accounts and signs transactions.
    pub wallet_url: String,
    /// Wallet-connection service identifier (WalletConnect project id).
    pub connection_service_id: String,
    pub router: Address,
    pub token_in: TokenConfig,
    pub token_out: TokenConfig,
    /// Seconds added to the submission time to form the swap deadline.
    pub swap_deadline_secs: u64,
    /// Explicit gas limit for the swap; `None` lets the wallet estimate.
    pub swap_gas_limit: Option<u64>,
    pub minimum_output: MinimumOutput,
    /// Give up waiting for the approval after this long; `None` waits forever.
    pub approval_timeout_secs: Option<u64>,
    /// Give up waiting for the swap after this long; `None` waits forever.
    pub swap_timeout_secs: Option<u64>,
    /// Milliseconds between `eth_getTransactionReceipt` polls while a
    /// submitted transaction is pending.
    pub receipt_poll_ms: u64,
    /// Milliseconds between account/chain polls on wallets that cannot push
    /// notifications.
    pub event_poll_ms: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: 137,
            chain_name: "Polygon".to_string(),
            rpc_url: "https://polygon-rpc.com".to_string(),
            wallet_url: "http://127.0.0.1:1248".to_string(),
            connection_service_id: "80465b85478aa291bb30b4b3346b4b66".to_string(),
            router: address!("0xa5E0829CaCEd8fFDD4De3c43696c57F7D7A678ff"),
            token_in: TokenConfig {
                address: address!("0x2791Bca1f2de4661ED88A30C99A7a9449Aa84174"),
                symbol: "USDT".to_string(),
                decimals: 6,
            },
            token_out: TokenConfig {
                address: address!("0xab8DF9213d13a3cDe984A83129e6acDaCBA78633"),
                symbol: "ENOC".to_string(),
                decimals: 18,
            },
            swap_deadline_secs: 120,
            swap_gas_limit: Some(800_000),
            minimum_output: MinimumOutput::Unprotected,
            approval_timeout_secs: None,
            swap_timeout_secs: None,
            receipt_poll_ms: 2_000,
            event_poll_ms: 4_000,
        }
    }
}

impl ChainConfig {
    /// Default location: `<config dir>/walletswap/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Load from an explicit path, or from the default path if that file exists,
    /// or fall back to the built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain_id == 0 {
            return Err(ConfigError::Invalid("chain_id must be non-zero".into()));
        }
        if self.token_in.address == self.token_out.address {
            return Err(ConfigError::Invalid(
                "token_in and token_out must be different tokens".into(),
            ));
        }
        for token in [&self.token_in, &self.token_out] {
            if token.decimals > MAX_DECIMALS {
                return Err(ConfigError::Invalid(format!(
                    "{} decimals must be at most {MAX_DECIMALS}",
                    token.symbol
                )));
            }
        }
        self.minimum_output
            .resolve(self.token_out.decimals)
            .map_err(|err| ConfigError::Invalid(format!("minimum_output: {err}")))?;
        if self.receipt_poll_ms == 0 || self.event_poll_ms == 0 {
            return Err(ConfigError::Invalid("poll intervals must be non-zero".into()));
        }
        Ok(())
    }

    /// Swap path: input token straight to output token.
    pub fn swap_path(&self) -> Vec<Address> {
        vec![self.token_in.address, self.token_out.address]
    }

    pub const fn approval_timeout(&self) -> Option<Duration> {
        match self.approval_timeout_secs {
            Some(secs) => Some(Duration::from_secs(secs)),
            None => None,
        }
    }

    pub const fn swap_timeout(&self) -> Option<Duration> {
        match self.swap_timeout_secs {
            Some(secs) => Some(Duration::from_secs(secs)),
            None => None,
        }
    }

    pub const fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_ms)
    }

    pub const fn event_poll_interval(&self) -> Duration {
        Duration::from_millis(self.event_poll_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_target_polygon_usdt_to_enoc() {
        let config = ChainConfig::default();
        assert_eq!(config.chain_id, 137);
        assert_eq!(config.token_in.decimals, 6);
        assert_eq!(config.swap_deadline_secs, 120);
        assert_eq!(config.swap_path(), vec![config.token_in.address, config.token_out.address]);
        assert!(config.approval_timeout().is_none());
        config.validate().unwrap();
    }

    #[test]
    fn partial_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"chain_id": 31337, "rpc_url": "http://127.0.0.1:8545", "approval_timeout_secs": 300}}"#
        )
        .unwrap();

        let config = ChainConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.chain_id, 31337);
        assert_eq!(config.rpc_url, "http://127.0.0.1:8545");
        assert_eq!(config.approval_timeout(), Some(Duration::from_secs(300)));
        assert_eq!(config.token_in, ChainConfig::default().token_in);
    }

    #[test]
    fn rejects_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(
            ChainConfig::load(Some(file.path())),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn rejects_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        assert!(matches!(
            ChainConfig::load(Some(&path)),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn validation_catches_bad_values() {
        let mut config = ChainConfig::default();
        config.chain_id = 0;
        assert!(config.validate().is_err());

        let mut config = ChainConfig::default();
        config.token_out.address = config.token_in.address;
        assert!(config.validate().is_err());

        let mut config = ChainConfig::default();
        config.token_in.decimals = 78;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_fixed_floor_is_valid() {
        let config = ChainConfig {
            minimum_output: MinimumOutput::Fixed { amount: "0".into() },
            ..ChainConfig::default()
        };
        config.validate().unwrap();

        let config = ChainConfig {
            minimum_output: MinimumOutput::Fixed { amount: "abc".into() },
            ..ChainConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
