//! Swap request model: one user-initiated purchase attempt.

use alloy_primitives::{TxHash, U256};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::ChainConfig;
use crate::contracts::{parse_amount, AmountError};

/// Lowest output amount the swap accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum MinimumOutput {
    /// `amountOutMin = 0`: the swap executes at whatever price the pool gives.
    #[default]
    Unprotected,
    /// A fixed floor expressed in output-token units (e.g. `"12.5"`).
    Fixed { amount: String },
}

impl MinimumOutput {
    /// Resolve to base units of the output token. A fixed floor of `"0"` is
    /// accepted and means the same as [`MinimumOutput::Unprotected`].
    pub fn resolve(&self, decimals: u8) -> Result<U256, AmountError> {
        match self {
            Self::Unprotected => Ok(U256::ZERO),
            Self::Fixed { amount } => match parse_amount(amount, decimals) {
                Err(AmountError::NotPositive) => Ok(U256::ZERO),
                other => other,
            },
        }
    }
}

/// A validated purchase request. Construction fails unless the amount is a
/// positive decimal representable in the input token's smallest unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapRequest {
    /// Amount as entered by the user.
    pub amount: String,
    /// `amount` scaled by `token_decimals`.
    pub amount_in: U256,
    pub token_decimals: u8,
    pub minimum_amount_out: U256,
    deadline_window_secs: u64,
}

impl SwapRequest {
    pub fn new(amount: &str, config: &ChainConfig) -> Result<Self, AmountError> {
        let amount_in = parse_amount(amount, config.token_in.decimals)?;
        let minimum_amount_out = config.minimum_output.resolve(config.token_out.decimals)?;
        Ok(Self {
            amount: amount.trim().to_string(),
            amount_in,
            token_decimals: config.token_in.decimals,
            minimum_amount_out,
            deadline_window_secs: config.swap_deadline_secs,
        })
    }

    /// Deadline for a swap submitted at `now_epoch_secs`.
    pub fn deadline_at(&self, now_epoch_secs: u64) -> U256 {
        U256::from(now_epoch_secs.saturating_add(self.deadline_window_secs))
    }
}

/// Outcome of a purchase whose approve and swap were both included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    pub purchase_id: Uuid,
    pub amount: String,
    pub amount_in: U256,
    pub approval_tx: TxHash,
    pub swap_tx: TxHash,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_request_in_base_units() {
        let request = SwapRequest::new("100", &ChainConfig::default()).unwrap();
        assert_eq!(request.amount_in, U256::from(100_000_000u64));
        assert_eq!(request.token_decimals, 6);
        assert_eq!(request.minimum_amount_out, U256::ZERO);
        assert_eq!(request.deadline_at(1_000), U256::from(1_120u64));
    }

    #[test]
    fn rejects_invalid_amounts() {
        let config = ChainConfig::default();
        assert!(SwapRequest::new("abc", &config).is_err());
        assert!(SwapRequest::new("0", &config).is_err());
        assert!(SwapRequest::new("1.1234567", &config).is_err());
    }

    #[test]
    fn fixed_minimum_output_uses_output_decimals() {
        let config = ChainConfig {
            minimum_output: MinimumOutput::Fixed {
                amount: "2.5".into(),
            },
            ..ChainConfig::default()
        };
        let request = SwapRequest::new("1", &config).unwrap();
        assert_eq!(
            request.minimum_amount_out,
            U256::from(2_500_000_000_000_000_000u128)
        );
    }

    #[test]
    fn explicit_zero_floor_resolves_to_zero() {
        let floor = MinimumOutput::Fixed { amount: "0".into() };
        assert_eq!(floor.resolve(18), Ok(U256::ZERO));
        assert_eq!(
            MinimumOutput::Fixed { amount: "0.0".into() }.resolve(18),
            Ok(U256::ZERO)
        );
        assert!(MinimumOutput::Fixed { amount: "-1".into() }.resolve(18).is_err());
    }

    #[test]
    fn minimum_output_policy_from_json() {
        let fixed: MinimumOutput =
            serde_json::from_str(r#"{"policy":"fixed","amount":"3"}"#).unwrap();
        assert_eq!(fixed, MinimumOutput::Fixed { amount: "3".into() });

        let open: MinimumOutput = serde_json::from_str(r#"{"policy":"unprotected"}"#).unwrap();
        assert_eq!(open, MinimumOutput::Unprotected);
    }
}
