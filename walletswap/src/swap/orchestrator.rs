//! Purchase orchestration.
//!
//! A purchase is two strictly ordered transactions: an allowance approval for
//! the router, then the swap itself. Each is awaited until included in a block
//! before moving on, and nothing is retried. Calling [`submit_purchase`] twice
//! submits two independent purchases; callers that must avoid double
//! submission have to hold their trigger while one is in flight.
//!
//! [`submit_purchase`]: PurchaseOrchestrator::submit_purchase

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{TxHash, U256, U64};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::ChainConfig;
use crate::contracts::{approve_calldata, balance_of_calldata, decode_balance, SwapCall};
use crate::error::{PurchaseError, WalletError};
use crate::models::{PurchaseReceipt, ReadySession, Status, StatusBus, SwapRequest};
use crate::wallet::{wait_for_inclusion, TransactionRequest, TxReceipt};

/// Token balances of the connected account, in base units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Balances {
    pub token_in: U256,
    pub token_out: U256,
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Approve,
    Swap,
}

impl Step {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Swap => "swap",
        }
    }

    fn rejected(self) -> PurchaseError {
        match self {
            Self::Approve => PurchaseError::ApprovalRejected,
            Self::Swap => PurchaseError::SwapRejected,
        }
    }

    fn reverted(self, hash: TxHash) -> PurchaseError {
        match self {
            Self::Approve => PurchaseError::ApprovalReverted(hash),
            Self::Swap => PurchaseError::SwapReverted(hash),
        }
    }

    fn timed_out(self, hash: TxHash) -> PurchaseError {
        match self {
            Self::Approve => PurchaseError::ApprovalTimedOut(hash),
            Self::Swap => PurchaseError::SwapTimedOut(hash),
        }
    }
}

/// Runs purchases against a ready session. Never mutates the session.
#[derive(Debug, Clone)]
pub struct PurchaseOrchestrator {
    config: Arc<ChainConfig>,
    status: StatusBus,
}

impl PurchaseOrchestrator {
    pub const fn new(config: Arc<ChainConfig>, status: StatusBus) -> Self {
        Self { config, status }
    }

    /// Approve `amount` of the input token for the router, then swap it.
    ///
    /// The swap is only sent once the approval is included and succeeded. Every
    /// failure is also published as a `Failed` status.
    pub async fn submit_purchase(
        &self,
        session: &ReadySession,
        amount: &str,
    ) -> Result<PurchaseReceipt, PurchaseError> {
        let purchase_id = Uuid::now_v7();
        match self.execute(purchase_id, session, amount).await {
            Ok(receipt) => {
                info!(%purchase_id, swap_tx = %receipt.swap_tx, "purchase confirmed");
                self.status.publish_for(
                    purchase_id,
                    Status::Confirmed {
                        swap_tx: receipt.swap_tx,
                    },
                );
                Ok(receipt)
            }
            Err(err) => {
                warn!(%purchase_id, %err, "purchase failed");
                self.status.publish_for(purchase_id, Status::failed(&err));
                Err(err)
            }
        }
    }

    async fn execute(
        &self,
        purchase_id: Uuid,
        session: &ReadySession,
        amount: &str,
    ) -> Result<PurchaseReceipt, PurchaseError> {
        if session.chain_id != self.config.chain_id {
            return Err(PurchaseError::WrongNetwork {
                expected: self.config.chain_id,
                actual: session.chain_id,
            });
        }

        let request = SwapRequest::new(amount, &self.config)?;
        info!(
            %purchase_id,
            account = %session.account,
            amount = %request.amount,
            amount_in = %request.amount_in,
            "starting purchase"
        );

        self.status.publish_for(
            purchase_id,
            Status::Approving {
                amount: request.amount.clone(),
                symbol: self.config.token_in.symbol.clone(),
            },
        );
        let approve = TransactionRequest {
            from: session.account,
            to: self.config.token_in.address,
            data: approve_calldata(self.config.router, request.amount_in),
            gas: None,
        };
        let approval_tx = self
            .send_and_wait(Step::Approve, session, &approve, self.config.approval_timeout())
            .await?;

        self.status
            .publish_for(purchase_id, Status::Swapping { approval_tx });
        if request.minimum_amount_out.is_zero() {
            warn!(%purchase_id, "swapping with amountOutMin = 0, no slippage protection");
        }
        let now = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
        let swap = SwapCall {
            amount_in: request.amount_in,
            amount_out_min: request.minimum_amount_out,
            path: self.config.swap_path(),
            to: session.account,
            deadline: request.deadline_at(now),
        };
        let swap_tx_request = TransactionRequest {
            from: session.account,
            to: self.config.router,
            data: swap.calldata(),
            gas: self.config.swap_gas_limit.map(U64::from),
        };
        let swap_tx = self
            .send_and_wait(Step::Swap, session, &swap_tx_request, self.config.swap_timeout())
            .await?;

        Ok(PurchaseReceipt {
            purchase_id,
            amount: request.amount,
            amount_in: request.amount_in,
            approval_tx,
            swap_tx,
        })
    }

    /// Submit one transaction and suspend until it is included.
    async fn send_and_wait(
        &self,
        step: Step,
        session: &ReadySession,
        tx: &TransactionRequest,
        timeout: Option<Duration>,
    ) -> Result<TxHash, PurchaseError> {
        let hash = session
            .provider
            .send_transaction(tx)
            .await
            .map_err(|err| {
                if err.is_user_rejection() {
                    step.rejected()
                } else {
                    PurchaseError::Transport(err)
                }
            })?;
        info!(step = step.as_str(), tx_hash = %hash, "transaction submitted");

        let receipt: TxReceipt = wait_for_inclusion(
            session.provider.as_ref(),
            hash,
            self.config.receipt_poll_interval(),
            timeout,
        )
        .await?
        .ok_or_else(|| step.timed_out(hash))?;

        if !receipt.succeeded() {
            return Err(step.reverted(hash));
        }
        info!(step = step.as_str(), tx_hash = %hash, block = ?receipt.block_number, "transaction included");
        Ok(hash)
    }

    /// `balanceOf` the connected account for both configured tokens.
    pub async fn token_balances(&self, session: &ReadySession) -> Result<Balances, PurchaseError> {
        let token_in = self.balance_of(session, self.config.token_in.address).await?;
        let token_out = self.balance_of(session, self.config.token_out.address).await?;
        Ok(Balances {
            token_in,
            token_out,
        })
    }

    async fn balance_of(
        &self,
        session: &ReadySession,
        token: alloy_primitives::Address,
    ) -> Result<U256, PurchaseError> {
        let data = session
            .provider
            .call(token, balance_of_calldata(session.account))
            .await?;
        decode_balance(&data).map_err(|err| {
            PurchaseError::Transport(WalletError::UnexpectedResponse {
                method: "eth_call",
                detail: format!("balanceOf: {err}"),
            })
        })
    }
}
