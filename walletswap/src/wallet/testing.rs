//! Scripted in-memory wallet for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use alloy_primitives::{Address, Bytes, TxHash, U256, U64};
use async_trait::async_trait;
use tokio::sync::mpsc;

use super::events::WalletEvent;
use super::provider::{Capabilities, Connector, TransactionRequest, TxReceipt, WalletProvider};
use crate::contracts::decode_balance;
use crate::error::WalletError;

/// What happens to the next transaction sent through a [`MockWallet`].
#[derive(Debug, Clone, Copy)]
pub enum Outcome {
    /// Included on the first receipt poll.
    Included { success: bool },
    /// Pending for `polls` receipt polls, then included.
    IncludedAfter { polls: usize, success: bool },
    /// The user declines to sign.
    Rejected,
    /// Broadcast but never mined.
    NeverIncluded,
}

#[derive(Debug)]
struct Pending {
    remaining_polls: usize,
    receipt: Option<TxReceipt>,
}

#[derive(Debug)]
pub struct MockWallet {
    capabilities: Capabilities,
    accounts: Mutex<Vec<Address>>,
    chain_id: u64,
    outcomes: Mutex<VecDeque<Outcome>>,
    pending: Mutex<HashMap<TxHash, Pending>>,
    sent: Mutex<Vec<TransactionRequest>>,
    balances: Mutex<HashMap<Address, U256>>,
    events: Mutex<Option<mpsc::Sender<WalletEvent>>>,
    fail_teardown: bool,
    teardowns: AtomicUsize,
    requests: AtomicUsize,
    receipt_failures: AtomicUsize,
}

impl MockWallet {
    pub fn new(chain_id: u64) -> Arc<Self> {
        Self::build(chain_id, Capabilities {
            supports_event_subscription: true,
            supports_explicit_teardown: true,
        }, false)
    }

    pub fn with_capabilities(chain_id: u64, capabilities: Capabilities) -> Arc<Self> {
        Self::build(chain_id, capabilities, false)
    }

    /// A wallet whose teardown always errors.
    pub fn with_failing_teardown(chain_id: u64) -> Arc<Self> {
        Self::build(chain_id, Capabilities {
            supports_event_subscription: true,
            supports_explicit_teardown: true,
        }, true)
    }

    fn build(chain_id: u64, capabilities: Capabilities, fail_teardown: bool) -> Arc<Self> {
        Arc::new(Self {
            capabilities,
            accounts: Mutex::new(vec![Address::repeat_byte(0xaa)]),
            chain_id,
            outcomes: Mutex::new(VecDeque::new()),
            pending: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            balances: Mutex::new(HashMap::new()),
            events: Mutex::new(None),
            fail_teardown,
            teardowns: AtomicUsize::new(0),
            requests: AtomicUsize::new(0),
            receipt_failures: AtomicUsize::new(0),
        })
    }

    pub fn account(&self) -> Address {
        self.accounts.lock().unwrap()[0]
    }

    pub fn set_accounts(&self, accounts: Vec<Address>) {
        *self.accounts.lock().unwrap() = accounts;
    }

    pub fn push_outcome(&self, outcome: Outcome) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    /// Fail the next `count` receipt lookups as an overloaded node would.
    pub fn fail_receipt_polls(&self, count: usize) {
        self.receipt_failures.store(count, Ordering::SeqCst);
    }

    pub fn set_balance(&self, token: Address, balance: U256) {
        self.balances.lock().unwrap().insert(token, balance);
    }

    /// Transactions handed to the wallet, in order, including rejected ones.
    pub fn sent(&self) -> Vec<TransactionRequest> {
        self.sent.lock().unwrap().clone()
    }

    /// Every provider method call except capability queries.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn teardown_count(&self) -> usize {
        self.teardowns.load(Ordering::SeqCst)
    }

    pub fn is_subscribed(&self) -> bool {
        self.events.lock().unwrap().is_some()
    }

    /// Push a notification as the wallet would.
    pub async fn emit(&self, event: WalletEvent) {
        let sender = self.events.lock().unwrap().clone();
        if let Some(sender) = sender {
            sender.send(event).await.unwrap();
        }
    }

    /// Drop the notification channel, as a crashed transport would.
    pub fn close_events(&self) {
        self.events.lock().unwrap().take();
    }

    pub fn dummy_tx(&self) -> TransactionRequest {
        TransactionRequest {
            from: self.account(),
            to: Address::repeat_byte(0xbb),
            data: Bytes::new(),
            gas: None,
        }
    }

    fn touch(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl WalletProvider for MockWallet {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    async fn accounts(&self) -> Result<Vec<Address>, WalletError> {
        self.touch();
        Ok(self.accounts.lock().unwrap().clone())
    }

    async fn chain_id(&self) -> Result<u64, WalletError> {
        self.touch();
        Ok(self.chain_id)
    }

    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<TxHash, WalletError> {
        self.touch();
        let index = {
            let mut sent = self.sent.lock().unwrap();
            sent.push(tx.clone());
            sent.len()
        };
        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Outcome::Included { success: true });

        let hash = TxHash::with_last_byte(u8::try_from(index).unwrap());
        let receipt = |success: bool| TxReceipt {
            transaction_hash: hash,
            block_number: Some(U64::from(index)),
            status: Some(U64::from(u8::from(success))),
        };
        let pending = match outcome {
            Outcome::Rejected => return Err(WalletError::UserRejected),
            Outcome::Included { success } => Pending {
                remaining_polls: 0,
                receipt: Some(receipt(success)),
            },
            Outcome::IncludedAfter { polls, success } => Pending {
                remaining_polls: polls,
                receipt: Some(receipt(success)),
            },
            Outcome::NeverIncluded => Pending {
                remaining_polls: usize::MAX,
                receipt: None,
            },
        };
        self.pending.lock().unwrap().insert(hash, pending);
        Ok(hash)
    }

    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<TxReceipt>, WalletError> {
        self.touch();
        let failing = self
            .receipt_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(WalletError::Transport("502 Bad Gateway".to_string()));
        }
        let mut pending = self.pending.lock().unwrap();
        let Some(entry) = pending.get_mut(&hash) else {
            return Ok(None);
        };
        if entry.remaining_polls > 0 {
            entry.remaining_polls = entry.remaining_polls.saturating_sub(1);
            return Ok(None);
        }
        Ok(entry.receipt.clone())
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, WalletError> {
        self.touch();
        assert_eq!(&data[..4], &[0x70, 0xa0, 0x82, 0x31], "only balanceOf is mocked");
        let balance = self
            .balances
            .lock()
            .unwrap()
            .get(&to)
            .copied()
            .unwrap_or_default();
        let encoded = Bytes::from(balance.to_be_bytes::<32>().to_vec());
        debug_assert_eq!(decode_balance(&encoded).unwrap(), balance);
        Ok(encoded)
    }

    fn subscribe(&self) -> Option<mpsc::Receiver<WalletEvent>> {
        if !self.capabilities.supports_event_subscription {
            return None;
        }
        let (tx, rx) = mpsc::channel(16);
        *self.events.lock().unwrap() = Some(tx);
        Some(rx)
    }

    async fn disconnect(&self) -> Result<(), WalletError> {
        self.teardowns.fetch_add(1, Ordering::SeqCst);
        self.events.lock().unwrap().take();
        if self.fail_teardown {
            return Err(WalletError::Transport("socket already closed".into()));
        }
        Ok(())
    }
}

/// Connector that hands out one [`MockWallet`], or fails as scripted.
pub struct MockConnector {
    wallet: Arc<MockWallet>,
    failure: Mutex<Option<WalletError>>,
    connects: AtomicUsize,
}

impl MockConnector {
    pub fn new(wallet: Arc<MockWallet>) -> Arc<Self> {
        Arc::new(Self {
            wallet,
            failure: Mutex::new(None),
            connects: AtomicUsize::new(0),
        })
    }

    pub fn failing(wallet: Arc<MockWallet>, failure: WalletError) -> Arc<Self> {
        Arc::new(Self {
            wallet,
            failure: Mutex::new(Some(failure)),
            connects: AtomicUsize::new(0),
        })
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    fn name(&self) -> &str {
        "mock"
    }

    async fn connect(&self) -> Result<Arc<dyn WalletProvider>, WalletError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = self.failure.lock().unwrap().take() {
            return Err(failure);
        }
        Ok(Arc::clone(&self.wallet) as Arc<dyn WalletProvider>)
    }
}
