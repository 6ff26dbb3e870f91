//! Session controller: the single queue that serializes user actions and
//! wallet notifications.
//!
//! One task owns the [`SessionManager`]. Commands from presentation adapters and
//! events from the provider are handled one at a time on that task, so a
//! network change can never interleave with a half-applied connect. Purchases
//! are spawned off the queue: they suspend while waiting for inclusion without
//! blocking event handling, and they are not cancelled by later events.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::ChainConfig;
use crate::error::{ConnectError, PurchaseError};
use crate::models::{PurchaseReceipt, SessionView, Status, StatusBus, StatusEvent};
use crate::swap::{Balances, PurchaseOrchestrator};
use crate::wallet::{Connector, SessionManager};

const COMMAND_CHANNEL_CAPACITY: usize = 32;

/// Failure of an action requested through a [`ControllerHandle`].
#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Purchase(#[from] PurchaseError),

    #[error("a purchase is already in progress")]
    PurchaseInFlight,

    #[error("session controller has stopped")]
    Stopped,
}

/// Counts one purchase as in flight for as long as it is alive.
///
/// The count drops when the guard does, including when the purchase task
/// panics or the command never reaches the controller.
#[derive(Debug)]
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }

    /// Claim the counter only if nothing else holds it.
    fn enter_exclusive(counter: &Arc<AtomicUsize>) -> Option<Self> {
        counter
            .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(Arc::clone(counter)))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

enum Command {
    Connect {
        reply: oneshot::Sender<Result<SessionView, ConnectError>>,
    },
    Disconnect {
        reply: oneshot::Sender<SessionView>,
    },
    Purchase {
        amount: String,
        slot: InFlight,
        reply: oneshot::Sender<Result<PurchaseReceipt, PurchaseError>>,
    },
    Balances {
        reply: oneshot::Sender<Result<Balances, PurchaseError>>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionView>,
    },
}

/// Cloneable front door to the controller task.
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    commands: mpsc::Sender<Command>,
    status: StatusBus,
    in_flight: Arc<AtomicUsize>,
}

impl ControllerHandle {
    /// Status changes from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.status.subscribe()
    }

    pub fn purchases_in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub async fn connect(&self) -> Result<SessionView, ActionError> {
        Ok(self.request(|reply| Command::Connect { reply }).await??)
    }

    pub async fn disconnect(&self) -> Result<SessionView, ActionError> {
        self.request(|reply| Command::Disconnect { reply }).await
    }

    /// Start a purchase. Each call is an independent approve + swap.
    pub async fn submit_purchase(&self, amount: &str) -> Result<PurchaseReceipt, ActionError> {
        self.purchase(amount, InFlight::enter(&self.in_flight)).await
    }

    /// Start a purchase unless another one is still in flight, in which case
    /// fail with [`ActionError::PurchaseInFlight`] without touching the wallet.
    /// Concurrent callers cannot both get through.
    pub async fn submit_exclusive_purchase(
        &self,
        amount: &str,
    ) -> Result<PurchaseReceipt, ActionError> {
        let slot = InFlight::enter_exclusive(&self.in_flight).ok_or(ActionError::PurchaseInFlight)?;
        self.purchase(amount, slot).await
    }

    async fn purchase(&self, amount: &str, slot: InFlight) -> Result<PurchaseReceipt, ActionError> {
        let amount = amount.to_string();
        Ok(self
            .request(|reply| Command::Purchase {
                amount,
                slot,
                reply,
            })
            .await??)
    }

    pub async fn balances(&self) -> Result<Balances, ActionError> {
        Ok(self.request(|reply| Command::Balances { reply }).await??)
    }

    pub async fn snapshot(&self) -> Result<SessionView, ActionError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, ActionError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| ActionError::Stopped)?;
        response.await.map_err(|_| ActionError::Stopped)
    }
}

/// The task that owns the session.
pub struct Controller {
    manager: SessionManager,
    orchestrator: Arc<PurchaseOrchestrator>,
    commands: mpsc::Receiver<Command>,
    status: StatusBus,
    in_flight: Arc<AtomicUsize>,
}

impl Controller {
    /// Build the controller and run it on its own task. The task ends, and the
    /// session is disconnected, once every handle is dropped.
    pub fn spawn(
        config: Arc<ChainConfig>,
        connector: Arc<dyn Connector>,
    ) -> (ControllerHandle, JoinHandle<()>) {
        let status = StatusBus::new();
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let in_flight = Arc::new(AtomicUsize::new(0));

        let controller = Self {
            manager: SessionManager::new(Arc::clone(&config), connector, status.clone()),
            orchestrator: Arc::new(PurchaseOrchestrator::new(config, status.clone())),
            commands: rx,
            status: status.clone(),
            in_flight: Arc::clone(&in_flight),
        };
        let handle = ControllerHandle {
            commands: tx,
            status,
            in_flight,
        };
        (handle, tokio::spawn(controller.run()))
    }

    async fn run(mut self) {
        self.status.publish(Status::Disconnected);
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                event = self.manager.next_event() => {
                    debug!(event = event.name(), "wallet event");
                    self.manager.handle_event(event).await;
                }
            }
        }
        info!("session controller stopping");
        self.manager.disconnect().await;
    }

    fn view(&self) -> SessionView {
        SessionView {
            purchases_in_flight: self.in_flight.load(Ordering::SeqCst),
            ..self.manager.view()
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect { reply } => {
                let result = self.manager.connect().await.map(|view| SessionView {
                    purchases_in_flight: self.in_flight.load(Ordering::SeqCst),
                    ..view
                });
                let _ = reply.send(result);
            }
            Command::Disconnect { reply } => {
                self.manager.disconnect().await;
                let _ = reply.send(self.view());
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.view());
            }
            Command::Purchase {
                amount,
                slot,
                reply,
            } => {
                let session = match self.manager.ready_session() {
                    Ok(session) => session,
                    Err(err) => {
                        self.status.publish(Status::failed(&err));
                        let _ = reply.send(Err(err));
                        return;
                    }
                };
                let orchestrator = Arc::clone(&self.orchestrator);
                tokio::spawn(async move {
                    let result = orchestrator.submit_purchase(&session, &amount).await;
                    drop(slot);
                    let _ = reply.send(result);
                });
            }
            Command::Balances { reply } => {
                let session = match self.manager.ready_session() {
                    Ok(session) => session,
                    Err(err) => {
                        self.status.publish(Status::failed(&err));
                        let _ = reply.send(Err(err));
                        return;
                    }
                };
                let orchestrator = Arc::clone(&self.orchestrator);
                let status = self.status.clone();
                tokio::spawn(async move {
                    let result = orchestrator.token_balances(&session).await;
                    if let Err(err) = &result {
                        status.publish(Status::failed(err));
                    }
                    let _ = reply.send(result);
                });
            }
        }
    }
}
