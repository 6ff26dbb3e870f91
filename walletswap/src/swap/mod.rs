//! Approve-then-swap purchase workflow.

mod orchestrator;

pub use orchestrator::{Balances, PurchaseOrchestrator};
