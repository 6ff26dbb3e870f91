//! Data models for wallet sessions and purchases.

mod session;
mod status;
mod swap;

pub use session::{Connection, ReadySession, Session, SessionStatus, SessionView};
pub use status::{Status, StatusBus, StatusEvent};
pub use swap::{MinimumOutput, PurchaseReceipt, SwapRequest};
