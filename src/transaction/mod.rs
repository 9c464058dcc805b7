//! Transactions driving the batching engine
//!
//! A [`Transaction`] owns at most one [`BatchCoordinator`](crate::batch::BatchCoordinator)
//! and exposes it to the coordinator through the narrow [`TransactionContext`]
//! trait: an identifier plus the flush summary hook.

mod context;
mod session;

pub use context::{SummaryEntry, SummaryLog, TransactionContext};
pub use session::{Transaction, TransactionState};
