//! Write batching and dependency ordering
//!
//! Receives the individual writes produced while saving or deleting a graph
//! of related records and decides whether each runs immediately or waits in
//! a buffer. Buffered work reaches the store grouped into statement batches,
//! ordered so that writes at a lower cascade depth run first.
//!
//! # Components
//!
//! - [`StatementBatch`]: bound parameter sets per statement text
//! - [`WriteRequest`]: a record write or a raw statement
//! - [`EntityWriteGroup`]: pending record writes of one root type at one depth
//! - [`BatchCoordinator`]: owns the groups and the statement batch of one
//!   transaction, resolves depths and drives flushes
//!
//! # Invariants Enforced
//!
//! - A group's depth never changes once assigned
//! - Raw statements execute before record writes in the same flush
//! - Groups execute in ascending depth; writes in a group in arrival order
//! - After a failed flush nothing stays buffered

mod config;
mod coordinator;
mod depth;
mod errors;
mod group;
mod request;
mod statement;

pub use config::{BatchConfig, DEFAULT_BATCH_SIZE, DEFAULT_BUFFER_CAP_MULTIPLIER};
pub use coordinator::{BatchCoordinator, CoordinatorState};
pub use depth::{by_depth, resolve_depth, DepthDecision, BASE_DEPTH};
pub use errors::{BatchError, BatchResult, Severity, StoreError};
pub use group::{EntityWriteGroup, GroupExecution};
pub use request::{RawStatement, RecordWrite, RequestId, RootType, WriteKind, WriteOutcome, WriteRequest};
pub use statement::{normalize_sql, FlushOutcome, StatementBatch};
