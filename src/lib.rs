//! graphbatch - Depth-ordered write batching for object-graph persistence
//!
//! The engine beneath a persistence layer that saves and deletes graphs of
//! related records: it buffers writes per root type, orders them by cascade
//! depth and submits them to the store as statement batches, discarding
//! everything buffered when the store rejects a batch.

pub mod batch;
pub mod cli;
pub mod observability;
pub mod store;
pub mod transaction;
