//! Store collaborators for the batching engine
//!
//! The engine owns no SQL generation and no connection handling. It talks
//! to the outside through three seams:
//!
//! - [`StoreBackend`]: executes bound statements, singly or as one batch per
//!   statement text, and reports partial success on failure
//! - [`EntityDescriptor`]: per root type, the imported relationships used for
//!   depth resolution and the statement emitted for a record write
//! - [`DescriptorRegistry`]: lookup from root type identity to descriptor, so
//!   buffered groups only ever hold the identity key
//!
//! [`InMemoryStore`] is a recording substrate with failure injection.

mod backend;
mod descriptor;
mod memory;

pub use backend::{BatchExecuteResult, BoundStatement, ExecuteResult, StoreBackend};
pub use descriptor::{DescriptorRegistry, EntityDescriptor, TableDescriptor};
pub use memory::{ExecutedStatement, InMemoryStore};
