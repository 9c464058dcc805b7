//! Write Requests
//!
//! A write request is either a record mutation (insert/update/delete of one
//! domain record, tagged with its root type and relative cascade depth) or a
//! raw statement whose parameters are already bound.
//!
//! Both kinds know how to execute themselves immediately; the coordinator
//! decides whether they get that chance or are buffered instead.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::store::{BoundStatement, DescriptorRegistry, StoreBackend};

use super::errors::{BatchError, BatchResult};

/// Grouping key for buffered record writes.
///
/// Opaque: only compared and hashed, never resolved to a descriptor except
/// through a [`DescriptorRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RootType(String);

impl RootType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RootType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RootType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Identifier assigned to every request accepted by a coordinator.
///
/// Used to hand generated keys back to the caller after a deferred insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind of record mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteKind {
    Insert,
    Update,
    Delete,
}

impl WriteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteKind::Insert => "insert",
            WriteKind::Update => "update",
            WriteKind::Delete => "delete",
        }
    }
}

/// Insert, update or delete of one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordWrite {
    pub root: RootType,
    pub kind: WriteKind,
    /// Relative cascade depth, stamped by the caller's graph walk.
    #[serde(default)]
    pub depth: i32,
    /// Identity of the record; absent for inserts relying on a generated key.
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub values: Map<String, Value>,
}

impl RecordWrite {
    pub fn new(root: impl Into<RootType>, kind: WriteKind) -> Self {
        Self {
            root: root.into(),
            kind,
            depth: 0,
            id: None,
            values: Map::new(),
        }
    }

    pub fn insert(root: impl Into<RootType>) -> Self {
        Self::new(root, WriteKind::Insert)
    }

    pub fn update(root: impl Into<RootType>, id: impl Into<Value>) -> Self {
        Self::new(root, WriteKind::Update).with_id(id)
    }

    pub fn delete(root: impl Into<RootType>, id: impl Into<Value>) -> Self {
        Self::new(root, WriteKind::Delete).with_id(id)
    }

    pub fn with_id(mut self, id: impl Into<Value>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_depth(mut self, depth: i32) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_value(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(column.into(), value.into());
        self
    }
}

/// A statement with its parameters already bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawStatement {
    pub sql: String,
    #[serde(default)]
    pub params: Vec<Value>,
}

impl RawStatement {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    pub fn to_bound(&self) -> BoundStatement {
        BoundStatement::new(self.sql.clone(), self.params.clone())
    }
}

/// A unit of write work.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteRequest {
    Record(RecordWrite),
    Raw(RawStatement),
}

impl WriteRequest {
    /// Root type of a record write; raw statements have none.
    pub fn root(&self) -> Option<&RootType> {
        match self {
            Self::Record(record) => Some(&record.root),
            Self::Raw(_) => None,
        }
    }

    /// Name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::Record(record) => record.kind.as_str(),
            Self::Raw(_) => "statement",
        }
    }

    /// Produce the concrete statement for this request.
    ///
    /// Record writes delegate statement emission to their root type's descriptor.
    pub fn bind(&self, registry: &DescriptorRegistry) -> BatchResult<BoundStatement> {
        match self {
            Self::Record(record) => {
                let descriptor = registry
                    .get(&record.root)
                    .ok_or_else(|| BatchError::UnknownRootType(record.root.clone()))?;
                Ok(descriptor.bind(record))
            }
            Self::Raw(raw) => Ok(raw.to_bound()),
        }
    }

    /// Execute against the store right away, bypassing any buffering.
    pub fn execute_now(
        &self,
        registry: &DescriptorRegistry,
        store: &dyn StoreBackend,
        fetch_generated_keys: bool,
    ) -> BatchResult<WriteOutcome> {
        let statement = self.bind(registry)?;
        let fetch = fetch_generated_keys && statement.is_insert();
        let result = store
            .execute(&statement, fetch)
            .map_err(|e| BatchError::execution(statement.sql.as_str(), 0, e))?;
        Ok(WriteOutcome::Executed {
            rows: result.rows,
            generated_key: result.generated_key,
        })
    }
}

impl From<RecordWrite> for WriteRequest {
    fn from(record: RecordWrite) -> Self {
        Self::Record(record)
    }
}

impl From<RawStatement> for WriteRequest {
    fn from(raw: RawStatement) -> Self {
        Self::Raw(raw)
    }
}

/// What happened to a submitted request.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// Ran synchronously; the direct row count is known.
    Executed {
        rows: u64,
        generated_key: Option<Value>,
    },
    /// Buffered; no direct row count until the batch is flushed.
    Queued(RequestId),
}

impl WriteOutcome {
    pub fn rows(&self) -> Option<u64> {
        match self {
            Self::Executed { rows, .. } => Some(*rows),
            Self::Queued(_) => None,
        }
    }

    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Queued(_))
    }
}
