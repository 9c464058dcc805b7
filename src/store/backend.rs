//! Store execution substrate

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::batch::StoreError;

/// A statement with its parameters bound, ready to execute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl BoundStatement {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Whether the store may hand back a generated key for this statement.
    pub fn is_insert(&self) -> bool {
        is_insert_sql(&self.sql)
    }
}

pub(crate) fn is_insert_sql(sql: &str) -> bool {
    sql.trim_start()
        .get(..6)
        .map(|head| head.eq_ignore_ascii_case("insert"))
        .unwrap_or(false)
}

/// Result of executing one statement
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExecuteResult {
    pub rows: u64,
    pub generated_key: Option<Value>,
}

/// Result of executing one batched statement
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchExecuteResult {
    /// Row count per parameter set, in submission order
    pub row_counts: Vec<u64>,
    /// Generated keys per parameter set; empty unless keys were requested
    pub generated_keys: Vec<Value>,
}

/// Trait for the store a batch executes against.
///
/// Implementations are driven serially by the single thread owning the
/// transaction; `&self` receivers let the same store be shared with the code
/// inspecting it.
pub trait StoreBackend: Send + Sync {
    /// Execute a single statement
    fn execute(
        &self,
        statement: &BoundStatement,
        fetch_generated_keys: bool,
    ) -> Result<ExecuteResult, StoreError>;

    /// Execute one statement text once per parameter set, as a single batch.
    ///
    /// On failure the returned error carries how many parameter sets of this
    /// batch completed.
    fn execute_batch(
        &self,
        sql: &str,
        param_sets: &[Vec<Value>],
        fetch_generated_keys: bool,
    ) -> Result<BatchExecuteResult, StoreError>;
}
