//! In-memory recording store
//!
//! Records every statement it is asked to execute, in execution order, and
//! hands out sequential generated keys for inserts. A failure can be armed
//! on the Nth statement to simulate the store rejecting part of a batch.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde_json::Value;

use crate::batch::StoreError;

use super::backend::{is_insert_sql, BatchExecuteResult, BoundStatement, ExecuteResult, StoreBackend};

/// One statement execution as observed by the store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutedStatement {
    pub sql: String,
    pub params: Vec<Value>,
    /// Sequence of the batch call this statement belonged to; `None` when
    /// executed on its own.
    pub batch: Option<usize>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    executed: Vec<ExecutedStatement>,
    /// Size of every batch call, in call order
    batch_sizes: Vec<usize>,
    next_key: i64,
    /// 1-based position (over all statements ever executed) that fails
    fail_at: Option<usize>,
}

impl MemoryInner {
    fn run_one(&mut self, sql: &str, params: &[Value], batch: Option<usize>) -> Result<(), String> {
        let position = self.executed.len() + 1;
        if self.fail_at == Some(position) {
            self.fail_at = None;
            return Err(format!("injected failure at statement {}", position));
        }
        self.executed.push(ExecutedStatement {
            sql: sql.to_string(),
            params: params.to_vec(),
            batch,
        });
        Ok(())
    }

    fn next_key(&mut self) -> Value {
        self.next_key += 1;
        Value::from(self.next_key)
    }
}

/// Recording store backend
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<MemoryInner>,
}

impl InMemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the `position`th executed statement (1-based, counted from the
    /// store's creation) fail once.
    pub fn fail_at(&self, position: usize) {
        self.lock().fail_at = Some(position);
    }

    /// Make the `n`th statement executed from now on fail once.
    pub fn fail_after(&self, n: usize) {
        let mut inner = self.lock();
        inner.fail_at = Some(inner.executed.len() + n);
    }

    /// All statements executed so far
    pub fn executed(&self) -> Vec<ExecutedStatement> {
        self.lock().executed.clone()
    }

    /// Statement texts executed so far, in order
    pub fn executed_sql(&self) -> Vec<String> {
        self.lock().executed.iter().map(|s| s.sql.clone()).collect()
    }

    /// Size of every batch call made so far
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.lock().batch_sizes.clone()
    }

}

impl StoreBackend for InMemoryStore {
    fn execute(
        &self,
        statement: &BoundStatement,
        fetch_generated_keys: bool,
    ) -> Result<ExecuteResult, StoreError> {
        let mut inner = self.lock();
        inner
            .run_one(&statement.sql, &statement.params, None)
            .map_err(|message| StoreError::new(0, message))?;

        let generated_key = if fetch_generated_keys && statement.is_insert() {
            Some(inner.next_key())
        } else {
            None
        };
        Ok(ExecuteResult {
            rows: 1,
            generated_key,
        })
    }

    fn execute_batch(
        &self,
        sql: &str,
        param_sets: &[Vec<Value>],
        fetch_generated_keys: bool,
    ) -> Result<BatchExecuteResult, StoreError> {
        let mut inner = self.lock();
        let batch = inner.batch_sizes.len();
        inner.batch_sizes.push(param_sets.len());

        let want_keys = fetch_generated_keys && is_insert_sql(sql);
        let mut result = BatchExecuteResult::default();
        for (done, params) in param_sets.iter().enumerate() {
            inner
                .run_one(sql, params, Some(batch))
                .map_err(|message| StoreError::new(done, message))?;
            result.row_counts.push(1);
            if want_keys {
                let key = inner.next_key();
                result.generated_keys.push(key);
            }
        }
        Ok(result)
    }
}
