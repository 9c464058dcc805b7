//! Statement Batch
//!
//! Accumulates bound parameter sets per distinct statement text and executes
//! each text as one batch call against the store.
//!
//! - Statement texts are normalized before grouping
//! - Groups execute in the order they were first created
//! - Parameter sets within a group keep their append order
//! - A store failure aborts the flush and reports how many statements of
//!   this flush completed before it

use std::collections::HashMap;

use serde_json::Value;

use crate::store::{BoundStatement, StoreBackend};

use super::errors::{BatchError, BatchResult};
use super::request::RequestId;

/// Collapse whitespace so formatting differences don't split a batch.
pub fn normalize_sql(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parameter sets pending for one statement text
#[derive(Debug)]
struct StatementGroup {
    sql: String,
    params: Vec<Vec<Value>>,
    origins: Vec<Option<RequestId>>,
    is_insert: bool,
}

/// Totals of one flush
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlushOutcome {
    /// Statements executed
    pub statements: usize,
    /// Rows reported by the store
    pub rows: u64,
    /// Generated keys mapped back to the requests that produced them
    pub generated_keys: Vec<(RequestId, Value)>,
}

impl FlushOutcome {
    pub fn absorb(&mut self, other: FlushOutcome) {
        self.statements += other.statements;
        self.rows += other.rows;
        self.generated_keys.extend(other.generated_keys);
    }
}

/// Batched statements keyed by normalized statement text.
#[derive(Debug, Default)]
pub struct StatementBatch {
    groups: Vec<StatementGroup>,
    index: HashMap<String, usize>,
}

impl StatementBatch {
    /// Create a new empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a bound statement and return the size of its group.
    pub fn append(&mut self, statement: BoundStatement, origin: Option<RequestId>) -> usize {
        let is_insert = statement.is_insert();
        let sql = normalize_sql(&statement.sql);
        let slot = match self.index.get(&sql) {
            Some(slot) => *slot,
            None => {
                let slot = self.groups.len();
                self.groups.push(StatementGroup {
                    sql: sql.clone(),
                    params: Vec::new(),
                    origins: Vec::new(),
                    is_insert,
                });
                self.index.insert(sql, slot);
                slot
            }
        };
        let group = &mut self.groups[slot];
        group.params.push(statement.params);
        group.origins.push(origin);
        group.params.len()
    }

    /// Size of the largest pending group
    pub fn max_group_size(&self) -> usize {
        self.groups.iter().map(|g| g.params.len()).max().unwrap_or(0)
    }

    /// Total parameter sets pending across all groups
    pub fn len(&self) -> usize {
        self.groups.iter().map(|g| g.params.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Statement texts with their pending counts, in creation order
    pub fn groups(&self) -> Vec<(String, usize)> {
        self.groups
            .iter()
            .map(|g| (g.sql.clone(), g.params.len()))
            .collect()
    }

    /// Execute every pending group, one batch call per statement text.
    ///
    /// The batch is empty afterwards whether or not the store failed.
    pub fn flush(
        &mut self,
        store: &dyn StoreBackend,
        fetch_generated_keys: bool,
    ) -> BatchResult<FlushOutcome> {
        let groups = std::mem::take(&mut self.groups);
        self.index.clear();

        let mut outcome = FlushOutcome::default();
        for group in groups {
            let fetch = fetch_generated_keys && group.is_insert;
            let result = store
                .execute_batch(&group.sql, &group.params, fetch)
                .map_err(|e| BatchError::execution(group.sql.as_str(), outcome.statements, e))?;

            outcome.statements += group.params.len();
            outcome.rows += result.row_counts.iter().sum::<u64>();
            for (origin, key) in group.origins.iter().zip(result.generated_keys) {
                if let Some(id) = origin {
                    outcome.generated_keys.push((*id, key));
                }
            }
        }
        Ok(outcome)
    }

    /// Discard all pending groups without executing them.
    pub fn clear(&mut self) {
        self.groups.clear();
        self.index.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use serde_json::json;

    fn stmt(sql: &str, v: i64) -> BoundStatement {
        BoundStatement::new(sql, vec![json!(v)])
    }

    #[test]
    fn test_new_batch_empty() {
        let batch = StatementBatch::new();
        assert!(batch.is_empty());
        assert_eq!(batch.max_group_size(), 0);
    }

    #[test]
    fn test_append_groups_by_normalized_text() {
        let mut batch = StatementBatch::new();
        assert_eq!(batch.append(stmt("update a set x = ?", 1), None), 1);
        assert_eq!(batch.append(stmt("update  a\n set x = ?", 2), None), 2);
        assert_eq!(batch.append(stmt("delete from a where id = ?", 3), None), 1);

        assert_eq!(batch.max_group_size(), 2);
        assert_eq!(batch.len(), 3);
        assert_eq!(
            batch.groups(),
            vec![
                ("update a set x = ?".to_string(), 2),
                ("delete from a where id = ?".to_string(), 1)
            ]
        );
    }

    #[test]
    fn test_flush_in_creation_order() {
        let store = InMemoryStore::new();
        let mut batch = StatementBatch::new();
        batch.append(stmt("delete from b where id = ?", 1), None);
        batch.append(stmt("update a set x = ?", 2), None);
        batch.append(stmt("delete from b where id = ?", 3), None);

        let outcome = batch.flush(&store, false).unwrap();

        assert_eq!(outcome.statements, 3);
        assert_eq!(outcome.rows, 3);
        assert_eq!(store.batch_sizes(), vec![2, 1]);
        assert_eq!(
            store.executed_sql(),
            vec![
                "delete from b where id = ?",
                "delete from b where id = ?",
                "update a set x = ?"
            ]
        );
        assert!(batch.is_empty());
    }

    #[test]
    fn test_flush_maps_generated_keys() {
        let store = InMemoryStore::new();
        let mut batch = StatementBatch::new();
        batch.append(stmt("insert into a (x) values (?)", 1), Some(RequestId(10)));
        batch.append(stmt("insert into a (x) values (?)", 2), Some(RequestId(11)));

        let outcome = batch.flush(&store, true).unwrap();

        assert_eq!(
            outcome.generated_keys,
            vec![(RequestId(10), json!(1)), (RequestId(11), json!(2))]
        );
    }

    #[test]
    fn test_flush_failure_counts_earlier_groups() {
        let store = InMemoryStore::new();
        let mut batch = StatementBatch::new();
        batch.append(stmt("update a set x = ?", 1), None);
        batch.append(stmt("update a set x = ?", 2), None);
        batch.append(stmt("delete from b where id = ?", 3), None);
        batch.append(stmt("delete from b where id = ?", 4), None);
        store.fail_at(4);

        let err = batch.flush(&store, false).unwrap_err();

        assert_eq!(err.succeeded(), Some(3));
        assert!(batch.is_empty());
    }

    #[test]
    fn test_clear_discards() {
        let store = InMemoryStore::new();
        let mut batch = StatementBatch::new();
        batch.append(stmt("update a set x = ?", 1), None);

        batch.clear();
        let outcome = batch.flush(&store, false).unwrap();

        assert_eq!(outcome.statements, 0);
        assert!(store.executed().is_empty());
    }

    #[test]
    fn test_normalize_sql() {
        assert_eq!(normalize_sql("  select\t*\n from  a "), "select * from a");
    }
}
