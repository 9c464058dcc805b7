//! Entity Write Group
//!
//! Buffers the record writes of one root type at one resolved depth, in
//! arrival order. On execution the pending writes are bound through the
//! type's descriptor and pushed through the shared statement batch.

use std::fmt;

use crate::store::{DescriptorRegistry, StoreBackend};

use super::errors::BatchResult;
use super::request::{RecordWrite, RequestId, RootType, WriteRequest};
use super::statement::{normalize_sql, FlushOutcome, StatementBatch};

/// Everything a group needs to execute, borrowed from its coordinator.
pub struct GroupExecution<'a> {
    pub registry: &'a DescriptorRegistry,
    pub store: &'a dyn StoreBackend,
    pub statements: &'a mut StatementBatch,
    pub batch_size: usize,
    pub fetch_generated_keys: bool,
}

/// Pending record writes for one root type.
#[derive(Debug)]
pub struct EntityWriteGroup {
    root: RootType,
    depth: i32,
    /// Creation order among the coordinator's groups
    sequence: u64,
    pending: Vec<(RequestId, RecordWrite)>,
}

impl EntityWriteGroup {
    /// Create a group with its depth fixed for its whole life.
    pub fn new(root: RootType, depth: i32, sequence: u64) -> Self {
        Self {
            root,
            depth,
            sequence,
            pending: Vec::new(),
        }
    }

    pub fn root(&self) -> &RootType {
        &self.root
    }

    pub fn depth(&self) -> i32 {
        self.depth
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Enqueue a write and return the new buffer size.
    pub fn append(&mut self, id: RequestId, record: RecordWrite) -> usize {
        self.pending.push((id, record));
        self.pending.len()
    }

    /// Bind and execute every pending write in arrival order.
    ///
    /// Consecutive writes sharing a statement text go out as one batch call
    /// of at most `batch_size` entries. A change of statement text flushes
    /// the run before it, so writes never overtake each other. The queue is
    /// empty afterwards, even on failure.
    pub fn execute_now(&mut self, exec: GroupExecution<'_>) -> BatchResult<FlushOutcome> {
        let pending = std::mem::take(&mut self.pending);
        let batch_size = exec.batch_size.max(1);

        let mut outcome = FlushOutcome::default();
        let mut run_sql: Option<String> = None;
        let mut run_len = 0;
        for (id, record) in pending {
            let statement = WriteRequest::Record(record).bind(exec.registry)?;
            let sql = normalize_sql(&statement.sql);

            let text_changed = run_sql.as_deref().is_some_and(|prev| prev != sql);
            if run_len == batch_size || text_changed {
                let flushed = exec
                    .statements
                    .flush(exec.store, exec.fetch_generated_keys)
                    .map_err(|e| e.after(outcome.statements))?;
                outcome.absorb(flushed);
                run_len = 0;
            }

            exec.statements.append(statement, Some(id));
            run_sql = Some(sql);
            run_len += 1;
        }
        let flushed = exec
            .statements
            .flush(exec.store, exec.fetch_generated_keys)
            .map_err(|e| e.after(outcome.statements))?;
        outcome.absorb(flushed);
        Ok(outcome)
    }
}

impl fmt::Display for EntityWriteGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}[{}]", self.root, self.depth, self.pending.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryStore, TableDescriptor};
    use serde_json::json;

    fn registry() -> DescriptorRegistry {
        let mut registry = DescriptorRegistry::new();
        registry.register(TableDescriptor::new("item", "items"));
        registry
    }

    fn run(group: &mut EntityWriteGroup, store: &InMemoryStore, batch_size: usize) -> FlushOutcome {
        let registry = registry();
        let mut statements = StatementBatch::new();
        group
            .execute_now(GroupExecution {
                registry: &registry,
                store,
                statements: &mut statements,
                batch_size,
                fetch_generated_keys: true,
            })
            .unwrap()
    }

    #[test]
    fn test_append_returns_size() {
        let mut group = EntityWriteGroup::new(RootType::new("item"), 100, 0);
        assert!(group.is_empty());
        assert_eq!(group.append(RequestId(1), RecordWrite::insert("item")), 1);
        assert_eq!(group.append(RequestId(2), RecordWrite::insert("item")), 2);
        assert_eq!(group.depth(), 100);
    }

    #[test]
    fn test_execute_preserves_arrival_order() {
        let store = InMemoryStore::new();
        let mut group = EntityWriteGroup::new(RootType::new("item"), 100, 0);
        group.append(RequestId(1), RecordWrite::insert("item").with_id(1).with_value("n", 1));
        group.append(RequestId(2), RecordWrite::update("item", 1).with_value("n", 2));
        group.append(RequestId(3), RecordWrite::delete("item", 1));

        let outcome = run(&mut group, &store, 10);

        assert_eq!(outcome.statements, 3);
        assert_eq!(
            store.executed_sql(),
            vec![
                "insert into items (id, n) values (?, ?)",
                "update items set n = ? where id = ?",
                "delete from items where id = ?"
            ]
        );
        assert!(group.is_empty());
    }

    #[test]
    fn test_execute_chunks_by_batch_size() {
        let store = InMemoryStore::new();
        let mut group = EntityWriteGroup::new(RootType::new("item"), 100, 0);
        for i in 0..5 {
            group.append(RequestId(i), RecordWrite::insert("item").with_value("n", i));
        }

        let outcome = run(&mut group, &store, 2);

        assert_eq!(store.batch_sizes(), vec![2, 2, 1]);
        assert_eq!(outcome.generated_keys.len(), 5);
        assert_eq!(outcome.generated_keys[0].0, RequestId(0));
    }

    #[test]
    fn test_alternating_texts_keep_arrival_order() {
        let store = InMemoryStore::new();
        let mut group = EntityWriteGroup::new(RootType::new("item"), 100, 0);
        group.append(RequestId(1), RecordWrite::insert("item").with_id(7).with_value("n", "a"));
        group.append(RequestId(2), RecordWrite::delete("item", 7));
        group.append(RequestId(3), RecordWrite::insert("item").with_id(7).with_value("n", "b"));

        run(&mut group, &store, 10);

        let executed = store.executed();
        assert_eq!(executed[0].params, vec![json!(7), json!("a")]);
        assert_eq!(executed[1].sql, "delete from items where id = ?");
        assert_eq!(executed[2].params, vec![json!(7), json!("b")]);
        assert_eq!(store.batch_sizes(), vec![1, 1, 1]);
    }

    #[test]
    fn test_same_text_runs_share_a_batch() {
        let store = InMemoryStore::new();
        let mut group = EntityWriteGroup::new(RootType::new("item"), 100, 0);
        group.append(RequestId(1), RecordWrite::insert("item").with_value("n", 1));
        group.append(RequestId(2), RecordWrite::insert("item").with_value("n", 2));
        group.append(RequestId(3), RecordWrite::update("item", 1).with_value("n", 3));
        group.append(RequestId(4), RecordWrite::insert("item").with_value("n", 4));

        run(&mut group, &store, 10);

        assert_eq!(store.batch_sizes(), vec![2, 1, 1]);
        let params: Vec<_> = store.executed().into_iter().map(|s| s.params).collect();
        assert_eq!(
            params,
            vec![vec![json!(1)], vec![json!(2)], vec![json!(3), json!(1)], vec![json!(4)]]
        );
    }

    #[test]
    fn test_display() {
        let mut group = EntityWriteGroup::new(RootType::new("item"), 101, 0);
        group.append(RequestId(1), RecordWrite::insert("item"));
        assert_eq!(group.to_string(), "item@101[1]");
    }
}
