//! Batch Coordinator
//!
//! Decides, per write, whether to execute immediately or buffer, and drives
//! flushes of the buffered work in dependency order.
//!
//! # Ordering
//!
//! - Within one flush, every raw statement executes before any record write
//! - Record-write groups execute in strictly ascending resolved depth
//! - Writes of one root type execute in submission order
//! - Flushes themselves run in call order
//!
//! # Failure
//!
//! A store failure during a flush wipes all buffered state (statement
//! batch, groups, depth counter) before the error is returned. Nothing is
//! retried and nothing is replayed: depth assumptions made before the
//! failure no longer hold.
//!
//! One coordinator belongs to one transaction and is driven by the thread
//! owning that transaction. It does no locking of its own.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::observability::{log_event, BatchMetrics, Event};
use crate::store::{DescriptorRegistry, StoreBackend};
use crate::transaction::TransactionContext;

use super::config::BatchConfig;
use super::depth::{by_depth, resolve_depth, DepthDecision, BASE_DEPTH};
use super::errors::{BatchError, BatchResult};
use super::group::{EntityWriteGroup, GroupExecution};
use super::request::{RawStatement, RecordWrite, RequestId, RootType, WriteOutcome, WriteRequest};
use super::statement::{FlushOutcome, StatementBatch};

/// Observable lifecycle of a coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    /// Nothing buffered
    Idle,
    /// At least one write is waiting for a flush
    Accumulating,
}

/// Orders and batches the writes of one transaction.
pub struct BatchCoordinator {
    config: BatchConfig,
    registry: Arc<DescriptorRegistry>,
    store: Arc<dyn StoreBackend>,
    context: Arc<dyn TransactionContext>,
    metrics: Arc<BatchMetrics>,

    statements: StatementBatch,
    groups: HashMap<RootType, EntityWriteGroup>,
    max_depth: i32,
    /// Largest group size seen since the last flush
    buffer_high_water_mark: usize,

    next_request: u64,
    next_group: u64,
    generated_keys: HashMap<RequestId, Value>,
}

impl BatchCoordinator {
    /// Create an empty coordinator for the transaction behind `context`.
    pub fn new(
        config: BatchConfig,
        registry: Arc<DescriptorRegistry>,
        store: Arc<dyn StoreBackend>,
        context: Arc<dyn TransactionContext>,
    ) -> Self {
        Self {
            config,
            registry,
            store,
            context,
            metrics: Arc::new(BatchMetrics::new()),
            statements: StatementBatch::new(),
            groups: HashMap::new(),
            max_depth: 0,
            buffer_high_water_mark: 0,
            next_request: 0,
            next_group: 0,
            generated_keys: HashMap::new(),
        }
    }

    /// Report into a shared counter registry instead of a private one.
    pub fn with_metrics(mut self, metrics: Arc<BatchMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<BatchMetrics> {
        &self.metrics
    }

    /// Change the statement grouping threshold; sizes of 1 or less are ignored.
    pub fn set_batch_size(&mut self, batch_size: usize) {
        if batch_size > 1 {
            self.config.batch_size = batch_size;
        }
    }

    /// Change generated key retrieval; `None` keeps the current setting.
    pub fn set_fetch_generated_keys(&mut self, fetch: Option<bool>) {
        if let Some(fetch) = fetch {
            self.config.fetch_generated_keys = fetch;
        }
    }

    pub fn set_flush_on_mixed(&mut self, flush_on_mixed: bool) {
        self.config.flush_on_mixed = flush_on_mixed;
    }

    /// Submit either kind of write.
    pub fn submit(&mut self, request: WriteRequest, batch: bool) -> BatchResult<WriteOutcome> {
        match request {
            WriteRequest::Record(record) => self.execute_or_queue(record, batch),
            WriteRequest::Raw(raw) => self.execute_statement_or_batch(raw, batch),
        }
    }

    /// Execute or batch a raw statement.
    ///
    /// Raw statements never wait behind buffered record writes: when not
    /// batching, or when mixing is set to flush, everything buffered is
    /// flushed first.
    pub fn execute_statement_or_batch(
        &mut self,
        raw: RawStatement,
        batch: bool,
    ) -> BatchResult<WriteOutcome> {
        if !batch || (self.config.flush_on_mixed && !self.records_empty()) {
            self.flush()?;
        }
        if !batch {
            return self.execute_now(WriteRequest::Raw(raw));
        }

        let id = self.next_request_id();
        let size = self.statements.append(raw.to_bound(), Some(id));
        self.metrics.increment_queued();
        log_event(
            Event::BatchQueued,
            &[("kind", "statement"), ("size", &size.to_string())],
        );

        if self.statements.max_group_size() >= self.config.batch_size {
            self.flush()?;
        }
        Ok(WriteOutcome::Queued(id))
    }

    /// Execute or buffer a record write.
    pub fn execute_or_queue(
        &mut self,
        record: RecordWrite,
        batch: bool,
    ) -> BatchResult<WriteOutcome> {
        if !self.registry.contains(&record.root) {
            return Err(BatchError::UnknownRootType(record.root));
        }
        if !batch || (self.config.flush_on_mixed && !self.statements.is_empty()) {
            self.flush()?;
        }
        if !batch {
            return self.execute_now(WriteRequest::Record(record));
        }

        let id = self.next_request_id();
        let root = record.root.clone();
        let kind = record.kind;
        let size = match self.groups.get_mut(&root) {
            Some(group) => group.append(id, record),
            None => {
                let mut group = self.open_group(&root, record.depth)?;
                let size = group.append(id, record);
                self.groups.insert(root.clone(), group);
                size
            }
        };
        self.metrics.increment_queued();
        log_event(
            Event::BatchQueued,
            &[
                ("kind", kind.as_str()),
                ("root", root.as_str()),
                ("size", &size.to_string()),
            ],
        );

        self.buffer_high_water_mark = self.buffer_high_water_mark.max(size);
        if self.buffer_high_water_mark >= self.config.buffer_cap() {
            self.flush()?;
        }
        Ok(WriteOutcome::Queued(id))
    }

    /// Create the group for a root type entering the current window.
    ///
    /// An ambiguous depth flushes and resets everything buffered first, so
    /// the new group starts from a clean context.
    fn open_group(&mut self, root: &RootType, relative_depth: i32) -> BatchResult<EntityWriteGroup> {
        let imported = self.registry.imported(root);
        let depth = match resolve_depth(relative_depth, imported, &self.groups, self.max_depth) {
            DepthDecision::UseDepth(depth) => depth,
            DepthDecision::ForceReset => {
                self.metrics.increment_forced_resets();
                log_event(Event::ForcedReset, &[("root", root.as_str())]);
                self.flush_reset()?;
                BASE_DEPTH + relative_depth
            }
        };
        self.max_depth = self.max_depth.max(depth);

        let sequence = self.next_group;
        self.next_group += 1;
        Ok(EntityWriteGroup::new(root.clone(), depth, sequence))
    }

    fn execute_now(&mut self, request: WriteRequest) -> BatchResult<WriteOutcome> {
        let outcome = request.execute_now(
            &self.registry,
            self.store.as_ref(),
            self.config.fetch_generated_keys,
        )?;
        self.metrics.increment_executed_now();
        self.metrics.add_statements(1);
        log_event(Event::BatchExecutedNow, &[("kind", request.name())]);
        Ok(outcome)
    }

    fn next_request_id(&mut self) -> RequestId {
        self.next_request += 1;
        RequestId(self.next_request)
    }

    /// Flush everything buffered, keeping depth assignments for later writes.
    pub fn flush(&mut self) -> BatchResult<FlushOutcome> {
        self.flush_with(false)
    }

    /// Flush everything buffered and forget all depth assignments.
    pub fn flush_reset(&mut self) -> BatchResult<FlushOutcome> {
        self.flush_with(true)
    }

    fn flush_with(&mut self, reset_depth: bool) -> BatchResult<FlushOutcome> {
        self.buffer_high_water_mark = 0;
        match self.drain(reset_depth) {
            Ok(outcome) => {
                if outcome.statements > 0 {
                    self.metrics.increment_flushes();
                    self.metrics.add_statements(outcome.statements as u64);
                }
                self.generated_keys
                    .extend(outcome.generated_keys.iter().cloned());
                Ok(outcome)
            }
            Err(err) => {
                self.clear_state();
                self.metrics.increment_flush_failures();
                let succeeded = err.succeeded().unwrap_or(0).to_string();
                log_event(
                    Event::FlushFailed,
                    &[
                        ("code", err.code()),
                        ("succeeded", &succeeded),
                        ("txn", self.context.id()),
                    ],
                );
                Err(err)
            }
        }
    }

    fn drain(&mut self, reset_depth: bool) -> BatchResult<FlushOutcome> {
        let fetch = self.config.fetch_generated_keys;
        let mut outcome = FlushOutcome::default();

        if !self.statements.is_empty() {
            let drained = self.statements.flush(self.store.as_ref(), fetch)?;
            log_event(
                Event::StatementBatchFlushed,
                &[("statements", &drained.statements.to_string())],
            );
            outcome.absorb(drained);
        }

        if self.records_empty() {
            if reset_depth {
                self.reset_groups();
            }
            return Ok(outcome);
        }

        let mut ordered: Vec<&mut EntityWriteGroup> = self.groups.values_mut().collect();
        ordered.sort_by(|a, b| by_depth(a, b));

        let groups = ordered.len().to_string();
        log_event(
            Event::FlushBegin,
            &[("groups", &groups), ("txn", self.context.id())],
        );
        if self.context.log_summary_enabled() {
            let summary: Vec<String> = ordered.iter().map(|g| g.to_string()).collect();
            self.context
                .log_summary(&format!("flush [{}]", summary.join(", ")));
        }

        for group in ordered {
            let executed = group
                .execute_now(GroupExecution {
                    registry: &self.registry,
                    store: self.store.as_ref(),
                    statements: &mut self.statements,
                    batch_size: self.config.batch_size,
                    fetch_generated_keys: fetch,
                })
                .map_err(|e| e.after(outcome.statements))?;
            outcome.absorb(executed);
        }

        if reset_depth {
            self.reset_groups();
        }
        log_event(
            Event::FlushComplete,
            &[
                ("groups", &groups),
                ("rows", &outcome.rows.to_string()),
                ("statements", &outcome.statements.to_string()),
            ],
        );
        Ok(outcome)
    }

    fn reset_groups(&mut self) {
        self.groups.clear();
        self.max_depth = 0;
    }

    fn clear_state(&mut self) {
        self.statements.clear();
        self.reset_groups();
        self.buffer_high_water_mark = 0;
    }

    /// Discard all buffered work without executing it.
    pub fn clear(&mut self) {
        self.clear_state();
        log_event(Event::BatchCleared, &[("txn", self.context.id())]);
    }

    /// End of life: drop buffered work without executing it.
    ///
    /// Returns the number of buffered requests dropped. Nothing is logged
    /// when there were none, as after a successful commit.
    pub fn discard(mut self) -> usize {
        let dropped = self.statements.len() + self.buffered_records();
        if dropped > 0 {
            self.clear();
        }
        dropped
    }

    fn records_empty(&self) -> bool {
        self.groups.values().all(EntityWriteGroup::is_empty)
    }

    /// True when no raw statement and no record write is buffered.
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty() && self.records_empty()
    }

    pub fn state(&self) -> CoordinatorState {
        if self.is_empty() {
            CoordinatorState::Idle
        } else {
            CoordinatorState::Accumulating
        }
    }

    pub fn max_depth(&self) -> i32 {
        self.max_depth
    }

    /// Groups known in the current window, including drained ones
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn group_depth(&self, root: &RootType) -> Option<i32> {
        self.groups.get(root).map(EntityWriteGroup::depth)
    }

    /// Buffered record writes for `root`
    pub fn buffered(&self, root: &RootType) -> usize {
        self.groups.get(root).map(EntityWriteGroup::len).unwrap_or(0)
    }

    /// Buffered record writes across all groups
    pub fn buffered_records(&self) -> usize {
        self.groups.values().map(EntityWriteGroup::len).sum()
    }

    /// Statement texts waiting in the statement batch, with their counts
    pub fn pending_statements(&self) -> Vec<(String, usize)> {
        self.statements.groups()
    }

    pub fn buffer_high_water_mark(&self) -> usize {
        self.buffer_high_water_mark
    }

    pub fn generated_key(&self, id: RequestId) -> Option<&Value> {
        self.generated_keys.get(&id)
    }

    /// Hand over every generated key collected by past flushes.
    pub fn take_generated_keys(&mut self) -> HashMap<RequestId, Value> {
        std::mem::take(&mut self.generated_keys)
    }
}

impl std::fmt::Debug for BatchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchCoordinator")
            .field("txn", &self.context.id())
            .field("config", &self.config)
            .field("groups", &self.groups.len())
            .field("max_depth", &self.max_depth)
            .field("pending_statements", &self.statements.len())
            .finish()
    }
}
