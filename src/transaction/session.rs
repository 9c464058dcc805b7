//! Transaction handle
//!
//! Owns at most one batch coordinator and the relative cascade depth of the
//! graph walk currently saving records. Without batching every write runs
//! against the store immediately.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::batch::{
    BatchConfig, BatchCoordinator, BatchError, BatchResult, FlushOutcome, RawStatement,
    RecordWrite, RequestId, WriteOutcome, WriteRequest,
};
use crate::observability::{log_event, BatchMetrics, Event};
use crate::store::{DescriptorRegistry, StoreBackend};

use super::context::{SummaryLog, TransactionContext};

/// Lifecycle of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    RolledBack,
}

/// A unit of work writing through one store.
pub struct Transaction {
    context: Arc<SummaryLog>,
    registry: Arc<DescriptorRegistry>,
    store: Arc<dyn StoreBackend>,
    metrics: Arc<BatchMetrics>,
    batch: Option<BatchCoordinator>,
    depth: i32,
    state: TransactionState,
    /// Keys collected from coordinators that have already been dropped
    generated_keys: HashMap<RequestId, Value>,
}

impl Transaction {
    /// Begin a transaction with batching disabled and summaries off.
    pub fn new(registry: Arc<DescriptorRegistry>, store: Arc<dyn StoreBackend>) -> Self {
        Self {
            context: Arc::new(SummaryLog::new(false)),
            registry,
            store,
            metrics: Arc::new(BatchMetrics::new()),
            batch: None,
            depth: 0,
            state: TransactionState::Active,
            generated_keys: HashMap::new(),
        }
    }

    /// Replace the summary context, e.g. to enable flush summaries.
    pub fn with_summary_logging(mut self, enabled: bool) -> Self {
        self.context = Arc::new(SummaryLog::with_id(self.context.id(), enabled));
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<BatchMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn id(&self) -> &str {
        self.context.id()
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn metrics(&self) -> &Arc<BatchMetrics> {
        &self.metrics
    }

    /// Summary lines logged by flushes so far
    pub fn summary(&self) -> Vec<String> {
        self.context.messages()
    }

    fn ensure_active(&self) -> BatchResult<()> {
        match self.state {
            TransactionState::Active => Ok(()),
            _ => Err(BatchError::Discarded),
        }
    }

    /// Start buffering writes.
    ///
    /// An existing coordinator is flushed and replaced.
    pub fn enable_batching(&mut self, config: BatchConfig) -> BatchResult<()> {
        self.ensure_active()?;
        config.validate()?;
        self.retire_coordinator()?;

        let context: Arc<dyn TransactionContext> = self.context.clone();
        self.batch = Some(
            BatchCoordinator::new(config, self.registry.clone(), self.store.clone(), context)
                .with_metrics(self.metrics.clone()),
        );
        Ok(())
    }

    /// Flush buffered work and go back to immediate execution.
    pub fn disable_batching(&mut self) -> BatchResult<()> {
        self.ensure_active()?;
        self.retire_coordinator()
    }

    fn retire_coordinator(&mut self) -> BatchResult<()> {
        if let Some(coordinator) = self.batch.as_mut() {
            coordinator.flush()?;
        }
        if let Some(mut coordinator) = self.batch.take() {
            self.generated_keys.extend(coordinator.take_generated_keys());
            coordinator.discard();
        }
        Ok(())
    }

    pub fn is_batching(&self) -> bool {
        self.batch.is_some()
    }

    pub fn coordinator(&self) -> Option<&BatchCoordinator> {
        self.batch.as_ref()
    }

    pub fn coordinator_mut(&mut self) -> Option<&mut BatchCoordinator> {
        self.batch.as_mut()
    }

    /// Descend one level into a cascade; returns the new depth.
    pub fn depth_push(&mut self) -> i32 {
        self.depth += 1;
        self.depth
    }

    /// Climb one level out of a cascade; returns the new depth.
    pub fn depth_pop(&mut self) -> i32 {
        self.depth -= 1;
        self.depth
    }

    /// Current relative cascade depth
    pub fn depth(&self) -> i32 {
        self.depth
    }

    /// Save a record write at the current cascade depth.
    pub fn save(&mut self, mut record: RecordWrite) -> BatchResult<WriteOutcome> {
        self.ensure_active()?;
        record.depth = self.depth;
        match self.batch.as_mut() {
            Some(coordinator) => coordinator.execute_or_queue(record, true),
            None => self.execute_now(WriteRequest::Record(record)),
        }
    }

    /// Run a raw statement, batching it when batching is enabled.
    pub fn execute_sql(&mut self, raw: RawStatement) -> BatchResult<WriteOutcome> {
        self.ensure_active()?;
        match self.batch.as_mut() {
            Some(coordinator) => coordinator.execute_statement_or_batch(raw, true),
            None => self.execute_now(WriteRequest::Raw(raw)),
        }
    }

    /// Run a raw statement immediately, after flushing anything buffered.
    pub fn execute_sql_now(&mut self, raw: RawStatement) -> BatchResult<WriteOutcome> {
        self.ensure_active()?;
        match self.batch.as_mut() {
            Some(coordinator) => coordinator.execute_statement_or_batch(raw, false),
            None => self.execute_now(WriteRequest::Raw(raw)),
        }
    }

    fn execute_now(&self, request: WriteRequest) -> BatchResult<WriteOutcome> {
        let outcome = request.execute_now(&self.registry, self.store.as_ref(), true)?;
        self.metrics.increment_executed_now();
        self.metrics.add_statements(1);
        log_event(Event::BatchExecutedNow, &[("kind", request.name())]);
        Ok(outcome)
    }

    /// Flush buffered work; a no-op without batching.
    pub fn flush(&mut self) -> BatchResult<FlushOutcome> {
        self.ensure_active()?;
        match self.batch.as_mut() {
            Some(coordinator) => coordinator.flush(),
            None => Ok(FlushOutcome::default()),
        }
    }

    /// Flush and end the transaction.
    ///
    /// A failed flush leaves the transaction active with nothing buffered;
    /// the caller is expected to roll back.
    pub fn commit(&mut self) -> BatchResult<()> {
        self.ensure_active()?;
        self.retire_coordinator()?;
        self.state = TransactionState::Committed;
        log_event(Event::TransactionCommit, &[("txn", self.context.id())]);
        Ok(())
    }

    /// Drop buffered work unexecuted and end the transaction.
    pub fn rollback(&mut self) -> BatchResult<()> {
        self.ensure_active()?;
        let discarded = self.batch.take().map(BatchCoordinator::discard).unwrap_or(0);
        self.state = TransactionState::RolledBack;
        log_event(
            Event::TransactionRollback,
            &[("discarded", &discarded.to_string()), ("txn", self.context.id())],
        );
        Ok(())
    }

    /// Hand over generated keys of every flushed insert so far.
    pub fn take_generated_keys(&mut self) -> HashMap<RequestId, Value> {
        let mut keys = std::mem::take(&mut self.generated_keys);
        if let Some(coordinator) = self.batch.as_mut() {
            keys.extend(coordinator.take_generated_keys());
        }
        keys
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.context.id())
            .field("state", &self.state)
            .field("depth", &self.depth)
            .field("batch", &self.batch)
            .finish()
    }
}
