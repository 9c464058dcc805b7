//! Observable batching events

use std::fmt;

/// Observable events of the batching engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Submission
    /// Request buffered for a later flush
    BatchQueued,
    /// Request executed synchronously
    BatchExecutedNow,

    // Flush
    FlushBegin,
    FlushComplete,
    /// Flush failed; all buffered state was discarded
    FlushFailed,
    /// Depth of a new root type was ambiguous; flushed and reset first
    ForcedReset,
    /// Buffered state discarded without executing
    BatchCleared,
    /// Statement batch drained ahead of record-write groups
    StatementBatchFlushed,

    // Transaction
    TransactionCommit,
    TransactionRollback,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::BatchQueued => "BATCH_QUEUED",
            Event::BatchExecutedNow => "BATCH_EXECUTED_NOW",
            Event::FlushBegin => "FLUSH_BEGIN",
            Event::FlushComplete => "FLUSH_COMPLETE",
            Event::FlushFailed => "FLUSH_FAILED",
            Event::ForcedReset => "FORCED_RESET",
            Event::BatchCleared => "BATCH_CLEARED",
            Event::StatementBatchFlushed => "STATEMENT_BATCH_FLUSHED",
            Event::TransactionCommit => "TRANSACTION_COMMIT",
            Event::TransactionRollback => "TRANSACTION_ROLLBACK",
        }
    }

    /// Per-request events, logged at TRACE
    pub fn is_detail(&self) -> bool {
        matches!(self, Event::BatchQueued | Event::BatchExecutedNow)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Event::FlushFailed)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
