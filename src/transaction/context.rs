//! Transaction context seen by the batching engine

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::observability::Logger;

/// What a coordinator needs from the transaction that owns it.
pub trait TransactionContext: Send + Sync {
    /// Identifier used in diagnostics
    fn id(&self) -> &str;

    /// Whether flush summaries should be produced at all
    fn log_summary_enabled(&self) -> bool;

    /// Receive one summary line
    fn log_summary(&self, message: &str);
}

/// One summary line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryEntry {
    pub at: DateTime<Utc>,
    pub message: String,
}

/// Context collecting summary lines in memory and echoing them to the log.
#[derive(Debug)]
pub struct SummaryLog {
    id: String,
    enabled: bool,
    entries: Mutex<Vec<SummaryEntry>>,
}

impl SummaryLog {
    /// Create a context with a fresh random id
    pub fn new(enabled: bool) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), enabled)
    }

    pub fn with_id(id: impl Into<String>, enabled: bool) -> Self {
        Self {
            id: id.into(),
            enabled,
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn entries(&self) -> Vec<SummaryEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Summary messages, oldest first
    pub fn messages(&self) -> Vec<String> {
        self.entries().into_iter().map(|e| e.message).collect()
    }
}

impl TransactionContext for SummaryLog {
    fn id(&self) -> &str {
        &self.id
    }

    fn log_summary_enabled(&self) -> bool {
        self.enabled
    }

    fn log_summary(&self, message: &str) {
        Logger::info("TRANSACTION_SUMMARY", &[("txn", &self.id), ("message", message)]);
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SummaryEntry {
                at: Utc::now(),
                message: message.to_string(),
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_collects_messages() {
        let log = SummaryLog::with_id("txn-1", true);
        log.log_summary("flush [a@100[1]]");
        log.log_summary("flush [b@101[2]]");

        assert_eq!(log.id(), "txn-1");
        assert!(log.log_summary_enabled());
        assert_eq!(log.messages(), vec!["flush [a@100[1]]", "flush [b@101[2]]"]);
        assert!(log.entries()[0].at <= log.entries()[1].at);
    }

    #[test]
    fn test_random_ids_differ() {
        assert_ne!(SummaryLog::new(false).id(), SummaryLog::new(false).id());
    }
}
