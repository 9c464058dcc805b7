//! Batch configuration
//!
//! Knobs that decide when buffered work is pushed to the store:
//! - `batch_size`: statement grouping threshold
//! - `flush_on_mixed`: whether mixing raw statements with buffered record
//!   writes forces an eager flush
//! - `fetch_generated_keys`: whether inserts ask the store for generated keys
//! - `buffer_cap_multiplier`: a record-write group flushes once it holds
//!   `batch_size * buffer_cap_multiplier` requests

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::errors::{BatchError, BatchResult};

/// Default statement grouping threshold
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Multiple of `batch_size` at which a record-write buffer forces a flush
pub const DEFAULT_BUFFER_CAP_MULTIPLIER: usize = 10;

/// Configuration for one batch coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_true")]
    pub flush_on_mixed: bool,
    #[serde(default = "default_true")]
    pub fetch_generated_keys: bool,
    #[serde(default = "default_buffer_cap_multiplier")]
    pub buffer_cap_multiplier: usize,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_true() -> bool {
    true
}

fn default_buffer_cap_multiplier() -> usize {
    DEFAULT_BUFFER_CAP_MULTIPLIER
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            flush_on_mixed: true,
            fetch_generated_keys: true,
            buffer_cap_multiplier: DEFAULT_BUFFER_CAP_MULTIPLIER,
        }
    }
}

impl BatchConfig {
    /// Create config with the given batch size and defaults elsewhere.
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size,
            ..Self::default()
        }
    }

    pub fn with_flush_on_mixed(mut self, flush_on_mixed: bool) -> Self {
        self.flush_on_mixed = flush_on_mixed;
        self
    }

    pub fn with_fetch_generated_keys(mut self, fetch: bool) -> Self {
        self.fetch_generated_keys = fetch;
        self
    }

    pub fn with_buffer_cap_multiplier(mut self, multiplier: usize) -> Self {
        self.buffer_cap_multiplier = multiplier;
        self
    }

    /// Buffered record writes per group that force a flush
    pub fn buffer_cap(&self) -> usize {
        self.batch_size.saturating_mul(self.buffer_cap_multiplier)
    }

    /// Parse and validate a JSON config document
    pub fn from_json_str(content: &str) -> BatchResult<Self> {
        let config: BatchConfig = serde_json::from_str(content)
            .map_err(|e| BatchError::config(format!("Invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    pub fn load(path: &Path) -> BatchResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| BatchError::config(format!("Failed to read config: {}", e)))?;
        Self::from_json_str(&content)
    }

    pub fn validate(&self) -> BatchResult<()> {
        if self.batch_size == 0 {
            return Err(BatchError::config("batch_size must be > 0"));
        }
        if self.buffer_cap_multiplier == 0 {
            return Err(BatchError::config("buffer_cap_multiplier must be > 0"));
        }
        Ok(())
    }
}
