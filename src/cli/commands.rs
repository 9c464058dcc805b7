//! CLI command implementations
//!
//! The replay command builds a transaction over a fresh in-memory store,
//! applies the script in order and reports what reached the store. A batch
//! error does not fail the command: the transaction is rolled back, the
//! error is reported alongside the statements executed before it, and the
//! remaining script is skipped.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::batch::{BatchConfig, BatchError, RawStatement, RecordWrite};
use crate::observability::{Logger, Severity};
use crate::store::{DescriptorRegistry, InMemoryStore, TableDescriptor};
use crate::transaction::{Transaction, TransactionState};

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{read_script, write_error, write_response};

/// Replay configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Batching settings; absent means every write executes immediately
    #[serde(default)]
    pub batch: Option<BatchConfig>,

    /// Hand flush summaries to the transaction's summary log
    #[serde(default)]
    pub log_summary: bool,

    /// Root types known to the store
    pub descriptors: Vec<TableDescriptor>,

    /// Make the Nth executed statement fail (1-based)
    #[serde(default)]
    pub fail_at: Option<usize>,
}

impl ReplayConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;

        let config: ReplayConfig = serde_json::from_str(&content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> CliResult<()> {
        if let Some(batch) = &self.batch {
            batch.validate()?;
        }

        if self.descriptors.is_empty() {
            return Err(CliError::config_error("descriptors must not be empty"));
        }

        let mut seen = std::collections::HashSet::new();
        for descriptor in &self.descriptors {
            if !seen.insert(&descriptor.root) {
                return Err(CliError::config_error(format!(
                    "Duplicate descriptor for root type '{}'",
                    descriptor.root
                )));
            }
        }

        if self.fail_at == Some(0) {
            return Err(CliError::config_error("fail_at is 1-based"));
        }

        Ok(())
    }

    fn registry(&self) -> DescriptorRegistry {
        self.descriptors.iter().cloned().collect()
    }
}

/// One line of a replay script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScriptOp {
    /// Save a record write at the current cascade depth
    Save { record: RecordWrite },
    /// Raw statement; `now` bypasses batching
    Sql {
        sql: String,
        #[serde(default)]
        params: Vec<Value>,
        #[serde(default)]
        now: bool,
    },
    Push,
    Pop,
    Flush,
    Commit,
    Rollback,
}

impl ScriptOp {
    fn apply(self, txn: &mut Transaction) -> Result<(), BatchError> {
        match self {
            ScriptOp::Save { record } => txn.save(record).map(drop),
            ScriptOp::Sql { sql, params, now } => {
                let raw = RawStatement::new(sql, params);
                if now {
                    txn.execute_sql_now(raw).map(drop)
                } else {
                    txn.execute_sql(raw).map(drop)
                }
            }
            ScriptOp::Push => {
                txn.depth_push();
                Ok(())
            }
            ScriptOp::Pop => {
                txn.depth_pop();
                Ok(())
            }
            ScriptOp::Flush => txn.flush().map(drop),
            ScriptOp::Commit => txn.commit(),
            ScriptOp::Rollback => txn.rollback(),
        }
    }
}

/// Run CLI
///
/// Stdout carries only the command's JSON response; log lines go to stderr.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    Logger::set_stderr_only(true);
    Logger::set_min_severity(if cli.verbose {
        Severity::Trace
    } else {
        Severity::Info
    });
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Replay { config, script } => match replay(&config, &script) {
            Ok(report) => write_response(report),
            Err(e) => {
                write_error(e.code_str(), e.message())?;
                Err(e)
            }
        },
    }
}

/// Replay a script and return the report.
pub fn replay(config_path: &Path, script_path: &Path) -> CliResult<Value> {
    let config = ReplayConfig::load(config_path)?;
    let ops: Vec<ScriptOp> = read_script(script_path)?;

    let store = Arc::new(InMemoryStore::new());
    if let Some(position) = config.fail_at {
        store.fail_at(position);
    }

    let mut txn = Transaction::new(Arc::new(config.registry()), store.clone())
        .with_summary_logging(config.log_summary);
    if let Some(batch) = config.batch.clone() {
        txn.enable_batching(batch)?;
    }

    let mut error = Value::Null;
    for (index, op) in ops.into_iter().enumerate() {
        if let Err(e) = op.apply(&mut txn) {
            error = json!({
                "op": index + 1,
                "code": e.code(),
                "message": e.to_string(),
                "succeeded": e.succeeded(),
            });
            if txn.state() == TransactionState::Active {
                txn.rollback()?;
            }
            break;
        }
    }

    let state = match txn.state() {
        TransactionState::Active => "active",
        TransactionState::Committed => "committed",
        TransactionState::RolledBack => "rolled_back",
    };

    Ok(json!({
        "transaction": txn.id(),
        "state": state,
        "executed": store.executed(),
        "batch_sizes": store.batch_sizes(),
        "summary": txn.summary(),
        "metrics": txn.metrics().snapshot().to_json(),
        "error": error,
    }))
}

#[cfg(test)]
mod tests {
    use super::super::errors::CliErrorCode;
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn config(extra: Value) -> String {
        let mut config = json!({
            "batch": { "batch_size": 10 },
            "log_summary": true,
            "descriptors": [
                { "root": "customer", "table": "customers" },
                { "root": "order", "table": "orders", "imported": ["customer"] }
            ]
        });
        if let (Some(target), Some(extra)) = (config.as_object_mut(), extra.as_object()) {
            target.extend(extra.clone());
        }
        config.to_string()
    }

    const SCRIPT: &str = r#"{"op": "save", "record": {"root": "order", "kind": "insert"}}
{"op": "pop"}
{"op": "save", "record": {"root": "customer", "kind": "insert", "values": {"name": "a"}}}
{"op": "push"}
{"op": "commit"}
"#;

    #[test]
    fn test_replay_orders_by_depth() {
        let dir = TempDir::new().unwrap();
        let config_path = write(&dir, "graphbatch.json", &config(json!({})));
        let script_path = write(&dir, "ops.jsonl", SCRIPT);

        let report = replay(&config_path, &script_path).unwrap();

        assert_eq!(report["state"], "committed");
        assert_eq!(report["executed"][0]["sql"], "insert into customers (name) values (?)");
        assert_eq!(report["executed"][1]["sql"], "insert into orders () values ()");
        assert_eq!(report["summary"][0], "flush [customer@99[1], order@100[1]]");
        assert!(report["error"].is_null());
    }

    #[test]
    fn test_replay_reports_batch_failure() {
        let dir = TempDir::new().unwrap();
        let config_path = write(&dir, "graphbatch.json", &config(json!({ "fail_at": 2 })));
        let script_path = write(&dir, "ops.jsonl", SCRIPT);

        let report = replay(&config_path, &script_path).unwrap();

        assert_eq!(report["state"], "rolled_back");
        assert_eq!(report["error"]["code"], "BATCH_EXECUTION_FAILED");
        assert_eq!(report["error"]["op"], 5);
        assert_eq!(report["error"]["succeeded"], 1);
        assert_eq!(report["executed"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn test_replay_without_batching() {
        let dir = TempDir::new().unwrap();
        let config_path = write(&dir, "graphbatch.json", &config(json!({ "batch": null })));
        let script_path = write(&dir, "ops.jsonl", SCRIPT);

        let report = replay(&config_path, &script_path).unwrap();

        assert_eq!(report["executed"][0]["sql"], "insert into orders () values ()");
        assert_eq!(report["metrics"]["requests_executed_now"], 2);
    }

    #[test]
    fn test_missing_config_is_config_error() {
        let dir = TempDir::new().unwrap();
        let script_path = write(&dir, "ops.jsonl", SCRIPT);

        let err = replay(&dir.path().join("missing.json"), &script_path).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::ConfigError);
    }

    #[test]
    fn test_duplicate_descriptor_rejected() {
        let dir = TempDir::new().unwrap();
        let content = json!({
            "descriptors": [
                { "root": "customer", "table": "customers" },
                { "root": "customer", "table": "clients" }
            ]
        });
        let config_path = write(&dir, "graphbatch.json", &content.to_string());

        let err = ReplayConfig::load(&config_path).unwrap_err();
        assert!(err.message().contains("Duplicate descriptor"));
    }

    #[test]
    fn test_unknown_op_is_script_error() {
        let dir = TempDir::new().unwrap();
        let config_path = write(&dir, "graphbatch.json", &config(json!({})));
        let script_path = write(&dir, "ops.jsonl", "{\"op\": \"explode\"}\n");

        let err = replay(&config_path, &script_path).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::ScriptError);
    }
}
