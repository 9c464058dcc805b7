//! CLI module for graphbatch
//!
//! Provides command-line interface for:
//! - replay: Run a scripted write sequence through a batching transaction
//!   over the in-memory store and report what the store executed

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{replay, run, run_command, ReplayConfig, ScriptOp};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_script, write_error, write_response};
