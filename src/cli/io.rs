//! JSON I/O handling for CLI
//!
//! - Input: a JSON-lines script file, one operation per line
//! - Output: single JSON object via stdout
//! - UTF-8 only

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::errors::{CliError, CliResult};

/// Read every non-blank line of a JSON-lines file.
///
/// Lines starting with `#` are comments.
pub fn read_script<T: DeserializeOwned>(path: &Path) -> CliResult<Vec<T>> {
    let file = File::open(path).map_err(|e| {
        CliError::script_error(0, format!("Failed to open '{}': {}", path.display(), e))
    })?;

    let mut ops = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| CliError::script_error(index + 1, e.to_string()))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let op = serde_json::from_str(trimmed)
            .map_err(|e| CliError::script_error(index + 1, e.to_string()))?;
        ops.push(op);
    }
    Ok(ops)
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "ok",
        "data": data
    });

    let mut stdout = io::stdout();
    serde_json::to_writer(&mut stdout, &response)?;
    writeln!(stdout)?;
    stdout.flush()?;

    Ok(())
}

/// Write an error response to stdout
pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "error",
        "code": code,
        "message": message
    });

    let mut stdout = io::stdout();
    serde_json::to_writer(&mut stdout, &response)?;
    writeln!(stdout)?;
    stdout.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_read_script_skips_blank_and_comment_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ops.jsonl");
        fs::write(&path, "# header\n{\"a\": 1}\n\n{\"a\": 2}\n").unwrap();

        let values: Vec<Value> = read_script(&path).unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[1]["a"], 2);
    }

    #[test]
    fn test_read_script_reports_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ops.jsonl");
        fs::write(&path, "{\"a\": 1}\nnot json\n").unwrap();

        let err = read_script::<Value>(&path).unwrap_err();
        assert!(err.message().starts_with("line 2:"));
    }
}
