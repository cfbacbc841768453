//! Shared helper for shelling out to a scanner binary and parsing its
//! JSON report, in the style of the `gh` CLI wrapper used elsewhere in
//! this workspace (`utils::clippy::ClippyFetcher`).

use std::io;
use std::process::Stdio;

use remedy_core::EngineError;
use serde_json::Value;
use tokio::process::Command;

/// Run `binary` with `args` in `target_path` and parse its stdout as JSON.
///
/// Several scanners (bandit, checkov, tfsec, gitleaks) exit non-zero when
/// findings are present, so a failing exit status alone is not evidence
/// of a broken invocation -- only a non-zero status *and* unparseable
/// stdout is treated as [`EngineError::ToolFailure`].
pub async fn run_json_tool(binary: &str, args: &[&str], target_path: &str) -> Result<Value, EngineError> {
    let output = Command::new(binary)
        .args(args)
        .current_dir(target_path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => EngineError::ToolUnavailable(binary.to_string()),
            _ => EngineError::Io(err),
        })?;

    match serde_json::from_slice::<Value>(&output.stdout) {
        Ok(value) => Ok(value),
        Err(parse_err) => {
            if output.status.success() {
                Err(EngineError::NormalizationError(format!("{binary}: {parse_err}")))
            } else {
                Err(EngineError::ToolFailure {
                    exit_code: output.status.code(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                })
            }
        }
    }
}

/// Pull `target_path` out of the invoke params, the one field every
/// adapter's input schema requires.
pub fn target_path_of(params: &Value) -> Result<&str, EngineError> {
    params
        .get("target_path")
        .and_then(Value::as_str)
        .ok_or_else(|| EngineError::SchemaError("missing target_path".to_string()))
}
