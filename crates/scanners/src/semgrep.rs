//! Semgrep (multi-language pattern-based static analysis) adapter.

use std::collections::HashMap;
use std::sync::Arc;

use remedy_core::tool::{ArtifactKind, Risk, Schema, SchemaField, ToolCategory, ToolSpec};
use remedy_core::{EngineError, Severity};
use serde_json::{json, Value};

use crate::exec::{run_json_tool, target_path_of};

/// Semgrep's `extra.severity` values, lowercased.
#[must_use]
pub fn severity_table() -> HashMap<String, Severity> {
    HashMap::from([
        ("info".to_string(), Severity::Info),
        ("warning".to_string(), Severity::Medium),
        ("error".to_string(), Severity::High),
    ])
}

async fn invoke(params: Value) -> Result<Value, EngineError> {
    let target_path = target_path_of(&params)?;
    let native = run_json_tool("semgrep", &["--config=auto", "--json", "."], target_path).await?;

    let results = native.get("results").and_then(Value::as_array).cloned().unwrap_or_default();
    let findings: Vec<Value> = results.iter().filter_map(map_result).collect();
    Ok(json!({ "findings": findings }))
}

fn map_result(result: &Value) -> Option<Value> {
    let rule_id = result.get("check_id").and_then(Value::as_str)?;
    let file = result.get("path").and_then(Value::as_str)?;
    let line = result.get("start").and_then(|s| s.get("line")).and_then(Value::as_u64).unwrap_or(1);
    let column = result.get("start").and_then(|s| s.get("col")).and_then(Value::as_u64);
    let extra = result.get("extra");
    let message = extra.and_then(|e| e.get("message")).and_then(Value::as_str).unwrap_or("semgrep finding");
    let severity = extra.and_then(|e| e.get("severity")).and_then(Value::as_str).unwrap_or("info");
    let metadata = extra.and_then(|e| e.get("metadata")).cloned().unwrap_or(Value::Null);
    let confidence = metadata.get("confidence").and_then(Value::as_str);
    let cwe = metadata.get("cwe").and_then(|c| c.as_array().and_then(|a| a.first())).and_then(Value::as_str);

    Some(json!({
        "rule_id": rule_id,
        "file": file,
        "line": line,
        "severity": severity,
        "message": message,
        "column": column,
        "snippet": extra.and_then(|e| e.get("lines")).and_then(Value::as_str),
        "cwe": cwe,
        "confidence": confidence,
        "metadata": metadata,
    }))
}

#[must_use]
pub fn tool_spec() -> ToolSpec {
    ToolSpec::new(
        "semgrep",
        ToolCategory::Scanner,
        Risk::Safe,
        [ArtifactKind::PythonSource, ArtifactKind::FreeText].into_iter().collect(),
        Schema::new(vec![SchemaField { name: "target_path", required: true }]),
        Schema::empty(),
        Arc::new(invoke),
    )
}
