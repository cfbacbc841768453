//! Bandit (Python static analysis security scanner) adapter.

use std::collections::HashMap;
use std::sync::Arc;

use remedy_core::tool::{ArtifactKind, Risk, Schema, SchemaField, ToolCategory, ToolSpec};
use remedy_core::{EngineError, Severity};
use serde_json::{json, Value};

use crate::exec::{run_json_tool, target_path_of};

/// Bandit's own `issue_severity` values, lowercased (spec §4.2 per-scanner
/// severity table).
#[must_use]
pub fn severity_table() -> HashMap<String, Severity> {
    HashMap::from([
        ("undefined".to_string(), Severity::Info),
        ("low".to_string(), Severity::Low),
        ("medium".to_string(), Severity::Medium),
        ("high".to_string(), Severity::High),
    ])
}

async fn invoke(params: Value) -> Result<Value, EngineError> {
    let target_path = target_path_of(&params)?;
    let native = run_json_tool("bandit", &["-r", "-f", "json", "."], target_path).await?;

    let results = native.get("results").and_then(Value::as_array).cloned().unwrap_or_default();
    let findings: Vec<Value> = results.iter().filter_map(map_result).collect();
    Ok(json!({ "findings": findings }))
}

fn map_result(result: &Value) -> Option<Value> {
    let rule_id = result.get("test_id").and_then(Value::as_str)?;
    let file = result.get("filename").and_then(Value::as_str)?;
    let line = result.get("line_number").and_then(Value::as_u64).unwrap_or(1);
    let message = result.get("issue_text").and_then(Value::as_str).unwrap_or("bandit finding");
    let severity = result.get("issue_severity").and_then(Value::as_str).unwrap_or("undefined");
    let confidence = result.get("issue_confidence").and_then(Value::as_str);
    let cwe = result.get("cwe").and_then(|c| c.get("id")).map(|id| id.to_string());

    Some(json!({
        "rule_id": rule_id,
        "file": file,
        "line": line,
        "severity": severity,
        "message": message,
        "column": Value::Null,
        "snippet": result.get("code").and_then(Value::as_str),
        "cwe": cwe,
        "confidence": confidence,
        "metadata": { "test_name": result.get("test_name") },
    }))
}

#[must_use]
pub fn tool_spec() -> ToolSpec {
    ToolSpec::new(
        "bandit",
        ToolCategory::Scanner,
        Risk::Safe,
        [ArtifactKind::PythonSource].into_iter().collect(),
        Schema::new(vec![SchemaField { name: "target_path", required: true }]),
        Schema::empty(),
        Arc::new(invoke),
    )
}
