//! tfsec (Terraform-specific static analysis) adapter.

use std::collections::HashMap;
use std::sync::Arc;

use remedy_core::tool::{ArtifactKind, Risk, Schema, SchemaField, ToolCategory, ToolSpec};
use remedy_core::{EngineError, Severity};
use serde_json::{json, Value};

use crate::exec::{run_json_tool, target_path_of};

#[must_use]
pub fn severity_table() -> HashMap<String, Severity> {
    HashMap::from([
        ("low".to_string(), Severity::Low),
        ("medium".to_string(), Severity::Medium),
        ("high".to_string(), Severity::High),
        ("critical".to_string(), Severity::Critical),
    ])
}

async fn invoke(params: Value) -> Result<Value, EngineError> {
    let target_path = target_path_of(&params)?;
    let native = run_json_tool("tfsec", &[".", "-f", "json"], target_path).await?;

    let results = native.get("results").and_then(Value::as_array).cloned().unwrap_or_default();
    let findings: Vec<Value> = results.iter().filter_map(map_result).collect();
    Ok(json!({ "findings": findings }))
}

fn map_result(result: &Value) -> Option<Value> {
    let location = result.get("location")?;
    let rule_id = result.get("long_id").and_then(Value::as_str).or_else(|| result.get("rule_id").and_then(Value::as_str))?;
    let file = location.get("filename").and_then(Value::as_str)?;
    let line = location.get("start_line").and_then(Value::as_u64).unwrap_or(1);
    let message = result.get("description").and_then(Value::as_str).unwrap_or("tfsec finding");
    let severity = result.get("severity").and_then(Value::as_str).unwrap_or("medium");

    Some(json!({
        "rule_id": rule_id,
        "file": file,
        "line": line,
        "severity": severity,
        "message": message,
        "column": Value::Null,
        "snippet": Value::Null,
        "cwe": Value::Null,
        "confidence": Value::Null,
        "metadata": { "resource": result.get("resource") },
    }))
}

#[must_use]
pub fn tool_spec() -> ToolSpec {
    ToolSpec::new(
        "tfsec",
        ToolCategory::Scanner,
        Risk::Safe,
        [ArtifactKind::Hcl].into_iter().collect(),
        Schema::new(vec![SchemaField { name: "target_path", required: true }]),
        Schema::empty(),
        Arc::new(invoke),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_a_bucket_encryption_result() {
        let result = json!({
            "long_id": "aws-s3-enable-bucket-encryption",
            "description": "Bucket does not have encryption enabled",
            "severity": "HIGH",
            "location": {"filename": "main.tf", "start_line": 3, "end_line": 14},
        });
        let finding = map_result(&result).unwrap();
        assert_eq!(finding["rule_id"], "aws-s3-enable-bucket-encryption");
        assert_eq!(finding["line"], 3);
    }
}
