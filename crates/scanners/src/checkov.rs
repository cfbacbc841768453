//! Checkov (Terraform/CloudFormation/Kubernetes IaC scanner) adapter.

use std::collections::HashMap;
use std::sync::Arc;

use remedy_core::tool::{ArtifactKind, Risk, Schema, SchemaField, ToolCategory, ToolSpec};
use remedy_core::{EngineError, Severity};
use serde_json::{json, Value};

use crate::exec::{run_json_tool, target_path_of};

/// Checkov's `severity` field is optional on older check definitions, so
/// the table includes an `"unknown"` bucket rather than letting absent
/// severities fall through to the normalizer's unmapped-severity path.
#[must_use]
pub fn severity_table() -> HashMap<String, Severity> {
    HashMap::from([
        ("unknown".to_string(), Severity::Medium),
        ("low".to_string(), Severity::Low),
        ("medium".to_string(), Severity::Medium),
        ("high".to_string(), Severity::High),
        ("critical".to_string(), Severity::Critical),
    ])
}

async fn invoke(params: Value) -> Result<Value, EngineError> {
    let target_path = target_path_of(&params)?;
    let native = run_json_tool("checkov", &["-d", ".", "-o", "json"], target_path).await?;

    let failed = native
        .get("results")
        .and_then(|r| r.get("failed_checks"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let findings: Vec<Value> = failed.iter().filter_map(map_result).collect();
    Ok(json!({ "findings": findings }))
}

fn map_result(result: &Value) -> Option<Value> {
    let rule_id = result.get("check_id").and_then(Value::as_str)?;
    let file = result.get("file_path").and_then(Value::as_str)?;
    let line = result
        .get("file_line_range")
        .and_then(Value::as_array)
        .and_then(|r| r.first())
        .and_then(Value::as_u64)
        .unwrap_or(1);
    let message = result.get("check_name").and_then(Value::as_str).unwrap_or("checkov finding");
    let severity = result.get("severity").and_then(Value::as_str).unwrap_or("unknown");
    let resource = result.get("resource").cloned().unwrap_or(Value::Null);

    Some(json!({
        "rule_id": rule_id,
        "file": file.trim_start_matches('/'),
        "line": line,
        "severity": severity,
        "message": message,
        "column": Value::Null,
        "snippet": Value::Null,
        "cwe": Value::Null,
        "confidence": Value::Null,
        "metadata": { "resource": resource, "guideline": result.get("guideline") },
    }))
}

#[must_use]
pub fn tool_spec() -> ToolSpec {
    ToolSpec::new(
        "checkov",
        ToolCategory::Scanner,
        Risk::Safe,
        [ArtifactKind::Hcl, ArtifactKind::K8sYaml, ArtifactKind::JsonManifest].into_iter().collect(),
        Schema::new(vec![SchemaField { name: "target_path", required: true }]),
        Schema::empty(),
        Arc::new(invoke),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_an_unencrypted_bucket_check() {
        let result = json!({
            "check_id": "CKV_AWS_19",
            "check_name": "Ensure S3 bucket has encryption enabled",
            "file_path": "/main.tf",
            "file_line_range": [10, 25],
            "resource": "aws_s3_bucket.example",
            "severity": null,
        });
        let finding = map_result(&result).unwrap();
        assert_eq!(finding["rule_id"], "CKV_AWS_19");
        assert_eq!(finding["file"], "main.tf");
        assert_eq!(finding["severity"], "unknown");
    }
}
