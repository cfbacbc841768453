//! Trivy (container image / filesystem vulnerability and misconfiguration
//! scanner) adapter. Only the misconfiguration results are mapped here:
//! dependency CVEs have no corresponding fix pattern in this engine (spec
//! §4.4 only targets rewritable source/config artifacts).

use std::collections::HashMap;
use std::sync::Arc;

use remedy_core::tool::{ArtifactKind, Risk, Schema, SchemaField, ToolCategory, ToolSpec};
use remedy_core::{EngineError, Severity};
use serde_json::{json, Value};

use crate::exec::{run_json_tool, target_path_of};

#[must_use]
pub fn severity_table() -> HashMap<String, Severity> {
    HashMap::from([
        ("unknown".to_string(), Severity::Info),
        ("low".to_string(), Severity::Low),
        ("medium".to_string(), Severity::Medium),
        ("high".to_string(), Severity::High),
        ("critical".to_string(), Severity::Critical),
    ])
}

async fn invoke(params: Value) -> Result<Value, EngineError> {
    let target_path = target_path_of(&params)?;
    let native = run_json_tool("trivy", &["fs", "--format", "json", "."], target_path).await?;

    let targets = native.get("Results").and_then(Value::as_array).cloned().unwrap_or_default();
    let mut findings = Vec::new();
    for target in &targets {
        let file = target.get("Target").and_then(Value::as_str).unwrap_or("unknown");
        let misconfigs = target.get("Misconfigurations").and_then(Value::as_array).cloned().unwrap_or_default();
        findings.extend(misconfigs.iter().filter_map(|m| map_misconfig(m, file)));
    }
    Ok(json!({ "findings": findings }))
}

fn map_misconfig(misconfig: &Value, file: &str) -> Option<Value> {
    let rule_id = misconfig.get("ID").and_then(Value::as_str)?;
    let message = misconfig.get("Message").and_then(Value::as_str).unwrap_or("trivy finding");
    let severity = misconfig.get("Severity").and_then(Value::as_str).unwrap_or("unknown");
    let line = misconfig
        .get("CauseMetadata")
        .and_then(|c| c.get("StartLine"))
        .and_then(Value::as_u64)
        .unwrap_or(1);

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
        "metadata": { "title": misconfig.get("Title") },
    }))
}

#[must_use]
pub fn tool_spec() -> ToolSpec {
    ToolSpec::new(
        "trivy",
        ToolCategory::Scanner,
        Risk::Safe,
        [ArtifactKind::JsonManifest, ArtifactKind::K8sYaml].into_iter().collect(),
        Schema::new(vec![SchemaField { name: "target_path", required: true }]),
        Schema::empty(),
        Arc::new(invoke),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_a_misconfiguration_with_the_target_as_file() {
        let misconfig = json!({
            "ID": "AVD-AWS-0089",
            "Title": "S3 bucket has versioning disabled",
            "Message": "Bucket does not have versioning enabled",
            "Severity": "MEDIUM",
            "CauseMetadata": {"StartLine": 4},
        });
        let finding = map_misconfig(&misconfig, "main.tf").unwrap();
        assert_eq!(finding["file"], "main.tf");
        assert_eq!(finding["line"], 4);
    }
}
