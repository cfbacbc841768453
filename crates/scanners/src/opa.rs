//! Open Policy Agent (Rego policy compliance) adapter, driven through
//! `conftest` -- the standard way to run OPA's Rego policies against a
//! directory of manifests rather than a single JSON input document.
//!
//! Rego `deny`/`warn` rules carry no line information (they evaluate the
//! parsed document, not its source text), so every finding lands on line
//! 1; this is consistent with `fix::manifest`'s own structural,
//! line-independent container walk (spec §4.4).

use std::collections::HashMap;
use std::sync::Arc;

use remedy_core::tool::{ArtifactKind, Risk, Schema, SchemaField, ToolCategory, ToolSpec};
use remedy_core::{EngineError, Severity};
use serde_json::{json, Value};

use crate::exec::{run_json_tool, target_path_of};

#[must_use]
pub fn severity_table() -> HashMap<String, Severity> {
    HashMap::from([
        ("warning".to_string(), Severity::Medium),
        ("failure".to_string(), Severity::High),
    ])
}

async fn invoke(params: Value) -> Result<Value, EngineError> {
    let target_path = target_path_of(&params)?;
    let native = run_json_tool("conftest", &["test", "--output", "json", "."], target_path).await?;

    let reports = native.as_array().cloned().unwrap_or_default();
    let mut findings = Vec::new();
    for report in &reports {
        let file = report.get("filename").and_then(Value::as_str).unwrap_or("unknown");
        let failures = report.get("failures").and_then(Value::as_array).cloned().unwrap_or_default();
        let warnings = report.get("warnings").and_then(Value::as_array).cloned().unwrap_or_default();
        findings.extend(failures.iter().filter_map(|f| map_check(f, file, "failure")));
        findings.extend(warnings.iter().filter_map(|w| map_check(w, file, "warning")));
    }
    Ok(json!({ "findings": findings }))
}

fn map_check(check: &Value, file: &str, severity: &str) -> Option<Value> {
    let message = check.get("msg").and_then(Value::as_str)?;
    let rule_id = check
        .get("metadata")
        .and_then(|m| m.get("rule"))
        .and_then(Value::as_str)
        .unwrap_or(message);

    Some(json!({
        "rule_id": rule_id,
        "file": file,
        "line": 1,
        "severity": severity,
        "message": message,
        "column": Value::Null,
        "snippet": Value::Null,
        "cwe": Value::Null,
        "confidence": Value::Null,
        "metadata": check.get("metadata").cloned().unwrap_or(Value::Null),
    }))
}

#[must_use]
pub fn tool_spec() -> ToolSpec {
    ToolSpec::new(
        "opa",
        ToolCategory::Scanner,
        Risk::Safe,
        [ArtifactKind::K8sYaml, ArtifactKind::JsonManifest].into_iter().collect(),
        Schema::new(vec![SchemaField { name: "target_path", required: true }]),
        Schema::empty(),
        Arc::new(invoke),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_a_failure_to_high_and_a_warning_to_medium() {
        let failure = json!({"msg": "containers must not run as privileged", "metadata": {"rule": "no-privileged"}});
        let warning = json!({"msg": "image tag should be pinned", "metadata": {"rule": "pinned-tag"}});

        let mapped_failure = map_check(&failure, "deployment.yaml", "failure").unwrap();
        let mapped_warning = map_check(&warning, "deployment.yaml", "warning").unwrap();

        assert_eq!(mapped_failure["severity"], "failure");
        assert_eq!(mapped_failure["rule_id"], "no-privileged");
        assert_eq!(mapped_warning["severity"], "warning");
    }

    #[test]
    fn severity_table_ranks_failure_above_warning() {
        let table = severity_table();
        assert_eq!(table.get("failure"), Some(&Severity::High));
        assert_eq!(table.get("warning"), Some(&Severity::Medium));
    }
}
