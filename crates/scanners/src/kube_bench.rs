//! kube-bench (CIS Kubernetes Benchmark) adapter.
//!
//! Unlike the other scanners, kube-bench audits the live control
//! plane/node it runs on rather than a source tree -- `target_path` is
//! still required by the shared schema (every `ToolSpec` in this
//! registry takes one) but only sets the working directory kube-bench's
//! own report lands in; there is no per-file artifact to point at, so
//! every finding is attributed to the synthetic file `"cluster"`.

use std::collections::HashMap;
use std::sync::Arc;

use remedy_core::tool::{ArtifactKind, Risk, Schema, SchemaField, ToolCategory, ToolSpec};
use remedy_core::{EngineError, Severity};
use serde_json::{json, Value};

use crate::exec::{run_json_tool, target_path_of};

#[must_use]
pub fn severity_table() -> HashMap<String, Severity> {
    HashMap::from([
        ("pass".to_string(), Severity::Info),
        ("info".to_string(), Severity::Info),
        ("warn".to_string(), Severity::Medium),
        ("fail".to_string(), Severity::High),
    ])
}

async fn invoke(params: Value) -> Result<Value, EngineError> {
    let target_path = target_path_of(&params)?;
    let native = run_json_tool("kube-bench", &["--json"], target_path).await?;

    let controls = native.get("Controls").and_then(Value::as_array).cloned().unwrap_or_default();
    let mut findings = Vec::new();
    for control in &controls {
        let tests = control.get("tests").and_then(Value::as_array).cloned().unwrap_or_default();
        for test in &tests {
            let results = test.get("results").and_then(Value::as_array).cloned().unwrap_or_default();
            findings.extend(results.iter().filter_map(map_result));
        }
    }
    Ok(json!({ "findings": findings }))
}

fn map_result(result: &Value) -> Option<Value> {
    let status = result.get("status").and_then(Value::as_str)?;
    if status.eq_ignore_ascii_case("pass") {
        return None;
    }
    let rule_id = result.get("test_number").and_then(Value::as_str)?;
    let message = result.get("test_desc").and_then(Value::as_str).unwrap_or("kube-bench finding");

    Some(json!({
        "rule_id": rule_id,
        "file": "cluster",
        "line": 1,
        "severity": status.to_lowercase(),
        "message": message,
        "column": Value::Null,
        "snippet": Value::Null,
        "cwe": Value::Null,
        "confidence": Value::Null,
        "metadata": { "remediation": result.get("remediation") },
    }))
}

#[must_use]
pub fn tool_spec() -> ToolSpec {
    ToolSpec::new(
        "kube-bench",
        ToolCategory::Scanner,
        Risk::Safe,
        [ArtifactKind::K8sYaml].into_iter().collect(),
        Schema::new(vec![SchemaField { name: "target_path", required: true }]),
        Schema::empty(),
        Arc::new(invoke),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_failing_control_is_mapped_with_high_severity() {
        let result = json!({
            "test_number": "1.1.1",
            "test_desc": "Ensure that the API server pod specification file permissions are set to 600 or more restrictive",
            "status": "FAIL",
            "remediation": "chmod 600 /etc/kubernetes/manifests/kube-apiserver.yaml",
        });
        let finding = map_result(&result).unwrap();
        assert_eq!(finding["rule_id"], "1.1.1");
        assert_eq!(finding["severity"], "fail");
        assert_eq!(finding["file"], "cluster");
    }

    #[test]
    fn a_passing_control_is_dropped() {
        let result = json!({"test_number": "1.1.2", "test_desc": "ok", "status": "PASS"});
        assert!(map_result(&result).is_none());
    }

    #[test]
    fn severity_table_ranks_fail_above_warn() {
        let table = severity_table();
        assert_eq!(table.get("fail"), Some(&Severity::High));
        assert_eq!(table.get("warn"), Some(&Severity::Medium));
    }
}
