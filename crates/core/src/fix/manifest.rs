//! Kubernetes YAML / JSON manifest editor (spec §4.4: "parse and edit
//! structurally rather than textually").
//!
//! Both formats are parsed into a single `serde_json::Value` tree (the
//! `serde_json` crate's `preserve_order` feature keeps object key order
//! stable via `indexmap`, and `serde_yaml` happily deserializes into any
//! `Deserialize` target, `serde_json::Value` included) so the container
//! walk below is written once and works for either artifact kind.

use serde_json::Value;

use crate::finding::Finding;
use crate::tool::ArtifactKind;

use super::builtin::BuiltinPattern;
use super::FixError;

pub fn apply(
    pattern: BuiltinPattern,
    finding: &Finding,
    text: &str,
    artifact_kind: ArtifactKind,
) -> Result<String, FixError> {
    let mut doc: Value = parse(text, artifact_kind, &finding.file)?;

    let changed = match pattern {
        BuiltinPattern::ManifestDropPrivilegeEscalation => {
            for_each_container(&mut doc, drop_privilege_escalation)
        }
        BuiltinPattern::ManifestAddResourceLimits => for_each_container(&mut doc, add_resource_limits),
        _ => false,
    };

    if !changed {
        return Ok(text.to_string());
    }

    serialize(&doc, artifact_kind, &finding.file)
}

fn parse(text: &str, artifact_kind: ArtifactKind, file: &str) -> Result<Value, FixError> {
    let result = match artifact_kind {
        ArtifactKind::K8sYaml => serde_yaml::from_str::<Value>(text).map_err(|e| e.to_string()),
        ArtifactKind::JsonManifest => serde_json::from_str::<Value>(text).map_err(|e| e.to_string()),
        _ => unreachable!("manifest::apply only handles K8sYaml/JsonManifest"),
    };
    result.map_err(|reason| FixError::SyntaxInvalid {
        file: file.to_string(),
        reason,
    })
}

fn serialize(doc: &Value, artifact_kind: ArtifactKind, file: &str) -> Result<String, FixError> {
    let result = match artifact_kind {
        ArtifactKind::K8sYaml => serde_yaml::to_string(doc).map_err(|e| e.to_string()),
        ArtifactKind::JsonManifest => {
            serde_json::to_string_pretty(doc).map(|mut s| {
                s.push('\n');
                s
            }).map_err(|e| e.to_string())
        }
        _ => unreachable!("manifest::apply only handles K8sYaml/JsonManifest"),
    };
    result.map_err(|reason| FixError::SyntaxInvalid {
        file: file.to_string(),
        reason,
    })
}

/// Find every `containers[]` array reachable from common Pod/Deployment
/// shapes (`spec.containers`, `spec.template.spec.containers`) and apply
/// `f` to each container object, returning whether anything changed.
fn for_each_container(doc: &mut Value, f: fn(&mut Value) -> bool) -> bool {
    let mut changed = false;
    for containers in container_arrays(doc) {
        if let Value::Array(items) = containers {
            for container in items {
                changed |= f(container);
            }
        }
    }
    changed
}

fn container_arrays(doc: &mut Value) -> Vec<&mut Value> {
    let mut found = Vec::new();
    collect_container_arrays(doc, &mut found);
    found
}

fn collect_container_arrays<'a>(value: &'a mut Value, found: &mut Vec<&'a mut Value>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                if key == "containers" && child.is_array() {
                    found.push(child);
                    continue;
                }
                collect_container_arrays(child, found);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_container_arrays(item, found);
            }
        }
        _ => {}
    }
}

fn drop_privilege_escalation(container: &mut Value) -> bool {
    let Value::Object(map) = container else {
        return false;
    };
    let security_context = map
        .entry("securityContext")
        .or_insert_with(|| Value::Object(serde_json::Map::new()));
    let Value::Object(sc) = security_context else {
        return false;
    };

    let mut changed = false;
    if sc.get("allowPrivilegeEscalation") != Some(&Value::Bool(false)) {
        sc.insert("allowPrivilegeEscalation".to_string(), Value::Bool(false));
        changed = true;
    }
    if !sc.contains_key("runAsNonRoot") {
        sc.insert("runAsNonRoot".to_string(), Value::Bool(true));
        changed = true;
    }
    if changed {
        map.insert(
            "_remedyProvenance".to_string(),
            Value::String("auto-fixed for compliance".to_string()),
        );
    }
    changed
}

fn add_resource_limits(container: &mut Value) -> bool {
    let Value::Object(map) = container else {
        return false;
    };
    let resources = map
        .entry("resources")
        .or_insert_with(|| Value::Object(serde_json::Map::new()));
    let Value::Object(resources) = resources else {
        return false;
    };
    if resources.contains_key("limits") {
        return false;
    }

    let mut limits = serde_json::Map::new();
    limits.insert("cpu".to_string(), Value::String("500m".to_string()));
    limits.insert("memory".to_string(), Value::String("512Mi".to_string()));
    resources.insert("limits".to_string(), Value::Object(limits));
    map.insert(
        "_remedyProvenance".to_string(),
        Value::String("auto-fixed for compliance".to_string()),
    );
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::{Confidence, Fingerprint, Severity};

    fn finding(file: &str, rule_id: &str) -> Finding {
        Finding {
            id: "f1".to_string(),
            fingerprint: Fingerprint("fp-1".to_string()),
            rule_id: rule_id.to_string(),
            scanner: "checkov".to_string(),
            severity: Severity::Medium,
            confidence: Confidence::High,
            file: file.to_string(),
            line: 1,
            column: None,
            snippet: String::new(),
            message: "msg".to_string(),
            cwe: None,
            compliance_tags: Default::default(),
            fix_available: true,
            metadata: Value::Null,
        }
    }

    const YAML: &str = "apiVersion: v1\nkind: Pod\nspec:\n  containers:\n  - name: app\n    image: app:latest\n";

    #[test]
    fn drop_privilege_escalation_adds_security_context() {
        let result = apply(
            BuiltinPattern::ManifestDropPrivilegeEscalation,
            &finding("pod.yaml", "CKV_K8S_20"),
            YAML,
            ArtifactKind::K8sYaml,
        )
        .unwrap();
        assert!(result.contains("allowPrivilegeEscalation: false"));
        assert!(result.contains("runAsNonRoot: true"));
    }

    #[test]
    fn add_resource_limits_adds_cpu_and_memory() {
        let result = apply(
            BuiltinPattern::ManifestAddResourceLimits,
            &finding("pod.yaml", "CKV_K8S_10"),
            YAML,
            ArtifactKind::K8sYaml,
        )
        .unwrap();
        assert!(result.contains("cpu: 500m"));
        assert!(result.contains("memory: 512Mi"));
    }

    #[test]
    fn a_container_with_limits_already_set_is_left_alone() {
        let yaml_with_limits = "apiVersion: v1\nkind: Pod\nspec:\n  containers:\n  - name: app\n    resources:\n      limits:\n        cpu: 1\n";
        let result = apply(
            BuiltinPattern::ManifestAddResourceLimits,
            &finding("pod.yaml", "CKV_K8S_10"),
            yaml_with_limits,
            ArtifactKind::K8sYaml,
        )
        .unwrap();
        assert_eq!(result, yaml_with_limits);
    }
}
