//! [`ToolSpec`] -- description of one invokable operation (spec §3).

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EngineError;

/// The four kinds of operation the registry can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolCategory {
    Scanner,
    Fixer,
    Validator,
    Generator,
}

/// Authored safety classification of an operation; drives approval (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Risk {
    Safe,
    Low,
    Medium,
    High,
    Critical,
}

/// The type of artifact a pattern or tool can act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactKind {
    PythonSource,
    Hcl,
    K8sYaml,
    JsonManifest,
    FreeText,
}

/// One required or optional parameter of a tool's input/output contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: &'static str,
    pub required: bool,
}

/// A minimal, declarative description of a tool's JSON parameters.
///
/// This is intentionally a presence-check schema, not a full JSON Schema
/// document: the registry only needs to reject malformed calls before
/// they reach a tool's `invoke`, per spec §4.1 step 1.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<SchemaField>,
}

impl Schema {
    #[must_use]
    pub fn new(fields: Vec<SchemaField>) -> Self {
        Self { fields }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Validate that `params` is a JSON object containing every required field.
    pub fn validate(&self, params: &Value) -> Result<(), EngineError> {
        let Some(object) = params.as_object() else {
            return Err(EngineError::SchemaError(
                "params must be a JSON object".to_string(),
            ));
        };
        let missing: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.required && !object.contains_key(f.name))
            .map(|f| f.name)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(EngineError::SchemaError(format!(
                "missing required field(s): {}",
                missing.join(", ")
            )))
        }
    }
}

/// The callable contract behind a [`ToolSpec`].
#[async_trait]
pub trait Invoke: Send + Sync {
    async fn call(&self, params: Value) -> Result<Value, EngineError>;
}

#[async_trait]
impl<F, Fut> Invoke for F
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Value, EngineError>> + Send,
{
    async fn call(&self, params: Value) -> Result<Value, EngineError> {
        (self)(params).await
    }
}

/// Description of an invokable operation (spec §3).
#[derive(Clone)]
pub struct ToolSpec {
    pub name: &'static str,
    pub category: ToolCategory,
    pub risk: Risk,
    pub requires_approval: bool,
    pub input_schema: Schema,
    pub output_schema: Schema,
    pub applicable_artifacts: HashSet<ArtifactKind>,
    pub invoke: Arc<dyn Invoke>,
}

impl std::fmt::Debug for ToolSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSpec")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("risk", &self.risk)
            .field("requires_approval", &self.requires_approval)
            .finish_non_exhaustive()
    }
}

impl ToolSpec {
    /// Builder entry point with the invariants from spec §3 applied.
    ///
    /// `category = Scanner` forces `risk = Safe` and `requires_approval =
    /// false`; `risk in {High, Critical}` forces `requires_approval = true`
    /// unless the caller has already set it explicitly to `true` (policy
    /// override is handled one layer up, by the approval gate, not here).
    #[must_use]
    pub fn new(
        name: &'static str,
        category: ToolCategory,
        risk: Risk,
        applicable_artifacts: HashSet<ArtifactKind>,
        input_schema: Schema,
        output_schema: Schema,
        invoke: Arc<dyn Invoke>,
    ) -> Self {
        let (risk, requires_approval) = match category {
            ToolCategory::Scanner => (Risk::Safe, false),
            _ => {
                let requires_approval = matches!(risk, Risk::High | Risk::Critical);
                (risk, requires_approval)
            }
        };

        Self {
            name,
            category,
            risk,
            requires_approval,
            input_schema,
            output_schema,
            applicable_artifacts,
            invoke,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn noop_invoke() -> Arc<dyn Invoke> {
        Arc::new(|_: Value| async { Ok(json!({})) })
    }

    #[test]
    fn scanner_category_forces_safe_risk_and_no_approval() {
        let spec = ToolSpec::new(
            "bandit",
            ToolCategory::Scanner,
            Risk::Critical,
            HashSet::new(),
            Schema::empty(),
            Schema::empty(),
            noop_invoke(),
        );
        assert_eq!(spec.risk, Risk::Safe);
        assert!(!spec.requires_approval);
    }

    #[test]
    fn high_risk_fixer_requires_approval() {
        let spec = ToolSpec::new(
            "rewrite-secret",
            ToolCategory::Fixer,
            Risk::High,
            HashSet::new(),
            Schema::empty(),
            Schema::empty(),
            noop_invoke(),
        );
        assert!(spec.requires_approval);
    }

    #[test]
    fn schema_validate_flags_missing_required_fields() {
        let schema = Schema::new(vec![SchemaField {
            name: "target_path",
            required: true,
        }]);
        assert!(schema.validate(&json!({})).is_err());
        assert!(schema.validate(&json!({"target_path": "/tmp/x"})).is_ok());
    }
}
