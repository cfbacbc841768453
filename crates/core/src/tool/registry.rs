//! The tool registry: `register`, `lookup`, `list`, `execute` (spec §4.1).

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::tool::spec::{ArtifactKind, ToolCategory, ToolSpec};

/// Alias kept for call sites that want a component-scoped name; the
/// registry reuses the shared [`EngineError`] vocabulary rather than
/// minting a parallel enum (spec §7 keeps one vocabulary across components).
pub type RegistryError = EngineError;

/// Result of one `execute` call: the normalized tool output plus the
/// wall-clock duration the invocation took (useful for audit lines).
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub output: Value,
    pub elapsed: Duration,
}

/// The registry is **not** responsible for approval, cross-tool
/// concurrency, or persistence of results -- those are orchestrator
/// concerns (spec §4.1).
pub struct ToolRegistry {
    tools: RwLock<HashMap<&'static str, ToolSpec>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
        }
    }

    /// Register a tool. Registration is append-only during a workflow;
    /// re-registering the same name overwrites the prior spec (used by
    /// tests to install stubs), but this never happens mid-workflow.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned, which only happens after
    /// another thread has already panicked while holding it.
    pub fn register(&self, spec: ToolSpec) {
        let mut tools = self.tools.write().expect("tool registry lock poisoned");
        if tools.insert(spec.name, spec).is_some() {
            debug!("re-registered tool, overwriting previous spec");
        }
    }

    /// Look up a tool by name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<ToolSpec> {
        self.tools
            .read()
            .expect("tool registry lock poisoned")
            .get(name)
            .cloned()
    }

    /// List tools, optionally filtered by category and/or applicable artifact kind.
    #[must_use]
    pub fn list(
        &self,
        category: Option<ToolCategory>,
        artifact_kind: Option<ArtifactKind>,
    ) -> Vec<ToolSpec> {
        self.tools
            .read()
            .expect("tool registry lock poisoned")
            .values()
            .filter(|t| category.map_or(true, |c| t.category == c))
            .filter(|t| {
                artifact_kind.map_or(true, |k| t.applicable_artifacts.contains(&k))
            })
            .cloned()
            .collect()
    }

    /// Execute a tool by name: schema validation, timeout-bounded
    /// invocation, then normalization against the output schema (spec §4.1).
    pub async fn execute(
        &self,
        name: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<ToolOutcome, EngineError> {
        let spec = self
            .lookup(name)
            .ok_or_else(|| EngineError::ToolUnavailable(name.to_string()))?;

        spec.input_schema.validate(&params)?;

        let start = std::time::Instant::now();
        let result = tokio::time::timeout(timeout, spec.invoke.call(params)).await;
        let elapsed = start.elapsed();

        let output = match result {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => return Err(err),
            Err(_) => {
                warn!(tool = name, ?timeout, "tool invocation timed out");
                return Err(EngineError::Timeout(timeout));
            }
        };

        spec.output_schema
            .validate(&output)
            .map_err(|e| EngineError::NormalizationError(e.to_string()))?;

        Ok(ToolOutcome { output, elapsed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::spec::{Risk, Schema, SchemaField};
    use serde_json::json;
    use std::sync::Arc;

    fn stub_scanner() -> ToolSpec {
        ToolSpec::new(
            "stub-scanner",
            ToolCategory::Scanner,
            Risk::Safe,
            std::collections::HashSet::new(),
            Schema::new(vec![SchemaField {
                name: "target_path",
                required: true,
            }]),
            Schema::empty(),
            Arc::new(|_params: Value| async move { Ok(json!({"findings": []})) }),
        )
    }

    #[tokio::test]
    async fn execute_runs_a_registered_tool_and_returns_its_output() {
        let registry = ToolRegistry::new();
        registry.register(stub_scanner());

        let outcome = registry
            .execute(
                "stub-scanner",
                json!({"target_path": "/tmp"}),
                Duration::from_secs(1),
            )
            .await
            .unwrap();
        assert_eq!(outcome.output, json!({"findings": []}));
    }

    #[tokio::test]
    async fn execute_rejects_params_missing_required_fields() {
        let registry = ToolRegistry::new();
        registry.register(stub_scanner());

        let err = registry
            .execute("stub-scanner", json!({}), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::SchemaError(_)));
    }

    #[tokio::test]
    async fn execute_on_unknown_tool_is_tool_unavailable() {
        let registry = ToolRegistry::new();
        let err = registry
            .execute("does-not-exist", json!({}), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ToolUnavailable(_)));
    }

    #[tokio::test]
    async fn execute_times_out_slow_tools() {
        let registry = ToolRegistry::new();
        registry.register(ToolSpec::new(
            "slow",
            ToolCategory::Scanner,
            Risk::Safe,
            std::collections::HashSet::new(),
            Schema::empty(),
            Schema::empty(),
            Arc::new(|_: Value| async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(json!({}))
            }),
        ));

        let err = registry
            .execute("slow", json!({}), Duration::from_millis(5))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Timeout(_)));
    }

    #[test]
    fn registry_determinism_for_equal_inputs() {
        // Property 1 (spec §8.1): two executions of the same (tool, params)
        // over the same target yield equal normalized results modulo timestamps.
        let registry = ToolRegistry::new();
        registry.register(stub_scanner());
        let rt = tokio::runtime::Runtime::new().unwrap();
        let a = rt
            .block_on(registry.execute(
                "stub-scanner",
                json!({"target_path": "/tmp"}),
                Duration::from_secs(1),
            ))
            .unwrap();
        let b = rt
            .block_on(registry.execute(
                "stub-scanner",
                json!({"target_path": "/tmp"}),
                Duration::from_secs(1),
            ))
            .unwrap();
        assert_eq!(a.output, b.output);
    }
}
