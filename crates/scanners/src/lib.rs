//! Concrete [`remedy_core::tool::ToolSpec`] adapters for the scanner
//! binaries the core treats as external collaborators (spec §1, §6):
//! Bandit, Semgrep, Checkov, tfsec, Trivy, Gitleaks, OPA, kube-bench.
//! Each adapter shells out to its binary (via [`exec::run_json_tool`]),
//! maps native output into the registry's `{findings[]}` wire shape, and
//! exposes its own severity table for the normalizer.
//!
//! Registering a new scanner means adding a module here and calling
//! `registry.register(new_scanner::tool_spec())` in [`register_all`] --
//! no core code changes (spec §4.9: "adding a new scanner means
//! registering a new ToolSpec").

pub mod bandit;
pub mod checkov;
pub mod exec;
pub mod gitleaks;
pub mod kube_bench;
pub mod opa;
pub mod semgrep;
pub mod tfsec;
pub mod trivy;

use remedy_core::finding::Normalizer;
use remedy_core::tool::ToolRegistry;

/// Register every built-in scanner adapter into `registry`.
pub fn register_all(registry: &ToolRegistry) {
    registry.register(bandit::tool_spec());
    registry.register(semgrep::tool_spec());
    registry.register(checkov::tool_spec());
    registry.register(tfsec::tool_spec());
    registry.register(trivy::tool_spec());
    registry.register(gitleaks::tool_spec());
    registry.register(opa::tool_spec());
    registry.register(kube_bench::tool_spec());
}

/// Build a [`Normalizer`] with every built-in scanner's severity table
/// pre-registered, so a caller only has to layer its own compliance map
/// (if any) on top.
#[must_use]
pub fn normalizer_with_builtin_tables() -> Normalizer {
    Normalizer::new()
        .with_severity_table("bandit", bandit::severity_table())
        .with_severity_table("semgrep", semgrep::severity_table())
        .with_severity_table("checkov", checkov::severity_table())
        .with_severity_table("tfsec", tfsec::severity_table())
        .with_severity_table("trivy", trivy::severity_table())
        .with_severity_table("gitleaks", gitleaks::severity_table())
        .with_severity_table("opa", opa::severity_table())
        .with_severity_table("kube-bench", kube_bench::severity_table())
}
