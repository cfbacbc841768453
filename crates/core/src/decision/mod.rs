//! Adapter between the orchestrator and an external LLM reasoning engine
//! (spec §4.7).
//!
//! The core does not specify how a decision engine reaches its verdict;
//! it specifies the contract and a deterministic fallback so the kernel
//! is runnable with nothing configured.

mod fallback;
mod http;

pub use fallback::FallbackBridge;
pub use http::HttpDecisionBridge;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::finding::{Finding, ScanResult};

/// The decision bridge's verdict for a finding set (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub mode: DecisionMode,
    pub auto_fixable: Vec<String>,
    pub needs_approval: Vec<String>,
    pub needs_human: Vec<String>,
    pub rationale: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionMode {
    FixAuto,
    FixWithApproval,
    ReportOnly,
}

impl Decision {
    /// Derive the aggregate `mode` a [`Decision`] should report once the
    /// three finding-id buckets are known: auto-fixable findings
    /// dominate (`FixAuto`); anything left needing approval still routes
    /// through `Fix` (`FixWithApproval`); otherwise there is nothing to
    /// do but report.
    #[must_use]
    pub fn mode_for(auto_fixable: &[String], needs_approval: &[String]) -> DecisionMode {
        if !auto_fixable.is_empty() && needs_approval.is_empty() {
            DecisionMode::FixAuto
        } else if !auto_fixable.is_empty() || !needs_approval.is_empty() {
            DecisionMode::FixWithApproval
        } else {
            DecisionMode::ReportOnly
        }
    }
}

#[derive(Debug, Error)]
pub enum DecisionError {
    #[error("decision bridge timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("decision bridge transport error: {0}")]
    Transport(String),

    #[error("decision bridge returned a malformed response: {0}")]
    MalformedResponse(String),
}

/// Contract every decision engine adapter must satisfy (spec §4.7): must
/// return within a bounded time, must categorize every finding exactly
/// once, and must be idempotent for equal inputs.
#[async_trait::async_trait]
pub trait DecisionBridge: Send + Sync {
    async fn analyze(&self, scan_results: &[ScanResult]) -> Result<Decision, DecisionError>;
}

/// Partition `findings` across the three buckets, returning an error if
/// a caller-supplied classifier leaves any finding unclassified or
/// double-classified. Used by adapters to validate their own output
/// against the "categorize every finding exactly once" contract clause.
pub fn validate_partition(
    findings: &[Finding],
    auto_fixable: &[String],
    needs_approval: &[String],
    needs_human: &[String],
) -> Result<(), DecisionError> {
    use std::collections::HashSet;

    let all_ids: HashSet<&str> = findings.iter().map(|f| f.id.as_str()).collect();
    let mut seen: HashSet<&str> = HashSet::new();

    for bucket in [auto_fixable, needs_approval, needs_human] {
        for id in bucket {
            if !all_ids.contains(id.as_str()) {
                return Err(DecisionError::MalformedResponse(format!(
                    "decision references unknown finding id {id}"
                )));
            }
            if !seen.insert(id.as_str()) {
                return Err(DecisionError::MalformedResponse(format!(
                    "finding id {id} classified more than once"
                )));
            }
        }
    }

    if seen.len() != all_ids.len() {
        return Err(DecisionError::MalformedResponse(
            "not every finding was classified".to_string(),
        ));
    }

    Ok(())
}
