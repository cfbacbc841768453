//! Deterministic fallback used when the external decision engine fails
//! or times out (spec §4.7).
//!
//! Rule: findings whose `rule_id` has a pattern-store match with
//! `success_count >= 3` and `confidence_prior >= 0.7` are auto-fixable;
//! `High`/`Critical` severity findings with no such pattern need
//! approval; everything else needs a human.

use std::sync::Arc;

use crate::finding::{ScanResult, Severity};
use crate::pattern_store::PatternStore;
use crate::tool::ArtifactKind;

use super::{Decision, DecisionBridge, DecisionError, DecisionMode};

const MIN_SUCCESS_COUNT: u64 = 3;
const MIN_CONFIDENCE: f64 = 0.7;

/// The deterministic §4.7 fallback rule, resolved against the shared
/// pattern store.
pub struct FallbackBridge {
    patterns: Arc<PatternStore>,
    /// The artifact kind findings are assumed to target when consulting
    /// `lookup_by_rule`; callers with a richer artifact-detection step
    /// should prefer a real bridge and reserve this one for degraded mode.
    default_artifact_kind: ArtifactKind,
}

impl FallbackBridge {
    #[must_use]
    pub fn new(patterns: Arc<PatternStore>, default_artifact_kind: ArtifactKind) -> Self {
        Self {
            patterns,
            default_artifact_kind,
        }
    }

    fn has_qualifying_pattern(&self, rule_id: &str) -> bool {
        self.patterns
            .lookup_by_rule(rule_id, self.default_artifact_kind)
            .iter()
            .any(|p| p.success_count >= MIN_SUCCESS_COUNT && p.confidence_prior >= MIN_CONFIDENCE)
    }
}

#[async_trait::async_trait]
impl DecisionBridge for FallbackBridge {
    async fn analyze(&self, scan_results: &[ScanResult]) -> Result<Decision, DecisionError> {
        let mut auto_fixable = Vec::new();
        let mut needs_approval = Vec::new();
        let mut needs_human = Vec::new();

        for result in scan_results {
            for finding in &result.findings {
                if self.has_qualifying_pattern(&finding.rule_id) {
                    auto_fixable.push(finding.id.clone());
                } else if matches!(finding.severity, Severity::High | Severity::Critical) {
                    needs_approval.push(finding.id.clone());
                } else {
                    needs_human.push(finding.id.clone());
                }
            }
        }

        let mode = Decision::mode_for(&auto_fixable, &needs_approval);

        Ok(Decision {
            mode,
            auto_fixable,
            needs_approval,
            needs_human,
            rationale: "fallback rule: learned pattern confidence or severity threshold"
                .to_string(),
            confidence: 0.5,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::{Confidence, Finding, Fingerprint, ScanSummary};
    use chrono::Utc;
    use serde_json::Value;

    fn finding(id: &str, rule_id: &str, severity: Severity) -> Finding {
        Finding {
            id: id.to_string(),
            fingerprint: Fingerprint(format!("fp-{id}")),
            rule_id: rule_id.to_string(),
            scanner: "bandit".to_string(),
            severity,
            confidence: Confidence::High,
            file: "app.py".to_string(),
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

    fn scan_result(findings: Vec<Finding>) -> ScanResult {
        ScanResult {
            scan_id: "s-1".to_string(),
            scanner: "bandit".to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            target: "/tmp".to_string(),
            summary: ScanSummary::from_findings(&findings),
            findings,
            raw_artifact_ref: "bandit_latest.json".to_string(),
        }
    }

    #[tokio::test]
    async fn high_severity_without_a_learned_pattern_needs_approval() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(PatternStore::open(dir.path().join("patterns.log")).unwrap());
        let bridge = FallbackBridge::new(store, ArtifactKind::PythonSource);

        let decision = bridge
            .analyze(&[scan_result(vec![finding("f1", "B105", Severity::High)])])
            .await
            .unwrap();

        assert_eq!(decision.needs_approval, vec!["f1".to_string()]);
        assert!(decision.auto_fixable.is_empty());
    }

    #[tokio::test]
    async fn low_severity_without_a_learned_pattern_needs_a_human() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(PatternStore::open(dir.path().join("patterns.log")).unwrap());
        let bridge = FallbackBridge::new(store, ArtifactKind::PythonSource);

        let decision = bridge
            .analyze(&[scan_result(vec![finding("f1", "B105", Severity::Low)])])
            .await
            .unwrap();

        assert_eq!(decision.needs_human, vec!["f1".to_string()]);
    }

    #[tokio::test]
    async fn a_well_proven_pattern_makes_the_finding_auto_fixable() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(PatternStore::open(dir.path().join("patterns.log")).unwrap());
        for i in 0..3 {
            store
                .record_success(
                    &Fingerprint(format!("seed-{i}")),
                    "B105@python",
                    "B105",
                    ArtifactKind::PythonSource,
                    "diff",
                )
                .unwrap();
        }
        let bridge = FallbackBridge::new(store, ArtifactKind::PythonSource);

        let decision = bridge
            .analyze(&[scan_result(vec![finding("f1", "B105", Severity::High)])])
            .await
            .unwrap();

        assert_eq!(decision.auto_fixable, vec!["f1".to_string()]);
        assert_eq!(decision.mode, DecisionMode::FixAuto);
    }
}
