//! Before/after scan diff and effectiveness scoring (spec §4.9).

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::finding::{Fingerprint, ScanResult};
use crate::fix::{FixAttempt, FixStatus};

/// Result of comparing a before-scan and after-scan fingerprint set
/// against the fingerprints a workflow's fix attempts targeted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub effectiveness: f64,
    pub fixed: Vec<Fingerprint>,
    pub regressions: Vec<Fingerprint>,
}

/// Compute `effectiveness = |fixed| / |targeted|` and the regression set
/// (findings present after but absent before) for one workflow (spec
/// §4.9). `targeted` is every fingerprint referenced by an `Applied`
/// [`FixAttempt`]; findings not targeted by any fix never affect the
/// score either way.
#[must_use]
pub fn compare(
    before: &[ScanResult],
    after: &[ScanResult],
    fix_attempts: &[FixAttempt],
) -> VerificationReport {
    let before_fps: HashSet<Fingerprint> = before.iter().flat_map(ScanResult::fingerprints).collect();
    let after_fps: HashSet<Fingerprint> = after.iter().flat_map(ScanResult::fingerprints).collect();

    let targeted: Vec<Fingerprint> = fix_attempts
        .iter()
        .filter(|a| a.status == FixStatus::Applied)
        .map(|a| a.finding_ref.clone())
        .collect();

    let fixed: Vec<Fingerprint> = targeted
        .iter()
        .filter(|fp| !after_fps.contains(*fp))
        .cloned()
        .collect();

    let regressions: Vec<Fingerprint> = after_fps
        .difference(&before_fps)
        .cloned()
        .collect();

    let effectiveness = if targeted.is_empty() {
        0.0
    } else {
        fixed.len() as f64 / targeted.len() as f64
    };

    VerificationReport {
        effectiveness,
        fixed,
        regressions,
    }
}

/// A regression in `report` falls in the same file as `attempt`,
/// meaning [`crate::orchestrator`] must not record `attempt`'s pattern
/// as a success for its finding (spec §8.10, §4.9).
#[must_use]
pub fn regression_in_same_file(
    report: &VerificationReport,
    attempt: &FixAttempt,
    after: &[ScanResult],
) -> bool {
    if report.regressions.is_empty() {
        return false;
    }
    let regression_set: HashSet<&Fingerprint> = report.regressions.iter().collect();
    after
        .iter()
        .flat_map(|r| r.findings.iter())
        .any(|f| regression_set.contains(&f.fingerprint) && f.file == attempt.file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::{Confidence, Finding, ScanSummary, Severity};
    use chrono::Utc;
    use serde_json::Value;

    fn finding(id: &str, fp: &str, file: &str) -> Finding {
        Finding {
            id: id.to_string(),
            fingerprint: Fingerprint(fp.to_string()),
            rule_id: "B105".to_string(),
            scanner: "bandit".to_string(),
            severity: Severity::High,
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

    fn scan(findings: Vec<Finding>) -> ScanResult {
        ScanResult {
            scan_id: "s1".to_string(),
            scanner: "bandit".to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            target: "/tmp".to_string(),
            summary: ScanSummary::from_findings(&findings),
            findings,
            raw_artifact_ref: "bandit_latest.json".to_string(),
        }
    }

    fn applied_attempt(fp: &str, file: &str) -> FixAttempt {
        FixAttempt {
            finding_ref: Fingerprint(fp.to_string()),
            pattern_id: Some("env-varify@python".to_string()),
            rule_id: "B105".to_string(),
            file: file.to_string(),
            before_hash: "a".to_string(),
            after_hash: "b".to_string(),
            status: FixStatus::Applied,
            skip_reason: None,
            diff: String::new(),
            verified: false,
            backup_ref: Some("backup".to_string()),
        }
    }

    #[test]
    fn fully_fixed_findings_yield_effectiveness_one() {
        let before = vec![scan(vec![finding("f1", "fp-1", "app.py")])];
        let after = vec![scan(vec![])];
        let attempts = vec![applied_attempt("fp-1", "app.py")];

        let report = compare(&before, &after, &attempts);
        assert!((report.effectiveness - 1.0).abs() < f64::EPSILON);
        assert_eq!(report.fixed, vec![Fingerprint("fp-1".to_string())]);
        assert!(report.regressions.is_empty());
    }

    #[test]
    fn a_new_after_scan_finding_is_a_regression() {
        let before = vec![scan(vec![finding("f1", "fp-1", "app.py")])];
        let after = vec![scan(vec![finding("f2", "fp-2", "app.py")])];
        let attempts = vec![applied_attempt("fp-1", "app.py")];

        let report = compare(&before, &after, &attempts);
        assert_eq!(report.regressions, vec![Fingerprint("fp-2".to_string())]);
    }

    #[test]
    fn regression_in_same_file_blocks_learning_for_that_attempt() {
        let after = vec![scan(vec![finding("f2", "fp-2", "app.py")])];
        let report = VerificationReport {
            effectiveness: 1.0,
            fixed: vec![Fingerprint("fp-1".to_string())],
            regressions: vec![Fingerprint("fp-2".to_string())],
        };
        let attempt = applied_attempt("fp-1", "app.py");

        assert!(regression_in_same_file(&report, &attempt, &after));
    }

    #[test]
    fn no_targeted_fixes_yield_zero_effectiveness_rather_than_dividing_by_zero() {
        let report = compare(&[], &[], &[]);
        assert_eq!(report.effectiveness, 0.0);
    }
}
