//! Data types for a single normalized scanner observation (spec §3).

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stable, content-addressed identity of a finding across scans (spec §4.2).
///
/// Wrapped rather than a bare `String` so a raw rule id or file path
/// cannot accidentally be passed where a fingerprint is expected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(pub String);

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// A single normalized scanner observation (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    pub fingerprint: Fingerprint,
    pub rule_id: String,
    pub scanner: String,
    pub severity: Severity,
    pub confidence: Confidence,
    pub file: String,
    pub line: u32,
    pub column: Option<u32>,
    pub snippet: String,
    pub message: String,
    pub cwe: Option<String>,
    pub compliance_tags: HashSet<String>,
    pub fix_available: bool,
    pub metadata: Value,
}

/// Per-severity counts attached to a [`ScanResult`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanSummary {
    pub critical: u32,
    pub high: u32,
    pub medium: u32,
    pub low: u32,
    pub info: u32,
}

impl ScanSummary {
    #[must_use]
    pub fn from_findings(findings: &[Finding]) -> Self {
        let mut summary = Self::default();
        for finding in findings {
            match finding.severity {
                Severity::Critical => summary.critical += 1,
                Severity::High => summary.high += 1,
                Severity::Medium => summary.medium += 1,
                Severity::Low => summary.low += 1,
                Severity::Info => summary.info += 1,
            }
        }
        summary
    }
}

/// Result of one scanner execution (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub scan_id: String,
    pub scanner: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub target: String,
    pub findings: Vec<Finding>,
    pub summary: ScanSummary,
    pub raw_artifact_ref: String,
}

impl ScanResult {
    #[must_use]
    pub fn fingerprints(&self) -> HashSet<Fingerprint> {
        self.findings.iter().map(|f| f.fingerprint.clone()).collect()
    }
}
