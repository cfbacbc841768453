//! Pattern-matched, language-aware edits (spec §4.4).
//!
//! The engine resolves an artifact kind per finding, selects a pattern
//! (learned pattern-store hit, rule+artifact built-in, or skip),
//! batches same-file edits in descending-line order, applies the
//! artifact-appropriate editor, validates the result, and -- where the
//! artifact kind supports comments -- leaves a provenance comment next
//! to the change.

mod builtin;
mod hcl;
mod manifest;
mod python;
mod text;

pub use builtin::{builtin_pattern_for, BuiltinPattern, ResolvedBuiltinPattern};

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::backup::{BackupDir, LeaseError};
use crate::finding::{Finding, Fingerprint};
use crate::pattern_store::{Pattern, PatternStore};
use crate::tool::ArtifactKind;

#[derive(Debug, Error)]
pub enum FixError {
    #[error("lease error: {0}")]
    Lease(#[from] LeaseError),

    #[error("fix produced invalid syntax in {file}: {reason}")]
    SyntaxInvalid { file: String, reason: String },

    #[error("validator rejected fix in {file}: {reason}")]
    ValidatorRejected { file: String, reason: String },

    #[error("no pattern available for rule {0}")]
    NoPattern(String),
}

impl From<FixError> for LeaseError {
    fn from(err: FixError) -> Self {
        match err {
            FixError::Lease(e) => e,
            other => LeaseError::Io {
                path: String::new(),
                source: std::io::Error::other(other.to_string()),
            },
        }
    }
}

/// Outcome of applying (or declining to apply) a pattern to one finding
/// (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FixStatus {
    Applied,
    Skipped,
    Failed,
    RolledBack,
}

/// Why a finding was skipped rather than attempted (spec §4.4).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    NoPatternAvailable,
    Conflict,
    NoOp,
}

/// One applied edit (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixAttempt {
    pub finding_ref: Fingerprint,
    pub pattern_id: Option<String>,
    /// The finding's own `rule_id` (e.g. `B105`), carried alongside
    /// `pattern_id` so the Learn phase can record a [`Pattern`] keyed by
    /// the rule the matcher actually targets rather than having to parse
    /// it back out of a pattern slug like `env-varify@python`.
    pub rule_id: String,
    pub file: String,
    pub before_hash: String,
    pub after_hash: String,
    pub status: FixStatus,
    pub skip_reason: Option<SkipReason>,
    pub diff: String,
    pub verified: bool,
    pub backup_ref: Option<String>,
}

/// Resolve the artifact kind for a finding from its file extension
/// (spec §4.4 step 1).
#[must_use]
pub fn resolve_artifact_kind(file: &str) -> ArtifactKind {
    let path = Path::new(file);
    match path.extension().and_then(|e| e.to_str()) {
        Some("py") => ArtifactKind::PythonSource,
        Some("tf") | Some("tfvars") => ArtifactKind::Hcl,
        Some("yaml" | "yml") => ArtifactKind::K8sYaml,
        Some("json") => ArtifactKind::JsonManifest,
        _ => ArtifactKind::FreeText,
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// A selected pattern plus where it came from, used for audit lines
/// (spec S6: `pattern_source=store`) and for the tie-break rule (spec
/// §4.4: "equal confidence -> prefer built-in patterns over learned
/// ones; equal further -> lexicographic pattern_id").
enum Selection {
    Store(Pattern),
    Builtin(ResolvedBuiltinPattern),
}

impl Selection {
    fn pattern_id(&self) -> String {
        match self {
            Self::Store(p) => p.pattern_id.clone(),
            Self::Builtin(p) => p.kind.pattern_id().to_string(),
        }
    }

    fn confidence(&self) -> f64 {
        match self {
            Self::Store(p) => p.confidence_prior,
            Self::Builtin(p) => p.confidence_prior,
        }
    }

    fn source(&self) -> &'static str {
        match self {
            Self::Store(_) => "store",
            Self::Builtin(_) => "builtin",
        }
    }
}

fn select_pattern(
    finding: &Finding,
    artifact_kind: ArtifactKind,
    patterns: &PatternStore,
) -> Option<Selection> {
    if let Some(pattern) = patterns.lookup(&finding.fingerprint) {
        return Some(Selection::Store(pattern));
    }
    let by_rule = patterns.lookup_by_rule(&finding.rule_id, artifact_kind);
    let builtin = builtin_pattern_for(&finding.rule_id, artifact_kind);

    match (by_rule.into_iter().next(), builtin) {
        (Some(stored), Some(builtin)) => {
            // Tie-break: equal confidence prefers the built-in (deterministic).
            if builtin.confidence_prior >= stored.confidence_prior {
                Some(Selection::Builtin(builtin))
            } else {
                Some(Selection::Store(stored))
            }
        }
        (Some(stored), None) => Some(Selection::Store(stored)),
        (None, Some(builtin)) => Some(Selection::Builtin(builtin)),
        (None, None) => None,
    }
}

/// A finding's edit target, used to detect overlapping-span conflicts
/// within one file (spec §4.4: "two patterns that target overlapping
/// spans conflict").
fn span_for(finding: &Finding) -> (u32, u32) {
    let start = finding.line.saturating_sub(1);
    let end = finding.line + 1;
    (start, end)
}

fn spans_overlap(a: (u32, u32), b: (u32, u32)) -> bool {
    a.0 <= b.1 && b.0 <= a.1
}

/// Applies built-in/learned patterns to a set of findings inside one
/// workflow's file lease (spec §4.4).
pub struct FixPatternEngine<'a> {
    patterns: &'a PatternStore,
}

impl<'a> FixPatternEngine<'a> {
    #[must_use]
    pub fn new(patterns: &'a PatternStore) -> Self {
        Self { patterns }
    }

    /// Apply fixes for `findings`, batching same-file edits and applying
    /// them to `file_contents` (already-read file text keyed by path, so
    /// the engine never touches disk itself -- the caller is responsible
    /// for writing the result through the workflow's file lease and
    /// handling rollback on [`FixError`]).
    ///
    /// Returns one [`FixAttempt`] per input finding plus the final file
    /// text for every file that received at least one `Applied` edit.
    #[must_use]
    pub fn plan(
        &self,
        findings: &[Finding],
        file_contents: &HashMap<String, String>,
    ) -> (Vec<FixAttempt>, HashMap<String, String>) {
        let mut by_file: HashMap<String, Vec<&Finding>> = HashMap::new();
        for finding in findings {
            by_file.entry(finding.file.clone()).or_default().push(finding);
        }

        let mut attempts = Vec::new();
        let mut rewritten_files = HashMap::new();

        for (file, mut file_findings) in by_file {
            // Descending line order within a file avoids position drift
            // from earlier edits shifting later line numbers (spec §4.4,
            // §5 ordering).
            file_findings.sort_by(|a, b| b.line.cmp(&a.line));

            let Some(original_text) = file_contents.get(&file) else {
                for finding in &file_findings {
                    attempts.push(skipped(finding, SkipReason::NoPatternAvailable));
                }
                continue;
            };

            let artifact_kind = resolve_artifact_kind(&file);
            let mut current_text = original_text.clone();
            let mut applied_spans: Vec<(u32, u32)> = Vec::new();
            let mut any_applied = false;

            for finding in file_findings {
                let span = span_for(finding);
                if applied_spans.iter().any(|s| spans_overlap(*s, span)) {
                    attempts.push(skipped(finding, SkipReason::Conflict));
                    continue;
                }

                let Some(selection) = select_pattern(finding, artifact_kind, self.patterns) else {
                    attempts.push(skipped(finding, SkipReason::NoPatternAvailable));
                    continue;
                };

                match apply_one(artifact_kind, finding, &selection, &current_text) {
                    Ok(ApplyOutcome::Changed(new_text)) => {
                        let before_hash = sha256_hex(current_text.as_bytes());
                        let after_hash = sha256_hex(new_text.as_bytes());
                        info!(
                            finding = %finding.fingerprint,
                            pattern = %selection.pattern_id(),
                            pattern_source = selection.source(),
                            "applied fix"
                        );
                        attempts.push(FixAttempt {
                            finding_ref: finding.fingerprint.clone(),
                            pattern_id: Some(selection.pattern_id()),
                            rule_id: finding.rule_id.clone(),
                            file: file.clone(),
                            before_hash,
                            after_hash,
                            status: FixStatus::Applied,
                            skip_reason: None,
                            diff: diff_summary(&current_text, &new_text),
                            verified: false,
                            backup_ref: None,
                        });
                        applied_spans.push(span);
                        any_applied = true;
                        current_text = new_text;
                    }
                    Ok(ApplyOutcome::NoOp) => {
                        attempts.push(skipped(finding, SkipReason::NoOp));
                    }
                    Err(err) => {
                        warn!(finding = %finding.fingerprint, error = %err, "fix application failed");
                        if let Err(store_err) = self.patterns.record_failure(
                            &finding.fingerprint,
                            &selection.pattern_id(),
                            &finding.rule_id,
                            artifact_kind,
                            &err.to_string(),
                        ) {
                            warn!(error = %store_err, "failed to record pattern failure");
                        }
                        attempts.push(FixAttempt {
                            finding_ref: finding.fingerprint.clone(),
                            pattern_id: Some(selection.pattern_id()),
                            rule_id: finding.rule_id.clone(),
                            file: file.clone(),
                            before_hash: sha256_hex(current_text.as_bytes()),
                            after_hash: sha256_hex(current_text.as_bytes()),
                            status: FixStatus::Failed,
                            skip_reason: None,
                            diff: String::new(),
                            verified: false,
                            backup_ref: None,
                        });
                    }
                }
            }

            if any_applied {
                rewritten_files.insert(file, current_text);
            }
        }

        (attempts, rewritten_files)
    }
}

fn skipped(finding: &Finding, reason: SkipReason) -> FixAttempt {
    FixAttempt {
        finding_ref: finding.fingerprint.clone(),
        pattern_id: None,
        rule_id: finding.rule_id.clone(),
        file: finding.file.clone(),
        before_hash: String::new(),
        after_hash: String::new(),
        status: FixStatus::Skipped,
        skip_reason: Some(reason),
        diff: String::new(),
        verified: false,
        backup_ref: None,
    }
}

enum ApplyOutcome {
    Changed(String),
    NoOp,
}

fn apply_one(
    artifact_kind: ArtifactKind,
    finding: &Finding,
    selection: &Selection,
    text: &str,
) -> Result<ApplyOutcome, FixError> {
    let resolved = match selection {
        Selection::Builtin(b) => Some(*b),
        Selection::Store(p) => builtin_pattern_for(&p.rule_id, artifact_kind),
    };

    let Some(resolved) = resolved else {
        // A learned pattern with no matching built-in transform behind it
        // cannot be mechanically replayed; treat as no-op rather than a
        // hard failure (nothing was attempted).
        return Ok(ApplyOutcome::NoOp);
    };
    let builtin = resolved.kind;

    let new_text = match artifact_kind {
        ArtifactKind::PythonSource => python::apply(builtin, finding, text)?,
        ArtifactKind::Hcl => hcl::apply(builtin, finding, text)?,
        ArtifactKind::K8sYaml | ArtifactKind::JsonManifest => {
            manifest::apply(builtin, finding, text, artifact_kind)?
        }
        ArtifactKind::FreeText => text::apply(builtin, finding, text)?,
    };

    if new_text == text {
        Ok(ApplyOutcome::NoOp)
    } else {
        Ok(ApplyOutcome::Changed(new_text))
    }
}

fn diff_summary(before: &str, after: &str) -> String {
    let before_lines = before.lines().count();
    let after_lines = after.lines().count();
    format!("{before_lines} lines -> {after_lines} lines")
}
