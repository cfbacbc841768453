//! Append-only log of successful/failed fix patterns plus a derived,
//! in-memory index (spec §4.8).
//!
//! The log is the source of truth; the index is rebuilt from it at
//! startup and maintained in-memory during a run, then flushed after
//! each workflow (spec: "mid-run updates are maintained in-memory and
//! flushed after each workflow"). All writes go through
//! [`PatternStore`]'s single serializing gateway (an internal mutex) so
//! concurrent workflows queue rather than race; reads hit the in-memory
//! index lock-free relative to other readers.

mod posterior;

pub use posterior::posterior_mean;

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::finding::Fingerprint;
use crate::tool::ArtifactKind;

#[derive(Debug, Error)]
pub enum PatternStoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed pattern log line: {0}")]
    MalformedLine(String),
}

/// A reusable remediation template (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub pattern_id: String,
    pub rule_id: String,
    pub artifact_kind: ArtifactKind,
    pub confidence_prior: f64,
    pub success_count: u64,
    pub failure_count: u64,
    pub last_used_at: Option<DateTime<Utc>>,
    /// Fingerprints this exact pattern has already fixed; a direct
    /// `lookup(fingerprint)` hit is the highest-priority selection path
    /// (spec §4.4 step 2(i), observable in the audit log as
    /// `pattern_source=store`, spec S6).
    pub known_fingerprints: Vec<Fingerprint>,
}

impl Pattern {
    fn matches_fingerprint(&self, fingerprint: &Fingerprint) -> bool {
        self.known_fingerprints.contains(fingerprint)
    }
}

/// One line of the append-only pattern log (spec §6 wire format).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum PatternEvent {
    #[serde(rename = "success")]
    Success {
        timestamp: DateTime<Utc>,
        pattern_id: String,
        rule_id: String,
        artifact_kind: ArtifactKind,
        fingerprint: Fingerprint,
        #[serde(default)]
        diff: String,
    },
    #[serde(rename = "failure")]
    Failure {
        timestamp: DateTime<Utc>,
        pattern_id: String,
        rule_id: String,
        artifact_kind: ArtifactKind,
        fingerprint: Fingerprint,
        reason: String,
    },
}

struct Index {
    by_fingerprint: HashMap<Fingerprint, String>,
    by_pattern_id: HashMap<String, Pattern>,
}

impl Index {
    fn new() -> Self {
        Self {
            by_fingerprint: HashMap::new(),
            by_pattern_id: HashMap::new(),
        }
    }

    fn apply(&mut self, event: &PatternEvent) {
        match event {
            PatternEvent::Success {
                pattern_id,
                rule_id,
                artifact_kind,
                fingerprint,
                timestamp,
                ..
            } => {
                let pattern = self
                    .by_pattern_id
                    .entry(pattern_id.clone())
                    .or_insert_with(|| Pattern {
                        pattern_id: pattern_id.clone(),
                        rule_id: rule_id.clone(),
                        artifact_kind: *artifact_kind,
                        confidence_prior: 0.5,
                        success_count: 0,
                        failure_count: 0,
                        last_used_at: None,
                        known_fingerprints: Vec::new(),
                    });
                pattern.success_count += 1;
                pattern.last_used_at = Some(*timestamp);
                if !pattern.known_fingerprints.contains(fingerprint) {
                    pattern.known_fingerprints.push(fingerprint.clone());
                }
                pattern.confidence_prior =
                    posterior_mean(pattern.success_count, pattern.failure_count);
                self.by_fingerprint
                    .insert(fingerprint.clone(), pattern_id.clone());
            }
            PatternEvent::Failure {
                pattern_id,
                rule_id,
                artifact_kind,
                timestamp,
                ..
            } => {
                let pattern = self
                    .by_pattern_id
                    .entry(pattern_id.clone())
                    .or_insert_with(|| Pattern {
                        pattern_id: pattern_id.clone(),
                        rule_id: rule_id.clone(),
                        artifact_kind: *artifact_kind,
                        confidence_prior: 0.5,
                        success_count: 0,
                        failure_count: 0,
                        last_used_at: None,
                        known_fingerprints: Vec::new(),
                    });
                pattern.failure_count += 1;
                pattern.last_used_at = Some(*timestamp);
                pattern.confidence_prior =
                    posterior_mean(pattern.success_count, pattern.failure_count);
            }
        }
    }
}

/// Process-wide pattern store: append-only `.log` file plus the derived
/// index, guarded by a single mutex (spec §4.8, §5 "single serializing
/// gateway").
pub struct PatternStore {
    log_path: PathBuf,
    index: Mutex<Index>,
}

impl PatternStore {
    /// Open (or create) the pattern log at `log_path` and rebuild the
    /// in-memory index by replaying it from the start.
    pub fn open(log_path: impl Into<PathBuf>) -> Result<Self, PatternStoreError> {
        let log_path = log_path.into();
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        let mut index = Index::new();
        if let Ok(file) = std::fs::File::open(&log_path) {
            let reader = std::io::BufReader::new(file);
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let event: PatternEvent = serde_json::from_str(&line)
                    .map_err(|e| PatternStoreError::MalformedLine(e.to_string()))?;
                index.apply(&event);
            }
        }

        Ok(Self {
            log_path,
            index: Mutex::new(index),
        })
    }

    fn append(&self, event: &PatternEvent) -> Result<(), PatternStoreError> {
        let mut line = serde_json::to_string(event)
            .map_err(|e| PatternStoreError::MalformedLine(e.to_string()))?;
        line.push('\n');

        let mut file = OpenOptions::new().append(true).open(&self.log_path)?;
        file.write_all(line.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }

    /// Record a verified fix as a success event, updating the in-memory
    /// index and appending to the log under the single write gateway
    /// (spec §4.8, §5 "mutation through a single serializing gateway").
    pub fn record_success(
        &self,
        fingerprint: &Fingerprint,
        pattern_id: &str,
        rule_id: &str,
        artifact_kind: ArtifactKind,
        diff: &str,
    ) -> Result<(), PatternStoreError> {
        let event = PatternEvent::Success {
            timestamp: Utc::now(),
            pattern_id: pattern_id.to_string(),
            rule_id: rule_id.to_string(),
            artifact_kind,
            fingerprint: fingerprint.clone(),
            diff: diff.to_string(),
        };
        let mut index = self.index.lock().expect("pattern store lock poisoned");
        self.append(&event)?;
        index.apply(&event);
        Ok(())
    }

    /// Record a fix attempt that failed verification or application.
    pub fn record_failure(
        &self,
        fingerprint: &Fingerprint,
        pattern_id: &str,
        rule_id: &str,
        artifact_kind: ArtifactKind,
        reason: &str,
    ) -> Result<(), PatternStoreError> {
        let event = PatternEvent::Failure {
            timestamp: Utc::now(),
            pattern_id: pattern_id.to_string(),
            rule_id: rule_id.to_string(),
            artifact_kind,
            fingerprint: fingerprint.clone(),
            reason: reason.to_string(),
        };
        let mut index = self.index.lock().expect("pattern store lock poisoned");
        self.append(&event)?;
        index.apply(&event);
        Ok(())
    }

    /// Direct fingerprint match: the highest-priority pattern selection
    /// path (spec §4.4 step 2(i)).
    #[must_use]
    pub fn lookup(&self, fingerprint: &Fingerprint) -> Option<Pattern> {
        let index = self.index.lock().expect("pattern store lock poisoned");
        let pattern_id = index.by_fingerprint.get(fingerprint)?;
        index.by_pattern_id.get(pattern_id).cloned()
    }

    /// `rule_id + artifact_kind` match, used when no exact fingerprint
    /// match exists (spec §4.4 step 2(ii)). Ties broken by descending
    /// confidence then lexicographic `pattern_id` (spec §4.4 tie-break).
    #[must_use]
    pub fn lookup_by_rule(&self, rule_id: &str, artifact_kind: ArtifactKind) -> Vec<Pattern> {
        let index = self.index.lock().expect("pattern store lock poisoned");
        let mut matches: Vec<Pattern> = index
            .by_pattern_id
            .values()
            .filter(|p| p.rule_id == rule_id && p.artifact_kind == artifact_kind)
            .cloned()
            .collect();
        matches.sort_by(|a, b| {
            b.confidence_prior
                .partial_cmp(&a.confidence_prior)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.pattern_id.cmp(&b.pattern_id))
        });
        matches
    }

    /// Used by property tests (spec §8.7): `success_count` must never
    /// decrease for a given pattern across the log's lifetime.
    #[must_use]
    pub fn success_count(&self, pattern_id: &str) -> u64 {
        self.index
            .lock()
            .expect("pattern store lock poisoned")
            .by_pattern_id
            .get(pattern_id)
            .map_or(0, |p| p.success_count)
    }

    #[must_use]
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }
}
