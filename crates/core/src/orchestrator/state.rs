//! The orchestrator's per-run object (spec §3).

use serde::{Deserialize, Serialize};

use crate::decision::Decision;
use crate::finding::ScanResult;
use crate::fix::FixAttempt;

use super::Phase;

/// One end-to-end scan/analyze/decide/fix/verify/learn/report run for a
/// target path (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    pub workflow_id: String,
    pub task: String,
    pub target_path: String,
    pub phase: Phase,
    pub scan_results_before: Vec<ScanResult>,
    pub decision: Option<Decision>,
    pub fix_attempts: Vec<FixAttempt>,
    pub scan_results_after: Vec<ScanResult>,
    pub effectiveness: Option<f64>,
    pub errors: Vec<String>,
}

impl WorkflowState {
    #[must_use]
    pub fn new(workflow_id: impl Into<String>, task: impl Into<String>, target_path: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            task: task.into(),
            target_path: target_path.into(),
            phase: Phase::Scan,
            scan_results_before: Vec::new(),
            decision: None,
            fix_attempts: Vec::new(),
            scan_results_after: Vec::new(),
            effectiveness: None,
            errors: Vec::new(),
        }
    }

    pub fn push_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    /// Exit code classification (spec §6 CLI surface).
    #[must_use]
    pub fn exit_code(&self, effectiveness_target: f64) -> i32 {
        match self.phase {
            Phase::Done => {
                if self.effectiveness.unwrap_or(0.0) >= effectiveness_target {
                    0
                } else {
                    1
                }
            }
            Phase::Aborted => {
                if self
                    .errors
                    .iter()
                    .any(|e| e.contains("RestoreFailed") || e.contains("UnrecoverableRestoreFailure"))
                {
                    3
                } else {
                    2
                }
            }
            _ => 2,
        }
    }
}
