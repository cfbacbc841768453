//! Severity-driven approval prompt and policy evaluation (spec §4.5).
//!
//! The gate itself is pure: it never performs I/O. Interaction (asking a
//! human) is delegated to an injected [`InteractionPort`] so the
//! orchestrator can swap a blocking terminal prompt for a CI annotation,
//! a Slack message, or (in tests) a canned answer -- blocking by default
//! behind a port, the same shape as the `alerts` trait seam used
//! elsewhere in this workspace for notification delivery.

use serde::{Deserialize, Serialize};

use crate::finding::Severity;
use crate::tool::Risk;

/// Verdict returned by the gate for one `(Finding, Pattern)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Approved,
    Denied,
    /// A human decision is required; `prompt` is the text to show them.
    NeedsInteraction { prompt: String },
}

/// Policy knobs consulted by the gate (spec §4.5).
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    /// Elevates Medium-risk fixers into the Approved bucket.
    pub auto_approve_safe: bool,
    /// Explicit per-run override that approves High/Critical risk without
    /// interaction (e.g. a CI job that has already been granted blanket
    /// approval for this run).
    pub override_high_risk: bool,
    /// Identity recorded against the verdict for audit purposes.
    pub approver: String,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            auto_approve_safe: false,
            override_high_risk: false,
            approver: "remedy-engine".to_string(),
        }
    }
}

/// Inputs the gate reasons about; deliberately narrower than the full
/// `Finding`/`Pattern` types so the gate can't reach for fields it has no
/// business inspecting.
#[derive(Debug, Clone)]
pub struct ApprovalRequest {
    pub finding_id: String,
    pub fingerprint: String,
    pub severity: Severity,
    pub risk: Risk,
    pub pattern_id: String,
}

/// Evaluate policy for one request (spec §4.5's default policy table).
#[must_use]
pub fn evaluate(request: &ApprovalRequest, policy: &PolicyConfig) -> Verdict {
    match request.risk {
        Risk::Safe | Risk::Low => Verdict::Approved,
        Risk::Medium => {
            if policy.auto_approve_safe {
                Verdict::Approved
            } else {
                Verdict::NeedsInteraction {
                    prompt: prompt_for(request),
                }
            }
        }
        Risk::High | Risk::Critical => {
            if policy.override_high_risk {
                Verdict::Approved
            } else {
                Verdict::NeedsInteraction {
                    prompt: prompt_for(request),
                }
            }
        }
    }
}

fn prompt_for(request: &ApprovalRequest) -> String {
    format!(
        "Apply pattern {} ({:?} risk) to finding {} ({:?} severity, fingerprint {})?",
        request.pattern_id, request.risk, request.finding_id, request.severity, request.fingerprint
    )
}

/// Injected side channel for turning a `NeedsInteraction` verdict into a
/// final approve/deny decision. Implementations may block on stdin, post
/// to a chat channel and poll, or (in tests) return a canned answer.
#[async_trait::async_trait]
pub trait InteractionPort: Send + Sync {
    async fn ask(&self, prompt: &str) -> bool;
}

/// A port that always answers the same way; used by the CLI's
/// `--yes`/`--no` flags and by tests.
pub struct FixedAnswer(pub bool);

#[async_trait::async_trait]
impl InteractionPort for FixedAnswer {
    async fn ask(&self, _prompt: &str) -> bool {
        self.0
    }
}

/// Resolve a [`Verdict`] to a final boolean, consulting `port` only when
/// the verdict is `NeedsInteraction`.
pub async fn resolve(verdict: Verdict, port: &dyn InteractionPort) -> bool {
    match verdict {
        Verdict::Approved => true,
        Verdict::Denied => false,
        Verdict::NeedsInteraction { prompt } => port.ask(&prompt).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(risk: Risk) -> ApprovalRequest {
        ApprovalRequest {
            finding_id: "f-1".to_string(),
            fingerprint: "abc123".to_string(),
            severity: Severity::High,
            risk,
            pattern_id: "B105@python".to_string(),
        }
    }

    #[test]
    fn safe_and_low_risk_are_approved_without_interaction() {
        let policy = PolicyConfig::default();
        assert_eq!(evaluate(&request(Risk::Safe), &policy), Verdict::Approved);
        assert_eq!(evaluate(&request(Risk::Low), &policy), Verdict::Approved);
    }

    #[test]
    fn medium_risk_needs_interaction_unless_auto_approve_safe() {
        let strict = PolicyConfig::default();
        assert!(matches!(
            evaluate(&request(Risk::Medium), &strict),
            Verdict::NeedsInteraction { .. }
        ));

        let lenient = PolicyConfig {
            auto_approve_safe: true,
            ..PolicyConfig::default()
        };
        assert_eq!(evaluate(&request(Risk::Medium), &lenient), Verdict::Approved);
    }

    #[test]
    fn high_and_critical_risk_need_interaction_by_default() {
        let policy = PolicyConfig::default();
        assert!(matches!(
            evaluate(&request(Risk::High), &policy),
            Verdict::NeedsInteraction { .. }
        ));
        assert!(matches!(
            evaluate(&request(Risk::Critical), &policy),
            Verdict::NeedsInteraction { .. }
        ));
    }

    #[test]
    fn explicit_override_approves_high_risk_without_interaction() {
        let policy = PolicyConfig {
            override_high_risk: true,
            ..PolicyConfig::default()
        };
        assert_eq!(evaluate(&request(Risk::Critical), &policy), Verdict::Approved);
    }

    #[tokio::test]
    async fn resolve_only_consults_the_port_when_interaction_is_needed() {
        let port = FixedAnswer(true);
        assert!(resolve(Verdict::Approved, &port).await);
        assert!(!resolve(Verdict::Denied, &FixedAnswer(false)).await);
        assert!(
            resolve(
                Verdict::NeedsInteraction {
                    prompt: "approve?".into()
                },
                &port
            )
            .await
        );
    }
}
