//! Thin HTTP adapter to an external decision engine (spec §4.7, §1 --
//! the LLM reasoning engine itself is an out-of-scope collaborator).
//!
//! Built in the same `reqwest`-based HTTP client style used elsewhere in
//! this workspace for talking to external services (its GitHub/Linear
//! clients); this
//! adapter is deliberately dumb -- it posts the scan results as JSON and
//! deserializes a [`Decision`], applying the bridge's own bounded-time
//! contract via `reqwest`'s request timeout.

use std::time::Duration;

use serde_json::json;

use crate::finding::ScanResult;

use super::{validate_partition, Decision, DecisionBridge, DecisionError};

/// Calls a configured HTTP endpoint that wraps the external decision
/// engine. The endpoint contract is `POST {endpoint}` with body
/// `{"scan_results": [...]}`, returning a [`Decision`] JSON document.
pub struct HttpDecisionBridge {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpDecisionBridge {
    /// # Panics
    ///
    /// Panics if the underlying `reqwest` client cannot be built (e.g.
    /// TLS backend initialization failure), matching `reqwest::Client::new`'s
    /// own panicking constructor.
    #[must_use]
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build decision bridge HTTP client");
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait::async_trait]
impl DecisionBridge for HttpDecisionBridge {
    async fn analyze(&self, scan_results: &[ScanResult]) -> Result<Decision, DecisionError> {
        let body = json!({ "scan_results": scan_results });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DecisionError::Timeout(Duration::default())
                } else {
                    DecisionError::Transport(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(DecisionError::Transport(format!(
                "decision engine returned HTTP {}",
                response.status()
            )));
        }

        let decision = response
            .json::<Decision>()
            .await
            .map_err(|e| DecisionError::MalformedResponse(e.to_string()))?;

        let findings: Vec<_> = scan_results.iter().flat_map(|r| r.findings.iter().cloned()).collect();
        validate_partition(&findings, &decision.auto_fixable, &decision.needs_approval, &decision.needs_human)?;

        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::ScanSummary;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn empty_scan_result() -> ScanResult {
        ScanResult {
            scan_id: "scan-1".to_string(),
            scanner: "bandit".to_string(),
            started_at: chrono::Utc::now(),
            finished_at: chrono::Utc::now(),
            target: "/repo".to_string(),
            findings: Vec::new(),
            summary: ScanSummary::default(),
            raw_artifact_ref: "bandit_latest.json".to_string(),
        }
    }

    #[tokio::test]
    async fn analyze_posts_scan_results_and_deserializes_the_decision() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/decide"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "mode": "ReportOnly",
                "auto_fixable": [],
                "needs_approval": [],
                "needs_human": [],
                "rationale": "nothing actionable",
                "confidence": 0.9,
            })))
            .mount(&server)
            .await;

        let bridge = HttpDecisionBridge::new(format!("{}/decide", server.uri()), Duration::from_secs(5));
        let decision = bridge.analyze(&[empty_scan_result()]).await.unwrap();
        assert_eq!(decision.mode, crate::decision::DecisionMode::ReportOnly);
        assert!((decision.confidence - 0.9).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn analyze_surfaces_a_non_success_status_as_a_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).and(path("/decide")).respond_with(ResponseTemplate::new(503)).mount(&server).await;

        let bridge = HttpDecisionBridge::new(format!("{}/decide", server.uri()), Duration::from_secs(5));
        let err = bridge.analyze(&[empty_scan_result()]).await.unwrap_err();
        assert!(matches!(err, DecisionError::Transport(_)));
    }
}
