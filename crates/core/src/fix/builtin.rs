//! Built-in fix patterns, keyed by `(rule_id, artifact_kind)` (spec §4.4
//! step 2(iii)).
//!
//! Built-ins are deterministic and always win selection ties against a
//! learned pattern of equal confidence (spec §4.4 tie-break rule).

use crate::tool::{ArtifactKind, Risk};

/// Identifies which concrete transform function to run; the transform
/// logic itself lives in the per-artifact-kind editor modules
/// (`python`, `hcl`, `manifest`, `text`) since the shape of an edit is
/// inherently language-specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinPattern {
    /// Bandit B105/B106/B107 hardcoded credential -> `os.environ` lookup.
    PythonEnvVarify,
    /// Weak hash algorithm (md5/sha1) -> sha256.
    PythonUpgradeHash,
    /// Add `usedforsecurity=False` to a non-security hash call, the
    /// lower-confidence alternative to [`Self::PythonUpgradeHash`] used
    /// in the engine's conflicting-pattern test scenario (spec S3).
    PythonHashKwarg,
    /// Checkov CKV_AWS_19 unencrypted S3 bucket -> add
    /// `server_side_encryption_configuration` with AES256.
    HclS3Encryption,
    /// Checkov/tfsec public-access-block missing on an S3 bucket.
    HclS3PublicAccessBlock,
    /// kube-bench/Checkov: container missing a `securityContext` that
    /// drops privilege escalation.
    ManifestDropPrivilegeEscalation,
    /// Checkov: container missing CPU/memory resource limits.
    ManifestAddResourceLimits,
    /// Gitleaks: a secret literal in free text / config file.
    TextRedactSecret,
}

impl BuiltinPattern {
    #[must_use]
    pub fn pattern_id(&self) -> &'static str {
        match self {
            Self::PythonEnvVarify => "env-varify@python",
            Self::PythonUpgradeHash => "upgrade-hash@python",
            Self::PythonHashKwarg => "hash-kwarg@python",
            Self::HclS3Encryption => "s3-encryption@hcl",
            Self::HclS3PublicAccessBlock => "s3-public-access-block@hcl",
            Self::ManifestDropPrivilegeEscalation => "drop-privilege-escalation@manifest",
            Self::ManifestAddResourceLimits => "resource-limits@manifest",
            Self::TextRedactSecret => "redact-secret@text",
        }
    }

    /// Built-ins are hand-authored and reviewed, so they start with a
    /// higher prior than a freshly learned pattern (spec §4.4 tie-break:
    /// built-ins win equal-confidence ties against learned patterns,
    /// reinforced here by giving them a slight edge by default).
    #[must_use]
    pub fn confidence_prior_for(&self) -> f64 {
        match self {
            Self::PythonUpgradeHash | Self::HclS3Encryption | Self::PythonEnvVarify => 0.95,
            Self::PythonHashKwarg => 0.8,
            _ => 0.85,
        }
    }

    /// Authored risk classification for this transform, used when no
    /// matching `Fixer` `ToolSpec` is registered for the approval gate to
    /// consult directly (spec §4.5's `risk` policy variable "from the
    /// `ToolSpec` of the fixer" -- built-ins carry their own classification
    /// so the gate always has one).
    #[must_use]
    pub fn risk(&self) -> Risk {
        match self {
            Self::PythonUpgradeHash | Self::PythonHashKwarg => Risk::Low,
            Self::ManifestDropPrivilegeEscalation | Self::ManifestAddResourceLimits => Risk::Low,
            Self::PythonEnvVarify | Self::HclS3Encryption | Self::HclS3PublicAccessBlock => {
                Risk::Medium
            }
            Self::TextRedactSecret => Risk::High,
        }
    }
}

/// A resolved built-in, carrying both the transform identity and its
/// confidence prior so the engine's selection logic doesn't need to
/// special-case built-ins differently from learned [`crate::pattern_store::Pattern`]s.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedBuiltinPattern {
    pub kind: BuiltinPattern,
    pub confidence_prior: f64,
}

impl std::fmt::Display for ResolvedBuiltinPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind.pattern_id())
    }
}

impl std::ops::Deref for ResolvedBuiltinPattern {
    type Target = BuiltinPattern;
    fn deref(&self) -> &Self::Target {
        &self.kind
    }
}

/// Look up the built-in transform for `rule_id` under `artifact_kind`,
/// if one exists (spec §4.4 step 2(iii)).
#[must_use]
pub fn builtin_pattern_for(rule_id: &str, artifact_kind: ArtifactKind) -> Option<ResolvedBuiltinPattern> {
    let kind = match (rule_id, artifact_kind) {
        ("B105" | "B106" | "B107", ArtifactKind::PythonSource) => BuiltinPattern::PythonEnvVarify,
        ("weak-hash-md5", ArtifactKind::PythonSource) => BuiltinPattern::PythonUpgradeHash,
        ("weak-hash-kwarg", ArtifactKind::PythonSource) => BuiltinPattern::PythonHashKwarg,
        ("CKV_AWS_19" | "CKV_AWS_145", ArtifactKind::Hcl) => BuiltinPattern::HclS3Encryption,
        ("CKV_AWS_20" | "CKV_AWS_57", ArtifactKind::Hcl) => BuiltinPattern::HclS3PublicAccessBlock,
        ("CKV_K8S_20" | "CKV_K8S_8", ArtifactKind::K8sYaml | ArtifactKind::JsonManifest) => {
            BuiltinPattern::ManifestDropPrivilegeEscalation
        }
        ("CKV_K8S_10" | "CKV_K8S_11", ArtifactKind::K8sYaml | ArtifactKind::JsonManifest) => {
            BuiltinPattern::ManifestAddResourceLimits
        }
        ("generic-api-key" | "gitleaks-generic", ArtifactKind::FreeText) => {
            BuiltinPattern::TextRedactSecret
        }
        _ => return None,
    };
    Some(ResolvedBuiltinPattern {
        confidence_prior: kind.confidence_prior_for(),
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn python_hardcoded_credential_rule_resolves_to_env_varify() {
        let pattern = builtin_pattern_for("B105", ArtifactKind::PythonSource).unwrap();
        assert_eq!(*pattern, BuiltinPattern::PythonEnvVarify);
    }

    #[test]
    fn unknown_rule_has_no_builtin() {
        assert!(builtin_pattern_for("does-not-exist", ArtifactKind::PythonSource).is_none());
    }

    #[test]
    fn terraform_bucket_rule_resolves_under_hcl_only() {
        assert!(builtin_pattern_for("CKV_AWS_19", ArtifactKind::Hcl).is_some());
        assert!(builtin_pattern_for("CKV_AWS_19", ArtifactKind::PythonSource).is_none());
    }
}
