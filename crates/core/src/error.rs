//! Error kinds shared across the kernel (spec §7).
//!
//! Each variant here is observable in the audit log (see [`crate::audit`]):
//! the orchestrator converts any error it receives from a component into
//! an `EngineError` before recording it, so the audit trail has one
//! vocabulary regardless of which component raised it.

use thiserror::Error;

/// Top-level error type for the kernel.
///
/// Component modules define their own narrower error enums
/// (`RegistryError`, `LeaseError`, `FixError`, ...) and convert into
/// this one via `#[from]` at the orchestrator boundary.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Caller supplied parameters that violate a `ToolSpec`'s input schema.
    #[error("schema error: {0}")]
    SchemaError(String),

    /// The scanner/fixer/validator binary is missing or its adapter is uninitialized.
    #[error("tool unavailable: {0}")]
    ToolUnavailable(String),

    /// A tool invocation exceeded its configured deadline.
    #[error("tool timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// A tool ran and returned a non-zero / failure result.
    #[error("tool failed (exit {exit_code:?}): {stderr}")]
    ToolFailure {
        exit_code: Option<i32>,
        stderr: String,
    },

    /// Scanner output could not be mapped into the canonical Finding schema.
    #[error("normalization error: {0}")]
    NormalizationError(String),

    /// Re-parsing a file after a fix failed.
    #[error("fix produced invalid syntax in {file}: {reason}")]
    SyntaxInvalid { file: String, reason: String },

    /// The artifact-appropriate validator rejected a fix.
    #[error("validator rejected fix in {file}: {reason}")]
    ValidatorRejected { file: String, reason: String },

    /// A backup could not be restored to its original content hash.
    #[error("unrecoverable restore failure for {path}, backup at {backup_ref}")]
    RestoreFailed { path: String, backup_ref: String },

    /// Cooperative cancellation was observed at a checkpoint.
    #[error("workflow cancelled")]
    Cancelled,

    /// Catch-all for I/O and serialization failures that don't fit above.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// Stable string tag used as the `detail.kind` field in audit lines.
    #[must_use]
    pub fn kind_tag(&self) -> &'static str {
        match self {
            Self::SchemaError(_) => "SchemaError",
            Self::ToolUnavailable(_) => "ToolUnavailable",
            Self::Timeout(_) => "Timeout",
            Self::ToolFailure { .. } => "ToolFailure",
            Self::NormalizationError(_) => "NormalizationError",
            Self::SyntaxInvalid { .. } => "SyntaxInvalid",
            Self::ValidatorRejected { .. } => "ValidatorRejected",
            Self::RestoreFailed { .. } => "RestoreFailed",
            Self::Cancelled => "Cancelled",
            Self::Io(_) => "Io",
            Self::Other(_) => "Other",
        }
    }

    /// Whether the orchestrator's retry policy (spec §4.6) applies to this error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::ToolFailure { .. })
    }

    /// Whether this error must abort the whole workflow (spec §7).
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::RestoreFailed { .. } | Self::Cancelled)
    }
}
