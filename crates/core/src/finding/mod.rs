//! Canonical Finding model and the scanner-output normalizer (spec §4.2).

mod model;
mod normalizer;

pub use model::{Confidence, Finding, Fingerprint, ScanResult, ScanSummary, Severity};
pub use normalizer::{quarantine_reason_for, NativeFinding, Normalizer, QuarantinedFinding};
