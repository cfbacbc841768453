//! Environment-configured knobs (spec §6).

use std::path::PathBuf;
use std::time::Duration;

/// Environment variable names, exhaustive per spec §6.
mod env_keys {
    pub const SCAN_TIMEOUT_SECONDS: &str = "SCAN_TIMEOUT_SECONDS";
    pub const FIXER_TIMEOUT_SECONDS: &str = "FIXER_TIMEOUT_SECONDS";
    pub const AUTO_APPROVE_SAFE: &str = "AUTO_APPROVE_SAFE";
    pub const WORKER_POOL_SIZE: &str = "WORKER_POOL_SIZE";
    pub const PATTERN_STORE_PATH: &str = "PATTERN_STORE_PATH";
    pub const SCANS_PATH: &str = "SCANS_PATH";
    pub const FIXES_PATH: &str = "FIXES_PATH";
    pub const BACKUPS_PATH: &str = "BACKUPS_PATH";
    pub const DECISION_TIMEOUT_SECONDS: &str = "DECISION_TIMEOUT_SECONDS";
}

/// Runtime configuration for one engine instance.
///
/// Construct with [`EngineConfig::from_env`] in production, or
/// [`EngineConfig::default`] (rooted at `./.remedy`) in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Per-scanner deadline.
    pub scan_timeout: Duration,
    /// Per-fixer-pattern deadline.
    pub fixer_timeout: Duration,
    /// Elevates Medium-risk fixers into the Approved bucket (spec §4.5).
    pub auto_approve_safe: bool,
    /// Scanner dispatch parallelism (spec §5).
    pub worker_pool_size: usize,
    /// Filesystem roots for persisted artifacts (spec §6).
    pub pattern_store_path: PathBuf,
    pub scans_path: PathBuf,
    pub fixes_path: PathBuf,
    pub backups_path: PathBuf,
    pub audit_log_path: PathBuf,
    /// Decision bridge deadline.
    pub decision_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let root = PathBuf::from(".remedy");
        Self {
            scan_timeout: Duration::from_secs(600),
            fixer_timeout: Duration::from_secs(30),
            auto_approve_safe: false,
            worker_pool_size: std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(4),
            pattern_store_path: root.join("patterns"),
            scans_path: root.join("scans"),
            fixes_path: root.join("fixes"),
            backups_path: root.join("backups"),
            audit_log_path: root.join("audit.log"),
            decision_timeout: Duration::from_secs(60),
        }
    }
}

impl EngineConfig {
    /// Build configuration from environment variables, falling back to
    /// [`EngineConfig::default`] for anything unset or unparseable.
    #[must_use]
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            scan_timeout: env_duration_secs(env_keys::SCAN_TIMEOUT_SECONDS, default.scan_timeout),
            fixer_timeout: env_duration_secs(
                env_keys::FIXER_TIMEOUT_SECONDS,
                default.fixer_timeout,
            ),
            auto_approve_safe: env_bool(
                env_keys::AUTO_APPROVE_SAFE,
                default.auto_approve_safe,
            ),
            worker_pool_size: env_usize(
                env_keys::WORKER_POOL_SIZE,
                default.worker_pool_size,
            ),
            pattern_store_path: env_path(
                env_keys::PATTERN_STORE_PATH,
                default.pattern_store_path,
            ),
            scans_path: env_path(env_keys::SCANS_PATH, default.scans_path),
            fixes_path: env_path(env_keys::FIXES_PATH, default.fixes_path),
            backups_path: env_path(env_keys::BACKUPS_PATH, default.backups_path),
            audit_log_path: default.audit_log_path,
            decision_timeout: env_duration_secs(
                env_keys::DECISION_TIMEOUT_SECONDS,
                default.decision_timeout,
            ),
        }
    }

    /// Ensure the artifact directories exist, creating them if necessary.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [
            &self.pattern_store_path,
            &self.scans_path,
            &self.fixes_path,
            &self.backups_path,
        ] {
            std::fs::create_dir_all(dir)?;
        }
        if let Some(parent) = self.audit_log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

fn env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map_or(default, |v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_path(key: &str, default: PathBuf) -> PathBuf {
    std::env::var(key).map_or(default, PathBuf::from)
}
