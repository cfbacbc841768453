//! Path-keyed locking so concurrent workflows targeting the same path
//! are serialized while unrelated targets never block each other (spec
//! §5).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::OwnedMutexGuard;

/// A `Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>` keyed
/// registry, cleaned up lazily when a path's entry has no other holders.
#[derive(Default)]
pub struct PathLockRegistry {
    locks: Mutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>,
}

impl PathLockRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entry_for(&self, path: &PathBuf) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().expect("path lock registry poisoned");
        locks
            .entry(path.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Acquire the lock for `path`, holding it until the returned guard
    /// is dropped. The suspension happens at an `await` point, never
    /// while holding the registry's own short-lived internal mutex
    /// (spec §5: "the orchestrator must not hold the path lock ... across
    /// non-tool-related waits" -- here the distinction is between the
    /// cheap registry lookup and the actual per-path lease).
    pub async fn acquire(&self, path: &PathBuf) -> OwnedMutexGuard<()> {
        let entry = self.entry_for(path);
        entry.lock_owned().await
    }

    /// Drop any path entries with no other `Arc` holders, so the map
    /// doesn't grow unbounded across a long-lived process.
    pub fn sweep(&self) {
        let mut locks = self.locks.lock().expect("path lock registry poisoned");
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.lock().expect("path lock registry poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn two_acquisitions_of_different_paths_do_not_block_each_other() {
        let registry = PathLockRegistry::new();
        let guard_a = registry.acquire(&PathBuf::from("/a")).await;
        let guard_b = registry.acquire(&PathBuf::from("/b")).await;
        drop(guard_a);
        drop(guard_b);
    }

    #[tokio::test]
    async fn sweep_removes_entries_with_no_remaining_holders() {
        let registry = PathLockRegistry::new();
        {
            let _guard = registry.acquire(&PathBuf::from("/a")).await;
            assert_eq!(registry.len(), 1);
        }
        registry.sweep();
        assert!(registry.is_empty());
    }
}
