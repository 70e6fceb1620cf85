use super::error::{Result, TransactionError};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// Keys of packages that currently have an open transaction.
///
/// Acquisition never blocks: a second transaction on a held key fails with
/// [`TransactionError::AlreadyLocked`].
#[derive(Debug, Clone, Default)]
pub struct LockRegistry {
    held: Arc<Mutex<HashSet<String>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self, key: &str) -> Result<PackageLock> {
        if !self.held.lock().insert(key.to_string()) {
            return Err(TransactionError::AlreadyLocked(key.to_string()));
        }
        tracing::debug!(key, "package lock acquired");
        Ok(PackageLock {
            held: Arc::clone(&self.held),
            key: key.to_string(),
        })
    }

    pub fn is_locked(&self, key: &str) -> bool {
        self.held.lock().contains(key)
    }
}

/// Held lock on one package; released on drop.
#[derive(Debug)]
pub struct PackageLock {
    held: Arc<Mutex<HashSet<String>>>,
    key: String,
}

impl PackageLock {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for PackageLock {
    fn drop(&mut self) {
        self.held.lock().remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_is_exclusive_and_released() {
        let locks = LockRegistry::new();
        let guard = locks.try_acquire("a.potx").unwrap();
        assert!(matches!(locks.try_acquire("a.potx"), Err(TransactionError::AlreadyLocked(_))));
        assert!(locks.try_acquire("b.potx").is_ok());
        assert!(locks.is_locked("a.potx"));
        drop(guard);
        assert!(!locks.is_locked("a.potx"));
        assert!(locks.try_acquire("a.potx").is_ok());
    }

    #[test]
    fn test_lock_across_threads() {
        let locks = LockRegistry::new();
        let _guard = locks.try_acquire("shared").unwrap();
        let other = locks.clone();
        let attempt = std::thread::spawn(move || other.try_acquire("shared").is_err())
            .join()
            .unwrap();
        assert!(attempt);
    }
}
