//! The dual-lock primitive of §5.
//!
//! §9's REDESIGN FLAGS call for replacing "same entity carrying both a
//! reader-writer lock and a mutex, selected by a runtime tag" with two
//! distinct named locks, while preserving the property that a thread can
//! hold both at once. `DualLock<T>` is that: a `RwLock<T>` for ordinary
//! shared/exclusive field access, plus an independent `Mutex<()>` token
//! used where the spec calls for "mutex mode" (bitmap scans, the
//! open-with-TRUNC path). The two never interact; acquiring one never
//! blocks on the other.
//!
//! Every acquisition can fail with [`Error::LockFailure`] (§7) if the
//! lock is poisoned — some other thread panicked while holding it, so
//! the state it protects may be inconsistent and callers must not read
//! or write through it.

use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{LockResultExt as _, Result};

pub struct DualLock<T> {
    state: RwLock<T>,
    token: Mutex<()>,
}

impl<T> DualLock<T> {
    pub fn new(value: T) -> Self {
        Self {
            state: RwLock::new(value),
            token: Mutex::new(()),
        }
    }

    /// Acquires the reader-writer lock in read mode.
    pub fn read(&self) -> Result<RwLockReadGuard<'_, T>> {
        self.state.read().or_lock_failure()
    }

    /// Acquires the reader-writer lock in write mode.
    pub fn write(&self) -> Result<RwLockWriteGuard<'_, T>> {
        self.state.write().or_lock_failure()
    }

    /// Acquires the mutex token ("MUTEX" kind of §5). Callers combine
    /// this with [`DualLock::write`] (or `read`) to get at the fields
    /// while holding mutex-mode exclusion, matching the compound
    /// locking described for directory mutation and bitmap scans.
    pub fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.token.lock().or_lock_failure()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn poisoned_rwlock_surfaces_as_lock_failure() {
        use std::panic;
        use std::sync::Arc;

        let lock = Arc::new(DualLock::new(0));
        let poisoner = Arc::clone(&lock);
        let _ = panic::catch_unwind(panic::AssertUnwindSafe(|| {
            let mut guard = poisoner.write().unwrap();
            *guard = 1;
            panic!("deliberate poison for the test below");
        }));

        assert_eq!(lock.read().err(), Some(Error::LockFailure));
        assert_eq!(lock.write().err(), Some(Error::LockFailure));
        // the mutex token is independent of the poisoned `RwLock`.
        assert!(lock.lock().is_ok());
    }
}
