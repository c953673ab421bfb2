//! The single reader/writer discipline over the whole entity store.

use std::sync::{Mutex, RwLock};

/// One shared lock protecting a value, with closure-style entry points.
///
/// `read` takes the lock shared, `write` exclusive; neither is reentrant.
/// A read operation that wants a write side effect (recording a user's
/// last-seen) registers it with [`defer`](Self::defer); deferred actions
/// run under the exclusive lock only after the shared lock has been
/// released, so a reader never blocks on its own upgrade.
pub struct ResourceGuard<T> {
    inner: RwLock<T>,
    deferred: Mutex<Vec<Box<dyn FnOnce(&mut T) + Send>>>,
}

impl<T> ResourceGuard<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: RwLock::new(value),
            deferred: Mutex::new(Vec::new()),
        }
    }

    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let result = {
            let guard = self.inner.read().expect("Locking failed");
            f(&guard)
        };
        self.run_deferred();
        result
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.inner.write().expect("Locking failed");
        f(&mut guard)
    }

    /// Schedules a write to run after the current read releases the lock.
    pub fn defer(&self, f: impl FnOnce(&mut T) + Send + 'static) {
        self.deferred
            .lock()
            .expect("Locking failed")
            .push(Box::new(f));
    }

    fn run_deferred(&self) {
        let pending: Vec<_> = std::mem::take(&mut *self.deferred.lock().expect("Locking failed"));
        if pending.is_empty() {
            return;
        }
        let mut guard = self.inner.write().expect("Locking failed");
        for action in pending {
            action(&mut guard);
        }
    }
}
