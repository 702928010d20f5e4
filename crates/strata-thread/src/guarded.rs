//! A value serialized by a shared pool mutex.

#![allow(unsafe_code)]

use std::cell::UnsafeCell;
use std::sync::Arc;

use parking_lot::lock_api::RawMutex as _;
use parking_lot::RawMutex;

use crate::mutex::OsMutex;

/// `T` plus the mutex that serializes access to it.
///
/// The lock is an `Arc` so it can live in a mutex pool slot at the same
/// time as it guards something.
pub(crate) struct Guarded<T> {
    lock: Arc<OsMutex>,
    value: UnsafeCell<T>,
}

// SAFETY: every access to `value` goes through `with`, which holds `lock`.
unsafe impl<T: Send> Sync for Guarded<T> {}

impl<T> Guarded<T> {
    pub(crate) fn new(lock: Arc<OsMutex>, value: T) -> Self {
        Self {
            lock,
            value: UnsafeCell::new(value),
        }
    }

    /// Run `f` with exclusive access to the value.
    ///
    /// `f` must not call back into `with` on the same `Guarded`; the raw
    /// mutex is not reentrant.
    pub(crate) fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        self.lock.raw.lock();
        let _unlock = Unlock(&self.lock.raw);
        // SAFETY: the lock is held until `_unlock` drops.
        f(unsafe { &mut *self.value.get() })
    }
}

struct Unlock<'a>(&'a RawMutex);

impl Drop for Unlock<'_> {
    fn drop(&mut self) {
        // SAFETY: constructed only right after `lock()` on this thread.
        unsafe { self.0.unlock() };
    }
}
