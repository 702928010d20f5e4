//! Mutexes behind pool handles.
//!
//! Lock and unlock copy the mutex out of the pool before touching it, so a
//! thread blocked in [`ThreadRegistry::mutex_lock`] never holds the pool
//! guard. Destroying a mutex that another thread is waiting on leaves that
//! thread blocked forever.
//!
//! Each mutex remembers which thread holds it. Only that thread may
//! unlock it.

#![allow(unsafe_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::lock_api::RawMutex as _;
use parking_lot::RawMutex;
use strata_core::message::{self, MessageLevel};

use crate::handle::MutexHandle;
use crate::registry::{ThreadRegistry, RESERVED_MUTEXES};

/// Owner value of an unlocked [`OsMutex`].
const NO_OWNER: u64 = 0;

/// A raw mutex plus the token of the thread holding it.
pub(crate) struct OsMutex {
    pub(crate) raw: RawMutex,
    /// Written only by the holder: set right after acquiring, cleared
    /// right before releasing.
    owner: AtomicU64,
}

impl OsMutex {
    pub(crate) const fn new() -> Self {
        Self {
            raw: RawMutex::INIT,
            owner: AtomicU64::new(NO_OWNER),
        }
    }

    fn lock(&self) {
        self.raw.lock();
        self.owner.store(thread_token(), Ordering::Release);
    }

    fn try_lock(&self) -> bool {
        let acquired = self.raw.try_lock();
        if acquired {
            self.owner.store(thread_token(), Ordering::Release);
        }
        acquired
    }

    /// Release the mutex if the calling thread holds it.
    fn unlock(&self) -> bool {
        if self.owner.load(Ordering::Acquire) != thread_token() {
            return false;
        }
        self.owner.store(NO_OWNER, Ordering::Release);
        // SAFETY: only the holder stores its own token, and it clears the
        // token before releasing. Seeing our token means this thread locked
        // the mutex and has not released it since.
        unsafe { self.raw.unlock() };
        true
    }
}

/// A process-unique, never-zero token for the calling thread.
fn thread_token() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(NO_OWNER + 1);
    thread_local! {
        static TOKEN: u64 = NEXT.fetch_add(1, Ordering::Relaxed);
    }
    // A thread tearing down its locals gets a one-off token; it can lock
    // but never unlock.
    TOKEN
        .try_with(|t| *t)
        .unwrap_or_else(|_| NEXT.fetch_add(1, Ordering::Relaxed))
}

/// What the mutex pool stores per mutex.
pub(crate) struct MutexRecord {
    mutex: Arc<OsMutex>,
}

impl MutexRecord {
    pub(crate) fn new(mutex: Arc<OsMutex>) -> Self {
        Self { mutex }
    }
}

impl ThreadRegistry {
    /// Create an unlocked mutex.
    ///
    /// Returns [`MutexHandle::INVALID`] if the mutex pool is full.
    pub fn mutex_create(&self) -> MutexHandle {
        let inserted = self
            .mutexes
            .with(|pool| pool.insert(MutexRecord::new(Arc::new(OsMutex::new()))));
        match inserted {
            Ok(handle) => MutexHandle(handle),
            Err(_) => {
                message::emit(
                    MessageLevel::Warning,
                    format_args!(
                        "mutex pool exhausted, increase mutex_pool_capacity (currently {})",
                        self.config().mutex_pool_capacity
                    ),
                );
                MutexHandle::INVALID
            }
        }
    }

    /// Destroy a mutex. Returns `false` for an invalid or stale handle.
    pub fn mutex_destroy(&self, handle: MutexHandle) -> bool {
        if is_reserved(handle) {
            return false;
        }
        self.mutexes.with(|pool| pool.remove(handle.0)).is_some()
    }

    /// Block until the mutex is acquired.
    ///
    /// Returns `false` without blocking for an invalid or stale handle.
    /// Not reentrant: locking a mutex the caller already holds deadlocks.
    pub fn mutex_lock(&self, handle: MutexHandle) -> bool {
        let Some(mutex) = self.os_mutex(handle) else {
            return false;
        };
        mutex.lock();
        true
    }

    /// Acquire the mutex if it is free. Never blocks.
    pub fn mutex_try_lock(&self, handle: MutexHandle) -> bool {
        self.os_mutex(handle).is_some_and(|mutex| mutex.try_lock())
    }

    /// Release a mutex held by the calling thread.
    ///
    /// Returns `false` for an invalid or stale handle. A mutex that is
    /// unlocked, or held by another thread, is left alone: the call
    /// reports an `Error` message and returns `false`.
    pub fn mutex_unlock(&self, handle: MutexHandle) -> bool {
        let Some(mutex) = self.os_mutex(handle) else {
            return false;
        };
        let released = mutex.unlock();
        if !released {
            message::emit(
                MessageLevel::Error,
                format_args!("{handle} is not held by the calling thread"),
            );
        }
        released
    }

    /// Whether `handle` names a live user mutex.
    pub fn mutex_is_live(&self, handle: MutexHandle) -> bool {
        !is_reserved(handle) && self.mutexes.with(|pool| pool.contains(handle.0))
    }

    fn os_mutex(&self, handle: MutexHandle) -> Option<Arc<OsMutex>> {
        if is_reserved(handle) {
            return None;
        }
        self.mutexes
            .with(|pool| pool.get(handle.0).map(|r| Arc::clone(&r.mutex)))
    }
}

fn is_reserved(handle: MutexHandle) -> bool {
    handle.0.index() < RESERVED_MUTEXES
}
