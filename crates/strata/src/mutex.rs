//! Mutexes on the global registry.
//!
//! Before [`init`](crate::init) every call reports an `Error` message and
//! fails: [`create`] returns [`MutexHandle::INVALID`], the rest `false`.

use strata_thread::MutexHandle;

use crate::runtime::with_registry;

/// Create an unlocked mutex.
pub fn create() -> MutexHandle {
    with_registry("mutex::create", MutexHandle::INVALID, |r| r.mutex_create())
}

/// Destroy a mutex.
pub fn destroy(handle: MutexHandle) -> bool {
    with_registry("mutex::destroy", false, |r| r.mutex_destroy(handle))
}

/// Block until the mutex is acquired.
pub fn lock(handle: MutexHandle) -> bool {
    with_registry("mutex::lock", false, |r| r.mutex_lock(handle))
}

/// Acquire the mutex if it is free.
pub fn try_lock(handle: MutexHandle) -> bool {
    with_registry("mutex::try_lock", false, |r| r.mutex_try_lock(handle))
}

/// Release a locked mutex.
pub fn unlock(handle: MutexHandle) -> bool {
    with_registry("mutex::unlock", false, |r| r.mutex_unlock(handle))
}
