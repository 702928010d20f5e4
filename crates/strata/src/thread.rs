//! Threads on the global registry.
//!
//! Thin wrappers over [`ThreadRegistry`](strata_thread::ThreadRegistry).
//! Before [`init`](crate::init) every call reports an `Error` message and
//! fails: spawns return [`ThreadHandle::INVALID`], the rest `false`.

use strata_thread::ThreadHandle;

use crate::runtime::with_registry;

pub use strata_thread::thread::current;

/// Start a thread with its own scratch context.
pub fn spawn<F>(f: F) -> ThreadHandle
where
    F: FnOnce() + Send + 'static,
{
    with_registry("thread::spawn", ThreadHandle::INVALID, |r| r.spawn(f))
}

/// Start a thread without a scratch context.
pub fn spawn_without_context<F>(f: F) -> ThreadHandle
where
    F: FnOnce() + Send + 'static,
{
    with_registry("thread::spawn_without_context", ThreadHandle::INVALID, |r| {
        r.spawn_without_context(f)
    })
}

/// Block until the thread finishes and free its slot.
pub fn join(handle: ThreadHandle) -> bool {
    with_registry("thread::join", false, |r| r.join(handle))
}

/// Release the thread to run on unobserved and free its slot.
pub fn detach(handle: ThreadHandle) -> bool {
    with_registry("thread::detach", false, |r| r.detach(handle))
}
