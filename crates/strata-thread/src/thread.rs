//! Thread lifecycle: spawn, join, detach.
//!
//! Every thread started here runs through a small entry wrapper that
//! records its own handle and, for [`ThreadRegistry::spawn`], installs a
//! fresh [`ThreadContext`] for the duration of the thread body.

use std::cell::Cell;
use std::thread::{Builder, JoinHandle};

use crossbeam_channel::Receiver;

use strata_arena::ThreadContext;
use strata_core::fatal;
use strata_core::message::{self, MessageLevel};

use crate::handle::ThreadHandle;
use crate::registry::ThreadRegistry;

/// What the thread pool stores per started thread.
pub(crate) struct ThreadRecord {
    /// `None` until the spawn completes, and again once a join has
    /// claimed it. The thread body does not start before it is set.
    join: Option<JoinHandle<()>>,
}

thread_local! {
    static CURRENT: Cell<ThreadHandle> = const { Cell::new(ThreadHandle::INVALID) };
}

/// Handle of the calling thread, or [`ThreadHandle::INVALID`] if it was not
/// started through a registry.
pub fn current() -> ThreadHandle {
    CURRENT
        .try_with(Cell::get)
        .unwrap_or(ThreadHandle::INVALID)
}

impl ThreadRegistry {
    /// Start an OS thread running `f` with its own scratch context.
    ///
    /// Returns [`ThreadHandle::INVALID`] if the thread pool is full. The
    /// thread must eventually be [joined](Self::join) or
    /// [detached](Self::detach) to free its slot.
    pub fn spawn<F>(&self, f: F) -> ThreadHandle
    where
        F: FnOnce() + Send + 'static,
    {
        self.start(f, true)
    }

    /// Start an OS thread running `f` without a scratch context.
    ///
    /// [`strata_arena::scratch`] returns `None` on that thread.
    pub fn spawn_without_context<F>(&self, f: F) -> ThreadHandle
    where
        F: FnOnce() + Send + 'static,
    {
        self.start(f, false)
    }

    fn start<F>(&self, f: F, with_context: bool) -> ThreadHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let inserted = self.threads.with(|pool| pool.insert(ThreadRecord { join: None }));
        let Ok(handle) = inserted else {
            message::emit(
                MessageLevel::Warning,
                format_args!(
                    "thread pool exhausted, increase thread_pool_capacity (currently {})",
                    self.config().thread_pool_capacity
                ),
            );
            return ThreadHandle::INVALID;
        };
        let handle = ThreadHandle(handle);

        // Disconnected once the record holds the join handle.
        let (ready, gate) = crossbeam_channel::bounded::<()>(0);
        let spawned = Builder::new()
            .name(format!("strata-{}", handle.0.index()))
            .spawn(move || run(handle, with_context, gate, f));
        let join = match spawned {
            Ok(join) => join,
            Err(e) => fatal(&format_args!("failed to start {handle}: {e}")),
        };

        self.threads.with(|pool| {
            if let Some(record) = pool.get_mut(handle.0) {
                record.join = Some(join);
            }
        });
        drop(ready);
        tracing::debug!(%handle, with_context, "thread started");
        handle
    }

    /// Block until the thread behind `handle` finishes, then free its slot.
    ///
    /// Returns `false` for an invalid or stale handle, for a thread that is
    /// already being joined, and for the calling thread itself. A panic in
    /// the thread body is reported at `Error` and still counts as joined.
    pub fn join(&self, handle: ThreadHandle) -> bool {
        if !handle.is_invalid() && handle == current() {
            message::emit(
                MessageLevel::Error,
                format_args!("{handle} cannot join itself"),
            );
            return false;
        }

        let join = self
            .threads
            .with(|pool| pool.get_mut(handle.0).and_then(|r| r.join.take()));
        let Some(join) = join else {
            return false;
        };

        if join.join().is_err() {
            message::emit(MessageLevel::Error, format_args!("{handle} panicked"));
        }
        self.threads.with(|pool| pool.remove(handle.0));
        tracing::debug!(%handle, "thread joined");
        true
    }

    /// Let the thread behind `handle` run on unobserved and free its slot.
    ///
    /// Returns `false` for an invalid or stale handle.
    pub fn detach(&self, handle: ThreadHandle) -> bool {
        let record = self.threads.with(|pool| pool.remove(handle.0));
        // Dropping the join handle detaches the OS thread.
        let detached = record.is_some();
        if detached {
            tracing::debug!(%handle, "thread detached");
        }
        detached
    }

    /// Whether `handle` names a thread that has not been joined or
    /// detached. The thread body may already have returned.
    pub fn is_live(&self, handle: ThreadHandle) -> bool {
        self.threads.with(|pool| pool.contains(handle.0))
    }
}

fn run<F: FnOnce()>(handle: ThreadHandle, with_context: bool, gate: Receiver<()>, f: F) {
    let _ = gate.recv();
    CURRENT.with(|c| c.set(handle));
    let _context = with_context.then(ContextScope::enter);
    f();
}

/// Installs a thread context and removes it again on drop, panics included.
struct ContextScope;

impl ContextScope {
    fn enter() -> Self {
        ThreadContext::new().install();
        Self
    }
}

impl Drop for ContextScope {
    fn drop(&mut self) {
        drop(ThreadContext::uninstall());
    }
}
