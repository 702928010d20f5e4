//! Per-thread scratch arenas.
//!
//! Each thread that needs transient memory installs a [`ThreadContext`]
//! holding two private arenas. [`scratch`] hands out a checkpoint on one of
//! them; dropping the checkpoint rolls the arena back. Asking with the
//! arena you are already allocating into as a conflict returns the other
//! one, so a callee's scratch never tramples the caller's result.

use std::cell::RefCell;
use std::fmt;
use std::ptr;
use std::rc::Rc;

use smallvec::SmallVec;
use strata_core::config::arena_defaults;
use strata_core::message::{self, MessageLevel};

use crate::arena::Arena;
use crate::temp::Temp;

/// Number of scratch arenas in every [`ThreadContext`].
pub const SCRATCH_ARENA_COUNT: usize = 2;

/// A checkpoint on one of the calling thread's scratch arenas.
///
/// Not `Send`: it must be dropped on the thread that acquired it.
pub type Scratch = Temp<Rc<Arena>>;

thread_local! {
    static CURRENT: RefCell<Option<ThreadContext>> = const { RefCell::new(None) };
}

/// The scratch arenas owned by one thread.
pub struct ThreadContext {
    arenas: SmallVec<[Rc<Arena>; SCRATCH_ARENA_COUNT]>,
}

impl ThreadContext {
    /// Build a context with default-capacity arenas.
    pub fn new() -> Self {
        Self::with_capacity(arena_defaults().default_capacity)
    }

    /// Build a context whose arenas reserve `capacity` bytes each.
    pub fn with_capacity(capacity: usize) -> Self {
        let arenas = (0..SCRATCH_ARENA_COUNT)
            .map(|_| Rc::new(Arena::new(capacity)))
            .collect();
        Self { arenas }
    }

    /// The scratch arenas, in selection order.
    pub fn arenas(&self) -> &[Rc<Arena>] {
        &self.arenas
    }

    /// Make `self` the calling thread's context.
    ///
    /// Returns the context it replaced, if any.
    pub fn install(self) -> Option<ThreadContext> {
        CURRENT.with(|cell| cell.borrow_mut().replace(self))
    }

    /// Detach the calling thread's context and return it.
    ///
    /// Scratch checkpoints still alive keep their arena alive until they
    /// are dropped.
    pub fn uninstall() -> Option<ThreadContext> {
        CURRENT
            .try_with(|cell| cell.borrow_mut().take())
            .ok()
            .flatten()
    }

    /// Whether the calling thread has a context.
    pub fn is_installed() -> bool {
        CURRENT
            .try_with(|cell| cell.borrow().is_some())
            .unwrap_or(false)
    }
}

impl Default for ThreadContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ThreadContext {
    fn drop(&mut self) {
        // Reverse order: the last arena goes first.
        while let Some(arena) = self.arenas.pop() {
            drop(arena);
        }
    }
}

impl fmt::Debug for ThreadContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.arenas.iter().map(|a| &**a))
            .finish()
    }
}

/// Acquire a scratch checkpoint on the calling thread.
///
/// Picks the first scratch arena that is not in `conflicts`. Returns `None`
/// if the thread has no [`ThreadContext`]. If every scratch arena
/// conflicts, a warning is emitted and the first arena is used anyway.
pub fn scratch(conflicts: &[&Arena]) -> Option<Scratch> {
    CURRENT
        .try_with(|cell| {
            let current = cell.borrow();
            let ctx = current.as_ref()?;
            let arena = ctx
                .arenas
                .iter()
                .find(|a| !conflicts.iter().any(|c| ptr::eq(Rc::as_ptr(*a), *c)))
                .unwrap_or_else(|| {
                    message::emit(
                        MessageLevel::Warning,
                        format_args!(
                            "all {SCRATCH_ARENA_COUNT} scratch arenas conflict, scratch will alias"
                        ),
                    );
                    &ctx.arenas[0]
                });
            Some(Temp::begin(Rc::clone(arena)))
        })
        .ok()
        .flatten()
}
