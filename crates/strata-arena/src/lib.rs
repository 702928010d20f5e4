//! Linear arenas, per-thread scratch, and generational pools.
//!
//! Everything here sits on a single [`strata_vm::Reservation`] per arena.
//! This crate and `strata-vm` are the only ones that hand out raw
//! pointers; pointers returned by a push stay valid until the arena is
//! popped below them, reset, or dropped.
//!
//! # Architecture
//!
//! ```text
//! Arena (one reservation, bump cursor, page-granular commit)
//! ├── Temp<&Arena>          scoped checkpoint, pops on drop
//! ├── ThreadContext         thread-local pair of Rc<Arena>
//! │   └── Scratch           Temp<Rc<Arena>>, conflict-aware selection
//! └── Pool                  fixed slots carved from an owned Arena
//!     └── TypedPool<T>      owned values behind PoolHandles
//! ```
//!
//! An [`Arena`] is `Send` but not `Sync`: concurrent pushes from several
//! threads are impossible by construction. Threads that need transient
//! memory use their own [`ThreadContext`] instead of sharing an arena.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod arena;
pub mod context;
pub mod error;
pub mod handle;
pub mod pool;
pub mod temp;
pub mod typed;

// Public re-exports for the primary API surface.
pub use arena::Arena;
pub use context::{scratch, Scratch, ThreadContext, SCRATCH_ARENA_COUNT};
pub use error::ArenaError;
pub use handle::PoolHandle;
pub use pool::Pool;
pub use temp::Temp;
pub use typed::TypedPool;
