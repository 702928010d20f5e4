//! Strata: manual-memory-management primitives for native programs.
//!
//! This is the top-level facade crate. It owns the process-wide runtime
//! state ([`init`] / [`terminate`]) and re-exports the sub-crates as
//! modules.
//!
//! # Quick start
//!
//! ```rust
//! use strata::prelude::*;
//!
//! strata::init(CoreConfig::default()).unwrap();
//!
//! // A small arena of its own.
//! let arena = Arena::new(1 << 20);
//! let words = arena.push_array::<u64>(16);
//! assert!(arena.used() >= 16 * 8);
//!
//! // Scratch memory is rolled back when the checkpoint drops.
//! {
//!     let tmp = scratch(&[&arena]).unwrap();
//!     tmp.push(4096);
//! }
//!
//! // Threads started through strata get their own scratch arenas.
//! let worker = strata::thread::spawn(|| {
//!     let tmp = scratch(&[]).unwrap();
//!     tmp.push(128);
//! });
//! assert!(strata::thread::join(worker));
//!
//! let lock = strata::mutex::create();
//! assert!(strata::mutex::lock(lock));
//! assert!(strata::mutex::unlock(lock));
//! assert!(strata::mutex::destroy(lock));
//!
//! # let _ = words;
//! strata::terminate();
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `strata-core` | Config, message hook, fatal path |
//! | [`vm`] | `strata-vm` | Address-space reservations |
//! | [`mem`] | `strata-arena` | Arenas, checkpoints, scratch, pools |
//! | [`threading`] | `strata-thread` | Thread and mutex registry |
//! | [`thread`], [`mutex`] | this crate | Free functions over the global registry |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod mutex;
mod runtime;
pub mod thread;

pub use runtime::{init, is_initialized, registry, terminate, InitError};

/// Configuration, message hook, and fatal path (`strata-core`).
pub use strata_core as types;

/// Virtual-memory reservations (`strata-vm`).
///
/// Only arenas should need this directly.
pub use strata_vm as vm;

/// Arenas, checkpoints, scratch, and generational pools (`strata-arena`).
pub use strata_arena as mem;

/// The thread and mutex registry (`strata-thread`).
///
/// Most programs use the free functions in [`thread`] and [`mutex`] instead.
pub use strata_thread as threading;

/// Common imports.
///
/// ```rust
/// use strata::prelude::*;
/// ```
pub mod prelude {
    // Config and diagnostics
    pub use strata_core::{CoreConfig, MessageLevel, MessagingConfig};

    // Memory
    pub use strata_arena::{scratch, Arena, Pool, PoolHandle, Scratch, Temp, TypedPool};

    // Threads
    pub use strata_thread::{MutexHandle, ThreadHandle};

    // Errors
    pub use crate::InitError;
    pub use strata_arena::ArenaError;
}
