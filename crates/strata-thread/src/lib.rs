//! OS threads and mutexes behind generational handles.
//!
//! A [`ThreadRegistry`] keeps two [`TypedPool`](strata_arena::TypedPool)s:
//! one of thread records, one of mutex records. Each pool is serialized by
//! a mutex taken from the mutex pool itself; those guard mutexes occupy
//! the first [`RESERVED_MUTEXES`] slots and are never handed out.
//!
//! ```text
//! ThreadRegistry
//! ├── mutexes: Guarded<TypedPool<MutexRecord>>   guard = slot 0
//! │   └── user mutexes (slots 2..)
//! └── threads: Guarded<TypedPool<ThreadRecord>>  guard = slot 1
//! ```
//!
//! The guards only cover handle bookkeeping. Blocking operations
//! ([`ThreadRegistry::join`], [`ThreadRegistry::mutex_lock`]) copy what they
//! need out of the pool and block with the guard released.
//!
//! Pool exhaustion is reported through the message hook at `Warning` and
//! yields an invalid handle. A failed OS thread spawn is fatal.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]
#![deny(unsafe_op_in_unsafe_fn)]

mod guarded;
pub mod handle;
pub mod mutex;
pub mod registry;
pub mod thread;

pub use handle::{MutexHandle, ThreadHandle};
pub use registry::{ThreadRegistry, RESERVED_MUTEXES};
