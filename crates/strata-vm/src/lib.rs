//! Virtual-memory primitives for the strata runtime.
//!
//! The only crate in the workspace that talks to the operating system's
//! memory API. Everything above it (arenas, pools, scratch) goes through a
//! [`Reservation`]:
//!
//! ```text
//! reserve(size)            PROT_NONE mapping, first page read/write
//! ├── commit(size)         additive demand, grows the read/write prefix
//! ├── decommit(size)       shrinks the prefix, never below the first page
//! └── release() / Drop     unmaps the whole range
//! ```
//!
//! Bookkeeping lives in an [`AllocInfo`] owned by the reservation rather
//! than in a header written in front of the returned pointer.
//!
//! Errors are reported as [`VmError`]; callers in the higher layers treat
//! them as fatal.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod error;
pub mod reservation;
mod sys;

use std::sync::OnceLock;
use std::time::Instant;

pub use error::VmError;
pub use reservation::{reserve, AllocInfo, Reservation, HEADER_SIZE};

static PAGE_SIZE: OnceLock<usize> = OnceLock::new();
static START: OnceLock<Instant> = OnceLock::new();

/// OS page size in bytes, queried once and cached.
pub fn page_size() -> usize {
    *PAGE_SIZE.get_or_init(sys::page_size)
}

/// Round `value` up to the next multiple of the page size.
pub fn align_to_page(value: usize) -> usize {
    align_up(value, page_size())
}

/// Round `value` up to a multiple of `align` (a power of two).
#[inline]
pub fn align_up(value: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (value + align - 1) & !(align - 1)
}

/// Start the monotonic clock reported by [`elapsed`].
///
/// Idempotent. Also primes the page-size cache.
pub fn init() {
    START.get_or_init(Instant::now);
    page_size();
}

/// Seconds since [`init`] (or since the first call to `elapsed`).
pub fn elapsed() -> f64 {
    START.get_or_init(Instant::now).elapsed().as_secs_f64()
}
