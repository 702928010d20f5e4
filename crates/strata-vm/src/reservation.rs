//! Reserved address ranges with page-granular commit accounting.

#![allow(unsafe_code)]

use std::fmt;
use std::ptr::NonNull;

use crate::error::VmError;
use crate::{align_to_page, page_size, sys};

/// Bytes of bookkeeping charged to every reservation: three 64-bit words
/// (total size, requested-committed, committed).
///
/// The requested-committed counter never drops below this footprint, so
/// the first page of a reservation stays committed until release.
pub const HEADER_SIZE: usize = 3 * std::mem::size_of::<u64>();

/// Accounting for one reservation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AllocInfo {
    /// Total reserved bytes (page multiple).
    pub size: usize,
    /// Cumulative commit demand, floored at [`HEADER_SIZE`].
    pub requested_committed: usize,
    /// Bytes currently readable/writable from the start (page multiple).
    pub committed: usize,
}

/// An owned range of reserved address space.
///
/// Only the prefix `[0, committed)` is accessible. Dropping the
/// reservation unmaps it.
pub struct Reservation {
    base: NonNull<u8>,
    info: AllocInfo,
}

// SAFETY: the reservation exclusively owns its mapping; nothing about it is
// tied to the thread that created it.
unsafe impl Send for Reservation {}

/// Reserve `size` bytes (plus header footprint) of address space, rounded
/// up to whole pages, and commit the first page.
pub fn reserve(size: usize) -> Result<Reservation, VmError> {
    let page = page_size();
    let total = align_to_page(size.saturating_add(HEADER_SIZE)).max(page);

    let base = sys::reserve(total).map_err(|code| VmError::Reserve { size: total, code })?;

    // SAFETY: the first page lies inside the mapping just created.
    if let Err(code) = unsafe { sys::commit(base.as_ptr(), page) } {
        // SAFETY: mapping is ours and nothing references it yet.
        let _ = unsafe { sys::release(base.as_ptr(), total) };
        return Err(VmError::Commit {
            offset: 0,
            size: page,
            code,
        });
    }

    tracing::trace!(base = ?base, size = total, "reserved address space");
    Ok(Reservation {
        base,
        info: AllocInfo {
            size: total,
            requested_committed: HEADER_SIZE,
            committed: page,
        },
    })
}

impl Reservation {
    /// Start of the reservation.
    pub fn as_ptr(&self) -> NonNull<u8> {
        self.base
    }

    /// Total reserved bytes.
    pub fn len(&self) -> usize {
        self.info.size
    }

    /// Always false: a reservation spans at least one page.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Bytes currently accessible from the start.
    pub fn committed(&self) -> usize {
        self.info.committed
    }

    /// Cumulative commit demand.
    pub fn requested_committed(&self) -> usize {
        self.info.requested_committed
    }

    /// Snapshot of the accounting.
    pub fn info(&self) -> AllocInfo {
        self.info
    }

    /// Add `size` bytes of commit demand.
    ///
    /// Demand is additive: each call adds to the running total rather than
    /// setting an absolute target. Access is granted to the newly needed
    /// pages only; a no-op if the committed prefix already covers the
    /// demand. Demand beyond the reservation is clamped to its size.
    pub fn commit(&mut self, size: usize) -> Result<(), VmError> {
        self.info.requested_committed = self.info.requested_committed.saturating_add(size);
        let target = align_to_page(self.info.requested_committed).min(self.info.size);
        if target <= self.info.committed {
            return Ok(());
        }

        let offset = self.info.committed;
        let len = target - offset;
        // SAFETY: [offset, target) lies inside the mapping (target <= size).
        unsafe { sys::commit(self.base.as_ptr().add(offset), len) }
            .map_err(|code| VmError::Commit { offset, size: len, code })?;
        self.info.committed = target;
        tracing::trace!(base = ?self.base, committed = target, "committed pages");
        Ok(())
    }

    /// Remove up to `size` bytes of commit demand.
    ///
    /// The demand never drops below [`HEADER_SIZE`]. Pages past the new
    /// page-aligned demand become inaccessible and the OS is told it may
    /// reclaim them.
    pub fn decommit(&mut self, size: usize) -> Result<(), VmError> {
        let size = size.min(self.info.requested_committed);
        self.info.requested_committed = (self.info.requested_committed - size).max(HEADER_SIZE);
        let target = align_to_page(self.info.requested_committed);
        if target >= self.info.committed {
            return Ok(());
        }

        let offset = target;
        let len = self.info.committed - target;
        // SAFETY: [target, committed) lies inside the mapping; the caller
        // gave up this demand so nothing should reference it.
        unsafe { sys::decommit(self.base.as_ptr().add(offset), len) }
            .map_err(|code| VmError::Decommit { offset, size: len, code })?;
        self.info.committed = target;
        tracing::trace!(base = ?self.base, committed = target, "decommitted pages");
        Ok(())
    }

    /// Unmap the whole reservation.
    pub fn release(self) -> Result<(), VmError> {
        let this = std::mem::ManuallyDrop::new(self);
        this.unmap()
    }

    fn unmap(&self) -> Result<(), VmError> {
        // SAFETY: we own the mapping; `self` is being consumed or dropped.
        unsafe { sys::release(self.base.as_ptr(), self.info.size) }.map_err(|code| {
            VmError::Release {
                size: self.info.size,
                code,
            }
        })?;
        tracing::trace!(base = ?self.base, size = self.info.size, "released address space");
        Ok(())
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if let Err(err) = self.unmap() {
            tracing::error!(%err, "reservation leaked");
        }
    }
}

impl fmt::Debug for Reservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reservation")
            .field("base", &self.base)
            .field("info", &self.info)
            .finish()
    }
}
