//! Linear allocator over one virtual-memory reservation.
//!
//! An [`Arena`] reserves its full capacity once and commits pages lazily as
//! the cursor moves forward. Popping the cursor back decommits trailing
//! pages, always leaving the first page committed.

#![allow(unsafe_code)]

use std::alloc::Layout;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::ptr::{self, NonNull};

use strata_core::config::arena_defaults;
use strata_core::fatal;
use strata_vm::{align_to_page, align_up, page_size, reserve, AllocInfo, Reservation};

use crate::error::ArenaError;
use crate::temp::Temp;

/// Bump allocator over a reserved address range.
///
/// Invariant after every call: `0 <= used() <= committed() <= capacity()`,
/// with `committed()` a whole number of pages.
///
/// All operations take `&self`; the arena is `!Sync`, so only one thread
/// can touch it at a time. Returned pointers are raw: they stay valid
/// until the cursor is popped below them or the arena is dropped.
pub struct Arena {
    /// Start of the reservation; pushes return offsets from here.
    base: NonNull<u8>,
    /// Usable bytes (page multiple, at least one page).
    capacity: usize,
    /// Mirror of the reservation's committed prefix.
    committed: Cell<usize>,
    /// Bump cursor.
    position: Cell<usize>,
    /// Alignment applied to every push size.
    align: Cell<usize>,
    reservation: RefCell<Reservation>,
}

// SAFETY: the arena exclusively owns its reservation. `Cell`/`RefCell`
// make it `!Sync`, so moving it to another thread cannot race.
unsafe impl Send for Arena {}

impl Arena {
    /// Create an arena reserving at least `capacity` bytes.
    ///
    /// `capacity` is rounded up to whole pages. Aborts the process if the
    /// OS refuses the reservation.
    pub fn new(capacity: usize) -> Self {
        Self::try_new(capacity).unwrap_or_else(|e| fatal(&e))
    }

    /// Create an arena with the process-wide default capacity and alignment.
    pub fn with_defaults() -> Self {
        Self::new(arena_defaults().default_capacity)
    }

    /// Fallible form of [`Arena::new`].
    pub fn try_new(capacity: usize) -> Result<Self, ArenaError> {
        let page = page_size();
        let capacity = capacity
            .checked_next_multiple_of(page)
            .ok_or(ArenaError::InvalidLayout)?
            .max(page);
        let reservation = reserve(capacity)?;
        let base = reservation.as_ptr();
        let committed = reservation.committed();

        tracing::debug!(capacity, base = ?base, "arena created");
        Ok(Self {
            base,
            capacity,
            committed: Cell::new(committed),
            position: Cell::new(0),
            align: Cell::new(arena_defaults().default_align),
            reservation: RefCell::new(reservation),
        })
    }

    // ── push ───────────────────────────────────────────────────────

    /// Push `size` zeroed bytes.
    ///
    /// Returns the address at the current position and advances the cursor
    /// by `size` rounded up to the arena alignment. A zero-size push returns
    /// the current position without side effects. Aborts if the arena is
    /// full; use [`Arena::try_push`] to handle that case.
    pub fn push(&self, size: usize) -> NonNull<u8> {
        self.try_push(size).unwrap_or_else(|e| fatal(&e))
    }

    /// Like [`Arena::push`], leaving the bytes uninitialized.
    pub fn push_no_zero(&self, size: usize) -> NonNull<u8> {
        self.try_push_no_zero(size).unwrap_or_else(|e| fatal(&e))
    }

    /// Fallible form of [`Arena::push`].
    pub fn try_push(&self, size: usize) -> Result<NonNull<u8>, ArenaError> {
        let ptr = self.try_push_no_zero(size)?;
        // SAFETY: the bump just committed [ptr, ptr + size).
        unsafe { ptr::write_bytes(ptr.as_ptr(), 0, size) };
        Ok(ptr)
    }

    /// Fallible form of [`Arena::push_no_zero`].
    pub fn try_push_no_zero(&self, size: usize) -> Result<NonNull<u8>, ArenaError> {
        self.bump(0, size)
    }

    /// Push zeroed storage for `layout`, padding the cursor to its alignment.
    pub fn try_push_layout(&self, layout: Layout) -> Result<NonNull<u8>, ArenaError> {
        let addr = self.base.as_ptr() as usize + self.position.get();
        let aligned = addr
            .checked_next_multiple_of(layout.align())
            .ok_or(ArenaError::InvalidLayout)?;
        let ptr = self.bump(aligned - addr, layout.size())?;
        // SAFETY: the bump just committed [ptr, ptr + layout.size()).
        unsafe { ptr::write_bytes(ptr.as_ptr(), 0, layout.size()) };
        Ok(ptr)
    }

    /// Push zeroed storage for `len` values of `T`.
    ///
    /// The memory is all-zero bytes, which is not a valid `T` for every
    /// type; initialize before reading. Values are never dropped by the
    /// arena.
    pub fn push_array<T>(&self, len: usize) -> NonNull<T> {
        self.try_push_array(len).unwrap_or_else(|e| fatal(&e))
    }

    /// Fallible form of [`Arena::push_array`].
    pub fn try_push_array<T>(&self, len: usize) -> Result<NonNull<T>, ArenaError> {
        let layout = Layout::array::<T>(len).map_err(|_| ArenaError::InvalidLayout)?;
        Ok(self.try_push_layout(layout)?.cast())
    }

    /// Move `value` into the arena. It is never dropped.
    pub fn push_value<T>(&self, value: T) -> NonNull<T> {
        let ptr: NonNull<T> = self
            .try_push_layout(Layout::new::<T>())
            .unwrap_or_else(|e| fatal(&e))
            .cast();
        // SAFETY: freshly pushed, aligned, and sized for T.
        unsafe { ptr.as_ptr().write(value) };
        ptr
    }

    fn bump(&self, pad: usize, size: usize) -> Result<NonNull<u8>, ArenaError> {
        let position = self.position.get();
        let end = pad
            .checked_add(size)
            .and_then(|n| n.checked_next_multiple_of(self.align.get()))
            .and_then(|n| n.checked_add(position))
            .ok_or(ArenaError::InvalidLayout)?;
        if end > self.capacity {
            return Err(ArenaError::CapacityExceeded {
                requested: pad.saturating_add(size),
                available: self.capacity - position,
                capacity: self.capacity,
            });
        }

        self.grow_committed(end)?;
        self.position.set(end);
        // SAFETY: position + pad <= end <= capacity, inside the reservation.
        Ok(unsafe { NonNull::new_unchecked(self.base.as_ptr().add(position + pad)) })
    }

    fn grow_committed(&self, end: usize) -> Result<(), ArenaError> {
        let target = align_to_page(end);
        let committed = self.committed.get();
        if target > committed {
            let mut reservation = self.reservation.borrow_mut();
            reservation.commit(target - committed)?;
            self.committed.set(reservation.committed());
        }
        Ok(())
    }

    // ── pop ────────────────────────────────────────────────────────

    /// Move the cursor back by `size` rounded up to the arena alignment.
    ///
    /// Popping more than [`Arena::used`] clamps to a full reset. Trailing
    /// pages that fall out of use are decommitted; the first page stays.
    pub fn pop(&self, size: usize) {
        let position = self.position.get();
        let amount = if size >= position {
            position
        } else {
            align_up(size, self.align.get()).min(position)
        };
        self.pop_to(position - amount);
    }

    /// Return the arena to empty without releasing the reservation.
    pub fn reset(&self) {
        self.pop(self.position.get());
    }

    /// Move the cursor back to `position`. No-op if already at or below.
    pub(crate) fn pop_to(&self, position: usize) {
        if position >= self.position.get() {
            return;
        }
        self.position.set(position);

        let target = align_to_page(position).max(page_size());
        let committed = self.committed.get();
        if target < committed {
            let mut reservation = self.reservation.borrow_mut();
            if let Err(e) = reservation.decommit(committed - target) {
                fatal(&e);
            }
            self.committed.set(reservation.committed());
        }
    }

    // ── checkpoints ────────────────────────────────────────────────

    /// Snapshot the cursor. Dropping (or ending) the checkpoint pops
    /// everything pushed since.
    pub fn temp_begin(&self) -> Temp<&Arena> {
        Temp::begin(self)
    }

    // ── accessors ──────────────────────────────────────────────────

    /// Bytes pushed so far (the cursor position).
    pub fn used(&self) -> usize {
        self.position.get()
    }

    /// Bytes available before the arena is full.
    pub fn remaining(&self) -> usize {
        self.capacity - self.position.get()
    }

    /// Usable capacity in bytes (page multiple).
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes currently committed (page multiple, at least one page).
    pub fn committed(&self) -> usize {
        self.committed.get()
    }

    /// Alignment applied to push sizes.
    pub fn align(&self) -> usize {
        self.align.get()
    }

    /// Change the push alignment. Affects future pushes and pops only.
    ///
    /// # Panics
    ///
    /// Panics if `align` is not a power of two.
    pub fn set_align(&self, align: usize) {
        assert!(align.is_power_of_two(), "arena alignment {align} is not a power of two");
        self.align.set(align);
    }

    /// Start of the arena's memory.
    pub fn as_ptr(&self) -> NonNull<u8> {
        self.base
    }

    /// Accounting of the underlying reservation.
    pub fn reservation_info(&self) -> AllocInfo {
        self.reservation.borrow().info()
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        tracing::debug!(capacity = self.capacity, base = ?self.base, "arena destroyed");
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("base", &self.base)
            .field("capacity", &self.capacity)
            .field("committed", &self.committed.get())
            .field("position", &self.position.get())
            .field("align", &self.align.get())
            .finish()
    }
}
