//! Fixed-capacity generational slot pool carved from an arena.
//!
//! A [`Pool`] owns the [`Arena`] it lives in. At construction it pushes
//! four parallel regions onto that arena and never grows afterwards:
//!
//! ```text
//! objects      [capacity * stride]  zeroed on every create
//! generations  [capacity] u32       bumped on every destroy
//! used         [capacity] bool
//! free_list    [capacity] u32       LIFO stack of freed indices
//! ```
//!
//! Indices `>= next_index` have never been handed out. Freed indices are
//! reused most-recent-first before any fresh index is taken.

#![allow(unsafe_code)]

use std::alloc::Layout;
use std::fmt;
use std::ptr::{self, NonNull};
use std::slice;

use crate::arena::Arena;
use crate::error::ArenaError;
use crate::handle::PoolHandle;

/// Untyped generational pool of fixed-size slots.
pub struct Pool {
    arena: Arena,
    /// Arena position before the pool's regions were pushed.
    mark: usize,
    objects: NonNull<u8>,
    generations: NonNull<u32>,
    used: NonNull<bool>,
    free_list: NonNull<u32>,
    free_len: u32,
    next_index: u32,
    capacity: u32,
    live: u32,
    stride: usize,
    /// Generation every slot starts at.
    base_generation: u32,
}

// SAFETY: every pointer targets memory inside `arena`, which the pool owns
// and which is itself `Send`.
unsafe impl Send for Pool {}

impl Pool {
    /// Carve a pool of `capacity` slots of `object_size` bytes from `arena`.
    ///
    /// Slots are aligned to the arena's current alignment.
    pub fn new(arena: Arena, capacity: u32, object_size: usize) -> Result<Self, ArenaError> {
        let layout = Layout::from_size_align(object_size, arena.align())
            .map_err(|_| ArenaError::InvalidLayout)?;
        Self::with_layout(arena, capacity, layout)
    }

    /// Carve a pool whose slots fit `layout`.
    pub fn with_layout(arena: Arena, capacity: u32, layout: Layout) -> Result<Self, ArenaError> {
        let stride = slot_stride(layout);
        let len = capacity as usize;
        let bytes = stride.checked_mul(len).ok_or(ArenaError::InvalidLayout)?;
        let objects_layout = Layout::from_size_align(bytes, layout.align())
            .map_err(|_| ArenaError::InvalidLayout)?;

        let mark = arena.used();
        let objects = arena.try_push_layout(objects_layout)?;
        let generations = arena.try_push_array::<u32>(len)?;
        let used = arena.try_push_array::<bool>(len)?;
        let free_list = arena.try_push_array::<u32>(len)?;

        tracing::debug!(capacity, stride, "pool created");
        Ok(Self {
            arena,
            mark,
            objects,
            generations,
            used,
            free_list,
            free_len: 0,
            next_index: 0,
            capacity,
            live: 0,
            stride,
            base_generation: 0,
        })
    }

    /// Build a pool in a fresh arena sized to fit exactly.
    pub fn with_capacity(capacity: u32, layout: Layout) -> Result<Self, ArenaError> {
        let len = capacity as usize;
        let bytes = slot_stride(layout)
            .checked_mul(len)
            .and_then(|n| n.checked_add(len.checked_mul(2 * 4 + 1)?))
            .and_then(|n| n.checked_add(layout.align() + 2 * 4))
            .ok_or(ArenaError::InvalidLayout)?;
        let arena = Arena::try_new(bytes)?;
        arena.set_align(1);
        Self::with_layout(arena, capacity, layout)
    }

    // ── handles ────────────────────────────────────────────────────

    /// Take a slot and return its handle, or [`PoolHandle::INVALID`] when
    /// every slot is in use.
    ///
    /// The slot's bytes are zeroed.
    pub fn create(&mut self) -> PoolHandle {
        let index = if self.free_len > 0 {
            self.free_len -= 1;
            self.free_list()[self.free_len as usize]
        } else if self.next_index < self.capacity {
            self.next_index += 1;
            self.next_index - 1
        } else {
            return PoolHandle::INVALID;
        };

        let i = index as usize;
        self.used_mut()[i] = true;
        // SAFETY: `i < capacity`, so the slot lies inside the object region.
        unsafe { ptr::write_bytes(self.slot(i).as_ptr(), 0, self.stride) };
        self.live += 1;
        PoolHandle::new(self.generations()[i], index)
    }

    /// Release the slot behind `handle`.
    ///
    /// Returns `false` (and does nothing) if the handle is not valid. The
    /// slot's generation is incremented, invalidating every outstanding
    /// copy of `handle`. A slot whose generation wraps back to zero is
    /// retired instead of reused.
    pub fn destroy(&mut self, handle: PoolHandle) -> bool {
        if !self.is_valid(handle) {
            return false;
        }
        let i = handle.index() as usize;
        self.used_mut()[i] = false;
        let generation = self.generations()[i].wrapping_add(1);
        self.generations_mut()[i] = generation;
        self.live -= 1;

        if generation == 0 {
            tracing::debug!(index = i, "pool slot retired after generation wrap");
        } else {
            let top = self.free_len as usize;
            self.free_list_mut()[top] = handle.index();
            self.free_len += 1;
        }
        true
    }

    /// Whether `handle` names a live object in this pool.
    pub fn is_valid(&self, handle: PoolHandle) -> bool {
        if handle.is_invalid() || handle.index() >= self.next_index {
            return false;
        }
        let i = handle.index() as usize;
        self.generations()[i] == handle.generation() && self.used()[i]
    }

    /// Address of the slot behind `handle`, or `None` if it is not valid.
    ///
    /// The pointer stays usable until the handle is destroyed or the pool
    /// is dropped.
    pub fn get_ptr(&self, handle: PoolHandle) -> Option<NonNull<u8>> {
        self.is_valid(handle)
            .then(|| self.slot(handle.index() as usize))
    }

    /// Live handles in index order.
    pub fn iter(&self) -> Iter<'_> {
        Iter { pool: self, next: 0 }
    }

    // ── generations ────────────────────────────────────────────────

    /// Start every slot at `generation` instead of zero.
    ///
    /// Only possible before the first [`create`](Pool::create); returns
    /// `false` and changes nothing afterwards.
    pub fn set_base_generation(&mut self, generation: u32) -> bool {
        if self.next_index > 0 {
            return false;
        }
        self.generations_mut().fill(generation);
        self.base_generation = generation;
        true
    }

    /// One past the highest generation any handle from this pool has
    /// carried, saturating at `u32::MAX`.
    ///
    /// A pool whose base generation is at least this value never hands out
    /// a handle equal to one from this pool.
    pub fn generation_high_water(&self) -> u32 {
        let touched = self.next_index as usize;
        self.generations()[..touched]
            .iter()
            .map(|g| g.saturating_add(1))
            .fold(self.base_generation, u32::max)
    }

    // ── accessors ──────────────────────────────────────────────────

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.live as usize
    }

    /// Whether no object is live.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Maximum number of live objects.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Bytes between consecutive slots.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Give the arena back, popping the pool's regions off it.
    pub fn into_arena(self) -> Arena {
        let Self { arena, mark, .. } = self;
        arena.pop_to(mark);
        arena
    }

    // ── raw regions ────────────────────────────────────────────────

    fn slot(&self, i: usize) -> NonNull<u8> {
        debug_assert!(i < self.capacity as usize);
        // SAFETY: callers pass `i < capacity`.
        unsafe { self.objects.add(i * self.stride) }
    }

    fn generations(&self) -> &[u32] {
        // SAFETY: region of `capacity` u32s pushed at construction.
        unsafe { slice::from_raw_parts(self.generations.as_ptr(), self.capacity as usize) }
    }

    fn generations_mut(&mut self) -> &mut [u32] {
        // SAFETY: as above; `&mut self` makes the borrow unique.
        unsafe { slice::from_raw_parts_mut(self.generations.as_ptr(), self.capacity as usize) }
    }

    fn used(&self) -> &[bool] {
        // SAFETY: zero-initialized bools are `false`.
        unsafe { slice::from_raw_parts(self.used.as_ptr(), self.capacity as usize) }
    }

    fn used_mut(&mut self) -> &mut [bool] {
        // SAFETY: as above.
        unsafe { slice::from_raw_parts_mut(self.used.as_ptr(), self.capacity as usize) }
    }

    fn free_list(&self) -> &[u32] {
        // SAFETY: region of `capacity` u32s pushed at construction.
        unsafe { slice::from_raw_parts(self.free_list.as_ptr(), self.capacity as usize) }
    }

    fn free_list_mut(&mut self) -> &mut [u32] {
        // SAFETY: as above.
        unsafe { slice::from_raw_parts_mut(self.free_list.as_ptr(), self.capacity as usize) }
    }

    #[cfg(test)]
    fn set_generation(&mut self, index: u32, generation: u32) {
        self.generations_mut()[index as usize] = generation;
    }
}

fn slot_stride(layout: Layout) -> usize {
    layout.pad_to_align().size().max(layout.align())
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("capacity", &self.capacity)
            .field("stride", &self.stride)
            .field("live", &self.live)
            .field("next_index", &self.next_index)
            .field("free", &self.free_len)
            .field("base_generation", &self.base_generation)
            .finish()
    }
}

/// Iterator over a pool's live handles. See [`Pool::iter`].
pub struct Iter<'a> {
    pool: &'a Pool,
    next: u32,
}

impl Iterator for Iter<'_> {
    type Item = PoolHandle;

    fn next(&mut self) -> Option<PoolHandle> {
        let used = self.pool.used();
        while self.next < self.pool.next_index {
            let i = self.next as usize;
            self.next += 1;
            if used[i] {
                return Some(PoolHandle::new(self.pool.generations()[i], i as u32));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_vm::page_size;

    fn pool(capacity: u32, object_size: usize) -> Pool {
        let arena = Arena::new(16 * page_size());
        arena.set_align(8);
        Pool::new(arena, capacity, object_size).unwrap()
    }

    #[test]
    fn capacity_one_scenario() {
        let mut p = pool(1, 16);
        let h0 = p.create();
        assert_eq!((h0.generation(), h0.index()), (0, 0));
        assert!(p.is_valid(h0));

        assert!(p.create().is_invalid());

        assert!(p.destroy(h0));
        let h1 = p.create();
        assert_eq!((h1.generation(), h1.index()), (1, 0));
        assert!(p.is_valid(h1));
        assert!(!p.is_valid(h0));
        assert_ne!(h0, h1);
    }

    #[test]
    fn packed_bits_follow_create_order() {
        let mut p = pool(2, 8);
        let a = p.create();
        assert_eq!(a.to_bits(), 0);
        p.destroy(a);
        let b = p.create();
        assert_eq!(b.to_bits(), 1 << 32);
        let c = p.create();
        assert_eq!(c.to_bits(), 1);
        assert_eq!(p.create().to_bits(), u64::MAX);
    }

    #[test]
    fn freed_indices_are_reused_lifo() {
        let mut p = pool(4, 8);
        let hs: Vec<_> = (0..3).map(|_| p.create()).collect();
        p.destroy(hs[0]);
        p.destroy(hs[2]);
        assert_eq!(p.create().index(), 2);
        assert_eq!(p.create().index(), 0);
        assert_eq!(p.create().index(), 3);
    }

    #[test]
    fn destroy_is_noop_on_invalid_handles() {
        let mut p = pool(2, 8);
        let h = p.create();
        assert!(!p.destroy(PoolHandle::INVALID));
        assert!(!p.destroy(PoolHandle::new(0, 1)));
        assert!(!p.destroy(PoolHandle::new(5, 0)));
        assert!(p.destroy(h));
        assert!(!p.destroy(h));
        assert_eq!(p.len(), 0);
    }

    #[test]
    fn slots_are_zeroed_on_create() {
        let mut p = pool(1, 32);
        let h = p.create();
        let ptr = p.get_ptr(h).unwrap();
        unsafe { ptr::write_bytes(ptr.as_ptr(), 0x5A, 32) };
        p.destroy(h);

        let h = p.create();
        let ptr = p.get_ptr(h).unwrap();
        let bytes = unsafe { slice::from_raw_parts(ptr.as_ptr(), 32) };
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn get_ptr_distinct_and_persistent() {
        let mut p = pool(8, 24);
        let hs: Vec<_> = (0..8).map(|_| p.create()).collect();
        let ptrs: Vec<_> = hs.iter().map(|&h| p.get_ptr(h).unwrap()).collect();
        for (i, ptr) in ptrs.iter().enumerate() {
            unsafe { ptr.as_ptr().write(i as u8) };
        }
        for i in 0..ptrs.len() {
            for j in i + 1..ptrs.len() {
                assert_ne!(ptrs[i], ptrs[j]);
            }
        }
        p.destroy(hs[3]);
        p.create();
        for (i, ptr) in ptrs.iter().enumerate() {
            if i != 3 {
                assert_eq!(unsafe { *ptr.as_ptr() }, i as u8);
            }
        }
        assert!(p.get_ptr(hs[3]).is_none());
    }

    #[test]
    fn iter_yields_live_handles_in_index_order() {
        let mut p = pool(5, 8);
        let hs: Vec<_> = (0..5).map(|_| p.create()).collect();
        p.destroy(hs[1]);
        p.destroy(hs[3]);
        let live: Vec<_> = p.iter().collect();
        assert_eq!(live, vec![hs[0], hs[2], hs[4]]);
        assert_eq!(p.len(), 3);
    }

    #[test]
    fn generation_wrap_retires_slot() {
        let mut p = pool(2, 8);
        let h = p.create();
        p.destroy(h);
        p.set_generation(0, u32::MAX);

        let h = p.create();
        assert_eq!((h.generation(), h.index()), (u32::MAX, 0));
        assert!(p.destroy(h));

        // Slot 0 wrapped to generation 0 and is never reissued.
        let next = p.create();
        assert_eq!(next.index(), 1);
        assert!(p.create().is_invalid());
        assert!(!p.is_valid(PoolHandle::new(0, 0)));
    }

    #[test]
    fn base_generation_separates_successive_pools() {
        let mut old = pool(2, 8);
        assert_eq!(old.generation_high_water(), 0);
        let a = old.create();
        let b = old.create();
        old.destroy(a);
        let c = old.create();
        assert_eq!(old.generation_high_water(), 2);

        let mut fresh = pool(2, 8);
        assert!(fresh.set_base_generation(old.generation_high_water()));
        let d = fresh.create();
        let e = fresh.create();
        assert_eq!((d.generation(), d.index()), (2, 0));
        for stale in [a, b, c] {
            assert!(!fresh.is_valid(stale));
            assert_ne!(stale, d);
            assert_ne!(stale, e);
        }
        assert!(!fresh.set_base_generation(7));
        assert_eq!(fresh.generation_high_water(), 3);
    }

    #[test]
    fn zero_capacity_pool_is_always_full() {
        let mut p = pool(0, 8);
        assert!(p.create().is_invalid());
        assert_eq!(p.iter().count(), 0);
    }

    #[test]
    fn zero_size_objects_get_distinct_slots() {
        let mut p = pool(3, 0);
        let a = p.create();
        let b = p.create();
        assert_ne!(p.get_ptr(a), p.get_ptr(b));
    }

    #[test]
    fn slots_respect_layout_alignment() {
        let arena = Arena::new(4 * page_size());
        arena.set_align(1);
        arena.push(3);
        let mut p = Pool::with_layout(arena, 4, Layout::from_size_align(24, 64).unwrap()).unwrap();
        assert_eq!(p.stride(), 64);
        for _ in 0..4 {
            let h = p.create();
            assert_eq!(p.get_ptr(h).unwrap().as_ptr() as usize % 64, 0);
        }
    }

    #[test]
    fn into_arena_pops_pool_regions() {
        let arena = Arena::new(4 * page_size());
        arena.push(40);
        let before = arena.used();
        let p = Pool::new(arena, 32, 16).unwrap();
        let arena = p.into_arena();
        assert_eq!(arena.used(), before);
    }

    #[test]
    fn pool_larger_than_arena_fails() {
        let arena = Arena::new(page_size());
        let err = Pool::new(arena, 1024, 64).unwrap_err();
        assert!(matches!(err, ArenaError::CapacityExceeded { .. }));
    }

    #[test]
    fn with_capacity_fits_exactly() {
        let mut p = Pool::with_capacity(1000, Layout::new::<[u64; 3]>()).unwrap();
        let hs: Vec<_> = (0..1000).map(|_| p.create()).collect();
        assert!(hs.iter().all(|h| !h.is_invalid()));
        assert!(p.create().is_invalid());
    }

    #[cfg(not(miri))]
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn exhaustion_after_capacity_creates(capacity in 1u32..200) {
                let mut p = pool(capacity, 16);
                let mut seen = std::collections::HashSet::new();
                for _ in 0..capacity {
                    let h = p.create();
                    prop_assert!(p.is_valid(h));
                    prop_assert!(seen.insert(h));
                }
                prop_assert!(p.create().is_invalid());
            }

            #[test]
            fn destroyed_handles_never_revalidate(
                ops in proptest::collection::vec(any::<Option<prop::sample::Index>>(), 1..200),
            ) {
                let mut p = pool(8, 8);
                let mut live: Vec<PoolHandle> = Vec::new();
                let mut dead: Vec<PoolHandle> = Vec::new();
                for op in ops {
                    match op {
                        None => {
                            let h = p.create();
                            if !h.is_invalid() {
                                prop_assert!(!dead.contains(&h));
                                live.push(h);
                            }
                        }
                        Some(idx) if !live.is_empty() => {
                            let h = live.swap_remove(idx.index(live.len()));
                            prop_assert!(p.destroy(h));
                            dead.push(h);
                        }
                        Some(_) => {}
                    }
                    for h in &dead {
                        prop_assert!(!p.is_valid(*h));
                    }
                    for h in &live {
                        prop_assert!(p.is_valid(*h));
                    }
                    prop_assert_eq!(p.len(), live.len());
                }
            }
        }
    }
}
