//! Owned values behind generational handles.

#![allow(unsafe_code)]

use std::alloc::Layout;
use std::fmt;
use std::marker::PhantomData;
use std::ptr::{self, NonNull};

use crate::arena::Arena;
use crate::error::ArenaError;
use crate::handle::PoolHandle;
use crate::pool::Pool;

/// A [`Pool`] whose slots hold values of `T`.
///
/// Values are moved in by [`insert`](TypedPool::insert) and moved out by
/// [`remove`](TypedPool::remove); anything still live when the pool is
/// dropped is dropped with it.
pub struct TypedPool<T> {
    pool: Pool,
    _marker: PhantomData<T>,
}

impl<T> TypedPool<T> {
    /// Carve a pool of `capacity` slots of `T` from `arena`.
    pub fn new(arena: Arena, capacity: u32) -> Result<Self, ArenaError> {
        Ok(Self {
            pool: Pool::with_layout(arena, capacity, Layout::new::<T>())?,
            _marker: PhantomData,
        })
    }

    /// Build a pool of `capacity` slots in a fresh, exactly-sized arena.
    pub fn with_capacity(capacity: u32) -> Result<Self, ArenaError> {
        Ok(Self {
            pool: Pool::with_capacity(capacity, Layout::new::<T>())?,
            _marker: PhantomData,
        })
    }

    /// Store `value`, handing it back if the pool is full.
    pub fn insert(&mut self, value: T) -> Result<PoolHandle, T> {
        let handle = self.pool.create();
        let Some(slot) = self.slot(handle) else {
            return Err(value);
        };
        // SAFETY: fresh slot, sized and aligned for T, nothing stored yet.
        unsafe { slot.as_ptr().write(value) };
        Ok(handle)
    }

    /// Borrow the value behind `handle`.
    pub fn get(&self, handle: PoolHandle) -> Option<&T> {
        // SAFETY: a valid handle always points at an initialized T.
        self.slot(handle).map(|p| unsafe { &*p.as_ptr() })
    }

    /// Mutably borrow the value behind `handle`.
    pub fn get_mut(&mut self, handle: PoolHandle) -> Option<&mut T> {
        // SAFETY: as in `get`; `&mut self` makes the borrow unique.
        self.slot(handle).map(|p| unsafe { &mut *p.as_ptr() })
    }

    /// Move the value out and invalidate `handle`.
    pub fn remove(&mut self, handle: PoolHandle) -> Option<T> {
        let slot = self.slot(handle)?;
        // SAFETY: the slot holds an initialized T; the destroy below makes
        // sure it is never read again.
        let value = unsafe { slot.as_ptr().read() };
        self.pool.destroy(handle);
        Some(value)
    }

    /// Whether `handle` names a live value.
    pub fn contains(&self, handle: PoolHandle) -> bool {
        self.pool.is_valid(handle)
    }

    /// Live handles in index order.
    pub fn handles(&self) -> crate::pool::Iter<'_> {
        self.pool.iter()
    }

    /// Live `(handle, value)` pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (PoolHandle, &T)> + '_ {
        self.pool
            .iter()
            .filter_map(move |h| self.get(h).map(|v| (h, v)))
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.pool.len()
    }

    /// Whether no value is live.
    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// Maximum number of live values.
    pub fn capacity(&self) -> u32 {
        self.pool.capacity()
    }

    /// See [`Pool::set_base_generation`].
    pub fn set_base_generation(&mut self, generation: u32) -> bool {
        self.pool.set_base_generation(generation)
    }

    /// See [`Pool::generation_high_water`].
    pub fn generation_high_water(&self) -> u32 {
        self.pool.generation_high_water()
    }

    fn slot(&self, handle: PoolHandle) -> Option<NonNull<T>> {
        self.pool.get_ptr(handle).map(NonNull::cast)
    }
}

impl<T> Drop for TypedPool<T> {
    fn drop(&mut self) {
        if !std::mem::needs_drop::<T>() {
            return;
        }
        for handle in self.pool.iter() {
            if let Some(slot) = self.slot(handle) {
                // SAFETY: live slot, dropped exactly once here.
                unsafe { ptr::drop_in_place(slot.as_ptr()) };
            }
        }
    }
}

impl<T> fmt::Debug for TypedPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedPool")
            .field("type", &std::any::type_name::<T>())
            .field("pool", &self.pool)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn insert_get_remove() {
        let mut pool = TypedPool::with_capacity(4).unwrap();
        let h = pool.insert(String::from("alpha")).unwrap();
        assert_eq!(pool.get(h).map(String::as_str), Some("alpha"));

        pool.get_mut(h).unwrap().push_str("-beta");
        assert_eq!(pool.remove(h).as_deref(), Some("alpha-beta"));
        assert!(pool.get(h).is_none());
        assert!(pool.remove(h).is_none());
    }

    #[test]
    fn full_pool_returns_value() {
        let mut pool = TypedPool::with_capacity(1).unwrap();
        pool.insert(1u64).unwrap();
        assert_eq!(pool.insert(2u64), Err(2));
    }

    #[test]
    fn stale_handle_after_reuse() {
        let mut pool = TypedPool::with_capacity(1).unwrap();
        let a = pool.insert('a').unwrap();
        pool.remove(a);
        let b = pool.insert('b').unwrap();
        assert_eq!(a.index(), b.index());
        assert!(pool.get(a).is_none());
        assert_eq!(pool.get(b), Some(&'b'));
    }

    #[test]
    fn drop_releases_live_values() {
        let tracker = Rc::new(());
        {
            let mut pool = TypedPool::with_capacity(8).unwrap();
            for _ in 0..5 {
                pool.insert(Rc::clone(&tracker)).unwrap();
            }
            let h = pool.insert(Rc::clone(&tracker)).unwrap();
            drop(pool.remove(h));
            assert_eq!(Rc::strong_count(&tracker), 6);
        }
        assert_eq!(Rc::strong_count(&tracker), 1);
    }

    #[test]
    fn iter_pairs_handles_with_values() {
        let mut pool = TypedPool::with_capacity(4).unwrap();
        let hs: Vec<_> = (10u32..14).map(|v| pool.insert(v).unwrap()).collect();
        pool.remove(hs[1]);
        let got: Vec<_> = pool.iter().map(|(h, v)| (h, *v)).collect();
        assert_eq!(got, vec![(hs[0], 10), (hs[2], 12), (hs[3], 13)]);
        assert_eq!(pool.handles().count(), 3);
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn over_aligned_values() {
        #[derive(Debug)]
        #[repr(align(128))]
        struct Wide(u8);

        let mut pool = TypedPool::with_capacity(3).unwrap();
        for i in 0..3 {
            let h = pool.insert(Wide(i)).unwrap();
            let addr = pool.get(h).unwrap() as *const Wide as usize;
            assert_eq!(addr % 128, 0);
            assert_eq!(pool.get(h).unwrap().0, i);
        }
    }

    #[test]
    fn zero_sized_values() {
        let mut pool = TypedPool::with_capacity(2).unwrap();
        let a = pool.insert(()).unwrap();
        let b = pool.insert(()).unwrap();
        assert_ne!(a, b);
        assert_eq!(pool.insert(()), Err(()));
    }
}
