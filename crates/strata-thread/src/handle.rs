//! Typed handles for threads and mutexes.

use std::fmt;

use strata_arena::PoolHandle;

/// A thread started through a [`ThreadRegistry`](crate::ThreadRegistry).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct ThreadHandle(pub(crate) PoolHandle);

impl ThreadHandle {
    /// The "no handle" sentinel returned on failure.
    pub const INVALID: Self = Self(PoolHandle::INVALID);

    /// Whether this is the sentinel. A non-sentinel handle may still be
    /// stale.
    pub const fn is_invalid(self) -> bool {
        self.0.is_invalid()
    }

    /// The underlying pool handle.
    pub const fn pool_handle(self) -> PoolHandle {
        self.0
    }

    /// Packed `generation << 32 | index` form.
    pub const fn to_bits(self) -> u64 {
        self.0.to_bits()
    }

    /// Inverse of [`ThreadHandle::to_bits`].
    pub const fn from_bits(bits: u64) -> Self {
        Self(PoolHandle::from_bits(bits))
    }
}

impl fmt::Display for ThreadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thread {}v{}", self.0.index(), self.0.generation())
    }
}

/// A mutex created through a [`ThreadRegistry`](crate::ThreadRegistry).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct MutexHandle(pub(crate) PoolHandle);

impl MutexHandle {
    /// The "no handle" sentinel returned on failure.
    pub const INVALID: Self = Self(PoolHandle::INVALID);

    /// Whether this is the sentinel.
    pub const fn is_invalid(self) -> bool {
        self.0.is_invalid()
    }

    /// The underlying pool handle.
    pub const fn pool_handle(self) -> PoolHandle {
        self.0
    }

    /// Packed `generation << 32 | index` form.
    pub const fn to_bits(self) -> u64 {
        self.0.to_bits()
    }

    /// Inverse of [`MutexHandle::to_bits`].
    pub const fn from_bits(bits: u64) -> Self {
        Self(PoolHandle::from_bits(bits))
    }
}

impl fmt::Display for MutexHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mutex {}v{}", self.0.index(), self.0.generation())
    }
}
