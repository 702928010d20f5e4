//! Generational pool handles.

use std::fmt;

/// Identifies one object in a [`Pool`](crate::Pool).
///
/// A handle is a `(generation, index)` pair. Destroying an object bumps
/// its slot's generation, so every handle issued before the destroy stops
/// validating even after the slot is reused. Equality compares both
/// halves; there is no arithmetic on handles.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolHandle {
    generation: u32,
    index: u32,
}

impl PoolHandle {
    /// "No handle" / "allocation failed". All bits set.
    pub const INVALID: Self = Self {
        generation: u32::MAX,
        index: u32::MAX,
    };

    pub(crate) const fn new(generation: u32, index: u32) -> Self {
        Self { generation, index }
    }

    /// Generation the slot had when this handle was issued.
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Slot index.
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Whether this is [`PoolHandle::INVALID`].
    ///
    /// A handle that is not the sentinel may still be stale; ask the pool.
    pub const fn is_invalid(self) -> bool {
        self.generation == u32::MAX && self.index == u32::MAX
    }

    /// Packed form: generation in the upper 32 bits, index in the lower.
    pub const fn to_bits(self) -> u64 {
        ((self.generation as u64) << 32) | self.index as u64
    }

    /// Inverse of [`PoolHandle::to_bits`].
    pub const fn from_bits(bits: u64) -> Self {
        Self {
            generation: (bits >> 32) as u32,
            index: bits as u32,
        }
    }
}

impl Default for PoolHandle {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Debug for PoolHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_invalid() {
            f.write_str("PoolHandle(INVALID)")
        } else {
            write!(f, "PoolHandle({}v{})", self.index, self.generation)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_is_all_bits_set() {
        assert_eq!(PoolHandle::INVALID.to_bits(), u64::MAX);
        assert!(PoolHandle::from_bits(u64::MAX).is_invalid());
        assert!(PoolHandle::default().is_invalid());
    }

    #[test]
    fn packed_layout_puts_generation_high() {
        assert_eq!(PoolHandle::new(0, 0).to_bits(), 0);
        assert_eq!(PoolHandle::new(1, 0).to_bits(), 1 << 32);
        assert_eq!(PoolHandle::new(0, 1).to_bits(), 1);

        let h = PoolHandle::from_bits(0x0000_0007_0000_0003);
        assert_eq!(h.generation(), 7);
        assert_eq!(h.index(), 3);
    }

    #[test]
    fn equality_needs_both_halves() {
        assert_ne!(PoolHandle::new(0, 5), PoolHandle::new(1, 5));
        assert_ne!(PoolHandle::new(2, 5), PoolHandle::new(2, 6));
        assert_eq!(PoolHandle::new(2, 5), PoolHandle::new(2, 5));
    }

    #[test]
    fn half_set_is_not_sentinel() {
        assert!(!PoolHandle::new(u32::MAX, 0).is_invalid());
        assert!(!PoolHandle::new(0, u32::MAX).is_invalid());
    }

    #[test]
    fn debug_format() {
        assert_eq!(format!("{:?}", PoolHandle::new(3, 9)), "PoolHandle(9v3)");
        assert_eq!(format!("{:?}", PoolHandle::INVALID), "PoolHandle(INVALID)");
    }
}
