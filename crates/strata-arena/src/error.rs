//! Arena-specific error types.

use std::error::Error;
use std::fmt;

use strata_vm::VmError;

/// Errors that can occur during arena and pool operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArenaError {
    /// The push would move the cursor past the arena's capacity.
    CapacityExceeded {
        /// Number of bytes requested.
        requested: usize,
        /// Bytes still available before the push.
        available: usize,
        /// Total capacity of the arena.
        capacity: usize,
    },
    /// A size or alignment computation overflowed.
    InvalidLayout,
    /// The OS refused a reserve or commit.
    Vm(VmError),
}

impl fmt::Display for ArenaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapacityExceeded {
                requested,
                available,
                capacity,
            } => {
                write!(
                    f,
                    "arena capacity exceeded: requested {requested} bytes, {available} of {capacity} bytes available"
                )
            }
            Self::InvalidLayout => write!(f, "allocation size or alignment overflowed"),
            Self::Vm(e) => write!(f, "virtual memory: {e}"),
        }
    }
}

impl Error for ArenaError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Vm(e) => Some(e),
            _ => None,
        }
    }
}

impl From<VmError> for ArenaError {
    fn from(e: VmError) -> Self {
        Self::Vm(e)
    }
}
