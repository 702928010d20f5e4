//! Virtual-memory error types.

use std::error::Error;
use std::fmt;

/// Failure of an OS memory primitive.
///
/// `code` carries the raw OS error (`errno` / `GetLastError`) when the
/// platform reported one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VmError {
    /// Address-space reservation failed.
    Reserve {
        /// Bytes requested, after page rounding.
        size: usize,
        /// Raw OS error code.
        code: Option<i32>,
    },
    /// Granting read/write access to a range failed.
    Commit {
        /// Offset of the range within the reservation.
        offset: usize,
        /// Length of the range.
        size: usize,
        /// Raw OS error code.
        code: Option<i32>,
    },
    /// Revoking access to a range failed.
    Decommit {
        /// Offset of the range within the reservation.
        offset: usize,
        /// Length of the range.
        size: usize,
        /// Raw OS error code.
        code: Option<i32>,
    },
    /// Unmapping the reservation failed.
    Release {
        /// Total size of the reservation.
        size: usize,
        /// Raw OS error code.
        code: Option<i32>,
    },
}

impl VmError {
    /// Raw OS error code, if any.
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Reserve { code, .. }
            | Self::Commit { code, .. }
            | Self::Decommit { code, .. }
            | Self::Release { code, .. } => *code,
        }
    }
}

struct Code(Option<i32>);

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(code) => write!(f, " (os error {code})"),
            None => Ok(()),
        }
    }
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reserve { size, code } => {
                write!(f, "failed to reserve {size} bytes of address space{}", Code(*code))
            }
            Self::Commit { offset, size, code } => write!(
                f,
                "failed to commit {size} bytes at offset {offset}{}",
                Code(*code)
            ),
            Self::Decommit { offset, size, code } => write!(
                f,
                "failed to decommit {size} bytes at offset {offset}{}",
                Code(*code)
            ),
            Self::Release { size, code } => {
                write!(f, "failed to release {size}-byte reservation{}", Code(*code))
            }
        }
    }
}

impl Error for VmError {}
