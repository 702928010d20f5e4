//! Configuration error types.

use std::error::Error;
use std::fmt;

/// Errors detected by [`CoreConfig::validate()`](crate::CoreConfig::validate).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// `arena.default_capacity` is zero.
    ZeroArenaCapacity,
    /// `arena.default_align` is zero, not a power of two, or too large.
    InvalidAlignment {
        /// The rejected alignment.
        align: usize,
    },
    /// A pool capacity is zero or leaves no room for reserved slots.
    InvalidPoolCapacity {
        /// Which pool was misconfigured (`"thread"` or `"mutex"`).
        pool: &'static str,
        /// The rejected capacity.
        capacity: u32,
    },
    /// A message level string did not name a known level.
    UnknownMessageLevel {
        /// The string that failed to parse.
        name: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroArenaCapacity => write!(f, "arena default capacity must be non-zero"),
            Self::InvalidAlignment { align } => {
                write!(f, "arena default alignment {align} is not a power of two in [1, 4096]")
            }
            Self::InvalidPoolCapacity { pool, capacity } => {
                write!(f, "{pool} pool capacity {capacity} is out of range")
            }
            Self::UnknownMessageLevel { name } => write!(f, "unknown message level '{name}'"),
        }
    }
}

impl Error for ConfigError {}
