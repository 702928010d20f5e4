//! Runtime configuration and process-wide arena defaults.
//!
//! [`CoreConfig`] is the input to the process-wide init call. Arena
//! defaults are copied into atomics at init so that arena construction
//! on any thread can read them without locking.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::ConfigError;
use crate::message::MessagingConfig;

// ── ArenaDefaults ──────────────────────────────────────────────────

/// Default reservation size and alignment for arenas created without an
/// explicit capacity (including every scratch arena).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArenaDefaults {
    /// Bytes of address space reserved per arena. Default: 4 GiB on
    /// 64-bit targets, 1 GiB elsewhere.
    pub default_capacity: usize,
    /// Alignment applied to every push. Default: native pointer width.
    pub default_align: usize,
}

impl ArenaDefaults {
    /// Default reservation per arena.
    #[cfg(target_pointer_width = "64")]
    pub const DEFAULT_CAPACITY: usize = 4 << 30;
    /// Default reservation per arena.
    #[cfg(not(target_pointer_width = "64"))]
    pub const DEFAULT_CAPACITY: usize = 1 << 30;

    /// Default push alignment.
    pub const DEFAULT_ALIGN: usize = std::mem::size_of::<usize>();

    /// Largest alignment accepted by validation.
    pub const MAX_ALIGN: usize = 4096;

    /// Check the alignment and capacity values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_capacity == 0 {
            return Err(ConfigError::ZeroArenaCapacity);
        }
        if !self.default_align.is_power_of_two() || self.default_align > Self::MAX_ALIGN {
            return Err(ConfigError::InvalidAlignment {
                align: self.default_align,
            });
        }
        Ok(())
    }
}

impl Default for ArenaDefaults {
    fn default() -> Self {
        Self {
            default_capacity: Self::DEFAULT_CAPACITY,
            default_align: Self::DEFAULT_ALIGN,
        }
    }
}

static DEFAULT_CAPACITY: AtomicUsize = AtomicUsize::new(ArenaDefaults::DEFAULT_CAPACITY);
static DEFAULT_ALIGN: AtomicUsize = AtomicUsize::new(ArenaDefaults::DEFAULT_ALIGN);

/// Install process-wide arena defaults.
///
/// Affects arenas created after the call; existing arenas keep their
/// own capacity and alignment.
pub fn set_arena_defaults(defaults: ArenaDefaults) {
    DEFAULT_CAPACITY.store(defaults.default_capacity, Ordering::Relaxed);
    DEFAULT_ALIGN.store(defaults.default_align, Ordering::Relaxed);
}

/// Current process-wide arena defaults.
pub fn arena_defaults() -> ArenaDefaults {
    ArenaDefaults {
        default_capacity: DEFAULT_CAPACITY.load(Ordering::Relaxed),
        default_align: DEFAULT_ALIGN.load(Ordering::Relaxed),
    }
}

/// Restore the built-in arena defaults.
pub fn reset_arena_defaults() {
    set_arena_defaults(ArenaDefaults::default());
}

// ── ThreadConfig ───────────────────────────────────────────────────

/// Capacities of the thread and mutex pools.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThreadConfig {
    /// Maximum number of live thread records. Default: 256.
    pub thread_pool_capacity: u32,
    /// Maximum number of live user mutexes. Default: 256.
    pub mutex_pool_capacity: u32,
}

impl ThreadConfig {
    /// Default thread pool capacity.
    pub const DEFAULT_THREAD_POOL_CAPACITY: u32 = 256;
    /// Default mutex pool capacity.
    pub const DEFAULT_MUTEX_POOL_CAPACITY: u32 = 256;
    /// Upper bound on either pool so reserved slots and the invalid
    /// index never collide.
    pub const MAX_POOL_CAPACITY: u32 = u32::MAX - 16;

    /// Check both capacities.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_pool("thread", self.thread_pool_capacity)?;
        check_pool("mutex", self.mutex_pool_capacity)
    }
}

fn check_pool(pool: &'static str, capacity: u32) -> Result<(), ConfigError> {
    if capacity == 0 || capacity > ThreadConfig::MAX_POOL_CAPACITY {
        return Err(ConfigError::InvalidPoolCapacity { pool, capacity });
    }
    Ok(())
}

impl Default for ThreadConfig {
    fn default() -> Self {
        Self {
            thread_pool_capacity: Self::DEFAULT_THREAD_POOL_CAPACITY,
            mutex_pool_capacity: Self::DEFAULT_MUTEX_POOL_CAPACITY,
        }
    }
}

// ── CoreConfig ─────────────────────────────────────────────────────

/// Input to the process-wide init call.
#[derive(Clone, Debug, Default)]
pub struct CoreConfig {
    /// Thread and mutex pool sizing.
    pub threads: ThreadConfig,
    /// Diagnostic hook and its severity threshold.
    pub messaging: MessagingConfig,
    /// Defaults for arenas created without explicit parameters.
    pub arena: ArenaDefaults,
}

impl CoreConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.threads.validate()?;
        self.arena.validate()
    }
}
