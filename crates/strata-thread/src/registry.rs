//! The registry owning the thread and mutex pools.

use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;
use strata_arena::{ArenaError, PoolHandle, TypedPool};
use strata_core::message::{self, MessageLevel};
use strata_core::{fatal, ThreadConfig};

use crate::guarded::Guarded;
use crate::handle::MutexHandle;
use crate::mutex::{MutexRecord, OsMutex};
use crate::thread::ThreadRecord;

/// Mutex pool slots taken at boot to guard the two pools.
pub const RESERVED_MUTEXES: u32 = 2;

/// Owns every thread and mutex record for one runtime instance.
///
/// All methods take `&self`; the registry is `Sync` and is normally shared
/// behind an `Arc`.
pub struct ThreadRegistry {
    pub(crate) mutexes: Guarded<TypedPool<MutexRecord>>,
    pub(crate) threads: Guarded<TypedPool<ThreadRecord>>,
    config: ThreadConfig,
}

impl ThreadRegistry {
    /// Build both pools. Aborts if the OS refuses the backing memory.
    pub fn new(config: ThreadConfig) -> Self {
        Self::try_new(config).unwrap_or_else(|e| fatal(&e))
    }

    /// Fallible form of [`ThreadRegistry::new`].
    pub fn try_new(config: ThreadConfig) -> Result<Self, ArenaError> {
        Self::try_with_base_generation(config, 0)
    }

    /// Build both pools with every slot starting at `generation`.
    ///
    /// Passing the [`generation_high_water`](Self::generation_high_water)
    /// of an earlier registry keeps its handles from matching any handle
    /// this one issues.
    pub fn try_with_base_generation(
        config: ThreadConfig,
        generation: u32,
    ) -> Result<Self, ArenaError> {
        let mut mutex_pool =
            TypedPool::with_capacity(config.mutex_pool_capacity.saturating_add(RESERVED_MUTEXES))?;
        let mut thread_pool = TypedPool::with_capacity(config.thread_pool_capacity)?;
        mutex_pool.set_base_generation(generation);
        thread_pool.set_base_generation(generation);

        let mutex_guard = Arc::new(OsMutex::new());
        let thread_guard = Arc::new(OsMutex::new());
        for raw in [&mutex_guard, &thread_guard] {
            let inserted = mutex_pool.insert(MutexRecord::new(Arc::clone(raw))).is_ok();
            debug_assert!(inserted, "reserved mutexes fit in the pool");
        }

        tracing::debug!(
            threads = config.thread_pool_capacity,
            mutexes = config.mutex_pool_capacity,
            generation,
            "thread registry created"
        );
        Ok(Self {
            mutexes: Guarded::new(mutex_guard, mutex_pool),
            threads: Guarded::new(thread_guard, thread_pool),
            config,
        })
    }

    /// Capacities this registry was built with.
    pub fn config(&self) -> ThreadConfig {
        self.config
    }

    /// Threads started and not yet joined or detached.
    pub fn live_threads(&self) -> usize {
        self.threads.with(|pool| pool.len())
    }

    /// User mutexes created and not yet destroyed.
    pub fn live_mutexes(&self) -> usize {
        self.mutexes.with(|pool| pool.len()) - RESERVED_MUTEXES as usize
    }

    /// One past the highest generation any thread or mutex handle from this
    /// registry has carried.
    pub fn generation_high_water(&self) -> u32 {
        let mutexes = self.mutexes.with(|pool| pool.generation_high_water());
        let threads = self.threads.with(|pool| pool.generation_high_water());
        mutexes.max(threads)
    }

    /// Destroy every outstanding user mutex and detach every outstanding
    /// thread, warning about each kind of leak.
    ///
    /// The registry stays usable afterwards.
    pub fn shutdown(&self) {
        let mutexes: SmallVec<[PoolHandle; 16]> = self.mutexes.with(|pool| {
            pool.handles()
                .filter(|h| h.index() >= RESERVED_MUTEXES)
                .collect()
        });
        if !mutexes.is_empty() {
            message::emit(
                MessageLevel::Warning,
                format_args!("{} mutexes still live at shutdown, destroying", mutexes.len()),
            );
        }
        for handle in mutexes {
            self.mutex_destroy(MutexHandle(handle));
        }

        let threads: SmallVec<[ThreadRecord; 8]> = self.threads.with(|pool| {
            let handles: SmallVec<[PoolHandle; 16]> = pool.handles().collect();
            handles.into_iter().filter_map(|h| pool.remove(h)).collect()
        });
        if !threads.is_empty() {
            message::emit(
                MessageLevel::Warning,
                format_args!(
                    "{} threads neither joined nor detached at shutdown, detaching",
                    threads.len()
                ),
            );
        }
        // Dropping the join handles detaches the OS threads.
        drop(threads);
        tracing::debug!("thread registry shut down");
    }
}

impl fmt::Debug for ThreadRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadRegistry")
            .field("config", &self.config)
            .field("live_threads", &self.live_threads())
            .field("live_mutexes", &self.live_mutexes())
            .finish()
    }
}
