//! Process-wide init and terminate.

use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use strata_arena::ThreadContext;
use strata_core::config::{reset_arena_defaults, set_arena_defaults};
use strata_core::message::{self, MessageLevel};
use strata_core::{fatal, ConfigError, CoreConfig};
use strata_thread::ThreadRegistry;

static REGISTRY: RwLock<Option<Arc<ThreadRegistry>>> = RwLock::new(None);

/// Generation the next registry starts its slots at. Raised by every
/// [`terminate`] so handles never outlive their runtime instance.
static NEXT_GENERATION: AtomicU32 = AtomicU32::new(0);

/// Why [`init`] refused to start the runtime.
#[derive(Debug, PartialEq)]
pub enum InitError {
    /// A configuration value is out of range.
    Config(ConfigError),
    /// [`init`] already ran and [`terminate`] has not.
    AlreadyInitialized,
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "invalid configuration: {e}"),
            Self::AlreadyInitialized => write!(f, "strata is already initialized"),
        }
    }
}

impl Error for InitError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::AlreadyInitialized => None,
        }
    }
}

impl From<ConfigError> for InitError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

/// Start the runtime.
///
/// Validates `config`, installs the message hook and arena defaults,
/// builds the thread and mutex pools, and gives the calling thread a
/// scratch context. Call [`terminate`] from the same thread when done.
pub fn init(config: CoreConfig) -> Result<(), InitError> {
    config.validate()?;
    let CoreConfig {
        threads,
        messaging,
        arena,
    } = config;

    let mut slot = REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
    if slot.is_some() {
        return Err(InitError::AlreadyInitialized);
    }

    message::install(messaging);
    set_arena_defaults(arena);
    strata_vm::init();
    let generation = NEXT_GENERATION.load(Ordering::Acquire);
    let registry = ThreadRegistry::try_with_base_generation(threads, generation)
        .unwrap_or_else(|e| fatal(&e));
    *slot = Some(Arc::new(registry));
    drop(slot);

    ThreadContext::new().install();
    message::emit(
        MessageLevel::Trace,
        format_args!(
            "strata initialized: {} thread slots, {} mutex slots",
            threads.thread_pool_capacity, threads.mutex_pool_capacity
        ),
    );
    Ok(())
}

/// Stop the runtime.
///
/// Drops the calling thread's scratch context, destroys leftover mutexes,
/// detaches leftover threads, and clears the message hook and arena
/// defaults. Handles issued before `terminate` stay invalid after a later
/// [`init`]. Must be the last strata call on the thread that called
/// [`init`]. A no-op if the runtime is not running.
pub fn terminate() {
    let registry = REGISTRY
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    let Some(registry) = registry else {
        tracing::debug!("terminate without init");
        return;
    };

    drop(ThreadContext::uninstall());
    registry.shutdown();
    NEXT_GENERATION.fetch_max(registry.generation_high_water(), Ordering::AcqRel);
    message::emit(
        MessageLevel::Trace,
        format_args!("strata terminated after {:.3}s", strata_vm::elapsed()),
    );
    message::reset();
    reset_arena_defaults();
}

/// Whether [`init`] has run without a matching [`terminate`].
pub fn is_initialized() -> bool {
    REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .is_some()
}

/// The running registry, if any.
pub fn registry() -> Option<Arc<ThreadRegistry>> {
    REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Run `f` against the registry, or report `op` at `Error` and return
/// `fallback` when the runtime is not running.
pub(crate) fn with_registry<R>(op: &str, fallback: R, f: impl FnOnce(&ThreadRegistry) -> R) -> R {
    match registry() {
        Some(registry) => f(&registry),
        None => {
            message::emit(
                MessageLevel::Error,
                format_args!("{op} called before strata::init"),
            );
            fallback
        }
    }
}
