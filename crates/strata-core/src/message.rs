//! The process-wide diagnostic hook.
//!
//! Non-fatal conditions (pool exhaustion, aliased scratch requests, leaked
//! mutexes at shutdown) are reported through one callback configured at
//! init. A message is a severity plus a string; there is no structured
//! error object. Every message is also forwarded to `tracing` so hosts
//! with a subscriber see it without installing a callback.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::ConfigError;

/// Message severity, most severe first.
///
/// A message is delivered when `level <= configured level`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MessageLevel {
    /// The process is about to abort.
    Fatal,
    /// A call failed and returned a sentinel.
    Error,
    /// Resource pressure or a likely caller mistake.
    Warning,
    /// Noteworthy lifecycle events. The default threshold.
    Important,
    /// Routine lifecycle events.
    Info,
    /// Everything.
    Trace,
}

impl MessageLevel {
    /// Lower-case name, as accepted by [`FromStr`].
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fatal => "fatal",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Important => "important",
            Self::Info => "info",
            Self::Trace => "trace",
        }
    }
}

impl fmt::Display for MessageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fatal" => Ok(Self::Fatal),
            "error" => Ok(Self::Error),
            "warning" | "warn" => Ok(Self::Warning),
            "important" => Ok(Self::Important),
            "info" => Ok(Self::Info),
            "trace" => Ok(Self::Trace),
            _ => Err(ConfigError::UnknownMessageLevel { name: s.to_owned() }),
        }
    }
}

/// Callback receiving every delivered message.
pub type MessageCallback = Arc<dyn Fn(MessageLevel, &str) + Send + Sync>;

/// Messaging section of [`CoreConfig`](crate::CoreConfig).
#[derive(Clone)]
pub struct MessagingConfig {
    /// Receiver of delivered messages. `None` discards them.
    pub callback: Option<MessageCallback>,
    /// Most verbose level delivered. Default: [`MessageLevel::Important`].
    pub level: MessageLevel,
}

impl MessagingConfig {
    /// Config delivering messages up to `level` to `callback`.
    pub fn new<F>(level: MessageLevel, callback: F) -> Self
    where
        F: Fn(MessageLevel, &str) + Send + Sync + 'static,
    {
        Self {
            callback: Some(Arc::new(callback)),
            level,
        }
    }
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            callback: None,
            level: MessageLevel::Important,
        }
    }
}

impl fmt::Debug for MessagingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessagingConfig")
            .field("callback", &self.callback.as_ref().map(|_| "<fn>"))
            .field("level", &self.level)
            .finish()
    }
}

static HOOK: RwLock<Option<MessagingConfig>> = RwLock::new(None);

/// Install the process-wide hook, replacing any previous one.
pub fn install(config: MessagingConfig) {
    *HOOK.write().unwrap_or_else(PoisonError::into_inner) = Some(config);
}

/// Remove the hook. Later messages only reach `tracing`.
pub fn reset() {
    *HOOK.write().unwrap_or_else(PoisonError::into_inner) = None;
}

/// Emit a message.
///
/// The callback runs after the hook lock is released, so a callback may
/// itself call [`install`] or [`emit`].
pub fn emit(level: MessageLevel, args: fmt::Arguments<'_>) {
    match level {
        MessageLevel::Fatal | MessageLevel::Error => tracing::error!(target: "strata", "{args}"),
        MessageLevel::Warning => tracing::warn!(target: "strata", "{args}"),
        MessageLevel::Important | MessageLevel::Info => tracing::info!(target: "strata", "{args}"),
        MessageLevel::Trace => tracing::trace!(target: "strata", "{args}"),
    }

    let callback = {
        let hook = HOOK.read().unwrap_or_else(PoisonError::into_inner);
        match hook.as_ref() {
            Some(MessagingConfig {
                callback: Some(cb),
                level: threshold,
            }) if level <= *threshold => Arc::clone(cb),
            _ => return,
        }
    };
    callback(level, &args.to_string());
}

/// Report an unrecoverable failure and abort the process.
///
/// Used when an OS primitive (reservation, commit, thread creation) fails:
/// every higher layer assumes those succeed, so continuing would leave the
/// process in an inconsistent state.
pub fn fatal(err: &dyn fmt::Display) -> ! {
    emit(MessageLevel::Fatal, format_args!("{err}"));
    std::process::abort()
}
