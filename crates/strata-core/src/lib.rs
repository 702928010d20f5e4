//! Core types for the strata runtime.
//!
//! This is the leaf crate with zero internal dependencies. It holds the
//! pieces every other strata crate needs before it can touch memory:
//!
//! - [`CoreConfig`] and its validation ([`ConfigError`]).
//! - Process-wide arena defaults ([`ArenaDefaults`]).
//! - The single diagnostic hook ([`message`]) and the [`fatal`] path used
//!   when an OS primitive fails and there is no sensible continuation.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod message;

pub use config::{ArenaDefaults, CoreConfig, ThreadConfig};
pub use error::ConfigError;
pub use message::{fatal, MessageCallback, MessageLevel, MessagingConfig};
