//! Page-state engine.
//!
//! A [`Store`] owns the current immutable state, the undo and redo stacks, a
//! [`HandlerRegistry`] and a [`SyncQueue`](pagesync_sync::SyncQueue). UI events
//! enter through [`Store::update`], which runs every handler registered along
//! the event path inside one [`Transaction`]. Server replies enter through
//! [`Store::handle_server_response`] and never touch undo history.
//!
//! Reusable behavior is packaged as [`Capability`] values that register their
//! handlers under a scope path when the store is built.

/// Bundled capabilities and the trait they implement.
pub mod capabilities;
/// TOML engine configuration.
pub mod config;
/// Engine errors.
pub mod error;
/// Path trie and server-variable handler tables.
pub mod registry;
/// The state store and its transactions.
pub mod store;
/// Adapters for widget callbacks.
pub mod widgets;

pub use capabilities::Capability;
pub use config::{ConfigError, EngineConfig};
pub use error::{Result, StoreError};
pub use pagesync_primitives::{Path, Segment, Value, path};
pub use pagesync_sync as sync;
pub use registry::HandlerRegistry;
pub use store::{Notifier, Renderer, Store, StoreBuilder, Transaction};
