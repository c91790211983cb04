//! Persistent state values for page synchronization: paths, segments and the
//! structurally shared [`Value`] tree.

/// Errors raised by path-addressed writes.
pub mod error;
/// Path segments and the [`path!`] macro.
pub mod path;
/// Immutable, structurally shared value tree.
pub mod value;

pub use error::PathError;
pub use path::{Path, Segment};
pub use value::{List, Map, Value};
