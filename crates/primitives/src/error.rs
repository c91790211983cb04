use std::sync::Arc;

use crate::path::Path;

/// Failure to write through a path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
	/// A write tried to descend through a scalar value.
	#[error("cannot descend into {found} at `{path}`")]
	NotAContainer { path: Path, found: &'static str },
	/// A string key addressed a list.
	#[error("key `{key}` cannot address the list at `{path}`")]
	KeyOnList { path: Path, key: Arc<str> },
}
