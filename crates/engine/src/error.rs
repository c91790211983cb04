use pagesync_primitives::{Path, PathError};
use pagesync_sync::SyncError;
use serde_json::Value as Json;

/// Failure of a store operation. Any error aborts the running transaction.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
	#[error(transparent)]
	Sync(#[from] SyncError),
	#[error(transparent)]
	Path(#[from] PathError),
	#[error("server response must be a JSON object, got {0}")]
	MalformedResponse(Json),
	/// A handler rejected its input.
	#[error("{path}: {message}")]
	Handler { path: Path, message: String },
}

impl StoreError {
	pub fn handler(path: &Path, message: impl Into<String>) -> Self {
		Self::Handler {
			path: path.clone(),
			message: message.into(),
		}
	}
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;
