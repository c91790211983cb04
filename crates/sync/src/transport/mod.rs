use std::fmt;

use serde_json::Value as Json;
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::wire::WireRequest;

#[cfg(feature = "http")]
mod http;

#[cfg(feature = "http")]
pub use http::HttpTransport;

/// Outcome of one request: the decoded JSON body or a transport failure.
pub type ReplyResult = Result<Json, TransportError>;

/// Identifies one issued request within its queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub(crate) u64);

impl fmt::Display for RequestId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// Carries requests to the server.
///
/// `dispatch` must not block. The transport resolves `reply` whenever the
/// request finishes, on any thread. Dropping `reply` unresolved reports the
/// request as [`TransportError::Aborted`].
pub trait Transport: Send + Sync {
	fn dispatch(&self, request: WireRequest, reply: ReplyHandle);
}

#[derive(Debug)]
pub(crate) struct Completion {
	pub(crate) id: RequestId,
	pub(crate) result: ReplyResult,
}

/// One-shot completion slot for an issued request.
#[derive(Debug)]
pub struct ReplyHandle {
	id: RequestId,
	tx: Option<mpsc::UnboundedSender<Completion>>,
}

impl ReplyHandle {
	pub(crate) fn new(id: RequestId, tx: mpsc::UnboundedSender<Completion>) -> Self {
		Self { id, tx: Some(tx) }
	}

	pub fn id(&self) -> RequestId {
		self.id
	}

	pub fn resolve(mut self, result: ReplyResult) {
		self.send(result);
	}

	fn send(&mut self, result: ReplyResult) {
		let Some(tx) = self.tx.take() else {
			return;
		};
		if tx.send(Completion { id: self.id, result }).is_err() {
			tracing::trace!(id = %self.id, "sync.reply_dropped");
		}
	}
}

impl Drop for ReplyHandle {
	fn drop(&mut self) {
		self.send(Err(TransportError::Aborted));
	}
}
