//! Transport double that records requests and resolves them on demand.

use parking_lot::Mutex;
use serde_json::Value as Json;

use crate::error::TransportError;
use crate::transport::{ReplyHandle, ReplyResult, Transport};
use crate::wire::WireRequest;

struct Recorded {
	request: WireRequest,
	reply: Option<ReplyHandle>,
}

/// Records every dispatched request and holds its reply handle until a test
/// resolves it.
#[derive(Default)]
pub struct RecordingTransport {
	recorded: Mutex<Vec<Recorded>>,
}

impl RecordingTransport {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn requests(&self) -> Vec<WireRequest> {
		self.recorded
			.lock()
			.iter()
			.map(|r| r.request.clone())
			.collect()
	}

	pub fn request(&self, index: usize) -> Option<WireRequest> {
		self.recorded.lock().get(index).map(|r| r.request.clone())
	}

	pub fn len(&self) -> usize {
		self.recorded.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.recorded.lock().is_empty()
	}

	/// Resolves request `index`. Returns false if it was already resolved.
	pub fn resolve(&self, index: usize, result: ReplyResult) -> bool {
		let reply = self
			.recorded
			.lock()
			.get_mut(index)
			.and_then(|r| r.reply.take());
		match reply {
			Some(reply) => {
				reply.resolve(result);
				true
			}
			None => false,
		}
	}

	pub fn respond(&self, index: usize, body: Json) -> bool {
		self.resolve(index, Ok(body))
	}

	pub fn fail(&self, index: usize, error: TransportError) -> bool {
		self.resolve(index, Err(error))
	}

	/// Drops the reply handle, which reports the request as aborted.
	pub fn abandon(&self, index: usize) -> bool {
		let reply = self
			.recorded
			.lock()
			.get_mut(index)
			.and_then(|r| r.reply.take());
		reply.is_some()
	}
}

impl Transport for RecordingTransport {
	fn dispatch(&self, request: WireRequest, reply: ReplyHandle) {
		self.recorded.lock().push(Recorded {
			request,
			reply: Some(reply),
		});
	}
}
