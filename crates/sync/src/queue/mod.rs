//! Pending command queue.
//!
//! Commands accumulate until [`SyncQueue::flush`], which issues one request
//! per queued command and clears both the queue and the session-variable
//! accumulator without waiting for replies. Replies arrive through an internal
//! channel and are handed back as [`Completed`] values, which the owner runs
//! against its host type `H` on its own schedule.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap as HashMap;
use serde_json::{Map, Value as Json};
use tokio::sync::mpsc;

use crate::accumulator::SessionVarAccumulator;
use crate::command::{CommandParts, SESSION_VAR_KEY};
use crate::error::{Result, SyncError, TransportError};
use crate::transport::{Completion, ReplyHandle, ReplyResult, RequestId, Transport};
use crate::wire::{CacheTokens, FileAttachment, WireRequest};

#[cfg(test)]
mod tests;

/// Receives a successful reply body.
pub type SuccessCallback<H> = Box<dyn FnOnce(&mut H, Json)>;
/// Receives a failed request's error.
pub type ErrorCallback<H> = Box<dyn FnOnce(&mut H, &TransportError)>;

/// Owner of a [`SyncQueue`], used by the default error handler.
pub trait SyncHost {
	/// Shows a request failure to the user.
	fn report_error(&mut self, message: &str);
}

/// Per-request reply callbacks. Either may be absent.
pub struct Callbacks<H> {
	on_success: Option<SuccessCallback<H>>,
	on_error: Option<ErrorCallback<H>>,
}

impl<H> Callbacks<H> {
	pub fn none() -> Self {
		Self {
			on_success: None,
			on_error: None,
		}
	}

	pub fn on_success(f: impl FnOnce(&mut H, Json) + 'static) -> Self {
		Self {
			on_success: Some(Box::new(f)),
			on_error: None,
		}
	}

	pub fn on_error(f: impl FnOnce(&mut H, &TransportError) + 'static) -> Self {
		Self {
			on_success: None,
			on_error: Some(Box::new(f)),
		}
	}

	#[must_use]
	pub fn or_else(mut self, f: impl FnOnce(&mut H, &TransportError) + 'static) -> Self {
		self.on_error = Some(Box::new(f));
		self
	}

	pub fn is_empty(&self) -> bool {
		self.on_success.is_none() && self.on_error.is_none()
	}
}

impl<H> Default for Callbacks<H> {
	fn default() -> Self {
		Self::none()
	}
}

impl<H> fmt::Debug for Callbacks<H> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Callbacks")
			.field("on_success", &self.on_success.is_some())
			.field("on_error", &self.on_error.is_some())
			.finish()
	}
}

struct PendingRequest<H> {
	actions: Map<String, Json>,
	attachment: Option<FileAttachment>,
	callbacks: Callbacks<H>,
}

impl<H> PendingRequest<H> {
	fn empty() -> Self {
		Self {
			actions: Map::new(),
			attachment: None,
			callbacks: Callbacks::none(),
		}
	}
}

/// A finished request, ready to run its callback.
#[must_use = "a completion does nothing until run"]
pub struct Completed<H> {
	id: RequestId,
	callbacks: Callbacks<H>,
	result: ReplyResult,
}

impl<H: SyncHost> Completed<H> {
	pub fn id(&self) -> RequestId {
		self.id
	}

	pub fn result(&self) -> &ReplyResult {
		&self.result
	}

	/// Runs the request's callback, falling back to [`default_error_handler`]
	/// for failures without one.
	pub fn run(self, host: &mut H) {
		let Callbacks {
			on_success,
			on_error,
		} = self.callbacks;
		match self.result {
			Ok(body) => match on_success {
				Some(callback) => callback(host, body),
				None => tracing::debug!(id = %self.id, "sync.completion.unhandled"),
			},
			Err(error) => match on_error {
				Some(callback) => callback(host, &error),
				None => default_error_handler(host, &error),
			},
		}
	}
}

impl<H> fmt::Debug for Completed<H> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Completed")
			.field("id", &self.id)
			.field("result", &self.result)
			.finish_non_exhaustive()
	}
}

/// Ignores aborted requests; logs and reports everything else.
pub fn default_error_handler<H: SyncHost>(host: &mut H, error: &TransportError) {
	if error.is_aborted() {
		tracing::debug!("sync.request_aborted");
		return;
	}
	tracing::warn!(%error, "sync.request_failed");
	host.report_error(&format!("Request failed: {error}"));
}

/// Batches commands and session variables until flushed.
pub struct SyncQueue<H> {
	session_id: String,
	endpoint: Option<String>,
	pending: Vec<PendingRequest<H>>,
	session_vars: SessionVarAccumulator,
	in_flight: HashMap<RequestId, Callbacks<H>>,
	transport: Arc<dyn Transport>,
	completion_tx: mpsc::UnboundedSender<Completion>,
	completion_rx: mpsc::UnboundedReceiver<Completion>,
	next_id: u64,
	tokens: CacheTokens,
	debug: bool,
	flushes: u64,
}

/// Queue contents at one point in time, restored by [`SyncQueue::rollback`].
#[derive(Debug, Clone)]
#[must_use = "a checkpoint does nothing until rolled back to"]
pub struct Checkpoint {
	pending: usize,
	session_vars: SessionVarAccumulator,
	flushes: u64,
}

impl<H> SyncQueue<H> {
	pub fn new(session_id: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
		let (completion_tx, completion_rx) = mpsc::unbounded_channel();
		Self {
			session_id: session_id.into(),
			endpoint: None,
			pending: Vec::new(),
			session_vars: SessionVarAccumulator::new(),
			in_flight: HashMap::default(),
			transport,
			completion_tx,
			completion_rx,
			next_id: 0,
			tokens: CacheTokens::default(),
			debug: false,
			flushes: 0,
		}
	}

	#[must_use]
	pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
		self.endpoint = Some(endpoint.into());
		self
	}

	/// Sets the endpoint requests are posted to.
	pub fn set_endpoint(&mut self, endpoint: impl Into<String>) {
		self.endpoint = Some(endpoint.into());
	}

	pub fn endpoint(&self) -> Option<&str> {
		self.endpoint.as_deref()
	}

	pub fn session_id(&self) -> &str {
		&self.session_id
	}

	pub fn set_session_id(&mut self, session_id: impl Into<String>) {
		self.session_id = session_id.into();
	}

	/// Logs every issued request's fields.
	pub fn set_debug(&mut self, debug: bool) {
		self.debug = debug;
	}

	/// Queues `command`.
	///
	/// The command's `sessionVar` entry is merged into the accumulator and the
	/// remaining actions are queued with `callbacks`. A command with no actions
	/// and no callbacks only contributes its session variables.
	pub fn send(&mut self, command: Json, callbacks: Callbacks<H>) -> Result<()> {
		self.enqueue(command, None, callbacks)
	}

	/// Like [`send`](Self::send), with a file sent as a multipart part.
	pub fn upload_file(
		&mut self,
		command: Json,
		attachment: FileAttachment,
		callbacks: Callbacks<H>,
	) -> Result<()> {
		self.enqueue(command, Some(attachment), callbacks)
	}

	/// Assigns one session variable for the next flush.
	pub fn set_session_var(&mut self, name: impl Into<String>, value: impl Into<Json>) -> Result<()> {
		let mut vars = Map::new();
		vars.insert(name.into(), value.into());
		self.set_session_vars(vars)
	}

	/// Assigns several session variables for the next flush.
	pub fn set_session_vars(&mut self, vars: Map<String, Json>) -> Result<()> {
		let mut command = Map::new();
		command.insert(SESSION_VAR_KEY.to_string(), Json::Object(vars));
		self.send(Json::Object(command), Callbacks::none())
	}

	fn enqueue(
		&mut self,
		command: Json,
		attachment: Option<FileAttachment>,
		callbacks: Callbacks<H>,
	) -> Result<()> {
		let CommandParts {
			actions,
			session_vars,
		} = CommandParts::parse(command)?;
		self.session_vars.merge(&session_vars)?;

		tracing::debug!(
			actions = ?actions.keys().collect::<Vec<_>>(),
			session_vars = session_vars.len(),
			upload = attachment.is_some(),
			"sync.send"
		);

		if actions.is_empty() && attachment.is_none() && callbacks.is_empty() {
			return Ok(());
		}
		self.pending.push(PendingRequest {
			actions,
			attachment,
			callbacks,
		});
		Ok(())
	}

	/// Records the queue so that later sends can be undone.
	pub fn checkpoint(&self) -> Checkpoint {
		Checkpoint {
			pending: self.pending.len(),
			session_vars: self.session_vars.clone(),
			flushes: self.flushes,
		}
	}

	/// Drops every command and session variable queued since `checkpoint`.
	///
	/// Requests already issued by a flush cannot be recalled; if the queue was
	/// flushed since `checkpoint`, it is left as is.
	pub fn rollback(&mut self, checkpoint: Checkpoint) {
		if checkpoint.flushes != self.flushes {
			tracing::warn!("sync.rollback.after_flush");
			return;
		}
		let dropped = self.pending.len().saturating_sub(checkpoint.pending);
		tracing::debug!(dropped, "sync.rollback");
		self.pending.truncate(checkpoint.pending);
		self.session_vars = checkpoint.session_vars;
	}

	/// Commands waiting for the next flush.
	pub fn pending_len(&self) -> usize {
		self.pending.len()
	}

	pub fn session_vars(&self) -> &SessionVarAccumulator {
		&self.session_vars
	}

	/// True when a flush would issue at least one request.
	pub fn has_pending(&self) -> bool {
		!self.pending.is_empty() || !self.session_vars.is_empty()
	}

	/// Requests issued whose completion has not been taken yet.
	pub fn in_flight_len(&self) -> usize {
		self.in_flight.len()
	}

	/// Issues every queued request and returns how many were issued.
	///
	/// Pending session variables with no queued command still go out in one
	/// request of their own. Queue and accumulator are cleared as soon as the
	/// requests are handed to the transport. Without an endpoint nothing is
	/// issued or cleared.
	pub fn flush(&mut self) -> Result<usize> {
		let Some(endpoint) = self.endpoint.clone() else {
			return Err(SyncError::MissingEndpoint);
		};
		if !self.has_pending() {
			tracing::trace!("sync.flush.empty");
			return Ok(0);
		}
		if self.pending.is_empty() {
			self.pending.push(PendingRequest::empty());
		}

		self.flushes += 1;
		let vars = std::mem::take(&mut self.session_vars);
		let pending = std::mem::take(&mut self.pending);
		let count = pending.len();
		tracing::debug!(requests = count, session_vars = vars.len(), "sync.flush");

		for request in pending {
			let id = RequestId(self.next_id);
			self.next_id += 1;
			let wire = WireRequest::build(
				&endpoint,
				&self.session_id,
				&vars,
				&request.actions,
				self.tokens.next(),
				request.attachment,
			);
			if self.debug {
				tracing::debug!(%id, fields = ?wire.fields, "sync.flush_issued");
			}
			self.in_flight.insert(id, request.callbacks);
			self.transport
				.dispatch(wire, ReplyHandle::new(id, self.completion_tx.clone()));
		}
		Ok(count)
	}

	/// Takes every completion that has arrived so far, without waiting.
	pub fn take_completions(&mut self) -> Vec<Completed<H>> {
		let mut done = Vec::new();
		while let Ok(completion) = self.completion_rx.try_recv() {
			if let Some(completed) = self.claim(completion) {
				done.push(completed);
			}
		}
		done
	}

	/// Waits for the next completion. Returns `None` when nothing is in flight.
	pub async fn next_completion(&mut self) -> Option<Completed<H>> {
		while !self.in_flight.is_empty() {
			let completion = self.completion_rx.recv().await?;
			if let Some(completed) = self.claim(completion) {
				return Some(completed);
			}
		}
		None
	}

	fn claim(&mut self, completion: Completion) -> Option<Completed<H>> {
		let Completion { id, result } = completion;
		let Some(callbacks) = self.in_flight.remove(&id) else {
			tracing::warn!(%id, "sync.completion.unknown");
			return None;
		};
		tracing::debug!(%id, ok = result.is_ok(), "sync.completion");
		Some(Completed {
			id,
			callbacks,
			result,
		})
	}
}

impl<H> fmt::Debug for SyncQueue<H> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SyncQueue")
			.field("session_id", &self.session_id)
			.field("endpoint", &self.endpoint)
			.field("pending", &self.pending.len())
			.field("session_vars", &self.session_vars)
			.field("in_flight", &self.in_flight.len())
			.finish_non_exhaustive()
	}
}
