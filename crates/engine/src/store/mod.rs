//! The state store.
//!
//! Every UI-driven transition ([`Store::update`]) pushes the previous root on
//! the undo stack and clears the redo stack. Server-driven transitions
//! ([`Store::handle_server_response`], [`Store::bootstrap`]) replace the
//! current root without touching either stack, so a server reply is never an
//! undo step of its own.
//!
//! The `canUndo` and `canRedo` flags live at the top level of state so the
//! view can read them like any other value. They are rewritten on every
//! update, undo and redo.

use std::fmt;
use std::sync::Arc;

use pagesync_primitives::{Path, Value, path};
use pagesync_sync::{Callbacks, SyncHost, SyncQueue, Transport};
use serde_json::{Map, Value as Json};
use tokio::runtime::Handle;

use crate::capabilities::Capability;
use crate::config::EngineConfig;
use crate::error::{Result, StoreError};
use crate::registry::HandlerRegistry;

mod transaction;


pub use transaction::Transaction;
use transaction::Outcome;

pub const CAN_UNDO: &str = "canUndo";
pub const CAN_REDO: &str = "canRedo";
/// Response key carrying a server-side error message.
pub const ERROR_KEY: &str = "error";
/// Response key carrying server-side warnings.
pub const WARNING_KEY: &str = "warning";

/// Receives every committed state.
pub trait Renderer {
	fn render(&mut self, state: &Value);
}

impl<F: FnMut(&Value)> Renderer for F {
	fn render(&mut self, state: &Value) {
		self(state);
	}
}

/// User-visible messages.
pub trait Notifier {
	fn warn(&mut self, message: &str);
	fn error(&mut self, message: &str);
}

/// Drops every message. Messages are still logged by the store.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
	fn warn(&mut self, _message: &str) {}
	fn error(&mut self, _message: &str) {}
}

/// Returns `state` without the history flags.
pub fn without_history_flags(state: &Value) -> Value {
	state
		.remove_in(&path![CAN_UNDO])
		.remove_in(&path![CAN_REDO])
}

fn set_history_flags(state: &mut Value, can_undo: bool, can_redo: bool) {
	for (key, flag) in [(CAN_UNDO, can_undo), (CAN_REDO, can_redo)] {
		if let Err(error) = state.put_in(&path![key], Value::Bool(flag)) {
			tracing::warn!(%error, "store.history_flags");
		}
	}
}

fn initial_state() -> Value {
	let mut state = Value::map();
	set_history_flags(&mut state, false, false);
	state
}

fn message_text(value: &Value) -> String {
	match value.as_str() {
		Some(text) => text.to_string(),
		None => value.to_string(),
	}
}

/// Builds a [`Store`], registering capabilities and handlers first.
pub struct StoreBuilder {
	sync: SyncQueue<Store>,
	registry: HandlerRegistry,
	undo_limit: Option<usize>,
	renderer: Option<Box<dyn Renderer>>,
	notifier: Box<dyn Notifier>,
}

impl StoreBuilder {
	pub fn new(sync: SyncQueue<Store>) -> Self {
		Self {
			sync,
			registry: HandlerRegistry::new(),
			undo_limit: None,
			renderer: None,
			notifier: Box::new(NullNotifier),
		}
	}

	/// Applies `config` to a new sync queue over `transport`.
	pub fn from_config(config: &EngineConfig, transport: Arc<dyn Transport>) -> Self {
		let mut sync = SyncQueue::new(config.session_id.clone(), transport);
		if let Some(endpoint) = &config.endpoint {
			sync.set_endpoint(endpoint.clone());
		}
		sync.set_debug(config.debug);
		Self::new(sync).undo_limit(config.undo_limit)
	}

	/// Like [`from_config`](Self::from_config), posting over HTTP on
	/// `runtime` with the configured request timeout.
	pub fn http(config: &EngineConfig, runtime: Handle) -> Self {
		Self::from_config(config, Arc::new(config.http_transport(runtime)))
	}

	#[must_use]
	pub fn capability(mut self, capability: impl Capability) -> Self {
		tracing::debug!(name = capability.name(), "store.capability");
		capability.register(&mut self.registry);
		self
	}

	/// Registers handlers directly.
	#[must_use]
	pub fn handlers(mut self, register: impl FnOnce(&mut HandlerRegistry)) -> Self {
		register(&mut self.registry);
		self
	}

	/// Caps undo depth, dropping the oldest entries. A cap of zero is treated
	/// as one.
	#[must_use]
	pub fn undo_limit(mut self, limit: Option<usize>) -> Self {
		self.undo_limit = limit.map(|n| n.max(1));
		self
	}

	#[must_use]
	pub fn renderer(mut self, renderer: impl Renderer + 'static) -> Self {
		self.renderer = Some(Box::new(renderer));
		self
	}

	#[must_use]
	pub fn notifier(mut self, notifier: impl Notifier + 'static) -> Self {
		self.notifier = Box::new(notifier);
		self
	}

	pub fn build(self) -> Store {
		tracing::debug!(registry = ?self.registry, "store.build");
		Store {
			state: initial_state(),
			undo_stack: Vec::new(),
			redo_stack: Vec::new(),
			undo_limit: self.undo_limit,
			registry: self.registry,
			sync: self.sync,
			renderer: self.renderer,
			notifier: self.notifier,
			generation: 0,
		}
	}
}

/// Current state, history and sync queue of one page.
pub struct Store {
	state: Value,
	undo_stack: Vec<Value>,
	redo_stack: Vec<Value>,
	undo_limit: Option<usize>,
	registry: HandlerRegistry,
	sync: SyncQueue<Store>,
	renderer: Option<Box<dyn Renderer>>,
	notifier: Box<dyn Notifier>,
	generation: u64,
}

impl Store {
	pub fn builder(sync: SyncQueue<Store>) -> StoreBuilder {
		StoreBuilder::new(sync)
	}

	/// Callbacks that merge a reply into state with
	/// [`handle_server_response`](Self::handle_server_response).
	pub fn merge_response() -> Callbacks<Store> {
		Callbacks::on_success(|store: &mut Store, body| {
			if let Err(error) = store.handle_server_response(body) {
				store.report_error(&error.to_string());
			}
		})
	}

	pub fn state(&self) -> &Value {
		&self.state
	}

	pub fn can_undo(&self) -> bool {
		!self.undo_stack.is_empty()
	}

	pub fn can_redo(&self) -> bool {
		!self.redo_stack.is_empty()
	}

	pub fn undo_len(&self) -> usize {
		self.undo_stack.len()
	}

	pub fn redo_len(&self) -> usize {
		self.redo_stack.len()
	}

	/// Incremented on every committed transition. A reply handler can compare
	/// it with a value captured at send time to detect intervening changes.
	pub fn generation(&self) -> u64 {
		self.generation
	}

	pub fn registry(&self) -> &HandlerRegistry {
		&self.registry
	}

	pub fn sync(&self) -> &SyncQueue<Store> {
		&self.sync
	}

	pub fn sync_mut(&mut self) -> &mut SyncQueue<Store> {
		&mut self.sync
	}

	/// Runs every handler registered along `path` on one working copy of
	/// state, then commits it as an undoable transition.
	///
	/// A path with no handlers still commits: the history flags change and an
	/// undo entry is pushed. If a handler fails, nothing is committed, the
	/// commands and session variables queued by earlier handlers are dropped
	/// and the error is returned.
	pub fn update(&mut self, path: impl Into<Path>, data: impl Into<Value>) -> Result<()> {
		let path = path.into();
		let data = data.into();
		let handlers = self.registry.dispatch(&path);
		if handlers.is_empty() {
			tracing::debug!(%path, "store.update.unhandled");
		} else {
			tracing::debug!(%path, handlers = handlers.len(), "store.update");
		}

		let previous = self.state.clone();
		let mut working = previous.clone();
		set_history_flags(&mut working, true, false);

		let checkpoint = self.sync.checkpoint();
		let mut tx = Transaction::new(working, &mut self.sync);
		let ran = handlers.iter().try_for_each(|handler| handler(&mut tx, &path, &data));
		let outcome = tx.finish();
		if let Err(error) = ran {
			tracing::warn!(%path, %error, "store.update.aborted");
			self.sync.rollback(checkpoint);
			return Err(error);
		}

		self.push_undo(previous);
		self.redo_stack.clear();
		self.commit(outcome);
		Ok(())
	}

	/// Restores the previous state. Returns false, with a warning, when there
	/// is nothing to undo.
	pub fn undo(&mut self) -> bool {
		let Some(previous) = self.undo_stack.pop() else {
			tracing::warn!("store.undo.empty");
			self.notifier.warn("Nothing to undo");
			return false;
		};
		let current = std::mem::replace(&mut self.state, previous);
		self.redo_stack.push(current);
		self.history_moved();
		true
	}

	/// Re-applies the last undone state. Returns false, with a warning, when
	/// there is nothing to redo.
	pub fn redo(&mut self) -> bool {
		let Some(next) = self.redo_stack.pop() else {
			tracing::warn!("store.redo.empty");
			self.notifier.warn("Nothing to redo");
			return false;
		};
		let current = std::mem::replace(&mut self.state, next);
		self.push_undo(current);
		self.history_moved();
		true
	}

	/// Merges a server reply into current state without recording history.
	///
	/// Each top-level key goes to its registered variable handlers. Keys
	/// without handlers are stored verbatim at the top level, except the
	/// reserved `error` and `warning` keys, which are shown to the user.
	/// Validators run once after all keys.
	pub fn handle_server_response(&mut self, payload: Json) -> Result<()> {
		let entries = match payload {
			Json::Object(entries) => entries,
			other => return Err(StoreError::MalformedResponse(other)),
		};
		tracing::debug!(keys = ?entries.keys().collect::<Vec<_>>(), "store.server_response");
		let outcome = self.merge_entries(self.state.clone(), entries)?;
		self.commit(outcome);
		Ok(())
	}

	/// Replaces state with an initial page payload, merged like a server reply
	/// into empty state. Clears history.
	pub fn bootstrap(&mut self, payload: Json) -> Result<()> {
		let entries = match payload {
			Json::Object(entries) => entries,
			other => return Err(StoreError::MalformedResponse(other)),
		};
		tracing::debug!(keys = entries.len(), "store.bootstrap");
		let outcome = self.merge_entries(initial_state(), entries)?;
		self.undo_stack.clear();
		self.redo_stack.clear();
		self.commit(outcome);
		Ok(())
	}

	/// Queues `command` outside of any transaction; the reply is merged into
	/// state.
	pub fn send_command(&mut self, command: Json) -> Result<()> {
		self.sync.send(command, Self::merge_response())?;
		Ok(())
	}

	/// Issues every queued command. See [`SyncQueue::flush`].
	pub fn flush(&mut self) -> Result<usize> {
		Ok(self.sync.flush()?)
	}

	/// Runs the callbacks of every reply received so far.
	pub fn poll_responses(&mut self) -> usize {
		let completed = self.sync.take_completions();
		let count = completed.len();
		for completion in completed {
			completion.run(self);
		}
		count
	}

	/// Waits for the next reply and runs its callback. Returns false when no
	/// request is in flight.
	pub async fn next_response(&mut self) -> bool {
		match self.sync.next_completion().await {
			Some(completion) => {
				completion.run(self);
				true
			}
			None => false,
		}
	}

	/// Logs `message` and shows it to the user.
	pub fn report_error(&mut self, message: &str) {
		tracing::error!(detail = %message, "store.error");
		self.notifier.error(message);
	}

	pub fn render(&mut self) {
		if let Some(renderer) = self.renderer.as_mut() {
			renderer.render(&self.state);
		}
	}

	/// Runs the var handlers and validators for `entries` on `base`. On failure
	/// the sync queue is rolled back to where it was before the merge.
	fn merge_entries(&mut self, base: Value, entries: Map<String, Json>) -> Result<Outcome> {
		let checkpoint = self.sync.checkpoint();
		let merged = self.run_var_handlers(base, entries);
		if let Err(error) = &merged {
			tracing::warn!(%error, "store.merge.aborted");
			self.sync.rollback(checkpoint);
		}
		merged
	}

	fn run_var_handlers(&mut self, base: Value, entries: Map<String, Json>) -> Result<Outcome> {
		let mut tx = Transaction::new(base, &mut self.sync);
		for (key, value) in entries {
			let value = Value::from(value);
			let handlers = self.registry.var_handlers(&key);
			if !handlers.is_empty() {
				tracing::trace!(%key, handlers = handlers.len(), "store.server_var");
				for handler in handlers {
					handler(&mut tx, &key, &value)?;
				}
			} else if key == ERROR_KEY {
				if !value.is_null() {
					tx.report_error(message_text(&value));
				}
			} else if key == WARNING_KEY {
				if !value.is_null() {
					tx.warn(message_text(&value));
				}
			} else {
				tx.set_in(&path![key.as_str()], value)?;
			}
		}
		for validator in self.registry.validators() {
			validator(&mut tx)?;
		}
		Ok(tx.finish())
	}

	fn push_undo(&mut self, state: Value) {
		self.undo_stack.push(state);
		if let Some(limit) = self.undo_limit
			&& self.undo_stack.len() > limit
		{
			let excess = self.undo_stack.len() - limit;
			self.undo_stack.drain(..excess);
		}
	}

	fn history_moved(&mut self) {
		let (can_undo, can_redo) = (self.can_undo(), self.can_redo());
		set_history_flags(&mut self.state, can_undo, can_redo);
		self.generation += 1;
		self.render();
	}

	fn commit(&mut self, outcome: Outcome) {
		let Outcome {
			state,
			errors,
			warnings,
		} = outcome;
		self.state = state;
		self.generation += 1;
		for warning in &warnings {
			tracing::warn!(detail = %warning, "store.warning");
			self.notifier.warn(warning);
		}
		for error in &errors {
			self.report_error(error);
		}
		self.render();
	}
}

impl SyncHost for Store {
	fn report_error(&mut self, message: &str) {
		Store::report_error(self, message);
	}
}

impl fmt::Debug for Store {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Store")
			.field("state", &self.state)
			.field("undo", &self.undo_stack.len())
			.field("redo", &self.redo_stack.len())
			.field("generation", &self.generation)
			.field("sync", &self.sync)
			.finish_non_exhaustive()
	}
}
