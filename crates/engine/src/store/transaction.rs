use pagesync_primitives::{Path, Segment, Value};
use pagesync_sync::{Callbacks, FileAttachment, SyncQueue};
use serde_json::Value as Json;

use super::Store;
use crate::error::{Result, StoreError};

/// A working copy of state shared by every handler of one store operation.
///
/// Writes go to the working copy only; the store commits it once all
/// handlers have returned. Commands and session variables go straight to the
/// store's [`SyncQueue`]; if a later handler fails, the store rolls the queue
/// back along with the state.
pub struct Transaction<'a> {
	state: Value,
	sync: &'a mut SyncQueue<Store>,
	errors: Vec<String>,
	warnings: Vec<String>,
}

pub(crate) struct Outcome {
	pub(crate) state: Value,
	pub(crate) errors: Vec<String>,
	pub(crate) warnings: Vec<String>,
}

impl<'a> Transaction<'a> {
	pub(crate) fn new(state: Value, sync: &'a mut SyncQueue<Store>) -> Self {
		Self {
			state,
			sync,
			errors: Vec::new(),
			warnings: Vec::new(),
		}
	}

	pub(crate) fn finish(self) -> Outcome {
		Outcome {
			state: self.state,
			errors: self.errors,
			warnings: self.warnings,
		}
	}

	pub fn state(&self) -> &Value {
		&self.state
	}

	pub fn get(&self, key: &str) -> Option<&Value> {
		self.state.get_key(key)
	}

	pub fn get_in(&self, path: &Path) -> Option<&Value> {
		self.state.get_in(path)
	}

	pub fn get_str(&self, path: &Path) -> Option<&str> {
		self.get_in(path).and_then(Value::as_str)
	}

	pub fn set_in(&mut self, path: &Path, value: impl Into<Value>) -> Result<()> {
		self.state.put_in(path, value.into())?;
		Ok(())
	}

	pub fn update_in<F>(&mut self, path: &Path, f: F) -> Result<()>
	where
		F: FnOnce(Value) -> Value,
	{
		self.state.modify_in(path, f)?;
		Ok(())
	}

	pub fn remove_in(&mut self, path: &Path) -> Option<Value> {
		self.state.delete_in(path)
	}

	/// Queues `command`; its reply is merged with
	/// [`Store::handle_server_response`].
	pub fn send_command(&mut self, command: Json) -> Result<()> {
		self.send_with(command, Store::merge_response())
	}

	/// Queues `command` with caller-provided reply callbacks.
	pub fn send_with(&mut self, command: Json, callbacks: Callbacks<Store>) -> Result<()> {
		self.sync.send(command, callbacks)?;
		Ok(())
	}

	/// Queues `command` with a file; the reply is merged like
	/// [`send_command`](Self::send_command).
	pub fn upload_file(&mut self, command: Json, attachment: FileAttachment) -> Result<()> {
		self.sync
			.upload_file(command, attachment, Store::merge_response())?;
		Ok(())
	}

	pub fn set_session_var(&mut self, name: &str, value: impl Into<Json>) -> Result<()> {
		self.sync.set_session_var(name, value)?;
		Ok(())
	}

	/// Stores `value` at `path` and assigns it to the session variable named
	/// by the last segment of `path`.
	pub fn change_session_string(&mut self, path: &Path, value: &str) -> Result<()> {
		let Some(name) = path.last().and_then(Segment::as_key) else {
			return Err(StoreError::handler(path, "session variable path must end in a key"));
		};
		let name = name.to_string();
		self.set_session_var(&name, value)?;
		self.set_in(path, value)
	}

	/// Reports an error to the user once the transaction commits. Does not
	/// abort the transaction.
	pub fn report_error(&mut self, message: impl Into<String>) {
		self.errors.push(message.into());
	}

	/// Shows a warning once the transaction commits.
	pub fn warn(&mut self, message: impl Into<String>) {
		self.warnings.push(message.into());
	}
}
