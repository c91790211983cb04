//! Handler tables.
//!
//! Path handlers live in a trie keyed by [`Segment`]. Dispatch is
//! prefix-inclusive: a handler registered at `["a"]` fires for `["a"]`,
//! `["a", "b"]` and every other path starting with `"a"`, before any handler
//! registered deeper along the same path.

use std::rc::Rc;
use std::sync::Arc;

use pagesync_primitives::{Path, Segment, Value};
use rustc_hash::FxHashMap as HashMap;

use crate::error::Result;
use crate::store::Transaction;

#[cfg(test)]
mod tests;

/// Handles a UI event: `(transaction, event path, event data)`.
pub type PathHandler = Rc<dyn Fn(&mut Transaction<'_>, &Path, &Value) -> Result<()>>;
/// Handles one top-level key of a server response: `(transaction, name, value)`.
pub type VarHandler = Rc<dyn Fn(&mut Transaction<'_>, &str, &Value) -> Result<()>>;
/// Runs once after every server response merge.
pub type Validator = Rc<dyn Fn(&mut Transaction<'_>) -> Result<()>>;

#[derive(Default)]
struct HandlerNode {
	handlers: HashMap<Segment, Vec<PathHandler>>,
	children: HashMap<Segment, HandlerNode>,
}

/// Registered path handlers, server-variable handlers and validators.
#[derive(Default)]
pub struct HandlerRegistry {
	root: HandlerNode,
	var_handlers: HashMap<Arc<str>, Vec<VarHandler>>,
	validators: Vec<Validator>,
	path_handlers: usize,
}

impl HandlerRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends `handler` at `path`. Handlers already registered at the same
	/// path are kept and run first.
	pub fn on_path<F>(&mut self, path: impl Into<Path>, handler: F)
	where
		F: Fn(&mut Transaction<'_>, &Path, &Value) -> Result<()> + 'static,
	{
		let path = path.into();
		let Some((last, parents)) = path.segments().split_last() else {
			tracing::warn!("registry.on_path.empty");
			return;
		};
		let mut node = &mut self.root;
		for segment in parents {
			node = node.children.entry(segment.clone()).or_default();
		}
		node.handlers
			.entry(last.clone())
			.or_default()
			.push(Rc::new(handler));
		self.path_handlers += 1;
		tracing::trace!(%path, "registry.on_path");
	}

	/// Appends `handler` for the server variable `name`.
	pub fn on_var<F>(&mut self, name: &str, handler: F)
	where
		F: Fn(&mut Transaction<'_>, &str, &Value) -> Result<()> + 'static,
	{
		self.on_vars([name], handler);
	}

	/// Appends one shared `handler` for each of `names`.
	pub fn on_vars<I, S, F>(&mut self, names: I, handler: F)
	where
		I: IntoIterator<Item = S>,
		S: Into<Arc<str>>,
		F: Fn(&mut Transaction<'_>, &str, &Value) -> Result<()> + 'static,
	{
		let handler: VarHandler = Rc::new(handler);
		for name in names {
			let name = name.into();
			tracing::trace!(name = %name, "registry.on_var");
			self.var_handlers
				.entry(name)
				.or_default()
				.push(Rc::clone(&handler));
		}
	}

	/// Appends a validator run after each server response merge.
	pub fn on_validate<F>(&mut self, validator: F)
	where
		F: Fn(&mut Transaction<'_>) -> Result<()> + 'static,
	{
		self.validators.push(Rc::new(validator));
	}

	/// Collects the handlers for an event at `path`, shallow to deep.
	///
	/// At each step every handler registered for the current segment is taken,
	/// even if the node also has children, then the walk descends into the
	/// matching child. The walk stops at the first segment without a child.
	/// A path matching nothing yields an empty list.
	pub fn dispatch(&self, path: &Path) -> Vec<PathHandler> {
		let mut found = Vec::new();
		let mut node = &self.root;
		for segment in path {
			if let Some(handlers) = node.handlers.get(segment) {
				found.extend(handlers.iter().cloned());
			}
			match node.children.get(segment) {
				Some(child) => node = child,
				None => break,
			}
		}
		found
	}

	pub fn var_handlers(&self, name: &str) -> &[VarHandler] {
		self.var_handlers
			.get(name)
			.map(Vec::as_slice)
			.unwrap_or(&[])
	}

	pub fn validators(&self) -> &[Validator] {
		&self.validators
	}

	pub fn handler_count(&self) -> usize {
		self.path_handlers
	}

	pub fn var_names(&self) -> impl Iterator<Item = &str> {
		self.var_handlers.keys().map(|k| k.as_ref())
	}
}

impl std::fmt::Debug for HandlerRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("HandlerRegistry")
			.field("path_handlers", &self.path_handlers)
			.field("vars", &self.var_handlers.len())
			.field("validators", &self.validators.len())
			.finish()
	}
}
