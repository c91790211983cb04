//! Immutable state tree.
//!
//! Every [`Value`] container is an `Arc` around a persistent [`im`] collection.
//! Cloning a value is `O(1)`, and a write through a path copies only the nodes
//! along that path: every untouched subtree of the new root is still
//! [`ptr_eq`](Value::ptr_eq) to the corresponding subtree of the old root.
//!
//! Two families of writers exist:
//!
//! * persistent ([`set_in`](Value::set_in), [`update_in`](Value::update_in),
//!   [`remove_in`](Value::remove_in)) return a new root and leave `self`
//!   untouched;
//! * copy-on-write ([`put_in`](Value::put_in), [`modify_in`](Value::modify_in),
//!   [`delete_in`](Value::delete_in)) rewrite `self` in place. Any other clone
//!   of the same root keeps observing the old tree, so these are safe to use on
//!   a working copy.

use std::sync::Arc;

use crate::error::PathError;
use crate::path::{Path, Segment};

mod convert;


/// Persistent map node, ordered by key.
pub type Map = im::OrdMap<Arc<str>, Value>;
/// Persistent list node.
pub type List = im::Vector<Value>;

/// A node in the state tree.
#[derive(Debug, Clone, Default)]
pub enum Value {
	#[default]
	Null,
	Bool(bool),
	Number(serde_json::Number),
	String(Arc<str>),
	List(Arc<List>),
	Map(Arc<Map>),
}

impl Value {
	/// An empty map.
	pub fn map() -> Self {
		Self::Map(Arc::default())
	}

	/// An empty list.
	pub fn list() -> Self {
		Self::List(Arc::default())
	}

	/// A map built from key/value pairs. Later duplicates win.
	pub fn from_entries<I, K>(entries: I) -> Self
	where
		I: IntoIterator<Item = (K, Value)>,
		K: Into<Arc<str>>,
	{
		Self::Map(Arc::new(
			entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
		))
	}

	/// A list of `items` in order.
	pub fn from_items<I: IntoIterator<Item = Value>>(items: I) -> Self {
		Self::List(Arc::new(items.into_iter().collect()))
	}

	/// Short type name used in error messages.
	pub fn kind(&self) -> &'static str {
		match self {
			Self::Null => "null",
			Self::Bool(_) => "bool",
			Self::Number(_) => "number",
			Self::String(_) => "string",
			Self::List(_) => "list",
			Self::Map(_) => "map",
		}
	}

	/// True only for [`Value::Null`].
	pub fn is_null(&self) -> bool {
		matches!(self, Self::Null)
	}

	/// The boolean, if this is one.
	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Self::Bool(b) => Some(*b),
			_ => None,
		}
	}

	/// The string contents, if this is a string.
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::String(s) => Some(s),
			_ => None,
		}
	}

	/// The number as `i64`, if it is an integer in range.
	pub fn as_i64(&self) -> Option<i64> {
		match self {
			Self::Number(n) => n.as_i64(),
			_ => None,
		}
	}

	/// The number as `u64`, if it is a non-negative integer.
	pub fn as_u64(&self) -> Option<u64> {
		match self {
			Self::Number(n) => n.as_u64(),
			_ => None,
		}
	}

	/// The number as `f64`.
	pub fn as_f64(&self) -> Option<f64> {
		match self {
			Self::Number(n) => n.as_f64(),
			_ => None,
		}
	}

	/// The map node, if this is a map.
	pub fn as_map(&self) -> Option<&Map> {
		match self {
			Self::Map(map) => Some(map),
			_ => None,
		}
	}

	/// The list node, if this is a list.
	pub fn as_list(&self) -> Option<&List> {
		match self {
			Self::List(list) => Some(list),
			_ => None,
		}
	}

	/// Number of children for containers, zero for scalars.
	pub fn len(&self) -> usize {
		match self {
			Self::List(list) => list.len(),
			Self::Map(map) => map.len(),
			_ => 0,
		}
	}

	/// True for null, empty strings and empty containers.
	pub fn is_empty(&self) -> bool {
		match self {
			Self::Null => true,
			Self::String(s) => s.is_empty(),
			Self::List(list) => list.is_empty(),
			Self::Map(map) => map.is_empty(),
			Self::Bool(_) | Self::Number(_) => false,
		}
	}

	/// Referential equality.
	///
	/// Containers and strings compare by pointer. Other scalars have no
	/// identity and compare by value.
	pub fn ptr_eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Self::Null, Self::Null) => true,
			(Self::Bool(a), Self::Bool(b)) => a == b,
			(Self::Number(a), Self::Number(b)) => a == b,
			(Self::String(a), Self::String(b)) => Arc::ptr_eq(a, b),
			(Self::List(a), Self::List(b)) => Arc::ptr_eq(a, b),
			(Self::Map(a), Self::Map(b)) => Arc::ptr_eq(a, b),
			_ => false,
		}
	}

	/// The direct child at `segment`. On a map, an index segment is looked
	/// up as its decimal key.
	pub fn get(&self, segment: &Segment) -> Option<&Value> {
		match (self, segment) {
			(Self::Map(map), Segment::Key(key)) => map.get(key.as_ref()),
			(Self::Map(map), Segment::Index(index)) => map.get(index.to_string().as_str()),
			(Self::List(list), Segment::Index(index)) => list.get(*index),
			_ => None,
		}
	}

	/// The map entry under `key`.
	pub fn get_key(&self, key: &str) -> Option<&Value> {
		self.as_map()?.get(key)
	}

	/// The value at `path`, or `None` if any step is missing. The empty path
	/// yields the value itself.
	pub fn get_in(&self, path: &Path) -> Option<&Value> {
		path.segments()
			.iter()
			.try_fold(self, |node, segment| node.get(segment))
	}

	/// Returns a new root with `value` stored at `path`.
	///
	/// Missing intermediate nodes are created as maps for key segments and
	/// lists for index segments. Writing past the end of a list pads it with
	/// nulls.
	pub fn set_in(&self, path: &Path, value: Value) -> Result<Value, PathError> {
		let mut next = self.clone();
		next.put_in(path, value)?;
		Ok(next)
	}

	/// Returns a new root with the value at `path` replaced by `f(old)`.
	/// A missing value is passed as null.
	pub fn update_in<F>(&self, path: &Path, f: F) -> Result<Value, PathError>
	where
		F: FnOnce(Value) -> Value,
	{
		let mut next = self.clone();
		next.modify_in(path, f)?;
		Ok(next)
	}

	/// Returns a new root without the value at `path`.
	pub fn remove_in(&self, path: &Path) -> Value {
		let mut next = self.clone();
		next.delete_in(path);
		next
	}

	/// Copy-on-write form of [`set_in`](Self::set_in).
	pub fn put_in(&mut self, path: &Path, value: Value) -> Result<(), PathError> {
		put_at(self, path, 0, value)
	}

	/// Copy-on-write form of [`update_in`](Self::update_in).
	pub fn modify_in<F>(&mut self, path: &Path, f: F) -> Result<(), PathError>
	where
		F: FnOnce(Value) -> Value,
	{
		let current = self.get_in(path).cloned().unwrap_or_default();
		self.put_in(path, f(current))
	}

	/// Copy-on-write form of [`remove_in`](Self::remove_in). Returns the
	/// removed value. Removing from a list shifts later items down; removing
	/// the root resets it to null.
	pub fn delete_in(&mut self, path: &Path) -> Option<Value> {
		if self.get_in(path).is_none() {
			return None;
		}
		delete_at(self, path.segments())
	}
}

fn put_at(node: &mut Value, path: &Path, depth: usize, value: Value) -> Result<(), PathError> {
	let Some(segment) = path.segments().get(depth) else {
		*node = value;
		return Ok(());
	};

	if node.is_null() {
		*node = match segment {
			Segment::Key(_) => Value::map(),
			Segment::Index(_) => Value::list(),
		};
	}

	match (node, segment) {
		(Value::Map(map), segment) => {
			let key: Arc<str> = match segment {
				Segment::Key(key) => Arc::clone(key),
				Segment::Index(index) => index.to_string().into(),
			};
			let map = Arc::make_mut(map);
			let child = map.entry(key).or_insert_with(Value::default);
			put_at(child, path, depth + 1, value)
		}
		(Value::List(list), Segment::Index(index)) => {
			let list = Arc::make_mut(list);
			while list.len() <= *index {
				list.push_back(Value::Null);
			}
			let mut child = list.set(*index, Value::Null);
			let result = put_at(&mut child, path, depth + 1, value);
			list.set(*index, child);
			result
		}
		(Value::List(_), Segment::Key(key)) => Err(PathError::KeyOnList {
			path: path.prefix(depth),
			key: Arc::clone(key),
		}),
		(other, _) => Err(PathError::NotAContainer {
			path: path.prefix(depth),
			found: other.kind(),
		}),
	}
}

fn delete_at(node: &mut Value, segments: &[Segment]) -> Option<Value> {
	let Some((segment, rest)) = segments.split_first() else {
		return Some(std::mem::take(node));
	};

	match (node, segment) {
		(Value::Map(map), segment) => {
			let key = match segment {
				Segment::Key(key) => key.to_string(),
				Segment::Index(index) => index.to_string(),
			};
			let map = Arc::make_mut(map);
			if rest.is_empty() {
				map.remove(key.as_str())
			} else {
				delete_at(map.get_mut(key.as_str())?, rest)
			}
		}
		(Value::List(list), Segment::Index(index)) => {
			if *index >= list.len() {
				return None;
			}
			let list = Arc::make_mut(list);
			if rest.is_empty() {
				Some(list.remove(*index))
			} else {
				delete_at(list.get_mut(*index)?, rest)
			}
		}
		_ => None,
	}
}

impl PartialEq for Value {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Self::Null, Self::Null) => true,
			(Self::Bool(a), Self::Bool(b)) => a == b,
			(Self::Number(a), Self::Number(b)) => a == b,
			(Self::String(a), Self::String(b)) => a == b,
			(Self::List(a), Self::List(b)) => Arc::ptr_eq(a, b) || a == b,
			(Self::Map(a), Self::Map(b)) => Arc::ptr_eq(a, b) || a == b,
			_ => false,
		}
	}
}

impl Eq for Value {}
