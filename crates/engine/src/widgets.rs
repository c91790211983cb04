//! Widget events translated into store updates.
//!
//! Autocomplete and sortable widgets are external collaborators. Only the
//! shape of their events is consumed here.

use pagesync_primitives::{Path, Value};

use crate::error::{Result, StoreError};
use crate::store::{Store, Transaction};

/// The item picked in an autocomplete box.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AutocompleteSelection {
	/// Text written back into the input, usually a position or term.
	pub value: String,
	pub label: Option<String>,
	pub id: Option<String>,
}

impl AutocompleteSelection {
	/// A selection carrying only its value.
	pub fn new(value: impl Into<String>) -> Self {
		Self {
			value: value.into(),
			label: None,
			id: None,
		}
	}

	#[must_use]
	pub fn with_label(mut self, label: impl Into<String>) -> Self {
		self.label = Some(label.into());
		self
	}

	#[must_use]
	pub fn with_id(mut self, id: impl Into<String>) -> Self {
		self.id = Some(id.into());
		self
	}

	/// Sends the selected value to `path` as a single update.
	pub fn dispatch(self, store: &mut Store, path: impl Into<Path>) -> Result<()> {
		let path = path.into();
		tracing::debug!(%path, value = %self.value, id = ?self.id, "widgets.autocomplete");
		store.update(path, self.value)
	}
}

/// A sortable list item dragged from `old_index` to `new_index`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SortableDrop {
	pub old_index: usize,
	pub new_index: usize,
	pub len: usize,
}

impl SortableDrop {
	/// Old index of the item now at each position, or `None` if either index
	/// is outside the list.
	pub fn reordering(&self) -> Option<Vec<usize>> {
		if self.old_index >= self.len || self.new_index >= self.len {
			return None;
		}
		let mut order: Vec<usize> = (0..self.len).collect();
		let moved = order.remove(self.old_index);
		order.insert(self.new_index, moved);
		Some(order)
	}

	/// Sends the reordering to `path` as a list of old indices.
	pub fn dispatch(&self, store: &mut Store, path: impl Into<Path>) -> Result<()> {
		let path = path.into();
		let Some(order) = self.reordering() else {
			return Err(StoreError::handler(
				&path,
				format!(
					"drop from {} to {} is outside a list of {}",
					self.old_index, self.new_index, self.len
				),
			));
		};
		tracing::debug!(%path, from = self.old_index, to = self.new_index, "widgets.sortable_drop");
		store.update(path, Value::from_items(order.into_iter().map(Value::from)))
	}
}

/// Reads a reordering sent by [`SortableDrop::dispatch`].
pub fn parse_reordering(data: &Value) -> Option<Vec<usize>> {
	data.as_list()?
		.iter()
		.map(|index| index.as_u64().and_then(|n| usize::try_from(n).ok()))
		.collect()
}

/// Builds a new list whose item `i` is `list[reordering[i]]`.
///
/// Returns `None` unless `reordering` is a permutation of the list's indices.
pub fn reorder_list(list: &Value, reordering: &[usize]) -> Option<Value> {
	let items = list.as_list()?;
	if items.len() != reordering.len() {
		return None;
	}
	let mut taken = vec![false; items.len()];
	let mut reordered = Vec::with_capacity(items.len());
	for &old in reordering {
		let item = items.get(old)?;
		if std::mem::replace(&mut taken[old], true) {
			return None;
		}
		reordered.push(item.clone());
	}
	Some(Value::from_items(reordered))
}

/// Applies the reordering in `data` to the list at `list_path`.
///
/// A reordering that does not fit the list is reported to the user and the
/// list is left as it was.
pub fn apply_reordering(tx: &mut Transaction<'_>, list_path: &Path, data: &Value) -> Result<()> {
	let list = tx.get_in(list_path).cloned().unwrap_or_else(Value::list);
	let reordered = parse_reordering(data).and_then(|order| reorder_list(&list, &order));
	match reordered {
		Some(reordered) => tx.set_in(list_path, reordered),
		None => {
			tracing::warn!(path = %list_path, len = list.len(), data = %data, "widgets.reorder_mismatch");
			tx.report_error(format!(
				"Could not reorder {list_path}: expected {} positions",
				list.len()
			));
			Ok(())
		}
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use pagesync_primitives::path;
	use pagesync_sync::SyncQueue;
	use pagesync_sync::testing::RecordingTransport;
	use pretty_assertions::assert_eq;
	use serde_json::json;

	use super::*;

	fn store() -> Store {
		let sync = SyncQueue::new("sid", Arc::new(RecordingTransport::new()));
		Store::builder(sync)
			.handlers(|registry| {
				registry.on_path(path!["positionInfo", "position"], |tx, path, data| {
					tx.set_in(path, data.clone())
				});
				registry.on_path(path!["trackOrder"], |tx, _path, data| {
					apply_reordering(tx, &path!["tracks"], data)
				});
			})
			.build()
	}

	fn list(items: serde_json::Value) -> Value {
		Value::from(items)
	}

	#[test]
	fn drop_moves_one_item() {
		let down = SortableDrop {
			old_index: 0,
			new_index: 2,
			len: 4,
		};
		assert_eq!(down.reordering(), Some(vec![1, 2, 0, 3]));

		let up = SortableDrop {
			old_index: 3,
			new_index: 1,
			len: 4,
		};
		assert_eq!(up.reordering(), Some(vec![0, 3, 1, 2]));

		let out = SortableDrop {
			old_index: 4,
			new_index: 0,
			len: 4,
		};
		assert_eq!(out.reordering(), None);
	}

	#[test]
	fn reorder_list_requires_a_permutation() {
		let tracks = list(json!(["a", "b", "c"]));
		assert_eq!(
			reorder_list(&tracks, &[2, 0, 1]).map(|v| v.to_json()),
			Some(json!(["c", "a", "b"]))
		);
		assert_eq!(reorder_list(&tracks, &[0, 1]), None);
		assert_eq!(reorder_list(&tracks, &[0, 0, 1]), None);
		assert_eq!(reorder_list(&tracks, &[0, 1, 3]), None);
		assert_eq!(reorder_list(&Value::from("abc"), &[0]), None);
	}

	#[test]
	fn parse_reordering_rejects_non_indices() {
		assert_eq!(parse_reordering(&list(json!([1, 0]))), Some(vec![1, 0]));
		assert_eq!(parse_reordering(&list(json!([1, -1]))), None);
		assert_eq!(parse_reordering(&list(json!(["1"]))), None);
	}

	#[test]
	fn autocomplete_selection_updates_once() {
		let mut store = store();
		AutocompleteSelection::new("chr1:100-200")
			.with_label("BRCA1")
			.dispatch(&mut store, path!["positionInfo", "position"])
			.unwrap();
		assert_eq!(
			store.state().get_in(&path!["positionInfo", "position"]),
			Some(&Value::from("chr1:100-200"))
		);
		assert_eq!(store.undo_len(), 1);
	}

	#[test]
	fn sortable_drop_reorders_state() {
		let mut store = store();
		store
			.handle_server_response(json!({ "tracks": ["knownGene", "refGene", "snp"] }))
			.unwrap();
		SortableDrop {
			old_index: 2,
			new_index: 0,
			len: 3,
		}
		.dispatch(&mut store, path!["trackOrder"])
		.unwrap();
		assert_eq!(
			store.state().get_key("tracks").map(Value::to_json),
			Some(json!(["snp", "knownGene", "refGene"]))
		);
	}

	#[test]
	fn mismatched_drop_leaves_list_alone() {
		let mut store = store();
		store
			.handle_server_response(json!({ "tracks": ["knownGene", "refGene"] }))
			.unwrap();
		SortableDrop {
			old_index: 0,
			new_index: 2,
			len: 3,
		}
		.dispatch(&mut store, path!["trackOrder"])
		.unwrap();
		assert_eq!(
			store.state().get_key("tracks").map(Value::to_json),
			Some(json!(["knownGene", "refGene"]))
		);

		let err = SortableDrop {
			old_index: 5,
			new_index: 0,
			len: 3,
		}
		.dispatch(&mut store, path!["trackOrder"])
		.unwrap_err();
		assert!(matches!(err, StoreError::Handler { .. }));
	}
}
