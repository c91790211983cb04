use indexmap::IndexMap;
use serde_json::{Map, Value as Json};

use crate::error::{Result, SyncError};

/// Session-variable assignments gathered from every pending command since
/// the last flush.
///
/// Assigning the same value twice is a no-op. Assigning a different value
/// before the next flush is an error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionVarAccumulator {
	vars: IndexMap<String, Json>,
}

impl SessionVarAccumulator {
	pub fn new() -> Self {
		Self::default()
	}

	/// Merges `vars` atomically: on conflict nothing from `vars` is kept.
	pub fn merge(&mut self, vars: &Map<String, Json>) -> Result<()> {
		for (name, new) in vars {
			if let Some(old) = self.vars.get(name)
				&& old != new
			{
				return Err(SyncError::ConflictingSessionVar {
					name: name.clone(),
					old: old.clone(),
					new: new.clone(),
				});
			}
		}
		for (name, value) in vars {
			self.vars.insert(name.clone(), value.clone());
		}
		Ok(())
	}

	pub fn get(&self, name: &str) -> Option<&Json> {
		self.vars.get(name)
	}

	pub fn len(&self) -> usize {
		self.vars.len()
	}

	pub fn is_empty(&self) -> bool {
		self.vars.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &Json)> {
		self.vars.iter().map(|(k, v)| (k.as_str(), v))
	}

	pub fn clear(&mut self) {
		self.vars.clear();
	}
}
