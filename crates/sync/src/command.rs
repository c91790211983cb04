//! Command objects.
//!
//! A command is a JSON object whose values are themselves objects, one per
//! named server-side action:
//!
//! ```json
//! { "changePosition": { "newValue": "BRCA1" }, "getGeneSuggestTrack": {} }
//! ```
//!
//! The reserved `sessionVar` entry holds plain session-variable assignments and
//! is split off before the rest is queued.

use serde_json::{Map, Value as Json};

use crate::error::{Result, SyncError};
use crate::wire::RESERVED_FIELDS;

/// Key under which a command carries session-variable assignments.
pub const SESSION_VAR_KEY: &str = "sessionVar";

/// A validated command split into its actions and its session variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandParts {
	pub actions: Map<String, Json>,
	pub session_vars: Map<String, Json>,
}

impl CommandParts {
	/// Validates `command` and separates its `sessionVar` entry.
	pub fn parse(command: Json) -> Result<Self> {
		let Json::Object(entries) = command else {
			return Err(SyncError::malformed("command must be an object", &command));
		};

		let mut parts = Self::default();
		for (name, body) in entries {
			let Json::Object(body) = body else {
				return Err(SyncError::malformed(
					format!("`{name}` must map to an object"),
					&body,
				));
			};
			if name == SESSION_VAR_KEY {
				if let Some(reserved) = body.keys().find(|k| RESERVED_FIELDS.contains(&k.as_str())) {
					return Err(SyncError::malformed(
						format!("`{reserved}` is a reserved request field"),
						&Json::Object(body),
					));
				}
				parts.session_vars = body;
			} else {
				parts.actions.insert(name, Json::Object(body));
			}
		}
		Ok(parts)
	}

	pub fn is_empty(&self) -> bool {
		self.actions.is_empty() && self.session_vars.is_empty()
	}
}
