use std::sync::Arc;

use pagesync_primitives::{Value, path};
use serde_json::Value as Json;

use super::Capability;
use crate::registry::HandlerRegistry;

/// Decodes server variables whose values are JSON documents sent as strings,
/// storing the decoded tree at the top level under the variable name.
///
/// Text that fails to parse is reported and stored as-is. Empty strings
/// become null.
pub struct JsonBlobVars {
	names: Vec<Arc<str>>,
}

impl JsonBlobVars {
	pub fn new<I, S>(names: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<Arc<str>>,
	{
		Self {
			names: names.into_iter().map(Into::into).collect(),
		}
	}
}

impl Capability for JsonBlobVars {
	fn name(&self) -> &'static str {
		"json_blob_vars"
	}

	fn register(&self, registry: &mut HandlerRegistry) {
		registry.on_vars(self.names.iter().cloned(), |tx, name, value| {
			let decoded = match value.as_str() {
				Some("") => Value::Null,
				Some(text) => match serde_json::from_str::<Json>(text) {
					Ok(json) => Value::from(json),
					Err(error) => {
						tracing::warn!(name, %error, "json_blob.decode_failed");
						tx.report_error(format!("Could not parse {name}: {error}"));
						value.clone()
					}
				},
				None => value.clone(),
			};
			tx.set_in(&path![name], decoded)
		});
	}
}
