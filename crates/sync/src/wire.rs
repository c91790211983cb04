//! Request encoding.
//!
//! Every request is a flat list of form fields:
//!
//! | field   | content                                        |
//! |---------|------------------------------------------------|
//! | `hgsid` | session id                                     |
//! | *name*  | one field per accumulated session variable     |
//! | `cjCmd` | the request's own command JSON, when non-empty |
//! | `_`     | anti-cache token                               |
//!
//! Session variables holding strings are sent raw, anything else as compact
//! JSON.

use serde_json::{Map, Value as Json};

use crate::accumulator::SessionVarAccumulator;

pub const SESSION_ID_FIELD: &str = "hgsid";
pub const COMMAND_FIELD: &str = "cjCmd";
pub const CACHE_TOKEN_FIELD: &str = "_";

/// Field names a session variable may not take.
pub const RESERVED_FIELDS: [&str; 3] = [SESSION_ID_FIELD, COMMAND_FIELD, CACHE_TOKEN_FIELD];

/// A file sent along with a request as a multipart part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttachment {
	/// Form field name of the file part.
	pub field: String,
	pub file_name: String,
	pub mime: Option<String>,
	pub content: Vec<u8>,
}

impl FileAttachment {
	pub fn new(field: impl Into<String>, file_name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
		Self {
			field: field.into(),
			file_name: file_name.into(),
			mime: None,
			content: content.into(),
		}
	}

	#[must_use]
	pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
		self.mime = Some(mime.into());
		self
	}
}

/// One encoded request, ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireRequest {
	pub endpoint: String,
	pub fields: Vec<(String, String)>,
	pub attachment: Option<FileAttachment>,
}

impl WireRequest {
	pub(crate) fn build(
		endpoint: &str,
		session_id: &str,
		vars: &SessionVarAccumulator,
		actions: &Map<String, Json>,
		cache_token: String,
		attachment: Option<FileAttachment>,
	) -> Self {
		let mut fields = Vec::with_capacity(vars.len() + 3);
		fields.push((SESSION_ID_FIELD.to_string(), session_id.to_string()));
		for (name, value) in vars.iter() {
			fields.push((name.to_string(), encode_var(value)));
		}
		if !actions.is_empty() {
			fields.push((COMMAND_FIELD.to_string(), Json::Object(actions.clone()).to_string()));
		}
		fields.push((CACHE_TOKEN_FIELD.to_string(), cache_token));
		Self {
			endpoint: endpoint.to_string(),
			fields,
			attachment,
		}
	}

	pub fn field(&self, name: &str) -> Option<&str> {
		self.fields
			.iter()
			.find(|(k, _)| k == name)
			.map(|(_, v)| v.as_str())
	}

	pub fn session_id(&self) -> Option<&str> {
		self.field(SESSION_ID_FIELD)
	}

	/// Decodes the command JSON, if the request carries one.
	pub fn command(&self) -> Option<Json> {
		serde_json::from_str(self.field(COMMAND_FIELD)?).ok()
	}

	/// `application/x-www-form-urlencoded` body of the fields.
	#[cfg(feature = "http")]
	pub fn form_body(&self) -> String {
		encode_form(&self.fields)
	}
}

#[cfg(feature = "http")]
pub(crate) fn encode_form(fields: &[(String, String)]) -> String {
	fields
		.iter()
		.map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
		.collect::<Vec<_>>()
		.join("&")
}

fn encode_var(value: &Json) -> String {
	match value {
		Json::String(s) => s.clone(),
		other => other.to_string(),
	}
}

/// Monotonic anti-cache token source.
#[derive(Debug, Default)]
pub(crate) struct CacheTokens {
	seq: u64,
}

impl CacheTokens {
	pub(crate) fn next(&mut self) -> String {
		self.seq += 1;
		format!("{}-{}", chrono::Utc::now().timestamp_millis(), self.seq)
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use serde_json::json;

	use super::*;

	fn accumulated(value: Json) -> SessionVarAccumulator {
		let mut acc = SessionVarAccumulator::new();
		if let Json::Object(vars) = value {
			acc.merge(&vars).unwrap();
		}
		acc
	}

	#[test]
	fn fields_in_order() {
		let vars = accumulated(json!({ "position": "chr1:1-10", "hgi_uiChoices": { "a": 1 } }));
		let mut actions = Map::new();
		actions.insert("getUserRegions".into(), json!({}));
		let req = WireRequest::build("hgIntegrator", "42_x", &vars, &actions, "t".into(), None);

		let names: Vec<_> = req.fields.iter().map(|(k, _)| k.as_str()).collect();
		assert_eq!(names, ["hgsid", "position", "hgi_uiChoices", "cjCmd", "_"]);
		assert_eq!(req.field("position"), Some("chr1:1-10"));
		assert_eq!(req.field("hgi_uiChoices"), Some(r#"{"a":1}"#));
		assert_eq!(req.command(), Some(json!({ "getUserRegions": {} })));
		assert_eq!(req.session_id(), Some("42_x"));
	}

	#[test]
	fn empty_command_is_omitted() {
		let req = WireRequest::build("cgi", "1", &accumulated(json!({ "db": "hg19" })), &Map::new(), "t".into(), None);
		assert_eq!(req.field(COMMAND_FIELD), None);
		assert_eq!(req.command(), None);
	}

	#[cfg(feature = "http")]
	#[test]
	fn form_body_is_urlencoded() {
		let req = WireRequest::build("cgi", "1 2", &accumulated(json!({ "position": "chr1:1-10" })), &Map::new(), "t".into(), None);
		assert_eq!(req.form_body(), "hgsid=1%202&position=chr1%3A1-10&_=t");
	}

	#[test]
	fn cache_tokens_are_unique() {
		let mut tokens = CacheTokens::default();
		assert_ne!(tokens.next(), tokens.next());
	}
}
