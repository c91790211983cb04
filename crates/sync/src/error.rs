use serde_json::Value as Json;

/// Structural failures detected before anything is sent.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SyncError {
	/// The command is not an object of named sub-command objects.
	#[error("malformed command ({message}): {value}")]
	MalformedCommand { message: String, value: Json },
	/// Two pending assignments give one session variable different values.
	#[error("conflicting values for session variable `{name}`: {old} then {new}")]
	ConflictingSessionVar { name: String, old: Json, new: Json },
	/// `flush` was called before an endpoint was configured.
	#[error("no endpoint configured")]
	MissingEndpoint,
}

impl SyncError {
	pub(crate) fn malformed(message: impl Into<String>, value: &Json) -> Self {
		Self::MalformedCommand {
			message: message.into(),
			value: value.clone(),
		}
	}
}

/// Failure of an issued request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
	/// The request was abandoned before a reply arrived.
	#[error("request aborted")]
	Aborted,
	#[error("server returned {status}: {body}")]
	Status { status: u16, body: String },
	#[error("network error: {0}")]
	Network(String),
	#[error("invalid response body: {0}")]
	Decode(String),
	#[error("invalid attachment: {0}")]
	Attachment(String),
}

impl TransportError {
	/// Aborts happen when the page goes away mid-request and are not worth
	/// reporting.
	pub fn is_aborted(&self) -> bool {
		matches!(self, Self::Aborted)
	}
}

pub type Result<T, E = SyncError> = std::result::Result<T, E>;
