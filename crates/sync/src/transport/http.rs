//! HTTP transport.
//!
//! Plain requests are posted as `application/x-www-form-urlencoded`; requests
//! with a file go out as `multipart/form-data` carrying the same fields as
//! text parts.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use tokio::runtime::Handle;

use super::{ReplyHandle, ReplyResult, Transport};
use crate::error::TransportError;
use crate::wire::{FileAttachment, WireRequest, encode_form};

#[cfg(test)]
mod tests;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Posts requests with `reqwest` on a tokio runtime.
#[derive(Debug, Clone)]
pub struct HttpTransport {
	client: Client,
	runtime: Handle,
	timeout: Duration,
}

impl HttpTransport {
	/// Spawns each request on `runtime` with a default client and a 30 second
	/// timeout.
	pub fn new(runtime: Handle) -> Self {
		Self {
			client: Client::new(),
			runtime,
			timeout: DEFAULT_TIMEOUT,
		}
	}

	/// Uses the runtime of the calling context.
	///
	/// # Panics
	///
	/// Panics outside a tokio runtime.
	pub fn current() -> Self {
		Self::new(Handle::current())
	}

	/// Sets the per-request timeout.
	#[must_use]
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;
		self
	}

	/// Replaces the `reqwest` client, e.g. to set proxies or TLS roots.
	#[must_use]
	pub fn with_client(mut self, client: Client) -> Self {
		self.client = client;
		self
	}

	pub fn timeout(&self) -> Duration {
		self.timeout
	}
}

impl Transport for HttpTransport {
	fn dispatch(&self, request: WireRequest, reply: ReplyHandle) {
		let client = self.client.clone();
		let timeout = self.timeout;
		self.runtime.spawn(async move {
			let id = reply.id();
			let result = post(&client, request, timeout).await;
			if let Err(error) = &result {
				tracing::debug!(%id, %error, "http.post_failed");
			}
			reply.resolve(result);
		});
	}
}

async fn post(client: &Client, request: WireRequest, timeout: Duration) -> ReplyResult {
	let WireRequest {
		endpoint,
		fields,
		attachment,
	} = request;
	tracing::debug!(
		%endpoint,
		fields = fields.len(),
		multipart = attachment.is_some(),
		"http.post"
	);

	let builder = client.post(&endpoint).timeout(timeout);
	let builder = match attachment {
		None => builder
			.header(CONTENT_TYPE, "application/x-www-form-urlencoded")
			.body(encode_form(&fields)),
		Some(file) => builder.multipart(multipart_form(fields, file)?),
	};

	let response = builder
		.send()
		.await
		.map_err(|e| TransportError::Network(e.to_string()))?;

	let status = response.status();
	let text = response
		.text()
		.await
		.map_err(|e| TransportError::Network(e.to_string()))?;
	if !status.is_success() {
		return Err(TransportError::Status {
			status: status.as_u16(),
			body: text,
		});
	}

	serde_json::from_str(&text).map_err(|e| TransportError::Decode(e.to_string()))
}

fn multipart_form(fields: Vec<(String, String)>, file: FileAttachment) -> Result<Form, TransportError> {
	let mut form = Form::new();
	for (name, value) in fields {
		form = form.text(name, value);
	}
	let mut part = Part::bytes(file.content).file_name(file.file_name);
	if let Some(mime) = file.mime {
		part = part
			.mime_str(&mime)
			.map_err(|e| TransportError::Attachment(e.to_string()))?;
	}
	Ok(form.part(file.field, part))
}
