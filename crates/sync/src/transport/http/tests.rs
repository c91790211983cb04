use pretty_assertions::assert_eq;
use serde_json::{Map, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use super::*;
use crate::accumulator::SessionVarAccumulator;
use crate::transport::RequestId;

/// A request as `SyncQueue::flush` builds it, aimed at no endpoint yet.
fn request(attachment: Option<FileAttachment>) -> WireRequest {
	let mut vars = SessionVarAccumulator::new();
	let assigned = json!({ "db": "hg38", "position": "chr1:1-10 (gene)" });
	if let Some(assigned) = assigned.as_object() {
		vars.merge(assigned).unwrap();
	}
	let mut actions = Map::new();
	actions.insert("getStatus".into(), json!({ "verbose": true }));
	WireRequest::build("", "123_abc", &vars, &actions, "1700000000000-0".into(), attachment)
}

/// True once headers and a `content-length` body have been read.
fn request_complete(raw: &[u8]) -> bool {
	let text = String::from_utf8_lossy(raw);
	let Some(end) = text.find("\r\n\r\n") else {
		return false;
	};
	let length = text[..end]
		.lines()
		.filter_map(|line| line.split_once(':'))
		.find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
		.and_then(|(_, value)| value.trim().parse::<usize>().ok())
		.unwrap_or(0);
	raw.len() >= end + 4 + length
}

/// Accepts one connection, answers with `status` and `body`, and returns the
/// raw request.
async fn serve_once(listener: TcpListener, status: &'static str, body: &'static str) -> String {
	let (mut socket, _) = listener.accept().await.unwrap();
	let mut raw = Vec::new();
	let mut chunk = [0u8; 4096];
	while !request_complete(&raw) {
		let n = socket.read(&mut chunk).await.unwrap();
		if n == 0 {
			break;
		}
		raw.extend_from_slice(&chunk[..n]);
	}
	let response = format!(
		"HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
		body.len()
	);
	socket.write_all(response.as_bytes()).await.unwrap();
	let _ = socket.shutdown().await;
	String::from_utf8_lossy(&raw).into_owned()
}

/// Posts `request` to a one-shot local server and returns the raw request
/// text and the reply result.
async fn exchange(
	mut request: WireRequest,
	status: &'static str,
	body: &'static str,
) -> (String, ReplyResult) {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	let server = tokio::spawn(serve_once(listener, status, body));
	request.endpoint = format!("http://{addr}/cgi-bin/hgIntegrator");

	let client = Client::builder().no_proxy().build().unwrap();
	let transport = HttpTransport::current().with_client(client);
	let (tx, mut rx) = mpsc::unbounded_channel();
	transport.dispatch(request, ReplyHandle::new(RequestId(7), tx));

	let completion = rx.recv().await.unwrap();
	assert_eq!(completion.id, RequestId(7));
	(server.await.unwrap(), completion.result)
}

fn body_of(raw: &str) -> &str {
	raw.split_once("\r\n\r\n").map(|(_, body)| body).unwrap_or_default()
}

/// Value of the multipart part named `name`.
fn part<'r>(raw: &'r str, name: &str) -> Option<&'r str> {
	let start = raw.find(&format!("name=\"{name}\""))?;
	let rest = &raw[start..];
	let value = &rest[rest.find("\r\n\r\n")? + 4..];
	value.split("\r\n").next()
}

#[tokio::test]
async fn form_post_carries_every_field() {
	let sent = request(None);
	let (raw, result) = exchange(sent.clone(), "200 OK", r#"{"position":"chr1:1-10"}"#).await;

	assert_eq!(result, Ok(json!({ "position": "chr1:1-10" })));
	let lower = raw.to_ascii_lowercase();
	assert!(lower.starts_with("post /cgi-bin/hgintegrator "), "{raw}");
	assert!(lower.contains("content-type: application/x-www-form-urlencoded"), "{raw}");

	let received: Vec<(String, String)> = body_of(&raw)
		.split('&')
		.filter_map(|pair| pair.split_once('='))
		.map(|(name, value)| {
			let decode = |text: &str| urlencoding::decode(text).unwrap().into_owned();
			(decode(name), decode(value))
		})
		.collect();
	assert_eq!(received, sent.fields);
}

#[tokio::test]
async fn multipart_post_carries_same_fields_and_file() {
	let file = FileAttachment::new("regionFile", "regions.bed", b"chr1\t0\t100\n".to_vec())
		.with_mime("text/plain");
	let sent = request(Some(file));
	let (raw, result) = exchange(sent.clone(), "200 OK", "{}").await;

	assert_eq!(result, Ok(json!({})));
	assert!(
		raw.to_ascii_lowercase().contains("content-type: multipart/form-data; boundary="),
		"{raw}"
	);
	for (name, value) in &sent.fields {
		assert_eq!(part(&raw, name), Some(value.as_str()), "field {name}");
	}
	assert!(raw.contains("name=\"regionFile\"; filename=\"regions.bed\""), "{raw}");
	assert_eq!(part(&raw, "regionFile"), Some("chr1\t0\t100\n"));
}

#[tokio::test]
async fn error_status_keeps_body() {
	let (_raw, result) = exchange(request(None), "500 Internal Server Error", "boom").await;
	assert_eq!(
		result,
		Err(TransportError::Status {
			status: 500,
			body: "boom".into(),
		})
	);
}

#[tokio::test]
async fn non_json_reply_is_a_decode_error() {
	let (_raw, result) = exchange(request(None), "200 OK", "<html>oops</html>").await;
	assert!(matches!(result, Err(TransportError::Decode(_))), "{result:?}");
}
