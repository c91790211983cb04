use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;

use super::*;
use crate::testing::RecordingTransport;

#[derive(Default)]
struct Host {
	replies: Vec<Json>,
	failures: Vec<TransportError>,
	alerts: Vec<String>,
}

impl SyncHost for Host {
	fn report_error(&mut self, message: &str) {
		self.alerts.push(message.to_string());
	}
}

fn queue() -> (SyncQueue<Host>, Arc<RecordingTransport>) {
	let transport = Arc::new(RecordingTransport::new());
	let queue = SyncQueue::new("123_abc", transport.clone()).with_endpoint("hgIntegrator");
	(queue, transport)
}

fn record_reply() -> Callbacks<Host> {
	Callbacks::on_success(|host: &mut Host, body| host.replies.push(body))
}

fn run_all(queue: &mut SyncQueue<Host>, host: &mut Host) -> usize {
	let done = queue.take_completions();
	let n = done.len();
	for completed in done {
		completed.run(host);
	}
	n
}

#[test]
fn send_accumulates_until_flush() {
	let (mut queue, transport) = queue();
	queue.send(json!({ "getCladeOrgDbPos": {} }), record_reply()).unwrap();
	queue.send(json!({ "sessionVar": { "db": "hg38" } }), Callbacks::none()).unwrap();
	queue.send(json!({ "getGroupedTrackDb": { "fields": "track" } }), record_reply()).unwrap();

	assert_eq!(queue.pending_len(), 2);
	assert!(transport.is_empty());

	assert_eq!(queue.flush().unwrap(), 2);
	let requests = transport.requests();
	assert_eq!(requests.len(), 2);
	for request in &requests {
		assert_eq!(request.field("hgsid"), Some("123_abc"));
		assert_eq!(request.field("db"), Some("hg38"));
		assert_eq!(request.endpoint, "hgIntegrator");
	}
	assert_eq!(requests[0].command(), Some(json!({ "getCladeOrgDbPos": {} })));
	assert_eq!(
		requests[1].command(),
		Some(json!({ "getGroupedTrackDb": { "fields": "track" } }))
	);
	assert_ne!(requests[0].field("_"), requests[1].field("_"));
}

#[test]
fn flush_drains_everything() {
	let (mut queue, transport) = queue();
	queue.send(json!({ "get": { "var": "position" }, "sessionVar": { "x": 1 } }), Callbacks::none()).unwrap();
	assert_eq!(queue.flush().unwrap(), 1);
	assert!(!queue.has_pending());
	assert_eq!(queue.session_vars().len(), 0);
	assert_eq!(queue.flush().unwrap(), 0);
	assert_eq!(transport.len(), 1);
}

#[test]
fn session_vars_alone_synthesize_a_request() {
	let (mut queue, transport) = queue();
	queue.set_session_var("position", "chr1:100-200").unwrap();
	assert_eq!(queue.pending_len(), 0);
	assert_eq!(queue.flush().unwrap(), 1);

	let request = transport.request(0).unwrap();
	assert_eq!(request.field("position"), Some("chr1:100-200"));
	assert_eq!(request.command(), None);
}

#[test]
fn conflicting_session_var_is_rejected_before_sending() {
	let (mut queue, transport) = queue();
	queue.send(json!({ "sessionVar": { "x": 1 } }), Callbacks::none()).unwrap();
	let err = queue
		.send(json!({ "sessionVar": { "x": 2 }, "get": { "var": "x" } }), record_reply())
		.unwrap_err();

	let msg = err.to_string();
	assert!(msg.contains('x') && msg.contains('1') && msg.contains('2'), "{msg}");
	assert_eq!(queue.pending_len(), 0);

	queue.flush().unwrap();
	let requests = transport.requests();
	assert_eq!(requests.len(), 1);
	assert_eq!(requests[0].field("x"), Some("1"));
}

#[test]
fn malformed_command_queues_nothing() {
	let (mut queue, _transport) = queue();
	assert!(matches!(
		queue.send(json!({ "get": 3 }), Callbacks::none()),
		Err(SyncError::MalformedCommand { .. })
	));
	assert!(!queue.has_pending());
}

#[test]
fn flush_without_endpoint_keeps_queue() {
	let transport = Arc::new(RecordingTransport::new());
	let mut queue: SyncQueue<Host> = SyncQueue::new("1", transport.clone());
	queue.send(json!({ "get": {} }), Callbacks::none()).unwrap();
	assert_eq!(queue.flush(), Err(SyncError::MissingEndpoint));
	assert_eq!(queue.pending_len(), 1);

	queue.set_endpoint("cgi");
	assert_eq!(queue.flush().unwrap(), 1);
	assert_eq!(transport.len(), 1);
}

#[test]
fn completions_run_their_own_callbacks() {
	let (mut queue, transport) = queue();
	let mut host = Host::default();
	queue.send(json!({ "a": {} }), record_reply()).unwrap();
	queue
		.send(
			json!({ "b": {} }),
			Callbacks::on_error(|host: &mut Host, err| host.failures.push(err.clone())),
		)
		.unwrap();
	queue.flush().unwrap();
	assert_eq!(queue.in_flight_len(), 2);

	assert_eq!(run_all(&mut queue, &mut host), 0);

	transport.fail(1, TransportError::Network("reset".into()));
	transport.respond(0, json!({ "position": "chr2:1-5" }));
	assert_eq!(run_all(&mut queue, &mut host), 2);

	assert_eq!(host.replies, vec![json!({ "position": "chr2:1-5" })]);
	assert_eq!(host.failures, vec![TransportError::Network("reset".into())]);
	assert!(host.alerts.is_empty());
	assert_eq!(queue.in_flight_len(), 0);
}

#[test]
fn default_error_handler_alerts_except_on_abort() {
	let (mut queue, transport) = queue();
	let mut host = Host::default();
	queue.send(json!({ "a": {} }), Callbacks::none()).unwrap();
	queue.send(json!({ "b": {} }), Callbacks::none()).unwrap();
	queue.flush().unwrap();

	assert!(transport.abandon(0));
	transport.fail(
		1,
		TransportError::Status {
			status: 500,
			body: "boom".into(),
		},
	);
	run_all(&mut queue, &mut host);

	assert_eq!(host.alerts.len(), 1);
	assert!(host.alerts[0].contains("500"));
}

#[test]
fn upload_carries_attachment_and_shared_fields() {
	let (mut queue, transport) = queue();
	queue.set_session_var("db", "hg19").unwrap();
	queue
		.upload_file(
			json!({ "uploadUserRegions": {} }),
			FileAttachment::new("regionFile", "regions.bed", b"chr1\t0\t100\n".to_vec()),
			Callbacks::none(),
		)
		.unwrap();
	queue.flush().unwrap();

	let request = transport.request(0).unwrap();
	let attachment = request.attachment.as_ref().unwrap();
	assert_eq!(attachment.file_name, "regions.bed");
	assert_eq!(request.field("db"), Some("hg19"));
	assert_eq!(request.field("hgsid"), Some("123_abc"));
	assert_eq!(request.command(), Some(json!({ "uploadUserRegions": {} })));
}

#[tokio::test]
async fn next_completion_waits_for_reply() {
	let (mut queue, transport) = queue();
	let mut host = Host::default();
	assert!(queue.next_completion().await.is_none());

	queue.send(json!({ "get": {} }), record_reply()).unwrap();
	queue.flush().unwrap();
	transport.respond(0, json!({ "ok": true }));

	let completed = queue.next_completion().await.unwrap();
	completed.run(&mut host);
	assert_eq!(host.replies, vec![json!({ "ok": true })]);
	assert!(queue.next_completion().await.is_none());
}

#[test]
fn rollback_drops_sends_after_checkpoint() {
	let (mut queue, transport) = queue();
	queue
		.send(json!({ "sessionVar": { "db": "hg38" }, "getA": {} }), Callbacks::none())
		.unwrap();
	let checkpoint = queue.checkpoint();

	queue
		.send(json!({ "sessionVar": { "org": "Human" }, "getB": {} }), record_reply())
		.unwrap();
	queue.set_session_var("position", "chr1:1-10").unwrap();
	queue.rollback(checkpoint);

	assert_eq!(queue.pending_len(), 1);
	assert_eq!(queue.session_vars().len(), 1);
	queue.set_session_var("org", "Mouse").unwrap();

	queue.flush().unwrap();
	let request = transport.request(0).unwrap();
	assert_eq!(request.command(), Some(json!({ "getA": {} })));
	assert_eq!(request.field("db"), Some("hg38"));
	assert_eq!(request.field("org"), Some("Mouse"));
	assert_eq!(request.field("position"), None);
}

#[test]
fn rollback_after_flush_keeps_queue() {
	let (mut queue, transport) = queue();
	let checkpoint = queue.checkpoint();
	queue.send(json!({ "getA": {} }), Callbacks::none()).unwrap();
	queue.flush().unwrap();
	queue.send(json!({ "getB": {} }), Callbacks::none()).unwrap();

	queue.rollback(checkpoint);
	assert_eq!(queue.pending_len(), 1);
	assert_eq!(transport.len(), 1);
}
