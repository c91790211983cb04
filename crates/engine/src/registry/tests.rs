use std::sync::Arc;

use pagesync_primitives::path;
use pagesync_sync::SyncQueue;
use pagesync_sync::testing::RecordingTransport;
use pretty_assertions::assert_eq;

use super::*;
use crate::store::Store;

/// Handler that appends `tag` to the `log` list.
fn tagger(tag: &'static str) -> impl Fn(&mut Transaction<'_>, &Path, &Value) -> Result<()> {
	move |tx: &mut Transaction<'_>, _path: &Path, _data: &Value| {
		tx.update_in(&path!["log"], |log| push(log, tag))
	}
}

fn push(log: Value, tag: &str) -> Value {
	let mut items: Vec<Value> = log.as_list().into_iter().flatten().cloned().collect();
	items.push(Value::from(tag));
	Value::from_items(items)
}

fn run(registry: &HandlerRegistry, path: &Path) -> Vec<String> {
	let mut sync = SyncQueue::<Store>::new("sid", Arc::new(RecordingTransport::new()));
	let mut tx = Transaction::new(Value::map(), &mut sync);
	for handler in registry.dispatch(path) {
		handler(&mut tx, path, &Value::Null).unwrap();
	}
	log_of(tx.state())
}

fn log_of(state: &Value) -> Vec<String> {
	state
		.get_key("log")
		.and_then(Value::as_list)
		.into_iter()
		.flatten()
		.filter_map(|v| v.as_str().map(str::to_string))
		.collect()
}

#[test]
fn dispatch_is_prefix_inclusive_shallow_first() {
	let mut registry = HandlerRegistry::new();
	registry.on_path(path!["a", "b"], tagger("deep"));
	registry.on_path(path!["a"], tagger("shallow"));

	assert_eq!(run(&registry, &path!["a", "b"]), ["shallow", "deep"]);
	assert_eq!(run(&registry, &path!["a"]), ["shallow"]);
	assert_eq!(run(&registry, &path!["a", "b", "c", 3usize]), ["shallow", "deep"]);
	assert_eq!(run(&registry, &path!["a", "x"]), ["shallow"]);
}

#[test]
fn unmatched_paths_dispatch_nothing() {
	let mut registry = HandlerRegistry::new();
	registry.on_path(path!["a", "b"], tagger("deep"));

	assert!(registry.dispatch(&path!["b"]).is_empty());
	assert!(registry.dispatch(&path!["a"]).is_empty());
	assert!(registry.dispatch(&Path::new()).is_empty());
}

#[test]
fn handlers_at_same_path_run_in_registration_order() {
	let mut registry = HandlerRegistry::new();
	registry.on_path(path!["x"], tagger("first"));
	registry.on_path(path!["x"], tagger("second"));

	assert_eq!(registry.handler_count(), 2);
	assert_eq!(run(&registry, &path!["x", "y"]), ["first", "second"]);
}

#[test]
fn index_segments_are_distinct_from_keys() {
	let mut registry = HandlerRegistry::new();
	registry.on_path(path!["rows", 0usize], tagger("index"));
	registry.on_path(path!["rows", "0"], tagger("key"));

	assert_eq!(run(&registry, &path!["rows", 0usize]), ["index"]);
	assert_eq!(run(&registry, &path!["rows", "0"]), ["key"]);
}

#[test]
fn empty_path_registration_is_ignored() {
	let mut registry = HandlerRegistry::new();
	registry.on_path(Path::new(), tagger("root"));
	assert_eq!(registry.handler_count(), 0);
}

#[test]
fn var_handlers_are_shared_across_names() {
	let mut registry = HandlerRegistry::new();
	registry.on_vars(["db", "org"], |tx, name, value| {
		tx.set_in(&path![name], value.clone())
	});
	registry.on_var("db", |tx, _name, _value| tx.set_in(&path!["seen"], true));

	assert_eq!(registry.var_handlers("db").len(), 2);
	assert_eq!(registry.var_handlers("org").len(), 1);
	assert!(registry.var_handlers("other").is_empty());

	let mut names: Vec<&str> = registry.var_names().collect();
	names.sort_unstable();
	assert_eq!(names, ["db", "org"]);
}

#[test]
fn validators_keep_registration_order() {
	let mut registry = HandlerRegistry::new();
	registry.on_validate(|tx| tx.update_in(&path!["log"], |log| push(log, "one")));
	registry.on_validate(|tx| tx.update_in(&path!["log"], |log| push(log, "two")));

	let mut sync = SyncQueue::<Store>::new("sid", Arc::new(RecordingTransport::new()));
	let mut tx = Transaction::new(Value::map(), &mut sync);
	for validator in registry.validators() {
		validator(&mut tx).unwrap();
	}
	assert_eq!(log_of(tx.state()), ["one", "two"]);
}
