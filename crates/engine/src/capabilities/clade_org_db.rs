//! Cascading clade → organism → assembly selector.
//!
//! The server sends the whole menu tree under the `cladeOrgDb` variable:
//!
//! ```json
//! { "cladeOrgDb": [ { "value": "mammal", "label": "Mammal", "default": "Human",
//!                     "children": [ { "value": "Human", "label": "Human", "default": "hg38",
//!                                     "children": [ { "value": "hg38", "label": "GRCh38",
//!                                                     "defaultPos": "chr1:1-1000" } ] } ] } ],
//!   "clade": "mammal", "org": "Human", "db": "hg38" }
//! ```
//!
//! Picking a clade selects its default organism, which selects its default
//! assembly. Any change of assembly assigns the `clade`, `org`, `db` and
//! `position` session variables and asks the server for fresh menus.

use std::rc::Rc;

use pagesync_primitives::{Path, Value, path};
use serde_json::{Map, Value as Json};

use super::Capability;
use crate::error::{Result, StoreError};
use crate::registry::HandlerRegistry;
use crate::store::Transaction;

/// Server variable carrying the menu tree and current selection.
pub const VAR: &str = "cladeOrgDb";

/// Called after the assembly changes, with the new assembly name.
pub type DbChangeHook = Rc<dyn Fn(&mut Transaction<'_>, &str) -> Result<()>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Level {
	Clade,
	Org,
	Db,
}

impl Level {
	fn key(self) -> &'static str {
		match self {
			Self::Clade => "clade",
			Self::Org => "org",
			Self::Db => "db",
		}
	}
}

struct Selection {
	clade: String,
	org: String,
	db: String,
}

pub struct CladeOrgDb {
	scope: Path,
	on_change_db: Option<DbChangeHook>,
}

impl Default for CladeOrgDb {
	fn default() -> Self {
		Self::new(path![VAR])
	}
}

impl CladeOrgDb {
	pub fn new(scope: impl Into<Path>) -> Self {
		Self {
			scope: scope.into(),
			on_change_db: None,
		}
	}

	#[must_use]
	pub fn on_change_db(
		mut self,
		hook: impl Fn(&mut Transaction<'_>, &str) -> Result<()> + 'static,
	) -> Self {
		self.on_change_db = Some(Rc::new(hook));
		self
	}
}

impl Capability for CladeOrgDb {
	fn name(&self) -> &'static str {
		"clade_org_db"
	}

	fn register(&self, registry: &mut HandlerRegistry) {
		let scope = self.scope.clone();
		registry.on_var(VAR, move |tx, _name, value| merge_menus(tx, &scope, value));

		for level in [Level::Clade, Level::Org, Level::Db] {
			let scope = self.scope.clone();
			let hook = self.on_change_db.clone();
			registry.on_path(self.scope.join(level.key()), move |tx, path, data| {
				select(tx, &scope, level, path, data, hook.as_ref())
			});
		}
	}
}

fn merge_menus(tx: &mut Transaction<'_>, scope: &Path, value: &Value) -> Result<()> {
	let tree = value.get_key(VAR).cloned().unwrap_or_else(Value::list);
	let selection = Selection {
		clade: text(value, "clade"),
		org: text(value, "org"),
		db: text(value, "db"),
	};
	tx.set_in(&scope.join("tree"), tree.clone())?;
	apply(tx, scope, &tree, &selection)
}

fn select(
	tx: &mut Transaction<'_>,
	scope: &Path,
	level: Level,
	path: &Path,
	data: &Value,
	hook: Option<&DbChangeHook>,
) -> Result<()> {
	let Some(choice) = data.as_str() else {
		return Err(StoreError::handler(
			path,
			format!("expected a menu value, got {}", data.kind()),
		));
	};
	let tree = tx.get_in(&scope.join("tree")).cloned().unwrap_or_default();
	let current = |key: &str| tx.get_str(&scope.join(key)).unwrap_or_default().to_string();
	let unknown = |what: &str, value: &str| StoreError::handler(path, format!("unknown {what} `{value}`"));

	let (clade, org) = match level {
		Level::Clade => {
			let clade = find(&tree, choice).ok_or_else(|| unknown("clade", choice))?;
			(clade, default_child(clade))
		}
		Level::Org => {
			let clade_name = current("clade");
			let clade = find(&tree, &clade_name).ok_or_else(|| unknown("clade", &clade_name))?;
			let org = find_child(clade, choice).ok_or_else(|| unknown("organism", choice))?;
			(clade, Some(org))
		}
		Level::Db => {
			let clade_name = current("clade");
			let org_name = current("org");
			let clade = find(&tree, &clade_name).ok_or_else(|| unknown("clade", &clade_name))?;
			let org = find_child(clade, &org_name).ok_or_else(|| unknown("organism", &org_name))?;
			if find_child(org, choice).is_none() {
				return Err(unknown("assembly", choice));
			}
			(clade, Some(org))
		}
	};
	let org = org.ok_or_else(|| StoreError::handler(path, "clade has no organisms"))?;
	let db = match level {
		Level::Db => Some(choice.to_string()),
		Level::Clade | Level::Org => default_child(org).map(|db| text(db, "value")),
	};
	let db = db.ok_or_else(|| StoreError::handler(path, "organism has no assemblies"))?;

	let selection = Selection {
		clade: text(clade, "value"),
		org: text(org, "value"),
		db,
	};
	if selection.db == current("db") {
		tracing::trace!(db = %selection.db, "clade_org_db.unchanged");
		return apply(tx, scope, &tree, &selection);
	}

	apply(tx, scope, &tree, &selection)?;
	let mut vars = Map::new();
	vars.insert("clade".into(), Json::from(selection.clade.as_str()));
	vars.insert("org".into(), Json::from(selection.org.as_str()));
	vars.insert("db".into(), Json::from(selection.db.as_str()));
	if let Some(pos) = tx.get_str(&scope.join("defaultPos")) {
		vars.insert("position".into(), Json::from(pos));
	}
	let mut command = Map::new();
	command.insert("sessionVar".into(), Json::Object(vars));
	command.insert("getCladeOrgDbPos".into(), Json::Object(Map::new()));
	tx.send_command(Json::Object(command))?;
	tracing::debug!(db = %selection.db, "clade_org_db.change_db");

	match hook {
		Some(hook) => hook(tx, &selection.db),
		None => Ok(()),
	}
}

/// Writes the selection and the three derived menus under `scope`.
fn apply(tx: &mut Transaction<'_>, scope: &Path, tree: &Value, selection: &Selection) -> Result<()> {
	let clade = find(tree, &selection.clade);
	let org = clade.and_then(|c| find_child(c, &selection.org));
	let db = org.and_then(|o| find_child(o, &selection.db));

	tx.set_in(&scope.join("clade"), selection.clade.as_str())?;
	tx.set_in(&scope.join("org"), selection.org.as_str())?;
	tx.set_in(&scope.join("db"), selection.db.as_str())?;
	tx.set_in(&scope.join("cladeOptions"), options(Some(tree)))?;
	tx.set_in(&scope.join("orgOptions"), options(clade.and_then(|c| c.get_key("children"))))?;
	tx.set_in(&scope.join("dbOptions"), options(org.and_then(|o| o.get_key("children"))))?;
	match db.and_then(|d| d.get_key("defaultPos")) {
		Some(pos) => tx.set_in(&scope.join("defaultPos"), pos.clone()),
		None => {
			tx.remove_in(&scope.join("defaultPos"));
			Ok(())
		}
	}
}

fn text(node: &Value, key: &str) -> String {
	node.get_key(key)
		.and_then(Value::as_str)
		.unwrap_or_default()
		.to_string()
}

fn find<'v>(nodes: &'v Value, value: &str) -> Option<&'v Value> {
	nodes
		.as_list()?
		.iter()
		.find(|node| node.get_key("value").and_then(Value::as_str) == Some(value))
}

fn find_child<'v>(node: &'v Value, value: &str) -> Option<&'v Value> {
	find(node.get_key("children")?, value)
}

/// The child named by `default`, else the first child.
fn default_child(node: &Value) -> Option<&Value> {
	let children = node.get_key("children")?;
	node.get_key("default")
		.and_then(Value::as_str)
		.and_then(|name| find(children, name))
		.or_else(|| children.as_list()?.front())
}

fn options(nodes: Option<&Value>) -> Value {
	let items = nodes
		.and_then(Value::as_list)
		.into_iter()
		.flatten()
		.map(|node| {
			Value::from_entries([
				("value", node.get_key("value").cloned().unwrap_or_default()),
				("label", node.get_key("label").cloned().unwrap_or_default()),
			])
		});
	Value::from_items(items)
}
