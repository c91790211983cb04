//! Popup for pasting or uploading a list of user-defined regions.
//!
//! ```text
//! closed ──open──▶ open ──cancel──────────────────────▶ closedCancelled
//!                    └──pasted / uploaded ─▶ (loading) ─reply: userRegionsUpdate─▶ closedWithResult
//! ```
//!
//! Pasted text goes to the server as `setUserRegions { regions }`; uploaded
//! files go out as a multipart request through [`UserRegions::upload`]. The
//! server answers with `userRegions` (the stored regions text) and
//! `userRegionsUpdate` (a summary, empty when nothing usable was found). An
//! empty `userRegions` while the popup is open closes it as cancelled.

use pagesync_primitives::{Path, Value, path};
use pagesync_sync::FileAttachment;
use serde_json::json;

use super::Capability;
use crate::error::{Result, StoreError};
use crate::registry::HandlerRegistry;
use crate::store::{Store, Transaction};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PopupState {
	#[default]
	Closed,
	Open,
	ClosedWithResult,
	ClosedCancelled,
}

impl PopupState {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Closed => "closed",
			Self::Open => "open",
			Self::ClosedWithResult => "closedWithResult",
			Self::ClosedCancelled => "closedCancelled",
		}
	}

	pub fn parse(text: &str) -> Option<Self> {
		[Self::Closed, Self::Open, Self::ClosedWithResult, Self::ClosedCancelled]
			.into_iter()
			.find(|state| state.as_str() == text)
	}

	pub fn read(state: &Value, scope: &Path) -> Self {
		state
			.get_in(&scope.join("popup"))
			.and_then(Value::as_str)
			.and_then(Self::parse)
			.unwrap_or_default()
	}

	pub fn is_open(self) -> bool {
		self == Self::Open
	}
}

impl From<PopupState> for Value {
	fn from(state: PopupState) -> Self {
		Value::from(state.as_str())
	}
}

pub struct UserRegions {
	scope: Path,
}

impl Default for UserRegions {
	fn default() -> Self {
		Self::new(path!["userRegions"])
	}
}

impl UserRegions {
	pub fn new(scope: impl Into<Path>) -> Self {
		Self {
			scope: scope.into(),
		}
	}

	pub fn scope(&self) -> &Path {
		&self.scope
	}

	/// Queues `file` for upload and records the `uploaded` event.
	pub fn upload(&self, store: &mut Store, file: FileAttachment) -> Result<()> {
		let file_name = file.file_name.clone();
		store
			.sync_mut()
			.upload_file(json!({ "uploadUserRegions": {} }), file, Store::merge_response())?;
		store.update(self.scope.join("uploaded"), file_name)
	}
}

impl Capability for UserRegions {
	fn name(&self) -> &'static str {
		"user_regions"
	}

	fn register(&self, registry: &mut HandlerRegistry) {
		let scope = self.scope.clone();
		registry.on_path(self.scope.join("open"), move |tx, _path, _data| {
			set_popup(tx, &scope, PopupState::Open)
		});

		let scope = self.scope.clone();
		registry.on_path(self.scope.join("cancel"), move |tx, _path, _data| {
			tx.set_in(&scope.join("loading"), false)?;
			set_popup(tx, &scope, PopupState::ClosedCancelled)
		});

		let scope = self.scope.clone();
		registry.on_path(self.scope.join("pasted"), move |tx, path, data| {
			let Some(text) = data.as_str() else {
				return Err(StoreError::handler(path, "pasted regions must be text"));
			};
			let text = text.replace("\r\n", "\n").replace('\r', "\n");
			if text.trim().is_empty() {
				tx.report_error("No regions were entered");
				return Ok(());
			}
			tx.set_in(&scope.join("loading"), true)?;
			tx.send_command(json!({ "setUserRegions": { "regions": text } }))
		});

		let scope = self.scope.clone();
		registry.on_path(self.scope.join("uploaded"), move |tx, _path, data| {
			tx.set_in(&scope.join("fileName"), data.clone())?;
			tx.set_in(&scope.join("loading"), true)
		});

		let scope = self.scope.clone();
		registry.on_path(self.scope.join("clear"), move |tx, _path, _data| {
			tx.set_in(&scope.join("regions"), "")?;
			tx.set_in(&scope.join("summary"), "")?;
			set_popup(tx, &scope, PopupState::Closed)?;
			tx.send_command(json!({ "clearUserRegions": {} }))
		});

		let scope = self.scope.clone();
		registry.on_var("userRegions", move |tx, _name, value| {
			tx.set_in(&scope.join("regions"), value.clone())?;
			if value.is_empty() && PopupState::read(tx.state(), &scope).is_open() {
				tx.set_in(&scope.join("loading"), false)?;
				set_popup(tx, &scope, PopupState::ClosedCancelled)?;
			}
			Ok(())
		});

		let scope = self.scope.clone();
		registry.on_var("userRegionsUpdate", move |tx, _name, value| {
			tx.set_in(&scope.join("loading"), false)?;
			tx.set_in(&scope.join("summary"), value.clone())?;
			if !value.is_empty() && PopupState::read(tx.state(), &scope).is_open() {
				set_popup(tx, &scope, PopupState::ClosedWithResult)?;
			}
			Ok(())
		});
	}
}

fn set_popup(tx: &mut Transaction<'_>, scope: &Path, popup: PopupState) -> Result<()> {
	tracing::trace!(scope = %scope, popup = popup.as_str(), "user_regions.popup");
	tx.set_in(&scope.join("popup"), popup)
}
