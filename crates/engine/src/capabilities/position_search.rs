//! Position search box with a popup of multiple matches.
//!
//! ```text
//! idle ──position──▶ loading ──reply: position──────────▶ resolved
//!                       └─────reply: positionMatches───▶ multipleMatches
//! multipleMatches ──positionMatch──▶ resolved
//! multipleMatches ──hidePosPopup───▶ idle
//! ```
//!
//! A search term goes to the server as `changePosition { newValue }`. The
//! server answers with `position` and, when the term is ambiguous,
//! `positionMatches`: a list of tracks, each with its own `matches`.

use pagesync_primitives::{Path, Value, path};
use serde_json::json;

use super::Capability;
use crate::error::{Result, StoreError};
use crate::registry::HandlerRegistry;
use crate::store::Transaction;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SearchState {
	#[default]
	Idle,
	Loading,
	Resolved,
	MultipleMatches,
}

impl SearchState {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Idle => "idle",
			Self::Loading => "loading",
			Self::Resolved => "resolved",
			Self::MultipleMatches => "multipleMatches",
		}
	}

	pub fn parse(text: &str) -> Option<Self> {
		[Self::Idle, Self::Loading, Self::Resolved, Self::MultipleMatches]
			.into_iter()
			.find(|state| state.as_str() == text)
	}

	/// Reads the state stored under `scope`; missing means idle.
	pub fn read(state: &Value, scope: &Path) -> Self {
		state
			.get_in(&scope.join("searchState"))
			.and_then(Value::as_str)
			.and_then(Self::parse)
			.unwrap_or_default()
	}
}

impl From<SearchState> for Value {
	fn from(state: SearchState) -> Self {
		Value::from(state.as_str())
	}
}

pub struct PositionSearch {
	scope: Path,
}

impl Default for PositionSearch {
	fn default() -> Self {
		Self::new(path!["positionInfo"])
	}
}

impl PositionSearch {
	pub fn new(scope: impl Into<Path>) -> Self {
		Self {
			scope: scope.into(),
		}
	}

	pub fn scope(&self) -> &Path {
		&self.scope
	}
}

impl Capability for PositionSearch {
	fn name(&self) -> &'static str {
		"position_search"
	}

	fn register(&self, registry: &mut HandlerRegistry) {
		let scope = self.scope.clone();
		registry.on_path(self.scope.join("position"), move |tx, path, data| {
			let term = data.as_str().map(str::trim).unwrap_or_default();
			if term.is_empty() {
				return Err(StoreError::handler(path, "position search term is empty"));
			}
			tx.set_in(&scope.join("position"), term)?;
			tx.remove_in(&scope.join("positionMatches"));
			set_state(tx, &scope, SearchState::Loading)?;
			tx.send_command(json!({ "changePosition": { "newValue": term } }))
		});

		let scope = self.scope.clone();
		registry.on_path(self.scope.join("positionMatch"), move |tx, path, data| {
			let position = data
				.as_str()
				.or_else(|| data.get_key("position").and_then(Value::as_str))
				.ok_or_else(|| StoreError::handler(path, "match has no position"))?
				.to_string();
			tx.remove_in(&scope.join("positionMatches"));
			set_state(tx, &scope, SearchState::Resolved)?;
			tx.set_session_var("position", position.as_str())?;
			tx.set_in(&scope.join("position"), position)
		});

		let scope = self.scope.clone();
		registry.on_path(self.scope.join("hidePosPopup"), move |tx, _path, _data| {
			tx.remove_in(&scope.join("positionMatches"));
			if SearchState::read(tx.state(), &scope) == SearchState::MultipleMatches {
				set_state(tx, &scope, SearchState::Idle)?;
			}
			Ok(())
		});

		let scope = self.scope.clone();
		registry.on_var("position", move |tx, _name, value| {
			tx.set_in(&scope.join("position"), value.clone())?;
			if SearchState::read(tx.state(), &scope) == SearchState::Loading {
				set_state(tx, &scope, SearchState::Resolved)?;
			}
			Ok(())
		});

		let scope = self.scope.clone();
		registry.on_var("positionMatches", move |tx, _name, value| {
			if value.is_empty() {
				tx.remove_in(&scope.join("positionMatches"));
				return Ok(());
			}
			tx.set_in(&scope.join("positionMatches"), value.clone())?;
			set_state(tx, &scope, SearchState::MultipleMatches)
		});

		let scope = self.scope.clone();
		registry.on_var("geneSuggestTrack", move |tx, _name, value| {
			tx.set_in(&scope.join("geneSuggestTrack"), value.clone())
		});
	}
}

fn set_state(tx: &mut Transaction<'_>, scope: &Path, state: SearchState) -> Result<()> {
	tracing::trace!(scope = %scope, state = state.as_str(), "position_search.state");
	tx.set_in(&scope.join("searchState"), state)
}
