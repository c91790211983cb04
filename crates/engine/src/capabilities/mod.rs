//! Capabilities: self-contained bundles of handlers for one concern.
//!
//! A capability owns a scope path. It registers server-variable handlers that
//! merge their values under that scope and path handlers for UI events below
//! it. It never writes outside its scope except by sending commands and
//! session variables, so capabilities compose without knowing each other.

use crate::registry::HandlerRegistry;

mod clade_org_db;
mod json_blob;
mod position_search;
mod user_regions;


pub use clade_org_db::{CladeOrgDb, DbChangeHook};
pub use json_blob::JsonBlobVars;
pub use position_search::{PositionSearch, SearchState};
pub use user_regions::{PopupState, UserRegions};

/// A bundle of handlers registered once while the store is built.
pub trait Capability {
	/// Short name for logs.
	fn name(&self) -> &'static str;

	fn register(&self, registry: &mut HandlerRegistry);
}
