//! Outgoing session synchronization.
//!
//! Handlers queue commands and session-variable assignments on a
//! [`SyncQueue`] while a user action is processed. The caller decides when to
//! [`flush`](SyncQueue::flush), which turns everything accumulated so far into
//! one [`WireRequest`] per queued command and hands each to a [`Transport`].
//! Replies come back over a channel and are applied by the owner of the queue
//! through [`Completed::run`].

/// Session-variable accumulation with conflict detection.
pub mod accumulator;
/// Command object validation.
pub mod command;
/// Sync and transport errors.
pub mod error;
/// The pending queue and completion handling.
pub mod queue;
/// In-memory transport for tests.
#[cfg(any(test, feature = "testing"))]
pub mod testing;
/// Transport seam and the HTTP implementation.
pub mod transport;
/// Request encoding.
pub mod wire;

pub use accumulator::SessionVarAccumulator;
pub use command::{CommandParts, SESSION_VAR_KEY};
pub use error::{SyncError, TransportError};
pub use queue::{Callbacks, Checkpoint, Completed, ErrorCallback, SuccessCallback, SyncHost, SyncQueue};
#[cfg(feature = "http")]
pub use transport::HttpTransport;
pub use transport::{ReplyHandle, ReplyResult, RequestId, Transport};
pub use wire::{FileAttachment, WireRequest};
