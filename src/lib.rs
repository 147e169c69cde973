//! Editor-side Language Server Protocol client engine.
//!
//! Launches a language server subprocess, speaks Content-Length framed
//! JSON-RPC over its standard streams, tracks per-document synchronization
//! state, and surfaces server responses and notifications (diagnostics,
//! hover, completion, signature help, references, rename, definition) to a
//! host editor through typed interfaces.
//!
//! The entry point for hosts is [`session::WindowManager`], which maps
//! editor windows to at most one running [`session`] each and drives the
//! whole lifecycle from a typed [`events::EventBus`]. Lower layers
//! ([`client`], [`codec`], [`document`], [`sync`]) are public so hosts can
//! drive a single server directly.

use std::io;
use std::path::{Path, PathBuf};

pub mod client;
pub mod codec;
pub mod diagnostics;
pub mod document;
pub mod events;
pub mod features;
pub mod session;
pub mod sync;
pub mod types;
pub mod ui;

pub use client::{
	ClientHandle, LocalTransport, LspTransport, ServerConfig, ServerId, StartedServer,
	TransportEvent, TransportStatus,
};
pub use diagnostics::{DiagnosticsStore, format_diagnostic, format_reference};
pub use document::{DocumentState, DocumentStore};
pub use events::{DiagnosticsUpdate, EditorEvent, EventBus, Topic, ViewSnapshot, WindowId};
pub use features::{Features, SyncMode};
pub use serde_json::Value as JsonValue;
pub use session::{RestartPolicy, SessionConfig, SessionState, SpawnRouterError, WindowManager};
pub use sync::DocumentSync;
pub use types::{AnyNotification, AnyRequest, AnyResponse, Message, RequestId, ResponseError};
pub use ui::{EditorUi, MessageKind, NoOpUi, SharedUi};

/// Result type used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors produced by the client engine.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
	/// The server's I/O task exited before the operation completed.
	#[error("language server service stopped")]
	ServiceStopped,

	/// A payload failed to serialize or deserialize.
	#[error("deserialization failed: {0}")]
	Deserialize(#[from] serde_json::Error),

	/// The server answered a request with a JSON-RPC error object.
	#[error("{0}")]
	Response(#[from] types::ResponseError),

	/// The peer violated the wire protocol.
	#[error("protocol error: {0}")]
	Protocol(String),

	/// Underlying stream I/O failed.
	#[error(transparent)]
	Io(#[from] io::Error),

	/// The server process could not be spawned.
	#[error("failed to spawn language server `{server}`: {reason}")]
	ServerSpawn { server: String, reason: String },

	/// A request did not receive a response within its deadline.
	#[error("request `{0}` timed out")]
	RequestTimeout(String),

	/// The session exists but has not finished initializing.
	#[error("language server not ready")]
	NotReady,
}

/// Convert an absolute filesystem path to an LSP document URI.
///
/// Returns `None` for paths that cannot be expressed as a `file://` URL
/// (relative paths, invalid UTF-8 components on some platforms).
pub fn uri_from_path(path: &Path) -> Option<lsp_types::Uri> {
	let url = url::Url::from_file_path(path).ok()?;
	url.as_str().parse().ok()
}

/// Convert a `file://` document URI back to a filesystem path.
pub fn path_from_uri(uri: &lsp_types::Uri) -> Option<PathBuf> {
	let url = url::Url::parse(uri.as_str()).ok()?;
	url.to_file_path().ok()
}
