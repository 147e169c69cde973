//! Transport abstraction between the session layer and a server process.
//!
//! The production implementation is [`super::LocalTransport`] (a local
//! subprocess over stdio); tests substitute mocks behind the same trait.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio::sync::mpsc;

use crate::types::{AnyNotification, AnyResponse, Message};
use crate::{Result, ServerConfig, ServerId};

/// Lifecycle status of one server instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStatus {
	/// Process spawn requested.
	Starting,
	/// Process running, I/O task live.
	Running,
	/// Server exited cleanly (EOF on stdout).
	Stopped,
	/// Server died or the stream broke mid-session.
	Crashed,
}

/// Events pushed from a transport to its consumer.
#[derive(Debug)]
pub enum TransportEvent {
	/// `textDocument/publishDiagnostics`, pre-split for routing.
	Diagnostics {
		server: ServerId,
		uri: String,
		version: Option<i32>,
		diagnostics: JsonValue,
	},
	/// Any other inbound message that is not a response to our request.
	Message { server: ServerId, message: Message },
	/// Server lifecycle change.
	Status {
		server: ServerId,
		status: TransportStatus,
	},
}

/// Handle returned once a server process has been spawned.
#[derive(Debug, Clone, Copy)]
pub struct StartedServer {
	pub id: ServerId,
}

/// Transport seam for language server I/O.
///
/// `notify` is deliberately synchronous (enqueue only) so document-sync
/// notifications can be emitted from inside synchronous event-bus
/// dispatch; requests and lifecycle operations are async.
#[async_trait]
pub trait LspTransport: Send + Sync {
	/// Take the event stream. May only be taken once per transport.
	fn subscribe_events(&self) -> Result<mpsc::UnboundedReceiver<TransportEvent>>;

	/// Spawn a server process for this configuration.
	async fn start(&self, config: ServerConfig) -> Result<StartedServer>;

	/// Enqueue a notification for the server. No response is expected.
	fn notify(&self, server: ServerId, notification: AnyNotification) -> Result<()>;

	/// Send a request and await its response. The transport allocates the
	/// request id; callers never see or choose ids.
	async fn request(&self, server: ServerId, method: &str, params: JsonValue)
	-> Result<AnyResponse>;

	/// Stop a server, killing the process if it does not exit promptly.
	async fn stop(&self, server: ServerId) -> Result<()>;
}
