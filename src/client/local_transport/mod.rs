//! Local subprocess transport: spawns the language server with piped
//! stdio and runs one I/O task per server.

mod io;

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value as JsonValue;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::{mpsc, oneshot};

use super::transport::{LspTransport, StartedServer, TransportEvent, TransportStatus};
use crate::types::{AnyNotification, AnyResponse};
use crate::{Error, Result, ServerConfig, ServerId};

/// How long `stop` waits for a clean exit before killing the process.
const STOP_GRACE: Duration = Duration::from_secs(2);

/// Work items queued to a server's I/O task. Writes are serialized by
/// funneling every outbound message through this queue.
pub(crate) enum Outbound {
	Notify(AnyNotification),
	Request {
		method: String,
		params: JsonValue,
		response_tx: oneshot::Sender<Result<AnyResponse>>,
	},
}

struct ServerProcess {
	child: Child,
	outbound_tx: mpsc::UnboundedSender<Outbound>,
}

/// Transport that runs language servers as local child processes over
/// stdio. Stderr is drained line-by-line into the log.
pub struct LocalTransport {
	servers: RwLock<HashMap<ServerId, ServerProcess>>,
	event_tx: mpsc::UnboundedSender<TransportEvent>,
	event_rx: Mutex<Option<mpsc::UnboundedReceiver<TransportEvent>>>,
}

impl LocalTransport {
	pub fn new() -> Arc<Self> {
		let (event_tx, event_rx) = mpsc::unbounded_channel();
		Arc::new(Self {
			servers: RwLock::new(HashMap::new()),
			event_tx,
			event_rx: Mutex::new(Some(event_rx)),
		})
	}

	fn spawn_server(&self, config: &ServerConfig) -> Result<ServerProcess> {
		let mut command = Command::new(&config.command);
		command
			.args(&config.args)
			.envs(&config.env)
			.current_dir(&config.root_path)
			.stdin(Stdio::piped())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.kill_on_drop(true);

		let mut child = command.spawn().map_err(|e| Error::ServerSpawn {
			server: config.command.clone(),
			reason: e.to_string(),
		})?;

		let stdin = child
			.stdin
			.take()
			.ok_or_else(|| Error::Protocol("child stdin not captured".into()))?;
		let stdout = child
			.stdout
			.take()
			.ok_or_else(|| Error::Protocol("child stdout not captured".into()))?;
		let stderr = child
			.stderr
			.take()
			.ok_or_else(|| Error::Protocol("child stderr not captured".into()))?;

		let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
		tokio::spawn(io::run_server_io(
			config.id,
			stdin,
			stdout,
			outbound_rx,
			self.event_tx.clone(),
		));
		tokio::spawn(forward_stderr(config.id, config.command.clone(), stderr));

		Ok(ServerProcess { child, outbound_tx })
	}
}

/// Drain the server's stderr into the log. A read error ends the drain
/// without touching the process; the stdout reader owns liveness.
async fn forward_stderr(id: ServerId, server: String, stderr: ChildStderr) {
	let mut lines = BufReader::new(stderr).lines();
	while let Ok(Some(line)) = lines.next_line().await {
		if !line.trim().is_empty() {
			tracing::debug!(server_id = %id, server = %server, "{line}");
		}
	}
}

#[async_trait]
impl LspTransport for LocalTransport {
	fn subscribe_events(&self) -> Result<mpsc::UnboundedReceiver<TransportEvent>> {
		self.event_rx
			.lock()
			.take()
			.ok_or_else(|| Error::Protocol("transport event stream already taken".into()))
	}

	async fn start(&self, config: ServerConfig) -> Result<StartedServer> {
		let id = config.id;
		let _ = self.event_tx.send(TransportEvent::Status {
			server: id,
			status: TransportStatus::Starting,
		});

		let process = self.spawn_server(&config)?;
		self.servers.write().insert(id, process);

		let _ = self.event_tx.send(TransportEvent::Status {
			server: id,
			status: TransportStatus::Running,
		});
		tracing::info!(
			server_id = %id,
			command = %config.command,
			root = %config.root_path.display(),
			"language server started"
		);
		Ok(StartedServer { id })
	}

	fn notify(&self, server: ServerId, notification: AnyNotification) -> Result<()> {
		let servers = self.servers.read();
		let process = servers.get(&server).ok_or(Error::ServiceStopped)?;
		process
			.outbound_tx
			.send(Outbound::Notify(notification))
			.map_err(|_| Error::ServiceStopped)
	}

	async fn request(
		&self,
		server: ServerId,
		method: &str,
		params: JsonValue,
	) -> Result<AnyResponse> {
		let (response_tx, response_rx) = oneshot::channel();
		{
			let servers = self.servers.read();
			let process = servers.get(&server).ok_or(Error::ServiceStopped)?;
			process
				.outbound_tx
				.send(Outbound::Request {
					method: method.to_owned(),
					params,
					response_tx,
				})
				.map_err(|_| Error::ServiceStopped)?;
		}
		response_rx.await.map_err(|_| Error::ServiceStopped)?
	}

	async fn stop(&self, server: ServerId) -> Result<()> {
		let Some(process) = self.servers.write().remove(&server) else {
			return Ok(());
		};
		let ServerProcess {
			mut child,
			outbound_tx,
		} = process;
		// Closing the outbound queue lets the I/O task run down once the
		// server's stdout reaches EOF.
		drop(outbound_tx);

		if tokio::time::timeout(STOP_GRACE, child.wait()).await.is_err() {
			tracing::warn!(server_id = %server, "language server did not exit, killing");
			child.start_kill()?;
			let _ = child.wait().await;
		}
		tracing::info!(server_id = %server, "language server stopped");
		Ok(())
	}
}
