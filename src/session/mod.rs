//! Session and window management.
//!
//! A [`WindowManager`] maps each editor window to at most one language
//! server session. The lifecycle is a small state machine: no session →
//! [`SessionState::Starting`] (process spawned, `initialize` in flight) →
//! [`SessionState::Ready`] (capabilities applied, queued documents
//! flushed) → gone (window closed, root changed, last relevant view
//! closed, or server death).
//!
//! All state mutation happens on a single router task fed by a command
//! queue, so event handling is serialized: per-file `didChange` versions
//! come out strictly increasing and contiguous. A crashed session is
//! restarted with the same document set, bounded by [`RestartPolicy`].

#[cfg(test)]
mod tests;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use lsp_types::{
	CompletionResponse, Diagnostic, GotoDefinitionResponse, Hover, InitializeResult, Location,
	LogMessageParams, Position, ShowMessageParams, SignatureHelp, WorkspaceEdit,
};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::client::transport::{LspTransport, TransportEvent, TransportStatus};
use crate::diagnostics::{DiagnosticsStore, format_reference};
use crate::document::DocumentStore;
use crate::events::{DiagnosticsUpdate, EditorEvent, EventBus, Topic, ViewSnapshot, WindowId};
use crate::features::Features;
use crate::sync::DocumentSync;
use crate::types::Message;
use crate::ui::{MessageKind, NoOpUi, SharedUi};
use crate::{ClientHandle, Error, Result, ServerConfig, ServerId, path_from_uri};

/// How long teardown waits for the `shutdown` request before moving on.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Lifecycle of one session. Absence of a session is the third state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
	/// Process spawned, `initialize` not yet answered. Documents opened
	/// now are queued.
	Starting,
	/// Capabilities applied; the session serves requests.
	Ready,
}

/// Bounds on automatic restart of crashed sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartPolicy {
	/// Consecutive failures tolerated before giving up. The counter
	/// resets once a session reaches Ready.
	#[serde(default = "default_max_attempts")]
	pub max_attempts: u32,
	/// Delay before the first restart; doubles per attempt.
	#[serde(default = "default_base_delay_ms")]
	pub base_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
	3
}

fn default_base_delay_ms() -> u64 {
	500
}

impl Default for RestartPolicy {
	fn default() -> Self {
		Self {
			max_attempts: default_max_attempts(),
			base_delay_ms: default_base_delay_ms(),
		}
	}
}

impl RestartPolicy {
	/// Backoff before the given attempt (1-based).
	pub fn delay_for(&self, attempt: u32) -> Duration {
		let exponent = attempt.saturating_sub(1).min(10);
		Duration::from_millis(self.base_delay_ms.saturating_mul(1u64 << exponent))
	}
}

/// Host-provided configuration for one language server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
	pub command: String,
	#[serde(default)]
	pub args: Vec<String>,
	#[serde(default)]
	pub env: HashMap<String, String>,
	/// Language id sent in `didOpen`, e.g. `rust` or `typescript`.
	pub language_id: String,
	/// File extensions this server handles; empty means no filtering.
	#[serde(default)]
	pub file_extensions: Vec<String>,
	#[serde(default = "default_request_timeout_secs")]
	pub request_timeout_secs: u64,
	#[serde(default)]
	pub restart: RestartPolicy,
}

fn default_request_timeout_secs() -> u64 {
	30
}

impl SessionConfig {
	pub fn new(command: impl Into<String>, language_id: impl Into<String>) -> Self {
		Self {
			command: command.into(),
			args: Vec::new(),
			env: HashMap::new(),
			language_id: language_id.into(),
			file_extensions: Vec::new(),
			request_timeout_secs: default_request_timeout_secs(),
			restart: RestartPolicy::default(),
		}
	}

	pub fn extensions(mut self, extensions: impl IntoIterator<Item = impl Into<String>>) -> Self {
		self.file_extensions = extensions.into_iter().map(Into::into).collect();
		self
	}

	pub fn restart(mut self, restart: RestartPolicy) -> Self {
		self.restart = restart;
		self
	}

	fn request_timeout(&self) -> Duration {
		Duration::from_secs(self.request_timeout_secs)
	}

	fn supports_path(&self, path: &Path) -> bool {
		if self.file_extensions.is_empty() {
			return true;
		}
		path.extension()
			.and_then(|extension| extension.to_str())
			.is_some_and(|extension| self.file_extensions.iter().any(|e| e == extension))
	}
}

/// One running language server bound to one window.
struct Session {
	id: ServerId,
	state: SessionState,
	handle: ClientHandle,
	sync: DocumentSync,
	documents: Arc<DocumentStore>,
	diagnostics: Arc<DiagnosticsStore>,
	features: Features,
	/// Documents opened while Starting, in original open order. Flushed
	/// exactly once when the session reaches Ready.
	pending_opens: Vec<(PathBuf, String)>,
}

#[derive(Default)]
struct WindowState {
	session: Option<Session>,
	/// Supported views currently open in the window. Empty set tears
	/// the session down.
	open_views: HashSet<PathBuf>,
	root: Option<PathBuf>,
	restart_attempts: u32,
	/// Documents to re-open when a dead session restarts.
	reopen: Vec<(PathBuf, String)>,
}

enum Command {
	Event(EditorEvent),
	Transport(TransportEvent),
	Initialized {
		window: WindowId,
		server: ServerId,
		result: Box<InitializeResult>,
	},
	StartFailed {
		window: WindowId,
		server: ServerId,
	},
	Restart(WindowId),
	SetRoot {
		window: WindowId,
		root: Option<PathBuf>,
	},
	CloseWindow(WindowId),
}

struct ManagerInner {
	transport: Arc<dyn LspTransport>,
	config: SessionConfig,
	ui: SharedUi,
	bus: Arc<EventBus>,
	windows: RwLock<HashMap<WindowId, WindowState>>,
	next_server_id: AtomicU64,
	cmd_tx: mpsc::UnboundedSender<Command>,
}

#[derive(Debug, thiserror::Error)]
pub enum SpawnRouterError {
	#[error("router already started")]
	AlreadyStarted,
	#[error("no tokio runtime available")]
	NoRuntime,
	#[error("transport event stream unavailable: {0}")]
	Events(Error),
}

/// Maps editor windows to language server sessions and drives them from
/// editor events.
pub struct WindowManager {
	inner: Arc<ManagerInner>,
	cmd_rx: Mutex<Option<mpsc::UnboundedReceiver<Command>>>,
	router_started: AtomicBool,
}

impl WindowManager {
	pub fn new(transport: Arc<dyn LspTransport>, config: SessionConfig) -> Self {
		Self::with_ui(transport, config, Arc::new(NoOpUi))
	}

	pub fn with_ui(transport: Arc<dyn LspTransport>, config: SessionConfig, ui: SharedUi) -> Self {
		let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
		let bus = Arc::new(EventBus::new());

		// View events flow from the bus into the command queue so all
		// handling happens on the router task.
		for topic in [
			Topic::ViewLoaded,
			Topic::ViewModified,
			Topic::ViewSaved,
			Topic::ViewClosed,
			Topic::ViewActivated,
		] {
			let tx = cmd_tx.clone();
			bus.subscribe(topic, move |event| {
				let _ = tx.send(Command::Event(event.clone()));
			});
		}

		let inner = Arc::new(ManagerInner {
			transport,
			config,
			ui,
			bus,
			windows: RwLock::new(HashMap::new()),
			next_server_id: AtomicU64::new(0),
			cmd_tx,
		});

		Self {
			inner,
			cmd_rx: Mutex::new(Some(cmd_rx)),
			router_started: AtomicBool::new(false),
		}
	}

	/// The bus the host publishes view events on and receives
	/// [`EditorEvent::DiagnosticsPublished`] from.
	pub fn bus(&self) -> &Arc<EventBus> {
		&self.inner.bus
	}

	/// Spawn the background router task. Must be called from within a
	/// tokio runtime, at most once.
	pub fn spawn_router(&self) -> Result<JoinHandle<()>, SpawnRouterError> {
		if tokio::runtime::Handle::try_current().is_err() {
			return Err(SpawnRouterError::NoRuntime);
		}
		if self.router_started.swap(true, Ordering::SeqCst) {
			return Err(SpawnRouterError::AlreadyStarted);
		}

		let mut events = self
			.inner
			.transport
			.subscribe_events()
			.map_err(SpawnRouterError::Events)?;
		let tx = self.inner.cmd_tx.clone();
		tokio::spawn(async move {
			while let Some(event) = events.recv().await {
				if tx.send(Command::Transport(event)).is_err() {
					break;
				}
			}
		});

		let Some(mut cmd_rx) = self.cmd_rx.lock().take() else {
			return Err(SpawnRouterError::AlreadyStarted);
		};
		let inner = self.inner.clone();
		Ok(tokio::spawn(async move {
			while let Some(command) = cmd_rx.recv().await {
				handle_command(&inner, command);
			}
		}))
	}

	/// Feed one editor event directly, bypassing the bus.
	pub fn handle_event(&self, event: &EditorEvent) {
		let _ = self.inner.cmd_tx.send(Command::Event(event.clone()));
	}

	/// Record the window's workspace root (its first folder). Changing
	/// an established root tears the session down; the next open starts
	/// a fresh one.
	pub fn set_window_root(&self, window: WindowId, root: Option<PathBuf>) {
		let _ = self.inner.cmd_tx.send(Command::SetRoot { window, root });
	}

	pub fn close_window(&self, window: WindowId) {
		let _ = self.inner.cmd_tx.send(Command::CloseWindow(window));
	}

	pub fn session_state(&self, window: WindowId) -> Option<SessionState> {
		let windows = self.inner.windows.read();
		Some(windows.get(&window)?.session.as_ref()?.state)
	}

	pub fn features(&self, window: WindowId) -> Option<Features> {
		let windows = self.inner.windows.read();
		Some(windows.get(&window)?.session.as_ref()?.features.clone())
	}

	pub fn active_sessions(&self) -> usize {
		self.inner
			.windows
			.read()
			.values()
			.filter(|state| state.session.is_some())
			.count()
	}

	pub fn diagnostics_for(&self, window: WindowId, path: &Path) -> Vec<String> {
		self.with_diagnostics(window, |store| store.lines_for(path))
			.unwrap_or_default()
	}

	/// Aggregate diagnostics panel for the window, one formatted line
	/// per diagnostic across all files.
	pub fn diagnostics_panel(&self, window: WindowId) -> String {
		self.with_diagnostics(window, |store| store.panel_content())
			.unwrap_or_default()
	}

	fn with_diagnostics<T>(
		&self,
		window: WindowId,
		f: impl FnOnce(&DiagnosticsStore) -> T,
	) -> Option<T> {
		let windows = self.inner.windows.read();
		let session = windows.get(&window)?.session.as_ref()?;
		Some(f(&session.diagnostics))
	}

	pub async fn hover(
		&self,
		window: WindowId,
		path: &Path,
		position: Position,
	) -> Result<Option<Hover>> {
		self.ready_handle(window)?.hover(path, position).await
	}

	pub async fn completion(
		&self,
		window: WindowId,
		path: &Path,
		position: Position,
	) -> Result<Option<CompletionResponse>> {
		self.ready_handle(window)?.completion(path, position).await
	}

	pub async fn signature_help(
		&self,
		window: WindowId,
		path: &Path,
		position: Position,
	) -> Result<Option<SignatureHelp>> {
		self.ready_handle(window)?
			.signature_help(path, position)
			.await
	}

	pub async fn references(
		&self,
		window: WindowId,
		path: &Path,
		position: Position,
	) -> Result<Vec<Location>> {
		self.ready_handle(window)?.references(path, position).await
	}

	/// References formatted as `path\tline:col` panel lines.
	pub async fn reference_lines(
		&self,
		window: WindowId,
		path: &Path,
		position: Position,
	) -> Result<Vec<String>> {
		let locations = self.references(window, path, position).await?;
		Ok(locations.iter().filter_map(format_reference).collect())
	}

	pub async fn goto_definition(
		&self,
		window: WindowId,
		path: &Path,
		position: Position,
	) -> Result<Option<GotoDefinitionResponse>> {
		self.ready_handle(window)?
			.goto_definition(path, position)
			.await
	}

	pub async fn rename(
		&self,
		window: WindowId,
		path: &Path,
		position: Position,
		new_name: &str,
	) -> Result<Option<WorkspaceEdit>> {
		self.ready_handle(window)?
			.rename(path, position, new_name)
			.await
	}

	fn ready_handle(&self, window: WindowId) -> Result<ClientHandle> {
		let windows = self.inner.windows.read();
		let session = windows
			.get(&window)
			.and_then(|state| state.session.as_ref())
			.ok_or(Error::ServiceStopped)?;
		if session.state != SessionState::Ready {
			return Err(Error::NotReady);
		}
		Ok(session.handle.clone())
	}

	/// Orderly shutdown of every session, for host exit.
	pub async fn shutdown_all(&self) {
		let sessions: Vec<Session> = {
			let mut windows = self.inner.windows.write();
			windows
				.values_mut()
				.filter_map(|state| state.session.take())
				.collect()
		};

		for session in sessions {
			if session.handle.is_initialized() {
				let _ = tokio::time::timeout(SHUTDOWN_GRACE, session.handle.shutdown()).await;
			}
			let _ = session.handle.exit();
			let _ = self.inner.transport.stop(session.id).await;
		}
	}
}

fn handle_command(inner: &Arc<ManagerInner>, command: Command) {
	match command {
		Command::Event(event) => handle_editor_event(inner, event),
		Command::Transport(event) => handle_transport_event(inner, event),
		Command::Initialized {
			window,
			server,
			result,
		} => handle_initialized(inner, window, server, *result),
		Command::StartFailed { window, server } => handle_session_death(inner, window, server),
		Command::Restart(window) => handle_restart(inner, window),
		Command::SetRoot { window, root } => handle_set_root(inner, window, root),
		Command::CloseWindow(window) => handle_close_window(inner, window),
	}
}

fn handle_editor_event(inner: &Arc<ManagerInner>, event: EditorEvent) {
	if let Some(view) = event.view()
		&& !inner.config.supports_path(&view.path)
	{
		return;
	}

	match event {
		EditorEvent::ViewLoaded(view) | EditorEvent::ViewActivated(view) => {
			view_opened(inner, view);
		}
		EditorEvent::ViewModified(view) => view_modified(inner, view),
		EditorEvent::ViewSaved(view) => view_saved(inner, view),
		EditorEvent::ViewClosed(view) => view_closed(inner, view),
		// Diagnostics events originate here; nothing to do inbound.
		EditorEvent::DiagnosticsPublished(_) => {}
	}
}

fn view_opened(inner: &Arc<ManagerInner>, view: ViewSnapshot) {
	let mut windows = inner.windows.write();
	let state = windows.entry(view.window).or_default();
	state.open_views.insert(view.path.clone());

	if state.session.is_none() {
		state.restart_attempts = 0;
		state.reopen.clear();
		start_session(inner, view.window, state, vec![(view.path, view.text)]);
		return;
	}
	let Some(session) = state.session.as_mut() else {
		return;
	};

	match session.state {
		SessionState::Starting => queue_open(session, view.path, view.text),
		SessionState::Ready => {
			if session.features.sync_enabled()
				&& let Err(e) = session.sync.open(&view.path, &view.text)
			{
				tracing::warn!(
					server_id = %session.id,
					path = %view.path.display(),
					error = %e,
					"didOpen failed"
				);
			}
		}
	}
}

fn view_modified(inner: &Arc<ManagerInner>, view: ViewSnapshot) {
	let mut windows = inner.windows.write();
	let Some(state) = windows.get_mut(&view.window) else {
		return;
	};
	let Some(session) = state.session.as_mut() else {
		return;
	};

	match session.state {
		// The didOpen that eventually goes out should carry current
		// text, so edits made during the handshake update the queue.
		SessionState::Starting => queue_open(session, view.path, view.text),
		SessionState::Ready => {
			if session.features.sync_enabled()
				&& let Err(e) = session.sync.change(&view.path, &view.text)
			{
				tracing::warn!(
					server_id = %session.id,
					path = %view.path.display(),
					error = %e,
					"didChange failed"
				);
			}
		}
	}
}

fn view_saved(inner: &Arc<ManagerInner>, view: ViewSnapshot) {
	let windows = inner.windows.read();
	let Some(session) = windows
		.get(&view.window)
		.and_then(|state| state.session.as_ref())
	else {
		return;
	};

	if session.state == SessionState::Ready
		&& session.features.sync_enabled()
		&& let Err(e) = session.sync.save(&view.path)
	{
		tracing::warn!(
			server_id = %session.id,
			path = %view.path.display(),
			error = %e,
			"didSave failed"
		);
	}
}

fn view_closed(inner: &Arc<ManagerInner>, view: ViewSnapshot) {
	let mut windows = inner.windows.write();
	let Some(state) = windows.get_mut(&view.window) else {
		return;
	};
	state.open_views.remove(&view.path);

	if let Some(session) = state.session.as_mut() {
		match session.state {
			SessionState::Starting => {
				session.pending_opens.retain(|(path, _)| path != &view.path);
			}
			SessionState::Ready => {
				if session.features.sync_enabled()
					&& let Err(e) = session.sync.close(&view.path)
				{
					tracing::warn!(
						server_id = %session.id,
						path = %view.path.display(),
						error = %e,
						"didClose failed"
					);
				}
			}
		}
	}

	if state.open_views.is_empty()
		&& let Some(session) = state.session.take()
	{
		tracing::info!(
			server_id = %session.id,
			window = %view.window,
			"all relevant views closed, stopping session"
		);
		state.restart_attempts = 0;
		state.reopen.clear();
		teardown(inner, session);
	}
}

/// Queue a didOpen for a session still in its handshake, deduplicated by
/// path with the latest text winning.
fn queue_open(session: &mut Session, path: PathBuf, text: String) {
	if let Some(entry) = session
		.pending_opens
		.iter_mut()
		.find(|(queued, _)| *queued == path)
	{
		entry.1 = text;
	} else {
		session.pending_opens.push((path, text));
	}
}

/// Allocate an id, record the Starting session and kick off spawn plus
/// `initialize` on a background task. Called with the windows lock held;
/// does not await.
fn start_session(
	inner: &Arc<ManagerInner>,
	window: WindowId,
	state: &mut WindowState,
	pending_opens: Vec<(PathBuf, String)>,
) {
	let root = state.root.clone().or_else(|| {
		pending_opens
			.first()
			.and_then(|(path, _)| path.parent().map(Path::to_path_buf))
	});
	let Some(root) = root else {
		tracing::warn!(window = %window, "no workspace root, session not started");
		return;
	};

	let id = ServerId(inner.next_server_id.fetch_add(1, Ordering::SeqCst) + 1);
	let handle = ClientHandle::new(
		id,
		inner.config.command.clone(),
		root.clone(),
		inner.transport.clone(),
		inner.config.request_timeout(),
	);
	let documents = Arc::new(DocumentStore::new());
	let sync = DocumentSync::new(
		handle.clone(),
		documents.clone(),
		inner.config.language_id.clone(),
	);

	state.session = Some(Session {
		id,
		state: SessionState::Starting,
		handle: handle.clone(),
		sync,
		documents,
		diagnostics: Arc::new(DiagnosticsStore::new()),
		features: Features::default(),
		pending_opens,
	});
	tracing::info!(
		server_id = %id,
		window = %window,
		root = %root.display(),
		"starting language server session"
	);

	let server_config = ServerConfig::new(id, inner.config.command.clone(), root)
		.args(inner.config.args.clone())
		.env(inner.config.env.clone())
		.request_timeout(inner.config.request_timeout());
	let inner = inner.clone();
	tokio::spawn(async move {
		let command = match inner.transport.start(server_config).await {
			Ok(_) => match handle.initialize().await {
				Ok(result) => Command::Initialized {
					window,
					server: id,
					result: Box::new(result),
				},
				Err(e) => {
					tracing::error!(server_id = %id, error = %e, "initialize failed");
					Command::StartFailed { window, server: id }
				}
			},
			Err(e) => {
				tracing::error!(server_id = %id, error = %e, "failed to start language server");
				Command::StartFailed { window, server: id }
			}
		};
		let _ = inner.cmd_tx.send(command);
	});
}

fn handle_initialized(
	inner: &Arc<ManagerInner>,
	window: WindowId,
	server: ServerId,
	result: InitializeResult,
) {
	let mut windows = inner.windows.write();
	let Some(session) = windows
		.get_mut(&window)
		.and_then(|state| state.session.as_mut())
		.filter(|session| session.id == server)
	else {
		tracing::debug!(server_id = %server, "initialize completed for a stale session");
		stop_server(inner, server);
		return;
	};

	session.features = Features::from_initialize(&result);
	session.state = SessionState::Ready;
	tracing::info!(
		server_id = %server,
		window = %window,
		features = ?session.features,
		"session ready"
	);

	// Flush queued didOpens in original open order, exactly once each.
	let queued = std::mem::take(&mut session.pending_opens);
	for (path, text) in queued {
		if let Err(e) = session.sync.open(&path, &text) {
			tracing::warn!(
				server_id = %server,
				path = %path.display(),
				error = %e,
				"queued didOpen failed"
			);
		}
	}

	if let Some(state) = windows.get_mut(&window) {
		state.restart_attempts = 0;
		state.reopen.clear();
	}
}

fn handle_transport_event(inner: &Arc<ManagerInner>, event: TransportEvent) {
	match event {
		TransportEvent::Diagnostics {
			server,
			uri,
			diagnostics,
			..
		} => handle_diagnostics(inner, server, &uri, diagnostics),
		TransportEvent::Message { server, message } => handle_server_message(inner, server, message),
		TransportEvent::Status { server, status } => match status {
			TransportStatus::Stopped | TransportStatus::Crashed => {
				if let Some(window) = window_of(inner, server) {
					handle_session_death(inner, window, server);
				} else {
					tracing::debug!(
						server_id = %server,
						status = ?status,
						"exit status for unknown or stale server"
					);
				}
			}
			TransportStatus::Starting | TransportStatus::Running => {
				tracing::debug!(server_id = %server, status = ?status, "server status");
			}
		},
	}
}

fn window_of(inner: &Arc<ManagerInner>, server: ServerId) -> Option<WindowId> {
	inner.windows.read().iter().find_map(|(window, state)| {
		let session = state.session.as_ref()?;
		(session.id == server).then_some(*window)
	})
}

fn handle_diagnostics(
	inner: &Arc<ManagerInner>,
	server: ServerId,
	uri: &str,
	diagnostics: JsonValue,
) {
	let Ok(uri) = uri.parse::<lsp_types::Uri>() else {
		tracing::warn!(server_id = %server, uri = %uri, "unparseable diagnostics URI");
		return;
	};
	let Some(path) = path_from_uri(&uri) else {
		return;
	};
	let Ok(diagnostics) = serde_json::from_value::<Vec<Diagnostic>>(diagnostics) else {
		tracing::warn!(server_id = %server, uri = %uri.as_str(), "malformed diagnostics payload");
		return;
	};

	let found = {
		let windows = inner.windows.read();
		windows.iter().find_map(|(window, state)| {
			let session = state.session.as_ref()?;
			(session.id == server).then(|| (*window, session.diagnostics.clone()))
		})
	};
	let Some((window, store)) = found else {
		tracing::debug!(server_id = %server, "diagnostics from a stale server");
		return;
	};

	let lines = store.publish(&path, &diagnostics);
	tracing::debug!(
		server_id = %server,
		path = %path.display(),
		count = lines.len(),
		"diagnostics updated"
	);
	inner
		.bus
		.publish(&EditorEvent::DiagnosticsPublished(DiagnosticsUpdate {
			window,
			path,
			lines,
		}));
}

fn handle_server_message(inner: &Arc<ManagerInner>, server: ServerId, message: Message) {
	match message {
		Message::Notification(notification) => match notification.method.as_str() {
			"window/showMessage" => {
				if let Ok(params) = serde_json::from_value::<ShowMessageParams>(notification.params)
				{
					inner
						.ui
						.show_message(MessageKind::from_lsp(params.typ), &params.message);
				}
			}
			"window/logMessage" => {
				if let Ok(params) = serde_json::from_value::<LogMessageParams>(notification.params)
				{
					inner.ui.log_message(&inner.config.command, &params.message);
				}
			}
			method => {
				tracing::debug!(server_id = %server, method = %method, "unhandled server notification");
			}
		},
		Message::Request(request) => {
			tracing::debug!(
				server_id = %server,
				method = %request.method,
				request_id = %request.id,
				"unhandled server request"
			);
		}
		Message::Response(_) => {}
	}
}

/// A session's server died (spawn failure, initialize failure, crash, or
/// unexpected exit). Schedule a restart unless the policy is exhausted.
fn handle_session_death(inner: &Arc<ManagerInner>, window: WindowId, server: ServerId) {
	let mut windows = inner.windows.write();
	let Some(state) = windows.get_mut(&window) else {
		return;
	};
	let Some(session) = state.session.take_if(|session| session.id == server) else {
		tracing::debug!(server_id = %server, "death of a stale session");
		return;
	};

	state.reopen = session.documents.open_documents();
	if state.reopen.is_empty() {
		// Died during the handshake: the queue is all we have.
		state.reopen = session.pending_opens.clone();
	}
	stop_server(inner, server);

	let attempt = state.restart_attempts + 1;
	if attempt > inner.config.restart.max_attempts {
		tracing::error!(
			server_id = %server,
			window = %window,
			attempts = state.restart_attempts,
			"language server keeps failing, giving up"
		);
		inner.ui.show_message(
			MessageKind::Error,
			&format!(
				"{} failed {} times in a row, not restarting",
				inner.config.command, state.restart_attempts
			),
		);
		state.restart_attempts = 0;
		state.reopen.clear();
		return;
	}

	state.restart_attempts = attempt;
	let delay = inner.config.restart.delay_for(attempt);
	tracing::warn!(
		server_id = %server,
		window = %window,
		attempt,
		delay_ms = delay.as_millis() as u64,
		"language server died, scheduling restart"
	);
	let tx = inner.cmd_tx.clone();
	tokio::spawn(async move {
		tokio::time::sleep(delay).await;
		let _ = tx.send(Command::Restart(window));
	});
}

fn handle_restart(inner: &Arc<ManagerInner>, window: WindowId) {
	let mut windows = inner.windows.write();
	let Some(state) = windows.get_mut(&window) else {
		return;
	};
	if state.session.is_some() {
		return;
	}

	let pending = std::mem::take(&mut state.reopen);
	if pending.is_empty() && state.open_views.is_empty() {
		return;
	}
	start_session(inner, window, state, pending);
}

fn handle_set_root(inner: &Arc<ManagerInner>, window: WindowId, root: Option<PathBuf>) {
	let mut windows = inner.windows.write();
	let state = windows.entry(window).or_default();
	if state.root == root {
		return;
	}
	state.root = root;

	if let Some(session) = state.session.take() {
		tracing::info!(
			server_id = %session.id,
			window = %window,
			"workspace root changed, stopping session"
		);
		state.restart_attempts = 0;
		state.reopen.clear();
		teardown(inner, session);
	}
}

fn handle_close_window(inner: &Arc<ManagerInner>, window: WindowId) {
	let Some(mut state) = inner.windows.write().remove(&window) else {
		return;
	};
	if let Some(session) = state.session.take() {
		tracing::info!(server_id = %session.id, window = %window, "window closed, stopping session");
		teardown(inner, session);
	}
}

/// Orderly teardown off the router task: best-effort `shutdown` request,
/// then `exit`, then kill.
fn teardown(inner: &Arc<ManagerInner>, session: Session) {
	let transport = inner.transport.clone();
	let handle = session.handle;
	let id = session.id;
	tokio::spawn(async move {
		if handle.is_initialized() {
			let _ = tokio::time::timeout(SHUTDOWN_GRACE, handle.shutdown()).await;
		}
		let _ = handle.exit();
		let _ = transport.stop(id).await;
	});
}

fn stop_server(inner: &Arc<ManagerInner>, server: ServerId) {
	let transport = inner.transport.clone();
	tokio::spawn(async move {
		let _ = transport.stop(server).await;
	});
}
