use std::sync::atomic::AtomicUsize;

use async_trait::async_trait;
use serde_json::json;

use super::*;
use crate::client::transport::StartedServer;
use crate::types::{AnyNotification, AnyResponse, RequestId};
use crate::ui::EditorUi;

struct MockTransport {
	capabilities: JsonValue,
	fail_starts: bool,
	hang_requests: bool,
	start_count: AtomicUsize,
	notifications: Mutex<Vec<(ServerId, AnyNotification)>>,
	requests: Mutex<Vec<(ServerId, String)>>,
	stopped: Mutex<Vec<ServerId>>,
	event_tx: mpsc::UnboundedSender<TransportEvent>,
	event_rx: Mutex<Option<mpsc::UnboundedReceiver<TransportEvent>>>,
}

impl MockTransport {
	fn make(capabilities: JsonValue, fail_starts: bool, hang_requests: bool) -> Arc<Self> {
		let (event_tx, event_rx) = mpsc::unbounded_channel();
		Arc::new(Self {
			capabilities,
			fail_starts,
			hang_requests,
			start_count: AtomicUsize::new(0),
			notifications: Mutex::new(Vec::new()),
			requests: Mutex::new(Vec::new()),
			stopped: Mutex::new(Vec::new()),
			event_tx,
			event_rx: Mutex::new(Some(event_rx)),
		})
	}

	fn new(capabilities: JsonValue) -> Arc<Self> {
		Self::make(capabilities, false, false)
	}

	fn failing() -> Arc<Self> {
		Self::make(json!({}), true, false)
	}

	fn hanging() -> Arc<Self> {
		Self::make(json!({}), false, true)
	}

	fn starts(&self) -> usize {
		self.start_count.load(Ordering::SeqCst)
	}

	fn crash(&self, server: ServerId) {
		let _ = self.event_tx.send(TransportEvent::Status {
			server,
			status: TransportStatus::Crashed,
		});
	}

	fn publish_diagnostics(&self, server: ServerId, uri: &str, diagnostics: JsonValue) {
		let _ = self.event_tx.send(TransportEvent::Diagnostics {
			server,
			uri: uri.to_owned(),
			version: None,
			diagnostics,
		});
	}

	fn send_notification(&self, server: ServerId, method: &str, params: JsonValue) {
		let _ = self.event_tx.send(TransportEvent::Message {
			server,
			message: Message::Notification(AnyNotification {
				method: method.to_owned(),
				params,
			}),
		});
	}

	fn named(&self, method: &str) -> Vec<AnyNotification> {
		self.notifications
			.lock()
			.iter()
			.filter(|(_, notification)| notification.method == method)
			.map(|(_, notification)| notification.clone())
			.collect()
	}

	fn notified_methods(&self) -> Vec<String> {
		self.notifications
			.lock()
			.iter()
			.map(|(_, notification)| notification.method.clone())
			.collect()
	}
}

#[async_trait]
impl LspTransport for MockTransport {
	fn subscribe_events(&self) -> crate::Result<mpsc::UnboundedReceiver<TransportEvent>> {
		self.event_rx
			.lock()
			.take()
			.ok_or_else(|| Error::Protocol("event stream already taken".into()))
	}

	async fn start(&self, config: ServerConfig) -> crate::Result<StartedServer> {
		self.start_count.fetch_add(1, Ordering::SeqCst);
		if self.fail_starts {
			return Err(Error::ServerSpawn {
				server: config.command,
				reason: "mock spawn failure".into(),
			});
		}
		Ok(StartedServer { id: config.id })
	}

	fn notify(&self, server: ServerId, notification: AnyNotification) -> crate::Result<()> {
		self.notifications.lock().push((server, notification));
		Ok(())
	}

	async fn request(
		&self,
		server: ServerId,
		method: &str,
		_params: JsonValue,
	) -> crate::Result<AnyResponse> {
		if self.hang_requests {
			futures::future::pending::<()>().await;
		}
		self.requests.lock().push((server, method.to_owned()));
		let result = match method {
			"initialize" => json!({"capabilities": self.capabilities}),
			_ => JsonValue::Null,
		};
		Ok(AnyResponse {
			id: RequestId::Number(0),
			result: Some(result),
			error: None,
		})
	}

	async fn stop(&self, server: ServerId) -> crate::Result<()> {
		self.stopped.lock().push(server);
		Ok(())
	}
}

#[derive(Default)]
struct RecordingUi {
	shown: Mutex<Vec<(MessageKind, String)>>,
	logged: Mutex<Vec<(String, String)>>,
}

impl EditorUi for RecordingUi {
	fn show_message(&self, kind: MessageKind, message: &str) {
		self.shown.lock().push((kind, message.to_owned()));
	}

	fn log_message(&self, server: &str, message: &str) {
		self.logged.lock().push((server.to_owned(), message.to_owned()));
	}
}

const WINDOW: WindowId = WindowId(1);

fn test_config() -> SessionConfig {
	SessionConfig::new("mock-server", "rust")
		.extensions(["rs"])
		.restart(RestartPolicy {
			max_attempts: 2,
			base_delay_ms: 1,
		})
}

fn start_manager(transport: Arc<MockTransport>) -> WindowManager {
	let manager = WindowManager::new(transport, test_config());
	manager.spawn_router().unwrap();
	manager
}

fn view(path: &str, text: &str) -> ViewSnapshot {
	ViewSnapshot {
		window: WINDOW,
		path: PathBuf::from(path),
		text: text.to_owned(),
	}
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
	for _ in 0..1000 {
		if condition() {
			return;
		}
		tokio::time::sleep(Duration::from_millis(2)).await;
	}
	panic!("condition not met within deadline");
}

#[tokio::test]
async fn test_session_reaches_ready_and_flushes_queued_opens() {
	let transport = MockTransport::new(json!({"textDocumentSync": 1}));
	let manager = start_manager(transport.clone());

	manager.handle_event(&EditorEvent::ViewLoaded(view("/ws/src/main.rs", "fn main() {}")));
	manager.handle_event(&EditorEvent::ViewLoaded(view("/ws/src/lib.rs", "pub fn f() {}")));

	wait_until(|| manager.session_state(WINDOW) == Some(SessionState::Ready)).await;
	wait_until(|| transport.named("textDocument/didOpen").len() == 2).await;

	// One session serves both views, and the handshake began with
	// `initialize`.
	assert_eq!(transport.starts(), 1);
	assert_eq!(
		transport.requests.lock().first().map(|(_, method)| method.clone()),
		Some("initialize".to_owned())
	);

	// Flushed in original open order, version 0, full text, exactly once.
	let opens = transport.named("textDocument/didOpen");
	assert_eq!(opens.len(), 2);
	assert_eq!(
		opens[0].params["textDocument"]["uri"],
		json!("file:///ws/src/main.rs")
	);
	assert_eq!(opens[0].params["textDocument"]["version"], json!(0));
	assert_eq!(opens[0].params["textDocument"]["text"], json!("fn main() {}"));
	assert_eq!(opens[0].params["textDocument"]["languageId"], json!("rust"));
	assert_eq!(
		opens[1].params["textDocument"]["uri"],
		json!("file:///ws/src/lib.rs")
	);

	// `initialized` went out before any didOpen.
	let methods = transport.notified_methods();
	let initialized = methods.iter().position(|m| m == "initialized").unwrap();
	let first_open = methods
		.iter()
		.position(|m| m == "textDocument/didOpen")
		.unwrap();
	assert!(initialized < first_open);
}

#[tokio::test]
async fn test_unsupported_files_are_ignored() {
	let transport = MockTransport::new(json!({"textDocumentSync": 1}));
	let manager = start_manager(transport.clone());

	manager.handle_event(&EditorEvent::ViewLoaded(view("/ws/notes.txt", "plain text")));
	tokio::time::sleep(Duration::from_millis(20)).await;

	assert_eq!(transport.starts(), 0);
	assert_eq!(manager.session_state(WINDOW), None);
}

#[tokio::test]
async fn test_features_follow_advertised_capabilities() {
	let transport = MockTransport::new(json!({"referencesProvider": true}));
	let manager = start_manager(transport.clone());

	manager.handle_event(&EditorEvent::ViewLoaded(view("/ws/src/main.rs", "")));
	wait_until(|| manager.session_state(WINDOW) == Some(SessionState::Ready)).await;

	let features = manager.features(WINDOW).unwrap();
	assert!(features.references);
	assert!(!features.hover);
	assert!(!features.definition);
	assert!(!features.rename);
	assert!(!features.sync_enabled());
}

#[tokio::test]
async fn test_didchange_versions_are_contiguous() {
	let transport = MockTransport::new(json!({"textDocumentSync": 1}));
	let manager = start_manager(transport.clone());

	manager.handle_event(&EditorEvent::ViewLoaded(view("/ws/src/main.rs", "v0")));
	wait_until(|| !transport.named("textDocument/didOpen").is_empty()).await;

	for text in ["v1", "v2", "v3"] {
		manager.handle_event(&EditorEvent::ViewModified(view("/ws/src/main.rs", text)));
	}
	wait_until(|| transport.named("textDocument/didChange").len() == 3).await;

	let changes = transport.named("textDocument/didChange");
	let versions: Vec<_> = changes
		.iter()
		.map(|change| change.params["textDocument"]["version"].clone())
		.collect();
	assert_eq!(versions, vec![json!(1), json!(2), json!(3)]);
	assert_eq!(changes[2].params["contentChanges"][0]["text"], json!("v3"));
}

#[tokio::test]
async fn test_second_view_reuses_ready_session() {
	let transport = MockTransport::new(json!({"textDocumentSync": 1}));
	let manager = start_manager(transport.clone());

	manager.handle_event(&EditorEvent::ViewLoaded(view("/ws/src/main.rs", "")));
	wait_until(|| manager.session_state(WINDOW) == Some(SessionState::Ready)).await;

	manager.handle_event(&EditorEvent::ViewLoaded(view("/ws/src/lib.rs", "")));
	wait_until(|| transport.named("textDocument/didOpen").len() == 2).await;

	assert_eq!(transport.starts(), 1);
}

#[tokio::test]
async fn test_closing_last_view_stops_session() {
	let transport = MockTransport::new(json!({"textDocumentSync": 1}));
	let manager = start_manager(transport.clone());

	manager.handle_event(&EditorEvent::ViewLoaded(view("/ws/src/main.rs", "")));
	wait_until(|| manager.session_state(WINDOW) == Some(SessionState::Ready)).await;

	manager.handle_event(&EditorEvent::ViewClosed(view("/ws/src/main.rs", "")));
	wait_until(|| !transport.stopped.lock().is_empty()).await;

	assert_eq!(manager.session_state(WINDOW), None);
	assert_eq!(manager.active_sessions(), 0);

	// didClose went out before the teardown's exit.
	let methods = transport.notified_methods();
	let close = methods
		.iter()
		.position(|m| m == "textDocument/didClose")
		.unwrap();
	let exit = methods.iter().position(|m| m == "exit").unwrap();
	assert!(close < exit);
}

#[tokio::test]
async fn test_window_close_stops_session() {
	let transport = MockTransport::new(json!({"textDocumentSync": 1}));
	let manager = start_manager(transport.clone());

	manager.handle_event(&EditorEvent::ViewLoaded(view("/ws/src/main.rs", "")));
	wait_until(|| manager.session_state(WINDOW) == Some(SessionState::Ready)).await;

	manager.close_window(WINDOW);
	wait_until(|| !transport.stopped.lock().is_empty()).await;
	assert_eq!(manager.session_state(WINDOW), None);
	assert!(transport.notified_methods().contains(&"exit".to_owned()));
}

#[tokio::test]
async fn test_crash_restarts_with_same_documents() {
	let transport = MockTransport::new(json!({"textDocumentSync": 1}));
	let manager = start_manager(transport.clone());

	manager.handle_event(&EditorEvent::ViewLoaded(view("/ws/src/main.rs", "fn main() {}")));
	wait_until(|| transport.named("textDocument/didOpen").len() == 1).await;

	transport.crash(ServerId(1));
	wait_until(|| transport.starts() == 2).await;
	wait_until(|| transport.named("textDocument/didOpen").len() == 2).await;
	wait_until(|| manager.session_state(WINDOW) == Some(SessionState::Ready)).await;

	let opens = transport.named("textDocument/didOpen");
	assert_eq!(
		opens[1].params["textDocument"]["uri"],
		json!("file:///ws/src/main.rs")
	);
	assert_eq!(opens[1].params["textDocument"]["text"], json!("fn main() {}"));
	assert_eq!(opens[1].params["textDocument"]["version"], json!(0));

	// Reaching Ready reset the attempt counter; a later crash restarts
	// again from attempt one.
	transport.crash(ServerId(2));
	wait_until(|| transport.starts() == 3).await;
	wait_until(|| manager.session_state(WINDOW) == Some(SessionState::Ready)).await;
}

#[tokio::test]
async fn test_restart_gives_up_after_max_attempts() {
	let transport = MockTransport::failing();
	let ui = Arc::new(RecordingUi::default());
	let manager = WindowManager::with_ui(transport.clone(), test_config(), ui.clone());
	manager.spawn_router().unwrap();

	manager.handle_event(&EditorEvent::ViewLoaded(view("/ws/src/main.rs", "")));

	// Initial start plus two retries, then nothing.
	wait_until(|| transport.starts() == 3).await;
	tokio::time::sleep(Duration::from_millis(50)).await;
	assert_eq!(transport.starts(), 3);
	assert_eq!(manager.session_state(WINDOW), None);

	let shown = ui.shown.lock();
	assert_eq!(shown.len(), 1);
	assert_eq!(shown[0].0, MessageKind::Error);
}

#[tokio::test]
async fn test_root_change_stops_session() {
	let transport = MockTransport::new(json!({"textDocumentSync": 1}));
	let manager = start_manager(transport.clone());

	manager.set_window_root(WINDOW, Some(PathBuf::from("/ws")));
	manager.handle_event(&EditorEvent::ViewLoaded(view("/ws/src/main.rs", "")));
	wait_until(|| manager.session_state(WINDOW) == Some(SessionState::Ready)).await;

	manager.set_window_root(WINDOW, Some(PathBuf::from("/elsewhere")));
	wait_until(|| !transport.stopped.lock().is_empty()).await;
	assert_eq!(manager.session_state(WINDOW), None);
}

#[tokio::test]
async fn test_diagnostics_flow_to_bus_and_panel() {
	let transport = MockTransport::new(json!({"textDocumentSync": 1}));
	let manager = start_manager(transport.clone());

	let updates = Arc::new(Mutex::new(Vec::new()));
	let sink = updates.clone();
	manager
		.bus()
		.subscribe(Topic::DiagnosticsPublished, move |event| {
			if let EditorEvent::DiagnosticsPublished(update) = event {
				sink.lock().push(update.clone());
			}
		});

	manager.handle_event(&EditorEvent::ViewLoaded(view("/ws/src/main.rs", "")));
	wait_until(|| manager.session_state(WINDOW) == Some(SessionState::Ready)).await;

	transport.publish_diagnostics(
		ServerId(1),
		"file:///ws/src/main.rs",
		json!([{
			"range": {
				"start": {"line": 3, "character": 8},
				"end": {"line": 3, "character": 12}
			},
			"message": "mismatched types"
		}]),
	);
	wait_until(|| !updates.lock().is_empty()).await;

	{
		let updates = updates.lock();
		assert_eq!(updates[0].window, WINDOW);
		assert_eq!(updates[0].path, PathBuf::from("/ws/src/main.rs"));
		assert_eq!(updates[0].lines, vec!["/ws/src/main.rs\t3:8\tmismatched types"]);
	}
	assert_eq!(
		manager.diagnostics_panel(WINDOW),
		"/ws/src/main.rs\t3:8\tmismatched types\n"
	);

	// An empty publish clears the file.
	transport.publish_diagnostics(ServerId(1), "file:///ws/src/main.rs", json!([]));
	wait_until(|| updates.lock().len() == 2).await;
	assert!(updates.lock()[1].lines.is_empty());
	assert!(manager.diagnostics_panel(WINDOW).is_empty());
}

#[tokio::test]
async fn test_show_and_log_messages_reach_the_ui() {
	let transport = MockTransport::new(json!({}));
	let ui = Arc::new(RecordingUi::default());
	let manager = WindowManager::with_ui(transport.clone(), test_config(), ui.clone());
	manager.spawn_router().unwrap();

	transport.send_notification(
		ServerId(1),
		"window/showMessage",
		json!({"type": 1, "message": "disk full"}),
	);
	transport.send_notification(
		ServerId(1),
		"window/logMessage",
		json!({"type": 4, "message": "indexing 3 files"}),
	);

	wait_until(|| !ui.logged.lock().is_empty()).await;
	assert_eq!(
		*ui.shown.lock(),
		vec![(MessageKind::Error, "disk full".to_owned())]
	);
	assert_eq!(
		*ui.logged.lock(),
		vec![("mock-server".to_owned(), "indexing 3 files".to_owned())]
	);
}

#[tokio::test]
async fn test_stale_server_events_are_dropped() {
	let transport = MockTransport::new(json!({"textDocumentSync": 1}));
	let manager = start_manager(transport.clone());

	manager.handle_event(&EditorEvent::ViewLoaded(view("/ws/src/main.rs", "")));
	wait_until(|| manager.session_state(WINDOW) == Some(SessionState::Ready)).await;

	// A crash report from an id that is not the live session must not
	// disturb it.
	transport.crash(ServerId(99));
	tokio::time::sleep(Duration::from_millis(20)).await;

	assert_eq!(manager.session_state(WINDOW), Some(SessionState::Ready));
	assert_eq!(transport.starts(), 1);
}

#[tokio::test]
async fn test_request_times_out() {
	let transport = MockTransport::hanging();
	let handle = ClientHandle::new(
		ServerId(1),
		"mock-server",
		"/ws",
		transport,
		Duration::from_millis(10),
	);

	let err = handle.shutdown().await.unwrap_err();
	assert!(matches!(err, Error::RequestTimeout(_)));
}

#[test]
fn test_restart_policy_backoff_doubles() {
	let policy = RestartPolicy {
		max_attempts: 3,
		base_delay_ms: 500,
	};
	assert_eq!(policy.delay_for(1), Duration::from_millis(500));
	assert_eq!(policy.delay_for(2), Duration::from_millis(1000));
	assert_eq!(policy.delay_for(3), Duration::from_millis(2000));
}

#[test]
fn test_session_config_defaults_from_json() {
	let config: SessionConfig = serde_json::from_str(
		r#"{"command": "rust-analyzer", "language_id": "rust"}"#,
	)
	.unwrap();

	assert_eq!(config.command, "rust-analyzer");
	assert!(config.args.is_empty());
	assert!(config.file_extensions.is_empty());
	assert_eq!(config.request_timeout_secs, 30);
	assert_eq!(config.restart, RestartPolicy::default());
}
