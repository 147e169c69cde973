//! Per-server I/O task.
//!
//! One task owns the server's stdin, the pending-request table and the
//! request id counter; a helper task owns stdout decoding. All outbound
//! traffic funnels through the [`Outbound`] queue, so writes are
//! serialized and ids are allocated in send order (1, 2, 3, …, never
//! reused). Because the table has a single owner, a response can never
//! race a concurrent registration.

use std::collections::HashMap;

use serde_json::{Value as JsonValue, json};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot};

use super::Outbound;
use crate::client::transport::{TransportEvent, TransportStatus};
use crate::types::{AnyResponse, Message, RequestId};
use crate::{Error, ServerId, codec};

type PendingTable = HashMap<RequestId, oneshot::Sender<crate::Result<AnyResponse>>>;

/// Drive one server's streams until the server goes away.
///
/// Generic over the byte streams so tests can substitute in-memory pipes
/// for child process stdio.
pub(crate) async fn run_server_io<R, W>(
	id: ServerId,
	mut stdin: W,
	stdout: R,
	mut outbound_rx: mpsc::UnboundedReceiver<Outbound>,
	event_tx: mpsc::UnboundedSender<TransportEvent>,
) where
	R: AsyncRead + Unpin + Send + 'static,
	W: AsyncWrite + Unpin + Send + 'static,
{
	let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel();
	let reader = tokio::spawn(read_loop(stdout, inbound_tx));

	let mut pending = PendingTable::new();
	let mut next_id: i64 = 1;
	let mut outbound_open = true;

	loop {
		tokio::select! {
			outbound = outbound_rx.recv(), if outbound_open => match outbound {
				Some(Outbound::Notify(notification)) => {
					let payload = json!({
						"jsonrpc": "2.0",
						"method": notification.method,
						"params": notification.params,
					});
					// A broken pipe here is not fatal: the reader sees
					// the server die and reports it.
					if let Err(e) = write_payload(&mut stdin, &payload).await {
						tracing::warn!(
							server_id = %id,
							method = %notification.method,
							error = %e,
							"notification write failed"
						);
					}
				}
				Some(Outbound::Request { method, params, response_tx }) => {
					let request_id = RequestId::Number(next_id);
					next_id += 1;
					let payload = json!({
						"jsonrpc": "2.0",
						"id": &request_id,
						"method": method,
						"params": params,
					});
					match write_payload(&mut stdin, &payload).await {
						Ok(()) => {
							pending.insert(request_id, response_tx);
						}
						Err(e) => {
							tracing::warn!(
								server_id = %id,
								method = %method,
								error = %e,
								"request write failed"
							);
							let _ = response_tx.send(Err(Error::ServiceStopped));
						}
					}
				}
				None => outbound_open = false,
			},
			inbound = inbound_rx.recv() => match inbound {
				Some(Ok(value)) => route_message(id, value, &mut pending, &event_tx),
				Some(Err(Error::Deserialize(e))) => {
					tracing::warn!(
						server_id = %id,
						error = %e,
						"dropping frame with invalid JSON body"
					);
				}
				Some(Err(e)) => {
					tracing::error!(server_id = %id, error = %e, "read from language server failed");
					let _ = event_tx.send(TransportEvent::Status {
						server: id,
						status: TransportStatus::Crashed,
					});
					break;
				}
				None => {
					tracing::info!(server_id = %id, "language server closed its output");
					let _ = event_tx.send(TransportEvent::Status {
						server: id,
						status: TransportStatus::Stopped,
					});
					break;
				}
			},
		}
	}

	reader.abort();

	// Every in-flight or still-queued request resolves exactly once.
	for (_, response_tx) in pending.drain() {
		let _ = response_tx.send(Err(Error::ServiceStopped));
	}
	outbound_rx.close();
	while let Ok(outbound) = outbound_rx.try_recv() {
		if let Outbound::Request { response_tx, .. } = outbound {
			let _ = response_tx.send(Err(Error::ServiceStopped));
		}
	}
}

/// Decode frames off the server's stdout and hand them to the I/O task.
/// Ends on EOF or a fatal read error; invalid JSON bodies are forwarded
/// as errors so the consumer can log and keep going.
async fn read_loop<R>(stdout: R, inbound_tx: mpsc::UnboundedSender<crate::Result<JsonValue>>)
where
	R: AsyncRead + Unpin,
{
	let mut reader = BufReader::new(stdout);
	let mut scratch = String::new();
	loop {
		match codec::read_message(&mut reader, &mut scratch).await {
			Ok(Some(value)) => {
				if inbound_tx.send(Ok(value)).is_err() {
					break;
				}
			}
			Ok(None) => break,
			Err(e @ Error::Deserialize(_)) => {
				if inbound_tx.send(Err(e)).is_err() {
					break;
				}
			}
			Err(e) => {
				let _ = inbound_tx.send(Err(e));
				break;
			}
		}
	}
}

async fn write_payload<W>(stdin: &mut W, payload: &JsonValue) -> crate::Result<()>
where
	W: AsyncWrite + Unpin,
{
	let framed = codec::encode(payload)?;
	stdin.write_all(&framed).await?;
	stdin.flush().await?;
	Ok(())
}

/// Route one decoded inbound message.
///
/// Responses resolve their pending entry (remote errors resolve it with
/// [`Error::Response`] rather than leaking the entry); diagnostics get
/// their own event; everything else is forwarded for the session layer
/// to handle or log.
fn route_message(
	id: ServerId,
	value: JsonValue,
	pending: &mut PendingTable,
	event_tx: &mpsc::UnboundedSender<TransportEvent>,
) {
	match Message::classify(value) {
		Ok(Message::Response(response)) => match pending.remove(&response.id) {
			Some(response_tx) => {
				let result = match response.error {
					Some(err) => {
						tracing::warn!(
							server_id = %id,
							request_id = %response.id,
							code = err.code,
							"request failed: {}",
							err.message
						);
						Err(Error::Response(err))
					}
					None => Ok(response),
				};
				let _ = response_tx.send(result);
			}
			None => {
				tracing::warn!(
					server_id = %id,
					request_id = %response.id,
					"response for unknown request id"
				);
			}
		},
		Ok(Message::Notification(notification)) => {
			if notification.method == "textDocument/publishDiagnostics" {
				let uri = notification
					.params
					.get("uri")
					.and_then(JsonValue::as_str)
					.unwrap_or_default()
					.to_owned();
				let version = notification
					.params
					.get("version")
					.and_then(JsonValue::as_i64)
					.and_then(|v| i32::try_from(v).ok());
				let diagnostics = notification
					.params
					.get("diagnostics")
					.cloned()
					.unwrap_or(JsonValue::Null);
				let _ = event_tx.send(TransportEvent::Diagnostics {
					server: id,
					uri,
					version,
					diagnostics,
				});
			} else {
				let _ = event_tx.send(TransportEvent::Message {
					server: id,
					message: Message::Notification(notification),
				});
			}
		}
		Ok(Message::Request(request)) => {
			tracing::debug!(server_id = %id, method = %request.method, "server-initiated request");
			let _ = event_tx.send(TransportEvent::Message {
				server: id,
				message: Message::Request(request),
			});
		}
		Err(e) => {
			tracing::warn!(server_id = %id, error = %e, "dropping unroutable message");
		}
	}
}
