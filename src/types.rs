//! JSON-RPC 2.0 message envelopes.
//!
//! Payloads stay as raw [`serde_json::Value`]s at this layer; typed
//! params/results live behind [`crate::client::ClientHandle`].

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::{Error, Result};

/// A JSON-RPC request id.
///
/// Outgoing ids are always numeric (allocated 1, 2, 3, … per session);
/// string ids can still arrive in server-initiated requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
	Number(i64),
	String(String),
}

impl fmt::Display for RequestId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			RequestId::Number(n) => write!(f, "{n}"),
			RequestId::String(s) => write!(f, "{s}"),
		}
	}
}

/// An untyped request envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnyRequest {
	pub id: RequestId,
	pub method: String,
	#[serde(default)]
	pub params: JsonValue,
}

/// An untyped notification envelope. Notifications carry no id and never
/// produce a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnyNotification {
	pub method: String,
	#[serde(default)]
	pub params: JsonValue,
}

/// An untyped response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct AnyResponse {
	pub id: RequestId,
	#[serde(default)]
	pub result: Option<JsonValue>,
	#[serde(default)]
	pub error: Option<ResponseError>,
}

/// A JSON-RPC error object from a response.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("server error {code}: {message}")]
pub struct ResponseError {
	pub code: i64,
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<JsonValue>,
}

/// A classified inbound message.
#[derive(Debug, Clone)]
pub enum Message {
	/// Server-initiated request (`id` + `method`).
	Request(AnyRequest),
	/// Response to one of our requests (`id`, `result` or `error`).
	Response(AnyResponse),
	/// Server notification (`method`, no `id`).
	Notification(AnyNotification),
}

impl Message {
	/// Classify a decoded JSON value into a message kind.
	///
	/// Checked in order: `error` member (error response), then `id` with
	/// `method` (server request), then `id` alone (response), then
	/// `method` alone (notification). Anything else is a protocol error.
	pub fn classify(value: JsonValue) -> Result<Message> {
		let Some(obj) = value.as_object() else {
			return Err(Error::Protocol("inbound message is not a JSON object".into()));
		};

		if obj.contains_key("error") {
			return Ok(Message::Response(serde_json::from_value(value)?));
		}
		match (obj.contains_key("id"), obj.contains_key("method")) {
			(true, true) => Ok(Message::Request(serde_json::from_value(value)?)),
			(true, false) => Ok(Message::Response(serde_json::from_value(value)?)),
			(false, true) => Ok(Message::Notification(serde_json::from_value(value)?)),
			(false, false) => Err(Error::Protocol(
				"inbound message has neither id nor method".into(),
			)),
		}
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn test_classify_response() {
		let msg = Message::classify(json!({"jsonrpc": "2.0", "id": 3, "result": {"x": 1}})).unwrap();
		let Message::Response(resp) = msg else {
			panic!("expected response");
		};
		assert_eq!(resp.id, RequestId::Number(3));
		assert!(resp.error.is_none());
	}

	#[test]
	fn test_classify_error_response() {
		let msg = Message::classify(json!({
			"jsonrpc": "2.0",
			"id": 7,
			"error": {"code": -32601, "message": "method not found"}
		}))
		.unwrap();
		let Message::Response(resp) = msg else {
			panic!("expected response");
		};
		let err = resp.error.unwrap();
		assert_eq!(err.code, -32601);
		assert_eq!(err.message, "method not found");
	}

	#[test]
	fn test_classify_notification() {
		let msg = Message::classify(json!({
			"jsonrpc": "2.0",
			"method": "textDocument/publishDiagnostics",
			"params": {"uri": "file:///a.rs", "diagnostics": []}
		}))
		.unwrap();
		let Message::Notification(notif) = msg else {
			panic!("expected notification");
		};
		assert_eq!(notif.method, "textDocument/publishDiagnostics");
	}

	#[test]
	fn test_classify_server_request() {
		let msg = Message::classify(json!({
			"jsonrpc": "2.0",
			"id": "cfg-1",
			"method": "workspace/configuration",
			"params": {}
		}))
		.unwrap();
		let Message::Request(req) = msg else {
			panic!("expected request");
		};
		assert_eq!(req.id, RequestId::String("cfg-1".into()));
	}

	#[test]
	fn test_classify_garbage_rejected() {
		assert!(Message::classify(json!({"jsonrpc": "2.0"})).is_err());
		assert!(Message::classify(json!([1, 2, 3])).is_err());
	}
}
