//! Host editor UI sinks.
//!
//! `window/showMessage` and `window/logMessage` end up here; the host
//! decides how to surface them (dialog, status bar, log panel).

use std::sync::Arc;

use lsp_types::MessageType;

/// Severity of a server message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
	Error,
	Warning,
	Info,
	Log,
}

impl MessageKind {
	pub fn from_lsp(message_type: MessageType) -> Self {
		if message_type == MessageType::ERROR {
			MessageKind::Error
		} else if message_type == MessageType::WARNING {
			MessageKind::Warning
		} else if message_type == MessageType::INFO {
			MessageKind::Info
		} else {
			MessageKind::Log
		}
	}
}

/// What the engine needs from the host UI.
pub trait EditorUi: Send + Sync {
	/// `window/showMessage`: user-facing, should be visible immediately.
	fn show_message(&self, kind: MessageKind, message: &str);

	/// `window/logMessage`: server log output, prefixed by server name.
	fn log_message(&self, server: &str, message: &str);
}

pub type SharedUi = Arc<dyn EditorUi>;

/// UI sink for headless hosts and tests; messages only reach the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpUi;

impl EditorUi for NoOpUi {
	fn show_message(&self, kind: MessageKind, message: &str) {
		tracing::info!(?kind, "server message: {message}");
	}

	fn log_message(&self, server: &str, message: &str) {
		tracing::debug!(server = %server, "{message}");
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_message_kind_mapping() {
		assert_eq!(MessageKind::from_lsp(MessageType::ERROR), MessageKind::Error);
		assert_eq!(MessageKind::from_lsp(MessageType::WARNING), MessageKind::Warning);
		assert_eq!(MessageKind::from_lsp(MessageType::INFO), MessageKind::Info);
		assert_eq!(MessageKind::from_lsp(MessageType::LOG), MessageKind::Log);
	}
}
