//! Document synchronization notifications.
//!
//! Builds and emits `didOpen`/`didChange`/`didSave`/`didClose` against a
//! session's [`DocumentStore`]. Everything here is synchronous: the
//! notifications only enqueue on the transport's outbound queue, so these
//! methods can run inside event-bus dispatch. Contiguous `didChange`
//! versions per file are guaranteed by the session's serialized dispatch
//! plus the single increment per call here.

use std::path::Path;
use std::sync::Arc;

use crate::document::DocumentStore;
use crate::{ClientHandle, Error, Result};

/// Full-text document sync for one session.
#[derive(Clone)]
pub struct DocumentSync {
	handle: ClientHandle,
	documents: Arc<DocumentStore>,
	language_id: Arc<str>,
}

impl DocumentSync {
	pub fn new(
		handle: ClientHandle,
		documents: Arc<DocumentStore>,
		language_id: impl Into<Arc<str>>,
	) -> Self {
		Self {
			handle,
			documents,
			language_id: language_id.into(),
		}
	}

	pub fn documents(&self) -> &Arc<DocumentStore> {
		&self.documents
	}

	/// Send `didOpen` with version 0 and the full text. A document that
	/// is already open is left alone.
	pub fn open(&self, path: &Path, text: &str) -> Result<()> {
		let state = self
			.documents
			.register(path, text)
			.ok_or_else(|| Error::Protocol(format!("unmappable document path: {}", path.display())))?;
		if state.is_opened() {
			return Ok(());
		}

		self.handle
			.text_document_did_open(path, &self.language_id, text)?;
		state.set_opened(true);
		tracing::debug!(
			server_id = %self.handle.id(),
			path = %path.display(),
			"document opened"
		);
		Ok(())
	}

	/// Send `didChange` with the full replacement text and the next
	/// version. Implicitly opens a document the server has not seen.
	pub fn change(&self, path: &Path, text: &str) -> Result<()> {
		let Some(state) = self.documents.get(path) else {
			return self.open(path, text);
		};
		if !state.is_opened() {
			return self.open(path, text);
		}

		let version = state.increment_version();
		state.set_text(text);
		self.handle
			.text_document_did_change_full(path, version, text)?;
		tracing::trace!(
			server_id = %self.handle.id(),
			path = %path.display(),
			version,
			"document changed"
		);
		Ok(())
	}

	pub fn save(&self, path: &Path) -> Result<()> {
		if !self.documents.get(path).is_some_and(|s| s.is_opened()) {
			return Ok(());
		}
		self.handle.text_document_did_save(path)
	}

	/// Send `didClose` and clear the opened flag. The document state
	/// itself stays in the store until the session drops.
	pub fn close(&self, path: &Path) -> Result<()> {
		let Some(state) = self.documents.get(path) else {
			return Ok(());
		};
		if !state.is_opened() {
			return Ok(());
		}

		self.handle.text_document_did_close(path)?;
		state.set_opened(false);
		tracing::debug!(
			server_id = %self.handle.id(),
			path = %path.display(),
			"document closed"
		);
		Ok(())
	}
}
