//! Per-document synchronization state.
//!
//! One [`DocumentState`] per absolute file path, created lazily the first
//! time the session touches a document and owned by that session's
//! [`DocumentStore`]. The store drops with the session; `didClose` only
//! flips the opened flag so a later re-open starts a fresh version run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use parking_lot::RwLock;

use crate::uri_from_path;

/// Tracked state for one document.
pub struct DocumentState {
	path: PathBuf,
	uri: lsp_types::Uri,
	/// `didOpen` sends 0; each `didChange` sends the next value.
	version: AtomicI32,
	opened: AtomicBool,
	/// Last full text pushed to the server, kept so a restarted session
	/// can re-open the document with current content.
	text: RwLock<String>,
}

impl DocumentState {
	fn new(path: PathBuf, uri: lsp_types::Uri, text: String) -> Self {
		Self {
			path,
			uri,
			version: AtomicI32::new(0),
			opened: AtomicBool::new(false),
			text: RwLock::new(text),
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn uri(&self) -> &lsp_types::Uri {
		&self.uri
	}

	pub fn version(&self) -> i32 {
		self.version.load(Ordering::SeqCst)
	}

	/// Bump the version counter, returning the new value. Called exactly
	/// once per outgoing `didChange`.
	pub fn increment_version(&self) -> i32 {
		self.version.fetch_add(1, Ordering::SeqCst) + 1
	}

	pub fn is_opened(&self) -> bool {
		self.opened.load(Ordering::SeqCst)
	}

	pub fn set_opened(&self, opened: bool) {
		self.opened.store(opened, Ordering::SeqCst);
	}

	pub fn text(&self) -> String {
		self.text.read().clone()
	}

	pub fn set_text(&self, text: &str) {
		*self.text.write() = text.to_owned();
	}
}

/// All documents known to one session.
#[derive(Default)]
pub struct DocumentStore {
	documents: RwLock<BTreeMap<PathBuf, Arc<DocumentState>>>,
}

impl DocumentStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Look up or create the state for a path. Returns `None` when the
	/// path cannot be expressed as a file URI.
	pub fn register(&self, path: &Path, text: &str) -> Option<Arc<DocumentState>> {
		if let Some(state) = self.get(path) {
			state.set_text(text);
			return Some(state);
		}
		let uri = uri_from_path(path)?;
		let state = Arc::new(DocumentState::new(path.to_path_buf(), uri, text.to_owned()));
		self.documents
			.write()
			.insert(path.to_path_buf(), state.clone());
		Some(state)
	}

	pub fn get(&self, path: &Path) -> Option<Arc<DocumentState>> {
		self.documents.read().get(path).cloned()
	}

	pub fn contains(&self, path: &Path) -> bool {
		self.documents.read().contains_key(path)
	}

	/// Paths and current text of every opened document, for re-opening
	/// after a restart.
	pub fn open_documents(&self) -> Vec<(PathBuf, String)> {
		self.documents
			.read()
			.values()
			.filter(|state| state.is_opened())
			.map(|state| (state.path().to_path_buf(), state.text()))
			.collect()
	}

	pub fn len(&self) -> usize {
		self.documents.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.documents.read().is_empty()
	}
}
