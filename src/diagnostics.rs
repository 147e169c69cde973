//! Diagnostics bookkeeping and display formatting.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use lsp_types::{Diagnostic, Location};
use parking_lot::RwLock;

use crate::path_from_uri;

/// Format one diagnostic as a panel line: `path\tline:col\tmessage`.
/// Line and column are zero-based, as the wire carries them.
pub fn format_diagnostic(path: &Path, diagnostic: &Diagnostic) -> String {
	format!(
		"{}\t{}:{}\t{}",
		path.display(),
		diagnostic.range.start.line,
		diagnostic.range.start.character,
		diagnostic.message
	)
}

/// Format one reference location as `path\tline:col`. `None` for
/// locations outside the filesystem.
pub fn format_reference(location: &Location) -> Option<String> {
	let path = path_from_uri(&location.uri)?;
	Some(format!(
		"{}\t{}:{}",
		path.display(),
		location.range.start.line,
		location.range.start.character
	))
}

/// Latest formatted diagnostics per file.
///
/// Each `publishDiagnostics` replaces the file's lines wholesale; an
/// empty list removes the file. Keyed order gives the panel a stable
/// file ordering.
#[derive(Default)]
pub struct DiagnosticsStore {
	files: RwLock<BTreeMap<PathBuf, Vec<String>>>,
}

impl DiagnosticsStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Record the new diagnostics for a file, returning the formatted
	/// lines (empty when the file became clean).
	pub fn publish(&self, path: &Path, diagnostics: &[Diagnostic]) -> Vec<String> {
		let lines: Vec<String> = diagnostics
			.iter()
			.map(|diagnostic| format_diagnostic(path, diagnostic))
			.collect();

		let mut files = self.files.write();
		if lines.is_empty() {
			files.remove(path);
		} else {
			files.insert(path.to_path_buf(), lines.clone());
		}
		lines
	}

	pub fn lines_for(&self, path: &Path) -> Vec<String> {
		self.files.read().get(path).cloned().unwrap_or_default()
	}

	/// All diagnostics across files, one line each, for the aggregate
	/// panel.
	pub fn panel_content(&self) -> String {
		let files = self.files.read();
		let mut panel = String::new();
		for lines in files.values() {
			for line in lines {
				panel.push_str(line);
				panel.push('\n');
			}
		}
		panel
	}

	pub fn is_empty(&self) -> bool {
		self.files.read().is_empty()
	}
}
