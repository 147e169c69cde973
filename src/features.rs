//! Negotiated feature set.
//!
//! Parsed once from the `initialize` result and read-only afterwards.
//! Closed defaults: a capability the server did not advertise (or
//! advertised as `false`) stays disabled.

use lsp_types::{
	HoverProviderCapability, InitializeResult, OneOf, ServerCapabilities,
	TextDocumentSyncCapability, TextDocumentSyncKind,
};

/// Document synchronization mode. Servers advertising incremental sync
/// are still driven with full-text updates, so there is only one mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
	Full,
}

/// What the server agreed to do, in the shape the session layer consults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Features {
	pub hover: bool,
	pub definition: bool,
	pub references: bool,
	pub rename: bool,
	/// Characters that should trigger completion, e.g. `.` or `::`.
	pub completion_triggers: Vec<String>,
	/// Characters that should trigger signature help, e.g. `(` or `,`.
	pub signature_help_triggers: Vec<String>,
	/// `None` means the server opted out of document sync entirely.
	pub sync: Option<SyncMode>,
}

impl Features {
	pub fn from_initialize(result: &InitializeResult) -> Self {
		Self::from_capabilities(&result.capabilities)
	}

	pub fn from_capabilities(caps: &ServerCapabilities) -> Self {
		Self {
			hover: matches!(
				caps.hover_provider,
				Some(HoverProviderCapability::Simple(true))
					| Some(HoverProviderCapability::Options(_))
			),
			definition: provider_enabled(&caps.definition_provider),
			references: provider_enabled(&caps.references_provider),
			rename: provider_enabled(&caps.rename_provider),
			completion_triggers: caps
				.completion_provider
				.as_ref()
				.and_then(|c| c.trigger_characters.clone())
				.unwrap_or_default(),
			signature_help_triggers: caps
				.signature_help_provider
				.as_ref()
				.and_then(|s| s.trigger_characters.clone())
				.unwrap_or_default(),
			sync: sync_mode(caps.text_document_sync.as_ref()),
		}
	}

	pub fn sync_enabled(&self) -> bool {
		self.sync.is_some()
	}
}

/// A `OneOf<bool, Options>` provider counts as enabled for `true` or any
/// options object, disabled for `false` or absence.
pub(crate) fn provider_enabled<T>(provider: &Option<OneOf<bool, T>>) -> bool {
	matches!(provider, Some(OneOf::Left(true)) | Some(OneOf::Right(_)))
}

fn sync_mode(sync: Option<&TextDocumentSyncCapability>) -> Option<SyncMode> {
	match sync {
		None => None,
		Some(TextDocumentSyncCapability::Kind(kind)) if *kind == TextDocumentSyncKind::NONE => None,
		// Full and incremental both drive full-text updates; an options
		// object means the server wants sync in some form.
		Some(_) => Some(SyncMode::Full),
	}
}
