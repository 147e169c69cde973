//! High-level LSP operations on [`ClientHandle`].
//!
//! Feature requests are gated on negotiated capabilities: an unsupported
//! request resolves to its empty value instead of bothering the server.

use std::path::Path;

use lsp_types::notification::{
	DidChangeTextDocument, DidCloseTextDocument, DidOpenTextDocument, DidSaveTextDocument, Exit,
	Initialized,
};
use lsp_types::request::{
	Completion, GotoDefinition, HoverRequest, Initialize, References, Rename, Shutdown,
	SignatureHelpRequest,
};
use lsp_types::{
	ClientInfo, CompletionParams, CompletionResponse, DidChangeTextDocumentParams,
	DidCloseTextDocumentParams, DidOpenTextDocumentParams, DidSaveTextDocumentParams,
	GotoDefinitionParams, GotoDefinitionResponse, Hover, HoverParams, InitializeParams,
	InitializeResult, InitializedParams, Location, Position, ReferenceContext, ReferenceParams,
	RenameParams, SignatureHelp, SignatureHelpParams, TextDocumentContentChangeEvent,
	TextDocumentIdentifier, TextDocumentItem, TextDocumentPositionParams,
	VersionedTextDocumentIdentifier, WorkspaceEdit, WorkspaceFolder,
};

use super::capabilities::client_capabilities;
use super::handle::ClientHandle;
use crate::{Error, Result, uri_from_path};

impl ClientHandle {
	/// Run the `initialize` handshake: send the request, record the
	/// returned capabilities, then send the `initialized` notification.
	pub async fn initialize(&self) -> Result<InitializeResult> {
		let root_uri = self.root_uri();
		// Single-root by design: exactly one workspace folder.
		let workspace_folders = root_uri.clone().map(|uri| {
			vec![WorkspaceFolder {
				uri,
				name: self
					.root_path()
					.file_name()
					.map(|n| n.to_string_lossy().into_owned())
					.unwrap_or_default(),
			}]
		});

		#[allow(deprecated)]
		let params = InitializeParams {
			process_id: Some(std::process::id()),
			root_uri,
			capabilities: client_capabilities(),
			client_info: Some(ClientInfo {
				name: "quill".into(),
				version: Some(env!("CARGO_PKG_VERSION").into()),
			}),
			workspace_folders,
			..Default::default()
		};

		let result = self.request::<Initialize>(params).await?;
		self.set_capabilities(result.capabilities.clone());
		self.notify::<Initialized>(InitializedParams {})?;

		tracing::info!(
			server_id = %self.id(),
			server = %self.name(),
			"language server initialized"
		);
		Ok(result)
	}

	/// Best-effort orderly shutdown request.
	pub async fn shutdown(&self) -> Result<()> {
		self.request::<Shutdown>(()).await
	}

	/// Tell the server to exit. Fire-and-forget.
	pub fn exit(&self) -> Result<()> {
		self.notify::<Exit>(())
	}

	/// `textDocument/didOpen` with the full text at version 0.
	pub fn text_document_did_open(
		&self,
		path: &Path,
		language_id: &str,
		text: &str,
	) -> Result<()> {
		self.notify::<DidOpenTextDocument>(DidOpenTextDocumentParams {
			text_document: TextDocumentItem {
				uri: self.uri_for(path)?,
				language_id: language_id.into(),
				version: 0,
				text: text.into(),
			},
		})
	}

	/// `textDocument/didChange` carrying the full replacement text.
	pub fn text_document_did_change_full(
		&self,
		path: &Path,
		version: i32,
		text: &str,
	) -> Result<()> {
		self.notify::<DidChangeTextDocument>(DidChangeTextDocumentParams {
			text_document: VersionedTextDocumentIdentifier {
				uri: self.uri_for(path)?,
				version,
			},
			content_changes: vec![TextDocumentContentChangeEvent {
				range: None,
				range_length: None,
				text: text.into(),
			}],
		})
	}

	pub fn text_document_did_save(&self, path: &Path) -> Result<()> {
		self.notify::<DidSaveTextDocument>(DidSaveTextDocumentParams {
			text_document: self.document_id(path)?,
			text: None,
		})
	}

	pub fn text_document_did_close(&self, path: &Path) -> Result<()> {
		self.notify::<DidCloseTextDocument>(DidCloseTextDocumentParams {
			text_document: self.document_id(path)?,
		})
	}

	pub async fn hover(&self, path: &Path, position: Position) -> Result<Option<Hover>> {
		if !self.supports_hover() {
			return Ok(None);
		}
		self.request::<HoverRequest>(HoverParams {
			text_document_position_params: self.position_params(path, position)?,
			work_done_progress_params: Default::default(),
		})
		.await
	}

	pub async fn completion(
		&self,
		path: &Path,
		position: Position,
	) -> Result<Option<CompletionResponse>> {
		if !self.supports_completion() {
			return Ok(None);
		}
		self.request::<Completion>(CompletionParams {
			text_document_position: self.position_params(path, position)?,
			context: None,
			work_done_progress_params: Default::default(),
			partial_result_params: Default::default(),
		})
		.await
	}

	pub async fn signature_help(
		&self,
		path: &Path,
		position: Position,
	) -> Result<Option<SignatureHelp>> {
		if !self.supports_signature_help() {
			return Ok(None);
		}
		self.request::<SignatureHelpRequest>(SignatureHelpParams {
			context: None,
			text_document_position_params: self.position_params(path, position)?,
			work_done_progress_params: Default::default(),
		})
		.await
	}

	pub async fn references(&self, path: &Path, position: Position) -> Result<Vec<Location>> {
		if !self.supports_references() {
			return Ok(Vec::new());
		}
		let locations = self
			.request::<References>(ReferenceParams {
				text_document_position: self.position_params(path, position)?,
				context: ReferenceContext {
					include_declaration: true,
				},
				work_done_progress_params: Default::default(),
				partial_result_params: Default::default(),
			})
			.await?;
		Ok(locations.unwrap_or_default())
	}

	pub async fn goto_definition(
		&self,
		path: &Path,
		position: Position,
	) -> Result<Option<GotoDefinitionResponse>> {
		if !self.supports_definition() {
			return Ok(None);
		}
		self.request::<GotoDefinition>(GotoDefinitionParams {
			text_document_position_params: self.position_params(path, position)?,
			work_done_progress_params: Default::default(),
			partial_result_params: Default::default(),
		})
		.await
	}

	pub async fn rename(
		&self,
		path: &Path,
		position: Position,
		new_name: &str,
	) -> Result<Option<WorkspaceEdit>> {
		if !self.supports_rename() {
			return Ok(None);
		}
		self.request::<Rename>(RenameParams {
			text_document_position: self.position_params(path, position)?,
			new_name: new_name.into(),
			work_done_progress_params: Default::default(),
		})
		.await
	}

	fn uri_for(&self, path: &Path) -> Result<lsp_types::Uri> {
		uri_from_path(path).ok_or_else(|| {
			Error::Protocol(format!("path is not a valid file URI: {}", path.display()))
		})
	}

	fn document_id(&self, path: &Path) -> Result<TextDocumentIdentifier> {
		Ok(TextDocumentIdentifier {
			uri: self.uri_for(path)?,
		})
	}

	fn position_params(
		&self,
		path: &Path,
		position: Position,
	) -> Result<TextDocumentPositionParams> {
		Ok(TextDocumentPositionParams {
			text_document: self.document_id(path)?,
			position,
		})
	}
}
