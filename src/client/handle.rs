//! Cloneable per-server client handle.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use lsp_types::ServerCapabilities;
use lsp_types::notification::Notification;
use lsp_types::request::Request;
use tokio::sync::OnceCell;

use super::transport::LspTransport;
use crate::features::provider_enabled;
use crate::types::AnyNotification;
use crate::{Error, Result, ServerId, uri_from_path};

/// Typed request/notify surface for one language server.
///
/// Cheap to clone; all clones share the capability cell, which is set
/// exactly once when `initialize` completes and read-only thereafter.
#[derive(Clone)]
pub struct ClientHandle {
	id: ServerId,
	name: Arc<str>,
	root_path: PathBuf,
	capabilities: Arc<OnceCell<ServerCapabilities>>,
	transport: Arc<dyn LspTransport>,
	request_timeout: Duration,
}

impl ClientHandle {
	pub fn new(
		id: ServerId,
		name: impl Into<Arc<str>>,
		root_path: impl Into<PathBuf>,
		transport: Arc<dyn LspTransport>,
		request_timeout: Duration,
	) -> Self {
		Self {
			id,
			name: name.into(),
			root_path: root_path.into(),
			capabilities: Arc::new(OnceCell::new()),
			transport,
			request_timeout,
		}
	}

	pub fn id(&self) -> ServerId {
		self.id
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn root_path(&self) -> &Path {
		&self.root_path
	}

	pub fn root_uri(&self) -> Option<lsp_types::Uri> {
		uri_from_path(&self.root_path)
	}

	/// Send a typed request and await its typed result.
	///
	/// Expires with [`Error::RequestTimeout`] after the configured
	/// deadline; a zero deadline waits forever.
	pub async fn request<R: Request>(&self, params: R::Params) -> Result<R::Result> {
		let params = serde_json::to_value(params)?;
		let pending = self.transport.request(self.id, R::METHOD, params);

		let response = if self.request_timeout.is_zero() {
			pending.await?
		} else {
			tokio::time::timeout(self.request_timeout, pending)
				.await
				.map_err(|_| Error::RequestTimeout(R::METHOD.to_owned()))??
		};

		Ok(serde_json::from_value(
			response.result.unwrap_or(serde_json::Value::Null),
		)?)
	}

	/// Enqueue a typed notification.
	pub fn notify<N: Notification>(&self, params: N::Params) -> Result<()> {
		self.transport.notify(
			self.id,
			AnyNotification {
				method: N::METHOD.to_owned(),
				params: serde_json::to_value(params)?,
			},
		)
	}

	pub(crate) fn set_capabilities(&self, capabilities: ServerCapabilities) {
		if self.capabilities.set(capabilities).is_err() {
			tracing::warn!(server_id = %self.id, "server capabilities already recorded");
		}
	}

	pub fn capabilities(&self) -> Option<&ServerCapabilities> {
		self.capabilities.get()
	}

	pub fn is_initialized(&self) -> bool {
		self.capabilities.initialized()
	}

	fn with_capabilities<T>(&self, f: impl FnOnce(&ServerCapabilities) -> T) -> Option<T> {
		self.capabilities.get().map(f)
	}

	/// `hoverProvider` is truthy. `false` from the server disables the
	/// feature just like absence does.
	pub fn supports_hover(&self) -> bool {
		use lsp_types::HoverProviderCapability;
		self.with_capabilities(|caps| {
			matches!(
				caps.hover_provider,
				Some(HoverProviderCapability::Simple(true)) | Some(HoverProviderCapability::Options(_))
			)
		})
		.unwrap_or(false)
	}

	pub fn supports_completion(&self) -> bool {
		self.with_capabilities(|caps| caps.completion_provider.is_some())
			.unwrap_or(false)
	}

	pub fn supports_signature_help(&self) -> bool {
		self.with_capabilities(|caps| caps.signature_help_provider.is_some())
			.unwrap_or(false)
	}

	pub fn supports_definition(&self) -> bool {
		self.with_capabilities(|caps| provider_enabled(&caps.definition_provider))
			.unwrap_or(false)
	}

	pub fn supports_references(&self) -> bool {
		self.with_capabilities(|caps| provider_enabled(&caps.references_provider))
			.unwrap_or(false)
	}

	pub fn supports_rename(&self) -> bool {
		self.with_capabilities(|caps| provider_enabled(&caps.rename_provider))
			.unwrap_or(false)
	}
}
