//! Client capabilities advertised during initialization.

use lsp_types::{
	ClientCapabilities, CompletionClientCapabilities, CompletionItemCapability,
	GotoCapability, HoverClientCapabilities, MarkupKind,
	PublishDiagnosticsClientCapabilities, ReferenceClientCapabilities, RenameClientCapabilities,
	SignatureHelpClientCapabilities, SignatureInformationSettings, TextDocumentClientCapabilities,
	TextDocumentSyncClientCapabilities, WindowClientCapabilities, WorkspaceClientCapabilities,
};

/// Build the capability set for `initialize`.
///
/// Declares only what this client actually consumes: full-text document
/// sync, the supported feature requests, and published diagnostics.
pub fn client_capabilities() -> ClientCapabilities {
	ClientCapabilities {
		workspace: Some(WorkspaceClientCapabilities {
			workspace_folders: Some(true),
			apply_edit: Some(false),
			..Default::default()
		}),
		text_document: Some(TextDocumentClientCapabilities {
			synchronization: Some(TextDocumentSyncClientCapabilities {
				dynamic_registration: Some(false),
				will_save: Some(false),
				will_save_wait_until: Some(false),
				did_save: Some(true),
			}),
			completion: Some(CompletionClientCapabilities {
				completion_item: Some(CompletionItemCapability {
					snippet_support: Some(false),
					..Default::default()
				}),
				..Default::default()
			}),
			hover: Some(HoverClientCapabilities {
				content_format: Some(vec![MarkupKind::Markdown, MarkupKind::PlainText]),
				..Default::default()
			}),
			signature_help: Some(SignatureHelpClientCapabilities {
				signature_information: Some(SignatureInformationSettings {
					documentation_format: Some(vec![MarkupKind::PlainText]),
					parameter_information: None,
					active_parameter_support: None,
				}),
				..Default::default()
			}),
			references: Some(ReferenceClientCapabilities {
				dynamic_registration: Some(false),
			}),
			definition: Some(GotoCapability {
				dynamic_registration: Some(false),
				link_support: Some(false),
			}),
			rename: Some(RenameClientCapabilities {
				dynamic_registration: Some(false),
				prepare_support: Some(false),
				prepare_support_default_behavior: None,
				honors_change_annotations: Some(false),
			}),
			publish_diagnostics: Some(PublishDiagnosticsClientCapabilities {
				version_support: Some(true),
				..Default::default()
			}),
			..Default::default()
		}),
		window: Some(WindowClientCapabilities {
			work_done_progress: Some(false),
			..Default::default()
		}),
		..Default::default()
	}
}
