//! Capability negotiation and dynamic-registration types.
//!
//! Only the fields that drive behavior are modeled; everything else in the
//! client's capability blob is ignored on deserialization.

use serde::{Deserialize, Serialize};

/// Client capabilities received in the `initialize` request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientCapabilities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_document: Option<TextDocumentClientCapabilities>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<WorkspaceClientCapabilities>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextDocumentClientCapabilities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<DiagnosticClientCapabilities>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticClientCapabilities {
    #[serde(default)]
    pub dynamic_registration: bool,
    #[serde(default)]
    pub related_document_support: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceClientCapabilities {
    #[serde(default)]
    pub work_done_progress: bool,
}

impl ClientCapabilities {
    /// Whether the client wants diagnostic subscriptions registered
    /// dynamically after initialization.
    pub fn supports_diagnostic_registration(&self) -> bool {
        self.text_document
            .as_ref()
            .and_then(|td| td.diagnostic.as_ref())
            .is_some_and(|d| d.dynamic_registration)
    }

    pub fn supports_work_done_progress(&self) -> bool {
        self.workspace.as_ref().is_some_and(|ws| ws.work_done_progress)
    }
}

/// Server capabilities returned from `initialize`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerCapabilities {
    /// Present when pull diagnostics is served statically; absent when the
    /// server will register diagnostic sources dynamically instead.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic_provider: Option<DiagnosticRegistrationOptions>,
    #[serde(default)]
    pub completion_provider: bool,
    #[serde(default)]
    pub hover_provider: bool,
}

/// Per-source options carried by a diagnostic registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticRegistrationOptions {
    /// Source category name; echoed back by the client in pull requests.
    pub identifier: String,
    /// Whether an edit in one file can change diagnostics in another.
    pub inter_file_dependencies: bool,
    pub work_done_progress: bool,
}

/// A single dynamic registration (server → client).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    /// Freshly generated identifier; would be used to unregister.
    pub id: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub register_options: Option<DiagnosticRegistrationOptions>,
}

/// Params for `client/registerCapability`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationParams {
    pub registrations: Vec<Registration>,
}

/// Params for the `initialize` request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    #[serde(default)]
    pub capabilities: ClientCapabilities,
}

/// Result of the `initialize` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub capabilities: ServerCapabilities,
}
