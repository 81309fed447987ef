//! Pull-diagnostics request and report types.
//!
//! The client pulls: it sends a request carrying the result id it last saw,
//! and the server answers with a full report (new result id) or, for the
//! workspace variant, `unchanged` per document whose state did not move.

use serde::{Deserialize, Serialize};

/// A single diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub line: u32,
    pub message: String,
    pub severity: DiagnosticSeverity,
    /// Source category that produced this diagnostic.
    pub source: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Hint,
}

/// Params for `textDocument/diagnostic`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDiagnosticParams {
    pub uri: String,
    /// Result id from the client's previous pull, absent on the first pull.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_result_id: Option<String>,
}

/// Response to `textDocument/diagnostic` — always a full report; the
/// long-poll wait happened before this was produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDiagnosticReport {
    pub result_id: String,
    pub items: Vec<Diagnostic>,
}

/// A (uri, result id) pair from the client's previous workspace pull.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviousResultId {
    pub uri: String,
    pub value: String,
}

/// Params for `workspace/diagnostic`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceDiagnosticParams {
    #[serde(default)]
    pub previous_result_ids: Vec<PreviousResultId>,
}

/// Per-document entry in a workspace report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum WorkspaceDocumentReport {
    Full {
        uri: String,
        result_id: String,
        items: Vec<Diagnostic>,
    },
    Unchanged {
        uri: String,
        result_id: String,
    },
}

/// Response to `workspace/diagnostic`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceDiagnosticReport {
    pub items: Vec<WorkspaceDocumentReport>,
}

impl WorkspaceDocumentReport {
    pub fn uri(&self) -> &str {
        match self {
            Self::Full { uri, .. } | Self::Unchanged { uri, .. } => uri,
        }
    }
}
