//! Lumen LIS — Protocol Types
//!
//! JSON-RPC 2.0 compatible types for the language-intelligence server.
//! This crate is the single source of truth for all protocol types,
//! method names, error codes, and the version-stamp token attached to
//! workspace snapshots and diagnostic result ids.

pub mod capabilities;
pub mod diagnostics;
pub mod error;
pub mod jsonrpc;
pub mod methods;
pub mod version;

pub use capabilities::{
    ClientCapabilities, DiagnosticClientCapabilities, DiagnosticRegistrationOptions,
    InitializeParams, InitializeResult, Registration, RegistrationParams, ServerCapabilities,
    TextDocumentClientCapabilities, WorkspaceClientCapabilities,
};
pub use diagnostics::{
    Diagnostic, DiagnosticSeverity, DocumentDiagnosticParams, DocumentDiagnosticReport,
    PreviousResultId, WorkspaceDiagnosticParams, WorkspaceDiagnosticReport,
    WorkspaceDocumentReport,
};
pub use error::{LisError, LisErrorCode};
pub use jsonrpc::{
    HandlerResult, LisErrorResponse, LisMessage, LisNotification, LisRequest, LisResponse,
    LisSuccessResponse, RequestId,
};
pub use methods::{is_known_method, Methods, Notifications};
pub use version::VersionStamp;
