//! Protocol error types and standard JSON-RPC 2.0 error codes.

use serde::{Deserialize, Serialize};

/// Standard JSON-RPC 2.0 error codes plus the LSP-style codes the
/// request queue and pull-diagnostics protocol rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LisErrorCode {
    // JSON-RPC 2.0 standard errors
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,

    // Server errors
    ServerError,
    ServerNotInitialized,
    ServerShuttingDown,

    // Request lifecycle
    RequestCancelled,
    ContentModified,

    // Custom code
    Custom(i32),
}

impl LisErrorCode {
    pub fn code(&self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::ServerError => -32000,
            Self::ServerNotInitialized => -32001,
            Self::ServerShuttingDown => -32002,
            Self::RequestCancelled => -32800,
            Self::ContentModified => -32801,
            Self::Custom(c) => *c,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            -32700 => Self::ParseError,
            -32600 => Self::InvalidRequest,
            -32601 => Self::MethodNotFound,
            -32602 => Self::InvalidParams,
            -32603 => Self::InternalError,
            -32000 => Self::ServerError,
            -32001 => Self::ServerNotInitialized,
            -32002 => Self::ServerShuttingDown,
            -32800 => Self::RequestCancelled,
            -32801 => Self::ContentModified,
            c => Self::Custom(c),
        }
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LisError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl LisError {
    pub fn new(code: LisErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(LisErrorCode::ParseError, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(LisErrorCode::InvalidRequest, message)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(LisErrorCode::MethodNotFound, format!("Method not found: {method}"))
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(LisErrorCode::InvalidParams, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(LisErrorCode::InternalError, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(LisErrorCode::ServerError, message)
    }

    pub fn not_initialized() -> Self {
        Self::new(LisErrorCode::ServerNotInitialized, "Server is not initialized")
    }

    pub fn shutting_down() -> Self {
        Self::new(LisErrorCode::ServerShuttingDown, "Server is shutting down")
    }

    /// Cancellation outcome. Not an error in the taxonomy — the client
    /// asked for the request to stop and it did.
    pub fn request_cancelled() -> Self {
        Self::new(LisErrorCode::RequestCancelled, "Request was cancelled")
    }

    /// The state a request referred to no longer exists (stale resolve
    /// token, superseded snapshot). The client is expected to re-issue.
    pub fn content_modified(message: impl Into<String>) -> Self {
        Self::new(LisErrorCode::ContentModified, message)
    }

    pub fn error_code(&self) -> LisErrorCode {
        LisErrorCode::from_code(self.code)
    }

    pub fn is_cancellation(&self) -> bool {
        self.error_code() == LisErrorCode::RequestCancelled
    }
}

impl std::fmt::Display for LisError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LIS Error [{}]: {}", self.code, self.message)
    }
}

impl std::error::Error for LisError {}
