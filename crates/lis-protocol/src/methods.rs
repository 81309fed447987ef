//! Method and notification name constants — every string sent over the
//! wire as the `method` field of a JSON-RPC message, grouped by namespace.

/// Request method names (client → server unless noted).
pub struct Methods;

impl Methods {
    // ── Lifecycle ───────────────────────────────────────────────────────
    pub const INITIALIZE: &str = "initialize";
    pub const SHUTDOWN: &str = "shutdown";

    // ── Diagnostics (pull model) ────────────────────────────────────────
    pub const DOCUMENT_DIAGNOSTIC: &str = "textDocument/diagnostic";
    pub const WORKSPACE_DIAGNOSTIC: &str = "workspace/diagnostic";

    // ── Language features ───────────────────────────────────────────────
    pub const COMPLETION: &str = "textDocument/completion";
    pub const COMPLETION_RESOLVE: &str = "completionItem/resolve";
    pub const HOVER: &str = "textDocument/hover";

    // ── Server → client ─────────────────────────────────────────────────
    pub const REGISTER_CAPABILITY: &str = "client/registerCapability";
}

/// Notification method names.
pub struct Notifications;

impl Notifications {
    pub const INITIALIZED: &str = "initialized";
    pub const EXIT: &str = "exit";
    pub const CANCEL_REQUEST: &str = "$/cancelRequest";

    pub const DID_OPEN: &str = "textDocument/didOpen";
    pub const DID_CHANGE: &str = "textDocument/didChange";
    pub const DID_CLOSE: &str = "textDocument/didClose";
}

/// Whether a method name is part of the protocol surface this server
/// implements. Unknown methods get a MethodNotFound response.
pub fn is_known_method(method: &str) -> bool {
    matches!(
        method,
        Methods::INITIALIZE
            | Methods::SHUTDOWN
            | Methods::DOCUMENT_DIAGNOSTIC
            | Methods::WORKSPACE_DIAGNOSTIC
            | Methods::COMPLETION
            | Methods::COMPLETION_RESOLVE
            | Methods::HOVER
            | Methods::REGISTER_CAPABILITY
            | Notifications::INITIALIZED
            | Notifications::EXIT
            | Notifications::CANCEL_REQUEST
            | Notifications::DID_OPEN
            | Notifications::DID_CHANGE
            | Notifications::DID_CLOSE
    )
}
