//! Per-connection client capability storage.

use std::sync::OnceLock;

use lis_protocol::ClientCapabilities;

#[derive(Debug, thiserror::Error)]
pub enum CapabilityStoreError {
    #[error("client capabilities were already set for this connection")]
    AlreadySet,
    #[error("client capabilities read before initialization")]
    Uninitialized,
}

/// One-shot-initialized holder of negotiated client capabilities.
///
/// Written exactly once during the `initialize` handshake; read-only
/// thereafter. The set-once invariant is carried by the cell itself rather
/// than a runtime flag.
#[derive(Default)]
pub struct ClientCapabilityStore {
    cell: OnceLock<ClientCapabilities>,
}

impl ClientCapabilityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the negotiated capabilities. Errors on a second call.
    pub fn set(&self, capabilities: ClientCapabilities) -> Result<(), CapabilityStoreError> {
        self.cell
            .set(capabilities)
            .map_err(|_| CapabilityStoreError::AlreadySet)
    }

    /// Read the capabilities; an uninitialized-access fault before `set`.
    pub fn get(&self) -> Result<&ClientCapabilities, CapabilityStoreError> {
        self.cell.get().ok_or(CapabilityStoreError::Uninitialized)
    }

    /// Non-failing probe for components that may run before initialization
    /// completes.
    pub fn try_get(&self) -> Option<&ClientCapabilities> {
        self.cell.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lis_protocol::{DiagnosticClientCapabilities, TextDocumentClientCapabilities};

    fn caps_with_dynamic_registration() -> ClientCapabilities {
        ClientCapabilities {
            text_document: Some(TextDocumentClientCapabilities {
                diagnostic: Some(DiagnosticClientCapabilities {
                    dynamic_registration: true,
                    related_document_support: false,
                }),
            }),
            workspace: None,
        }
    }

    #[test]
    fn get_before_set_fails() {
        let store = ClientCapabilityStore::new();
        assert!(matches!(store.get(), Err(CapabilityStoreError::Uninitialized)));
        assert!(store.try_get().is_none());
    }

    #[test]
    fn set_then_get_returns_stored_value() {
        let store = ClientCapabilityStore::new();
        store.set(caps_with_dynamic_registration()).unwrap();
        assert!(store.get().unwrap().supports_diagnostic_registration());
        assert!(store.try_get().is_some());
    }

    #[test]
    fn second_set_is_rejected() {
        let store = ClientCapabilityStore::new();
        store.set(ClientCapabilities::default()).unwrap();
        assert!(matches!(
            store.set(caps_with_dynamic_registration()),
            Err(CapabilityStoreError::AlreadySet)
        ));
        // The original value survives.
        assert!(!store.get().unwrap().supports_diagnostic_registration());
    }
}
