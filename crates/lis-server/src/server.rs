//! Server composition — owns the queue and routes transport events into it.

use std::sync::Arc;

use lis_protocol::{
    is_known_method, DiagnosticRegistrationOptions, InitializeParams, InitializeResult, LisError,
    LisMessage, LisNotification, LisRequest, LisResponse, Methods, Notifications, Registration,
    RegistrationParams, RequestId, ServerCapabilities,
};
use lis_transport::Connection;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::capabilities::ClientCapabilityStore;
use crate::queue::RequestExecutionQueue;
use crate::registry::ServiceRegistry;
use crate::workspace::Workspace;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("transport closed without an exit notification")]
    TransportClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServerState {
    Uninitialized,
    Running,
    ShutdownRequested,
}

/// Composes the queue, registry, workspace, and capability store, and owns
/// the queue's lifetime. One `Server` per client connection.
pub struct Server {
    connection: Connection,
    queue: Arc<RequestExecutionQueue>,
    registry: Arc<ServiceRegistry>,
    workspace: Arc<Workspace>,
    capabilities: Arc<ClientCapabilityStore>,
    diagnostic_sources: Vec<String>,
    state: ServerState,
    registrations_sent: bool,
}

pub struct ServerBuilder {
    connection: Connection,
    queue: Arc<RequestExecutionQueue>,
    registry: Arc<ServiceRegistry>,
    workspace: Arc<Workspace>,
    capabilities: Arc<ClientCapabilityStore>,
    diagnostic_sources: Vec<String>,
}

impl ServerBuilder {
    pub fn new(
        connection: Connection,
        queue: Arc<RequestExecutionQueue>,
        registry: Arc<ServiceRegistry>,
        workspace: Arc<Workspace>,
        capabilities: Arc<ClientCapabilityStore>,
    ) -> Self {
        Self {
            connection,
            queue,
            registry,
            workspace,
            capabilities,
            diagnostic_sources: Vec::new(),
        }
    }

    /// Diagnostic source categories to register with the client.
    pub fn with_diagnostic_sources(mut self, sources: Vec<String>) -> Self {
        self.diagnostic_sources = sources;
        self
    }

    pub fn build(self) -> Server {
        Server {
            connection: self.connection,
            queue: self.queue,
            registry: self.registry,
            workspace: self.workspace,
            capabilities: self.capabilities,
            diagnostic_sources: self.diagnostic_sources,
            state: ServerState::Uninitialized,
            registrations_sent: false,
        }
    }
}

impl Server {
    /// Drive the connection until the client exits or the transport breaks.
    /// Always drains the queue and disposes the registry on the way out.
    pub async fn run(mut self) -> Result<(), ServerError> {
        let outcome = self.run_loop().await;
        self.queue.shutdown().await;
        self.registry.dispose_all();
        outcome
    }

    async fn run_loop(&mut self) -> Result<(), ServerError> {
        while let Some(message) = self.connection.recv().await {
            match message {
                LisMessage::Request(request) => self.on_request(request),
                LisMessage::Notification(notification) => {
                    if self.on_notification(notification) {
                        info!("exit received, stopping server");
                        return Ok(());
                    }
                }
                LisMessage::Response(response) => {
                    // Ack for a server-initiated request (registration).
                    debug!(id = ?response.id(), "client response received");
                }
            }
        }
        // Transport gone without an exit notification: fatal fault. The
        // caller's cleanup fails all pending work via queue shutdown.
        error!("transport closed unexpectedly");
        Err(ServerError::TransportClosed)
    }

    fn on_request(&mut self, request: LisRequest) {
        if !is_known_method(&request.method) {
            self.send_response(LisResponse::error(
                Some(request.id),
                LisError::method_not_found(&request.method),
            ));
            return;
        }
        if request.method == Methods::INITIALIZE {
            let response = self.on_initialize(request.id.clone(), request.params);
            self.send_response(response);
            return;
        }
        if request.method == Methods::SHUTDOWN {
            self.state = ServerState::ShutdownRequested;
            self.send_response(LisResponse::success(request.id, json!(null)));
            return;
        }

        match self.state {
            ServerState::Uninitialized => {
                self.send_response(LisResponse::error(
                    Some(request.id),
                    LisError::not_initialized(),
                ));
            }
            ServerState::ShutdownRequested => {
                self.send_response(LisResponse::error(
                    Some(request.id),
                    LisError::shutting_down(),
                ));
            }
            ServerState::Running => {
                let receiver = self.queue.enqueue(request.id.clone(), request.method, request.params);
                let sender = self.connection.sender();
                let id = request.id;
                tokio::spawn(async move {
                    // A dropped responder means the queue died before the
                    // request ran; report that as a fatal-shutdown error.
                    let result = receiver.await.unwrap_or(Err(LisError::shutting_down()));
                    let _ = sender.send(LisMessage::Response(LisResponse::from_result(id, result)));
                });
            }
        }
    }

    fn on_initialize(&mut self, id: RequestId, params: Option<Value>) -> LisResponse {
        if self.state != ServerState::Uninitialized {
            return LisResponse::error(
                Some(id),
                LisError::invalid_request("server was already initialized"),
            );
        }
        let params: InitializeParams = match params {
            Some(value) => match serde_json::from_value(value) {
                Ok(params) => params,
                Err(e) => {
                    return LisResponse::error(
                        Some(id),
                        LisError::invalid_params(format!("malformed initialize params: {e}")),
                    );
                }
            },
            None => InitializeParams::default(),
        };

        let dynamic = params.capabilities.supports_diagnostic_registration();
        if let Err(e) = self.capabilities.set(params.capabilities) {
            return LisResponse::error(Some(id), LisError::invalid_request(e.to_string()));
        }
        self.state = ServerState::Running;
        info!(dynamic_diagnostics = dynamic, "server initialized");

        // With dynamic registration the diagnostic provider is announced
        // per source after `initialized`; otherwise the primary source is
        // declared statically here.
        let diagnostic_provider = if dynamic {
            None
        } else {
            self.diagnostic_sources.first().map(|source| DiagnosticRegistrationOptions {
                identifier: source.clone(),
                inter_file_dependencies: true,
                work_done_progress: false,
            })
        };
        let result = InitializeResult {
            capabilities: ServerCapabilities {
                diagnostic_provider,
                completion_provider: true,
                hover_provider: true,
            },
        };
        LisResponse::success(id, serde_json::to_value(result).unwrap_or(json!(null)))
    }

    /// Returns true when the client asked the server to exit.
    fn on_notification(&mut self, notification: LisNotification) -> bool {
        match notification.method.as_str() {
            Notifications::EXIT => return true,
            Notifications::INITIALIZED => self.send_diagnostic_registrations(),
            Notifications::CANCEL_REQUEST => {
                if let Some(id) = notification
                    .params
                    .as_ref()
                    .and_then(|p| p.get("id"))
                    .and_then(|id| serde_json::from_value::<RequestId>(id.clone()).ok())
                {
                    self.queue.cancel(&id);
                } else {
                    warn!("cancel notification without a request id");
                }
            }
            Notifications::DID_OPEN | Notifications::DID_CHANGE | Notifications::DID_CLOSE => {
                if self.state != ServerState::Running {
                    warn!(
                        method = %notification.method,
                        state = ?self.state,
                        "document notification dropped"
                    );
                    return false;
                }
                if notification.method == Notifications::DID_CHANGE {
                    // Live-edit signal: the precise new version is unknown
                    // until the queue applies the edit, so record a
                    // conservative "assume changed" for any in-flight
                    // diagnostics wait.
                    self.workspace.gate().record_change(None);
                }
                self.queue
                    .enqueue_notification(notification.method, notification.params);
            }
            other => debug!(method = other, "ignoring notification"),
        }
        false
    }

    /// One-shot registration handshake: one registration per diagnostic
    /// source category, fixed for the life of the connection.
    fn send_diagnostic_registrations(&mut self) {
        if self.registrations_sent {
            return;
        }
        let Some(caps) = self.capabilities.try_get() else {
            return;
        };
        if !caps.supports_diagnostic_registration() || self.diagnostic_sources.is_empty() {
            return;
        }
        let work_done_progress = caps.supports_work_done_progress();
        let registrations: Vec<Registration> = self
            .diagnostic_sources
            .iter()
            .map(|source| Registration {
                id: uuid::Uuid::new_v4().to_string(),
                method: Methods::DOCUMENT_DIAGNOSTIC.to_string(),
                register_options: Some(DiagnosticRegistrationOptions {
                    identifier: source.clone(),
                    inter_file_dependencies: true,
                    work_done_progress,
                }),
            })
            .collect();
        info!(count = registrations.len(), "registering diagnostic sources");

        let params = RegistrationParams { registrations };
        let request = LisRequest::new(
            RequestId::String(uuid::Uuid::new_v4().to_string()),
            Methods::REGISTER_CAPABILITY,
            serde_json::to_value(params).ok(),
        );
        if self.connection.send(LisMessage::Request(request)).is_err() {
            warn!("failed to send registrations: connection closed");
        }
        self.registrations_sent = true;
    }

    fn send_response(&self, response: LisResponse) {
        if self.connection.send(LisMessage::Response(response)).is_err() {
            warn!("failed to send response: connection closed");
        }
    }
}
