//! RequestExecutionQueue — total ordering for mutating work, maximum
//! concurrency for read-only work, uniform error isolation.
//!
//! All requests land on a single ordered channel. A dedicated dispatch loop
//! pops them one at a time: a mutating request is awaited inline, so its
//! effect on the workspace snapshot is visible before anything later is
//! dispatched; a non-mutating request captures the current snapshot and is
//! launched on its own task while the loop keeps going.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use futures_util::FutureExt;
use lis_protocol::{HandlerResult, LisError, RequestId};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::handler::{Handler, HandlerDyn, RequestContext};
use crate::registry::ServiceRegistry;
use crate::workspace::Workspace;

struct QueueItem {
    id: Option<RequestId>,
    method: String,
    params: Option<Value>,
    cancel: CancellationToken,
    responder: Option<oneshot::Sender<HandlerResult>>,
}

struct InFlight {
    cancel: CancellationToken,
    mutates: bool,
}

struct QueueCore {
    handlers: HashMap<&'static str, Arc<dyn HandlerDyn>>,
    workspace: Arc<Workspace>,
    registry: Arc<ServiceRegistry>,
    in_flight: DashMap<RequestId, InFlight>,
    draining: CancellationToken,
}

impl QueueCore {
    fn finish(
        &self,
        id: Option<RequestId>,
        responder: Option<oneshot::Sender<HandlerResult>>,
        result: HandlerResult,
    ) {
        if let Some(id) = &id {
            self.in_flight.remove(id);
        }
        if let Err(e) = &result {
            if e.is_cancellation() {
                debug!(?id, "request cancelled");
            } else {
                warn!(?id, error = %e, "request failed");
            }
        }
        if let Some(responder) = responder {
            // The caller may have stopped listening; that is not our problem.
            let _ = responder.send(result);
        }
    }
}

/// Run one handler invocation, racing it against its cancellation token
/// and converting panics into structured internal errors.
async fn execute(
    handler: Arc<dyn HandlerDyn>,
    ctx: RequestContext,
    params: Option<Value>,
) -> HandlerResult {
    let cancel = ctx.cancel.clone();
    let invocation = std::panic::AssertUnwindSafe(handler.handle_dyn(ctx, params)).catch_unwind();
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(LisError::request_cancelled()),
        outcome = invocation => match outcome {
            Ok(result) => result,
            Err(_) => {
                error!(method = handler.method_dyn(), "handler panicked");
                Err(LisError::internal(format!(
                    "handler for {} panicked",
                    handler.method_dyn()
                )))
            }
        },
    }
}

async fn dispatch_loop(mut rx: mpsc::UnboundedReceiver<QueueItem>, core: Arc<QueueCore>) {
    while let Some(item) = rx.recv().await {
        if core.draining.is_cancelled() {
            core.finish(item.id, item.responder, Err(LisError::shutting_down()));
            continue;
        }
        let Some(handler) = core.handlers.get(item.method.as_str()).cloned() else {
            core.finish(
                item.id,
                item.responder,
                Err(LisError::method_not_found(&item.method)),
            );
            continue;
        };

        // Bind the invocation to the snapshot that exists right now.
        let ctx = RequestContext {
            snapshot: core.workspace.snapshot(),
            workspace: core.workspace.clone(),
            registry: core.registry.clone(),
            cancel: item.cancel,
        };

        if handler.mutates_dyn() {
            // Exclusive: the mutation's effect lands before the next pop.
            let result = execute(handler, ctx, item.params).await;
            if result.is_err() {
                // The mutation applied nothing, so the current snapshot
                // version is authoritative; a conservative assume-changed
                // signal recorded at receipt must not outlive it.
                core.workspace
                    .gate()
                    .record_change(Some(core.workspace.snapshot().version));
            }
            core.finish(item.id, item.responder, result);
        } else {
            let core = core.clone();
            tokio::spawn(async move {
                let result = execute(handler, ctx, item.params).await;
                core.finish(item.id, item.responder, result);
            });
        }
    }
    debug!("dispatch loop stopped");
}

/// Central scheduler for all client requests.
pub struct RequestExecutionQueue {
    tx: Mutex<Option<mpsc::UnboundedSender<QueueItem>>>,
    core: Arc<QueueCore>,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

/// Collects handlers before the queue starts; the handler set is fixed for
/// the queue's lifetime.
#[derive(Default)]
pub struct RequestExecutionQueueBuilder {
    handlers: HashMap<&'static str, Arc<dyn HandlerDyn>>,
}

impl RequestExecutionQueueBuilder {
    pub fn register<H: Handler>(mut self, handler: H) -> Self {
        debug!(method = H::METHOD, mutates = H::MUTATES, "handler registered");
        self.handlers.insert(H::METHOD, Arc::new(handler));
        self
    }

    pub fn start(self, workspace: Arc<Workspace>, registry: Arc<ServiceRegistry>) -> RequestExecutionQueue {
        let (tx, rx) = mpsc::unbounded_channel();
        let core = Arc::new(QueueCore {
            handlers: self.handlers,
            workspace,
            registry,
            in_flight: DashMap::new(),
            draining: CancellationToken::new(),
        });
        info!(handlers = core.handlers.len(), "request execution queue started");
        let loop_handle = tokio::spawn(dispatch_loop(rx, core.clone()));
        RequestExecutionQueue {
            tx: Mutex::new(Some(tx)),
            core,
            loop_handle: Mutex::new(Some(loop_handle)),
        }
    }
}

impl RequestExecutionQueue {
    pub fn builder() -> RequestExecutionQueueBuilder {
        RequestExecutionQueueBuilder::default()
    }

    /// Submit a request. The returned receiver resolves with the handler's
    /// result, a cancellation outcome, or a shutdown error; it resolves
    /// exactly once.
    pub fn enqueue(
        &self,
        id: RequestId,
        method: impl Into<String>,
        params: Option<Value>,
    ) -> oneshot::Receiver<HandlerResult> {
        let method = method.into();
        let (responder, rx) = oneshot::channel();
        let cancel = CancellationToken::new();
        let mutates = self
            .core
            .handlers
            .get(method.as_str())
            .is_some_and(|h| h.mutates_dyn());

        let item = QueueItem {
            id: Some(id.clone()),
            method,
            params,
            cancel: cancel.clone(),
            responder: Some(responder),
        };

        let tx = self.tx.lock();
        match tx.as_ref() {
            Some(tx) if !self.core.draining.is_cancelled() => {
                self.core.in_flight.insert(id.clone(), InFlight { cancel, mutates });
                if let Err(rejected) = tx.send(item) {
                    self.core.in_flight.remove(&id);
                    if let Some(responder) = rejected.0.responder {
                        let _ = responder.send(Err(LisError::shutting_down()));
                    }
                }
            }
            _ => {
                if let Some(responder) = item.responder {
                    let _ = responder.send(Err(LisError::shutting_down()));
                }
            }
        }
        rx
    }

    /// Submit a notification-style request: no correlation id, no response.
    /// Used for mutating notifications so their effects stay in submission
    /// order with everything else.
    pub fn enqueue_notification(&self, method: impl Into<String>, params: Option<Value>) {
        let method = method.into();
        let item = QueueItem {
            id: None,
            method: method.clone(),
            params,
            cancel: CancellationToken::new(),
            responder: None,
        };
        let tx = self.tx.lock();
        match tx.as_ref() {
            Some(tx) if !self.core.draining.is_cancelled() => {
                if tx.send(item).is_err() {
                    warn!(method, "notification dropped: queue stopped");
                }
            }
            _ => warn!(method, "notification dropped: queue shutting down"),
        }
    }

    /// Cancel an outstanding request. Idempotent; unknown ids are ignored
    /// (the request may already have completed).
    pub fn cancel(&self, id: &RequestId) {
        if let Some(entry) = self.core.in_flight.get(id) {
            debug!(%id, "cancellation requested");
            entry.cancel.cancel();
        }
    }

    /// Drain and stop: no new requests are accepted, queued requests fail
    /// with a shutdown error, in-flight mutating work finishes, in-flight
    /// non-mutating work is cancelled.
    pub async fn shutdown(&self) {
        info!("request execution queue shutting down");
        self.core.draining.cancel();
        // Dropping the sender lets the loop drain the channel and exit.
        drop(self.tx.lock().take());
        for entry in self.core.in_flight.iter() {
            if !entry.mutates {
                entry.cancel.cancel();
            }
        }
        let handle = self.loop_handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use lis_protocol::VersionStamp;
    use serde_json::json;

    use crate::version_gate::VersionGate;
    use crate::workspace::DocumentState;

    fn test_workspace() -> Arc<Workspace> {
        Arc::new(Workspace::new(Arc::new(VersionGate::new())))
    }

    fn empty_registry() -> Arc<ServiceRegistry> {
        Arc::new(ServiceRegistry::builder().build())
    }

    fn set_document(
        ws: &Workspace,
        uri: &str,
        text: &str,
    ) {
        let uri = uri.to_string();
        let text = text.to_string();
        ws.apply(move |snap| {
            let mut documents: HashMap<_, _> = snap
                .documents()
                .map(|(uri, doc)| (uri.clone(), doc.clone()))
                .collect();
            documents.insert(uri, Arc::new(DocumentState { text, version: 1 }));
            documents
        });
    }

    /// Mutating handler that records its payload in submission order and
    /// rewrites the single tracked document.
    struct ApplyEdit {
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Handler for ApplyEdit {
        const METHOD: &'static str = "test/applyEdit";
        const MUTATES: bool = true;

        async fn handle(&self, ctx: RequestContext, params: Option<Value>) -> HandlerResult {
            let text = params
                .and_then(|p| p.get("text").and_then(|t| t.as_str()).map(String::from))
                .ok_or_else(|| LisError::invalid_params("missing text"))?;
            // Yield so interleaving would show up if serialization broke.
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.log.lock().push(text.clone());
            ctx.workspace.apply(move |snap| {
                let mut documents: HashMap<_, _> = snap
                    .documents()
                    .map(|(uri, doc)| (uri.clone(), doc.clone()))
                    .collect();
                documents.insert(
                    "file:///doc.rs".to_string(),
                    Arc::new(DocumentState { text, version: 1 }),
                );
                documents
            });
            Ok(json!(null))
        }
    }

    /// Read-only handler that sleeps, then reports its snapshot's content.
    struct SlowRead;

    impl Handler for SlowRead {
        const METHOD: &'static str = "test/slowRead";

        async fn handle(&self, ctx: RequestContext, _params: Option<Value>) -> HandlerResult {
            tokio::time::sleep(Duration::from_millis(30)).await;
            let text = ctx
                .snapshot
                .document("file:///doc.rs")
                .map(|d| d.text.clone())
                .unwrap_or_default();
            Ok(json!({ "text": text, "version": ctx.snapshot.version }))
        }
    }

    struct Panicking;

    impl Handler for Panicking {
        const METHOD: &'static str = "test/panic";

        async fn handle(&self, _ctx: RequestContext, _params: Option<Value>) -> HandlerResult {
            panic!("boom");
        }
    }

    struct WaitForCancel;

    impl Handler for WaitForCancel {
        const METHOD: &'static str = "test/wait";

        async fn handle(&self, ctx: RequestContext, _params: Option<Value>) -> HandlerResult {
            ctx.cancel.cancelled().await;
            Err(LisError::request_cancelled())
        }
    }

    fn id(n: i64) -> RequestId {
        RequestId::Number(n)
    }

    #[tokio::test]
    async fn mutations_apply_in_submission_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let queue = RequestExecutionQueue::builder()
            .register(ApplyEdit { log: log.clone() })
            .start(test_workspace(), empty_registry());

        let mut receivers = Vec::new();
        for i in 0..8 {
            receivers.push(queue.enqueue(
                id(i),
                "test/applyEdit",
                Some(json!({ "text": format!("edit-{i}") })),
            ));
        }
        for rx in receivers {
            rx.await.unwrap().unwrap();
        }
        let expected: Vec<String> = (0..8).map(|i| format!("edit-{i}")).collect();
        assert_eq!(*log.lock(), expected);
    }

    #[tokio::test]
    async fn reads_get_snapshot_isolation_across_a_mutation() {
        let ws = test_workspace();
        set_document(&ws, "file:///doc.rs", "before");
        let queue = RequestExecutionQueue::builder()
            .register(ApplyEdit { log: Arc::new(Mutex::new(Vec::new())) })
            .register(SlowRead)
            .start(ws, empty_registry());

        // R1 before the mutation, R2 after. R1 sleeps past M's completion.
        let r1 = queue.enqueue(id(1), "test/slowRead", None);
        let m = queue.enqueue(id(2), "test/applyEdit", Some(json!({ "text": "after" })));
        let r2 = queue.enqueue(id(3), "test/slowRead", None);

        m.await.unwrap().unwrap();
        let r1 = r1.await.unwrap().unwrap();
        let r2 = r2.await.unwrap().unwrap();
        assert_eq!(r1["text"], "before");
        assert_eq!(r2["text"], "after");
    }

    #[tokio::test]
    async fn concurrent_reads_never_see_a_torn_state() {
        let ws = test_workspace();
        set_document(&ws, "file:///doc.rs", "before");
        let queue = Arc::new(
            RequestExecutionQueue::builder()
                .register(ApplyEdit { log: Arc::new(Mutex::new(Vec::new())) })
                .register(SlowRead)
                .start(ws, empty_registry()),
        );

        let m = queue.enqueue(id(100), "test/applyEdit", Some(json!({ "text": "after" })));
        let reads: Vec<_> = (0..5).map(|i| queue.enqueue(id(i), "test/slowRead", None)).collect();

        m.await.unwrap().unwrap();
        for rx in reads {
            let result = rx.await.unwrap().unwrap();
            let text = result["text"].as_str().unwrap();
            assert!(text == "before" || text == "after", "torn state: {text}");
        }
    }

    #[tokio::test]
    async fn cancellation_resolves_the_request_without_stalling_the_loop() {
        let queue = RequestExecutionQueue::builder()
            .register(WaitForCancel)
            .register(SlowRead)
            .start(test_workspace(), empty_registry());

        let waiting = queue.enqueue(id(1), "test/wait", None);
        let other = queue.enqueue(id(2), "test/slowRead", None);
        queue.cancel(&id(1));

        let result = tokio::time::timeout(Duration::from_secs(1), waiting)
            .await
            .unwrap()
            .unwrap();
        assert!(result.unwrap_err().is_cancellation());
        other.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn a_panicking_handler_does_not_kill_the_queue() {
        let queue = RequestExecutionQueue::builder()
            .register(Panicking)
            .register(SlowRead)
            .start(test_workspace(), empty_registry());

        let panicked = queue.enqueue(id(1), "test/panic", None).await.unwrap();
        assert_eq!(
            panicked.unwrap_err().error_code(),
            lis_protocol::LisErrorCode::InternalError
        );
        queue.enqueue(id(2), "test/slowRead", None).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn unknown_methods_get_method_not_found() {
        let queue = RequestExecutionQueue::builder().start(test_workspace(), empty_registry());
        let result = queue.enqueue(id(1), "no/suchMethod", None).await.unwrap();
        assert_eq!(
            result.unwrap_err().error_code(),
            lis_protocol::LisErrorCode::MethodNotFound
        );
    }

    #[tokio::test]
    async fn shutdown_fails_new_requests_and_cancels_waiting_reads() {
        let queue = RequestExecutionQueue::builder()
            .register(WaitForCancel)
            .start(test_workspace(), empty_registry());

        let waiting = queue.enqueue(id(1), "test/wait", None);
        // Let the loop dispatch the read before shutting down.
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.shutdown().await;

        let result = waiting.await.unwrap();
        assert!(result.unwrap_err().is_cancellation());

        let rejected = queue.enqueue(id(2), "test/wait", None).await.unwrap();
        assert_eq!(
            rejected.unwrap_err().error_code(),
            lis_protocol::LisErrorCode::ServerShuttingDown
        );
    }

    #[tokio::test]
    async fn a_failed_mutation_restores_the_gate_to_the_current_version() {
        let ws = test_workspace();
        set_document(&ws, "file:///doc.rs", "text");
        let version = ws.snapshot().version;
        let queue = RequestExecutionQueue::builder()
            .register(ApplyEdit { log: Arc::new(Mutex::new(Vec::new())) })
            .register(SlowRead)
            .start(ws.clone(), empty_registry());

        // Receipt of a live edit records the conservative signal; the edit
        // itself then fails (no "text" param) without applying anything.
        ws.gate().record_change(None);
        queue.enqueue_notification("test/applyEdit", Some(json!({})));
        // A request behind the notification syncs with its completion.
        queue.enqueue(id(1), "test/slowRead", None).await.unwrap().unwrap();

        assert_eq!(ws.gate().current(), Some(version));
        assert!(!ws.gate().has_changed_since(Some(version)));
    }

    #[tokio::test]
    async fn mutating_notifications_keep_write_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let ws = test_workspace();
        let queue = RequestExecutionQueue::builder()
            .register(ApplyEdit { log: log.clone() })
            .register(SlowRead)
            .start(ws.clone(), empty_registry());

        queue.enqueue_notification("test/applyEdit", Some(json!({ "text": "n1" })));
        queue.enqueue_notification("test/applyEdit", Some(json!({ "text": "n2" })));
        // A request after both notifications observes both effects.
        let read = queue.enqueue(id(1), "test/slowRead", None).await.unwrap().unwrap();
        assert_eq!(read["text"], "n2");
        assert_eq!(*log.lock(), vec!["n1".to_string(), "n2".to_string()]);
        assert_eq!(ws.snapshot().version, VersionStamp(2));
    }
}
