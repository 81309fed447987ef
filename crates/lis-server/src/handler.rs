//! Request handler trait and the per-invocation context.

use std::pin::Pin;
use std::sync::Arc;

use lis_protocol::HandlerResult;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::registry::ServiceRegistry;
use crate::workspace::{Snapshot, Workspace};

/// Everything a handler invocation gets to see.
///
/// `snapshot` is captured at dispatch time and stays fixed for the whole
/// invocation; mutating handlers commit their effect through `workspace`.
#[derive(Clone)]
pub struct RequestContext {
    pub snapshot: Arc<Snapshot>,
    pub workspace: Arc<Workspace>,
    pub registry: Arc<ServiceRegistry>,
    /// Signalled when the client cancels this request or the queue drains.
    /// Long-running handlers must observe it within one poll interval.
    pub cancel: CancellationToken,
}

/// A request handler for one method.
///
/// `MUTATES` declares whether the handler changes workspace state; the
/// queue runs mutating handlers exclusively and in submission order, and
/// fans everything else out to concurrent tasks.
pub trait Handler: Send + Sync + 'static {
    const METHOD: &'static str;
    const MUTATES: bool = false;

    fn handle(
        &self,
        ctx: RequestContext,
        params: Option<Value>,
    ) -> impl std::future::Future<Output = HandlerResult> + Send;
}

/// Object-safe wrapper for the Handler trait.
pub(crate) trait HandlerDyn: Send + Sync {
    fn method_dyn(&self) -> &'static str;
    fn mutates_dyn(&self) -> bool;
    fn handle_dyn<'a>(
        &'a self,
        ctx: RequestContext,
        params: Option<Value>,
    ) -> Pin<Box<dyn std::future::Future<Output = HandlerResult> + Send + 'a>>;
}

impl<T: Handler> HandlerDyn for T {
    fn method_dyn(&self) -> &'static str {
        T::METHOD
    }

    fn mutates_dyn(&self) -> bool {
        T::MUTATES
    }

    fn handle_dyn<'a>(
        &'a self,
        ctx: RequestContext,
        params: Option<Value>,
    ) -> Pin<Box<dyn std::future::Future<Output = HandlerResult> + Send + 'a>> {
        Box::pin(self.handle(ctx, params))
    }
}
