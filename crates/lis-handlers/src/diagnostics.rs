//! Pull-diagnostics handlers — the long-poll wait-for-change protocol.
//!
//! A pull request carries the result id the client last saw. If the
//! version gate shows nothing newer, the handler parks in a poll loop
//! (fixed short interval, cancellation observed every iteration). Once a
//! change is at least suspected the handler completes the request from its
//! snapshot — possibly with no new information — and the client
//! immediately re-issues with the returned result id as its new baseline.
//! Closing and letting the client reopen is what gives push-like latency
//! over a pull transport.

use std::sync::Arc;
use std::time::Duration;

use lis_protocol::{
    DocumentDiagnosticParams, DocumentDiagnosticReport, HandlerResult, LisError, Methods,
    VersionStamp, WorkspaceDiagnosticParams, WorkspaceDiagnosticReport, WorkspaceDocumentReport,
};
use lis_server::{Handler, RequestContext, VersionGate};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::engine::AnalysisEngine;

/// Poll interval for the wait loop. A true wakeup signal would be lower
/// latency; the fixed interval is a deliberate simplicity trade.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Park until the gate reports a change relative to `baseline`, the token
/// is cancelled, or — when no baseline was given — immediately.
async fn wait_for_change(
    gate: &VersionGate,
    baseline: Option<VersionStamp>,
    interval: Duration,
    cancel: &CancellationToken,
) -> Result<(), LisError> {
    loop {
        if cancel.is_cancelled() {
            return Err(LisError::request_cancelled());
        }
        if gate.has_changed_since(baseline) {
            return Ok(());
        }
        tokio::select! {
            _ = cancel.cancelled() => return Err(LisError::request_cancelled()),
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

/// `textDocument/diagnostic` — document-scoped pull.
pub struct DocumentDiagnosticsHandler<E> {
    engine: Arc<E>,
    gate: Arc<VersionGate>,
    poll_interval: Duration,
}

impl<E: AnalysisEngine> DocumentDiagnosticsHandler<E> {
    pub fn new(engine: Arc<E>, gate: Arc<VersionGate>) -> Self {
        Self {
            engine,
            gate,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

impl<E: AnalysisEngine> Handler for DocumentDiagnosticsHandler<E> {
    const METHOD: &'static str = Methods::DOCUMENT_DIAGNOSTIC;

    async fn handle(&self, ctx: RequestContext, params: Option<Value>) -> HandlerResult {
        let params: DocumentDiagnosticParams = parse_params(params)?;
        let baseline = params
            .previous_result_id
            .as_deref()
            .and_then(VersionStamp::from_result_id);

        wait_for_change(&self.gate, baseline, self.poll_interval, &ctx.cancel).await?;
        debug!(uri = %params.uri, ?baseline, "diagnostics wait completed");

        // Report from this invocation's snapshot. If the suspected change
        // has not been applied yet, the result id equals the client's
        // baseline and its immediate re-pull parks again — the reopen half
        // of the handshake.
        let items = self.engine.diagnose(&ctx.snapshot, &params.uri).await?;
        let report = DocumentDiagnosticReport {
            result_id: ctx.snapshot.version.as_result_id(),
            items,
        };
        Ok(serde_json::to_value(report).unwrap_or(json!(null)))
    }
}

/// `workspace/diagnostic` — workspace-scoped pull across all open documents.
pub struct WorkspaceDiagnosticsHandler<E> {
    engine: Arc<E>,
    gate: Arc<VersionGate>,
    poll_interval: Duration,
}

impl<E: AnalysisEngine> WorkspaceDiagnosticsHandler<E> {
    pub fn new(engine: Arc<E>, gate: Arc<VersionGate>) -> Self {
        Self {
            engine,
            gate,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

impl<E: AnalysisEngine> Handler for WorkspaceDiagnosticsHandler<E> {
    const METHOD: &'static str = Methods::WORKSPACE_DIAGNOSTIC;

    async fn handle(&self, ctx: RequestContext, params: Option<Value>) -> HandlerResult {
        let params: WorkspaceDiagnosticParams = match params {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| LisError::invalid_params(e.to_string()))?,
            None => WorkspaceDiagnosticParams::default(),
        };

        // Conservative baseline: the oldest result the client still holds.
        // A document the client has never seen makes the pull immediately
        // stale; an empty workspace with nothing reported parks until the
        // first change instead of answering empty reports in a hot loop.
        let all_covered = ctx.snapshot.documents().all(|(uri, _)| {
            params.previous_result_ids.iter().any(|prev| &prev.uri == uri)
        });
        let baseline = if ctx.snapshot.document_count() == 0 && params.previous_result_ids.is_empty()
        {
            Some(ctx.snapshot.version)
        } else if all_covered {
            params
                .previous_result_ids
                .iter()
                .filter_map(|prev| VersionStamp::from_result_id(&prev.value))
                .min()
        } else {
            None
        };

        wait_for_change(&self.gate, baseline, self.poll_interval, &ctx.cancel).await?;

        let mut items = Vec::new();
        for (uri, _) in ctx.snapshot.documents() {
            let previous = params
                .previous_result_ids
                .iter()
                .find(|prev| &prev.uri == uri)
                .and_then(|prev| VersionStamp::from_result_id(&prev.value));
            if previous == Some(ctx.snapshot.version) {
                items.push(WorkspaceDocumentReport::Unchanged {
                    uri: uri.clone(),
                    result_id: ctx.snapshot.version.as_result_id(),
                });
                continue;
            }
            items.push(WorkspaceDocumentReport::Full {
                uri: uri.clone(),
                result_id: ctx.snapshot.version.as_result_id(),
                items: self.engine.diagnose(&ctx.snapshot, uri).await?,
            });
        }
        let report = WorkspaceDiagnosticReport { items };
        Ok(serde_json::to_value(report).unwrap_or(json!(null)))
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(params: Option<Value>) -> Result<T, LisError> {
    let value = params.ok_or_else(|| LisError::invalid_params("missing params"))?;
    serde_json::from_value(value).map_err(|e| LisError::invalid_params(e.to_string()))
}
