//! Document lifecycle handlers — the mutating edge of the queue.
//!
//! Open/change/close arrive as notifications but still flow through the
//! queue as mutating work, so every edit lands in submission order and
//! each one advances the snapshot before anything later is dispatched.
//! Full-content sync only.

use std::collections::HashMap;
use std::sync::Arc;

use lis_protocol::{HandlerResult, LisError, Methods, Notifications};
use lis_server::{DocumentState, Handler, RequestContext, Snapshot};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TextDocumentItem {
    uri: String,
    text: String,
    version: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DidOpenParams {
    text_document: TextDocumentItem,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionedTextDocumentIdentifier {
    uri: String,
    version: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentChange {
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DidChangeParams {
    text_document: VersionedTextDocumentIdentifier,
    content_changes: Vec<ContentChange>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TextDocumentIdentifier {
    uri: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DidCloseParams {
    text_document: TextDocumentIdentifier,
}

fn parse<T: serde::de::DeserializeOwned>(params: Option<Value>) -> Result<T, LisError> {
    let value = params.ok_or_else(|| LisError::invalid_params("missing params"))?;
    serde_json::from_value(value).map_err(|e| LisError::invalid_params(e.to_string()))
}

fn documents_of(snapshot: &Snapshot) -> HashMap<String, Arc<DocumentState>> {
    snapshot
        .documents()
        .map(|(uri, doc)| (uri.clone(), doc.clone()))
        .collect()
}

/// `textDocument/didOpen`.
pub struct DidOpenHandler;

impl Handler for DidOpenHandler {
    const METHOD: &'static str = Notifications::DID_OPEN;
    const MUTATES: bool = true;

    async fn handle(&self, ctx: RequestContext, params: Option<Value>) -> HandlerResult {
        let params: DidOpenParams = parse(params)?;
        let doc = params.text_document;
        debug!(uri = %doc.uri, version = doc.version, "document opened");
        ctx.workspace.apply(move |snap| {
            let mut documents = documents_of(snap);
            documents.insert(
                doc.uri,
                Arc::new(DocumentState { text: doc.text, version: doc.version }),
            );
            documents
        });
        Ok(json!(null))
    }
}

/// `textDocument/didChange` — full-content replacement.
pub struct DidChangeHandler;

impl Handler for DidChangeHandler {
    const METHOD: &'static str = Notifications::DID_CHANGE;
    const MUTATES: bool = true;

    async fn handle(&self, ctx: RequestContext, params: Option<Value>) -> HandlerResult {
        let params: DidChangeParams = parse(params)?;
        let text = params
            .content_changes
            .into_iter()
            .last()
            .map(|c| c.text)
            .ok_or_else(|| LisError::invalid_params("didChange without content changes"))?;
        let uri = params.text_document.uri;
        let version = params.text_document.version;
        if ctx.snapshot.document(&uri).is_none() {
            return Err(LisError::invalid_params(format!("change for unopened document: {uri}")));
        }
        debug!(uri = %uri, version, "document changed");
        ctx.workspace.apply(move |snap| {
            let mut documents = documents_of(snap);
            documents.insert(uri, Arc::new(DocumentState { text, version }));
            documents
        });
        Ok(json!(null))
    }
}

/// `textDocument/didClose`.
pub struct DidCloseHandler;

impl Handler for DidCloseHandler {
    const METHOD: &'static str = Notifications::DID_CLOSE;
    const MUTATES: bool = true;

    async fn handle(&self, ctx: RequestContext, params: Option<Value>) -> HandlerResult {
        let params: DidCloseParams = parse(params)?;
        let uri = params.text_document.uri;
        debug!(uri = %uri, "document closed");
        ctx.workspace.apply(move |snap| {
            let mut documents = documents_of(snap);
            documents.remove(&uri);
            documents
        });
        Ok(json!(null))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HoverParams {
    uri: String,
    line: u32,
}

/// `textDocument/hover` — read-only probe used to exercise snapshot
/// isolation: the response is built entirely from one snapshot.
pub struct HoverHandler;

impl Handler for HoverHandler {
    const METHOD: &'static str = Methods::HOVER;

    async fn handle(&self, ctx: RequestContext, params: Option<Value>) -> HandlerResult {
        let params: HoverParams = parse(params)?;
        let Some(document) = ctx.snapshot.document(&params.uri) else {
            return Ok(json!(null));
        };
        let line = document.text.lines().nth(params.line as usize).unwrap_or("");
        Ok(json!({
            "contents": line,
            "documentVersion": document.version,
            "workspaceVersion": ctx.snapshot.version,
        }))
    }
}
