//! Completion handlers — the two-phase list/resolve exchange.
//!
//! The list response carries a small cache key instead of re-serializing
//! the full context; the follow-up `completionItem/resolve` presents the
//! key to recover it. The cache lives in the service registry so both
//! handlers reach the same instance.

use lis_protocol::{HandlerResult, LisError, Methods};
use lis_server::{Handler, RequestContext, ResolveCache, ServiceId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

/// Registry identity of the shared [`ResolveCache`].
pub const RESOLVE_CACHE_SERVICE: &str = "resolve-cache";

fn resolve_cache(ctx: &RequestContext) -> Result<std::sync::Arc<ResolveCache>, LisError> {
    ctx.registry
        .resolve_required::<ResolveCache>(&ServiceId::global(RESOLVE_CACHE_SERVICE))
        .map_err(|e| LisError::internal(e.to_string()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompletionParams {
    uri: String,
    #[serde(default)]
    prefix: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompletionItem {
    label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<CompletionItemData>,
}

/// Opaque token the client echoes back on resolve.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompletionItemData {
    cache_key: u64,
    index: usize,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompletionList {
    is_incomplete: bool,
    items: Vec<CompletionItem>,
}

/// Context cached between list and resolve.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CachedList {
    uri: String,
    words: Vec<String>,
}

const MAX_ITEMS: usize = 50;

/// `textDocument/completion` — produce a candidate list from the snapshot.
pub struct CompletionHandler;

impl Handler for CompletionHandler {
    const METHOD: &'static str = Methods::COMPLETION;

    async fn handle(&self, ctx: RequestContext, params: Option<Value>) -> HandlerResult {
        let params: CompletionParams = params
            .ok_or_else(|| LisError::invalid_params("missing params"))
            .and_then(|v| serde_json::from_value(v).map_err(|e| LisError::invalid_params(e.to_string())))?;

        let Some(document) = ctx.snapshot.document(&params.uri) else {
            return Err(LisError::invalid_params(format!("unknown document: {}", params.uri)));
        };

        let mut words: Vec<String> = document
            .text
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|w| w.len() > 1 && w.starts_with(&params.prefix))
            .map(String::from)
            .collect();
        words.sort();
        words.dedup();
        words.truncate(MAX_ITEMS);

        let cached = CachedList { uri: params.uri, words: words.clone() };
        let cache_key = resolve_cache(&ctx)?.put(serde_json::to_value(&cached).map_err(
            |e| LisError::internal(format!("failed to cache completion context: {e}")),
        )?);
        debug!(cache_key, candidates = words.len(), "completion list produced");

        let items = words
            .into_iter()
            .enumerate()
            .map(|(index, label)| CompletionItem {
                label,
                detail: None,
                data: Some(CompletionItemData { cache_key, index }),
            })
            .collect();
        let list = CompletionList { is_incomplete: false, items };
        Ok(serde_json::to_value(list).unwrap_or(json!(null)))
    }
}

/// `completionItem/resolve` — recover the cached context for one candidate.
pub struct CompletionResolveHandler;

impl Handler for CompletionResolveHandler {
    const METHOD: &'static str = Methods::COMPLETION_RESOLVE;

    async fn handle(&self, ctx: RequestContext, params: Option<Value>) -> HandlerResult {
        let mut item: CompletionItem = params
            .ok_or_else(|| LisError::invalid_params("missing params"))
            .and_then(|v| serde_json::from_value(v).map_err(|e| LisError::invalid_params(e.to_string())))?;
        let data = item
            .data
            .as_ref()
            .ok_or_else(|| LisError::invalid_params("completion item carries no resolve token"))?;

        let payload = resolve_cache(&ctx)?
            .try_get(data.cache_key)
            .ok_or_else(|| LisError::content_modified("completion list expired; request a new one"))?;
        let cached: CachedList = serde_json::from_value(payload)
            .map_err(|e| LisError::internal(format!("corrupt cached completion context: {e}")))?;

        if cached.words.get(data.index).map(String::as_str) != Some(item.label.as_str()) {
            return Err(LisError::content_modified(
                "completion item no longer matches its list; request a new one",
            ));
        }
        item.detail = Some(format!("{} (from {})", item.label, cached.uri));
        Ok(serde_json::to_value(item).unwrap_or(json!(null)))
    }
}
