//! Analysis engine seam.
//!
//! The semantic-analysis engine that actually computes diagnostics is an
//! external collaborator; handlers only know this trait. `LintEngine` is a
//! small built-in implementation so the server runs standalone and tests
//! have something concrete to assert against.

use lis_protocol::{Diagnostic, DiagnosticSeverity, LisError};
use lis_server::Snapshot;

/// External collaborator that turns a snapshot into diagnostics.
///
/// A fault here is isolated exactly like a handler fault: the single
/// request fails with a structured error, nothing else is affected.
pub trait AnalysisEngine: Send + Sync + 'static {
    /// Source categories this engine produces; one dynamic registration is
    /// emitted per category.
    fn sources(&self) -> Vec<String>;

    fn diagnose(
        &self,
        snapshot: &Snapshot,
        uri: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Diagnostic>, LisError>> + Send;
}

/// Built-in line-level lint: flags TODO markers and trailing whitespace.
#[derive(Default)]
pub struct LintEngine;

impl LintEngine {
    pub fn new() -> Self {
        Self
    }
}

impl AnalysisEngine for LintEngine {
    fn sources(&self) -> Vec<String> {
        vec!["lint".to_string()]
    }

    async fn diagnose(&self, snapshot: &Snapshot, uri: &str) -> Result<Vec<Diagnostic>, LisError> {
        let Some(document) = snapshot.document(uri) else {
            return Ok(Vec::new());
        };
        let mut items = Vec::new();
        for (line, text) in document.text.lines().enumerate() {
            if text.contains("TODO") {
                items.push(Diagnostic {
                    line: line as u32,
                    message: "unresolved TODO marker".to_string(),
                    severity: DiagnosticSeverity::Warning,
                    source: "lint".to_string(),
                });
            }
            if text.len() != text.trim_end().len() {
                items.push(Diagnostic {
                    line: line as u32,
                    message: "trailing whitespace".to_string(),
                    severity: DiagnosticSeverity::Hint,
                    source: "lint".to_string(),
                });
            }
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use lis_server::{DocumentState, VersionGate, Workspace};

    fn snapshot_with(uri: &str, text: &str) -> Arc<Snapshot> {
        let ws = Workspace::new(Arc::new(VersionGate::new()));
        let uri = uri.to_string();
        let text = text.to_string();
        ws.apply(move |_| {
            let mut documents = HashMap::new();
            documents.insert(uri, Arc::new(DocumentState { text, version: 1 }));
            documents
        })
    }

    #[tokio::test]
    async fn flags_todo_markers_with_line_numbers() {
        let snapshot = snapshot_with("file:///a.rs", "fn main() {}\n// TODO: fix\n");
        let items = LintEngine::new().diagnose(&snapshot, "file:///a.rs").await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].line, 1);
        assert_eq!(items[0].severity, DiagnosticSeverity::Warning);
    }

    #[tokio::test]
    async fn unknown_documents_produce_no_diagnostics() {
        let snapshot = snapshot_with("file:///a.rs", "x");
        let items = LintEngine::new().diagnose(&snapshot, "file:///other.rs").await.unwrap();
        assert!(items.is_empty());
    }
}
