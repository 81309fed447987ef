//! LIS Handler Implementations
//!
//! Each handler implements the `Handler` trait from `lis-server` for one
//! method and declares whether it mutates workspace state. The queue runs
//! mutating handlers exclusively in submission order and fans read-only
//! handlers out to concurrent tasks over consistent snapshots.

pub mod completion;
pub mod diagnostics;
pub mod document;
pub mod engine;

pub use completion::{CompletionHandler, CompletionResolveHandler, RESOLVE_CACHE_SERVICE};
pub use diagnostics::{
    DocumentDiagnosticsHandler, WorkspaceDiagnosticsHandler, DEFAULT_POLL_INTERVAL,
};
pub use document::{DidChangeHandler, DidCloseHandler, DidOpenHandler, HoverHandler};
pub use engine::{AnalysisEngine, LintEngine};
