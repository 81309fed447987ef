//! Lumen LIS — language-intelligence server front end.
//!
//! Speaks JSON-RPC 2.0 over stdio (Content-Length framing). Mutating
//! requests are serialized through the execution queue; read-only requests
//! run concurrently against immutable workspace snapshots; pull
//! diagnostics long-polls against the version gate.
//!
//! Usage:
//!   lumen-lis                        # serve on stdio
//!   lumen-lis --poll-interval-ms 50  # faster diagnostics polling
//!   lumen-lis --verbose              # debug logging (stderr)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use lis_handlers::{
    AnalysisEngine, CompletionHandler, CompletionResolveHandler, DidChangeHandler,
    DidCloseHandler, DidOpenHandler, DocumentDiagnosticsHandler, HoverHandler, LintEngine,
    WorkspaceDiagnosticsHandler, RESOLVE_CACHE_SERVICE,
};
use lis_server::{
    ClientCapabilityStore, RequestExecutionQueue, ResolveCache, ServerBuilder, ServiceId,
    ServiceRegistry, VersionGate, Workspace,
};
use lis_transport::stdio_connection;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "lumen-lis", about = "Lumen LIS — language-intelligence server")]
struct Cli {
    /// Diagnostics long-poll interval in milliseconds
    #[arg(long, default_value = "100")]
    poll_interval_ms: u64,

    /// Candidate-list resolve cache capacity
    #[arg(long, default_value = "3")]
    resolve_cache_capacity: usize,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the protocol.
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let poll_interval = Duration::from_millis(cli.poll_interval_ms.max(1));
    let engine = Arc::new(LintEngine::new());

    let gate = Arc::new(VersionGate::new());
    let workspace = Arc::new(Workspace::new(gate.clone()));
    let registry = Arc::new(
        ServiceRegistry::builder()
            .with_base(
                ServiceId::global(RESOLVE_CACHE_SERVICE),
                Arc::new(ResolveCache::new(cli.resolve_cache_capacity)),
            )
            .build(),
    );
    let capabilities = Arc::new(ClientCapabilityStore::new());

    let queue = Arc::new(
        RequestExecutionQueue::builder()
            .register(DidOpenHandler)
            .register(DidChangeHandler)
            .register(DidCloseHandler)
            .register(HoverHandler)
            .register(CompletionHandler)
            .register(CompletionResolveHandler)
            .register(
                DocumentDiagnosticsHandler::new(engine.clone(), gate.clone())
                    .with_poll_interval(poll_interval),
            )
            .register(
                WorkspaceDiagnosticsHandler::new(engine.clone(), gate.clone())
                    .with_poll_interval(poll_interval),
            )
            .start(workspace.clone(), registry.clone()),
    );

    let connection = stdio_connection();
    let server = ServerBuilder::new(connection, queue, registry, workspace, capabilities)
        .with_diagnostic_sources(engine.sources())
        .build();

    info!("lumen-lis serving on stdio");
    match server.run().await {
        Ok(()) => {
            info!("server exited cleanly");
            Ok(())
        }
        Err(e) => {
            error!("server terminated: {e}");
            Err(e.into())
        }
    }
}
