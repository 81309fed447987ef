//! LIS Server — request scheduling and workspace state.
//!
//! The concurrency core of the language-intelligence server:
//! - [`RequestExecutionQueue`] serializes mutating requests and fans
//!   read-only requests out to concurrent tasks over consistent snapshots.
//! - [`VersionGate`] tracks the most recently observed workspace version
//!   and backs the pull-diagnostics long-poll protocol.
//! - [`ServiceRegistry`], [`ClientCapabilityStore`], and [`ResolveCache`]
//!   supply the supporting state handlers need.
//! - [`Server`] composes the above and routes transport messages.

pub mod capabilities;
pub mod handler;
pub mod queue;
pub mod registry;
pub mod resolve_cache;
pub mod server;
pub mod version_gate;
pub mod workspace;

pub use capabilities::{CapabilityStoreError, ClientCapabilityStore};
pub use handler::{Handler, RequestContext};
pub use queue::RequestExecutionQueue;
pub use registry::{RegistryError, Service, ServiceId, ServiceRegistry, ServiceRegistryBuilder};
pub use resolve_cache::ResolveCache;
pub use server::{Server, ServerBuilder, ServerError};
pub use version_gate::VersionGate;
pub use workspace::{DocumentState, Snapshot, Workspace};
