//! Workspace state — immutable snapshots advanced by mutating requests.

use std::collections::HashMap;
use std::sync::Arc;

use lis_protocol::VersionStamp;
use parking_lot::RwLock;
use tracing::debug;

use crate::version_gate::VersionGate;

/// State of one open document inside a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentState {
    pub text: String,
    /// Client-reported document version (distinct from the workspace stamp).
    pub version: i32,
}

/// Immutable view of the workspace at one point in time.
///
/// Every handler invocation is bound to exactly one snapshot captured at
/// dispatch time; a new snapshot wholesale-replaces the prior one on change.
#[derive(Debug)]
pub struct Snapshot {
    pub version: VersionStamp,
    documents: HashMap<String, Arc<DocumentState>>,
}

impl Snapshot {
    pub fn document(&self, uri: &str) -> Option<&Arc<DocumentState>> {
        self.documents.get(uri)
    }

    pub fn documents(&self) -> impl Iterator<Item = (&String, &Arc<DocumentState>)> {
        self.documents.iter()
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }
}

/// Owner of the current snapshot slot.
///
/// Mutating handlers commit through [`apply`](Self::apply), which builds
/// the successor snapshot, advances the version stamp, and records the
/// authoritative new version in the gate. Readers grab an `Arc` to the
/// current snapshot and are unaffected by later mutations.
pub struct Workspace {
    current: RwLock<Arc<Snapshot>>,
    gate: Arc<VersionGate>,
}

impl Workspace {
    pub fn new(gate: Arc<VersionGate>) -> Self {
        Self {
            current: RwLock::new(Arc::new(Snapshot {
                version: VersionStamp::INITIAL,
                documents: HashMap::new(),
            })),
            gate,
        }
    }

    /// The current snapshot. Cheap; clones an `Arc`.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.read().clone()
    }

    /// Replace the snapshot with one produced from the current documents.
    /// Returns the new snapshot.
    pub fn apply<F>(&self, f: F) -> Arc<Snapshot>
    where
        F: FnOnce(&Snapshot) -> HashMap<String, Arc<DocumentState>>,
    {
        let next = {
            let mut slot = self.current.write();
            let next = Arc::new(Snapshot {
                version: slot.version.next(),
                documents: f(&slot),
            });
            *slot = next.clone();
            next
        };
        debug!(version = %next.version, documents = next.document_count(), "snapshot advanced");
        self.gate.record_change(Some(next.version));
        next
    }

    pub fn gate(&self) -> &Arc<VersionGate> {
        &self.gate
    }
}
