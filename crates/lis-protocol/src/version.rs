//! Version stamps — totally ordered tokens identifying workspace snapshots.

use serde::{Deserialize, Serialize};

/// A monotonically advancing token attached to each workspace snapshot.
///
/// Comparison yields newer / older / same; the stamp never decreases for
/// the lifetime of the server. On the wire it travels as the string form
/// of a diagnostic result id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionStamp(pub u64);

impl VersionStamp {
    pub const INITIAL: VersionStamp = VersionStamp(0);

    pub fn next(self) -> VersionStamp {
        VersionStamp(self.0 + 1)
    }

    /// Render as a diagnostic result id.
    pub fn as_result_id(&self) -> String {
        self.0.to_string()
    }

    /// Parse a result id the client echoed back. Malformed ids are treated
    /// as absent (conservative: the wait is considered always stale).
    pub fn from_result_id(id: &str) -> Option<VersionStamp> {
        id.parse::<u64>().ok().map(VersionStamp)
    }
}

impl std::fmt::Display for VersionStamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}
