//! VersionGate — process-wide holder of the latest observed workspace version.

use lis_protocol::VersionStamp;
use parking_lot::Mutex;
use tracing::debug;

/// Thread-safe holder of the most recently observed workspace version.
///
/// Producers (the workspace applying mutations, live-edit notifications)
/// call [`record_change`](Self::record_change); pull-diagnostics poll loops
/// call [`has_changed_since`](Self::has_changed_since). The lock is held
/// only for the read/compare/write, never across an await.
///
/// A recorded `None` is a conservative "assume changed" signal, used when a
/// live edit is observed before the authoritative change has been applied.
/// The gate prefers false positives over missed updates throughout.
#[derive(Default)]
pub struct VersionGate {
    latest: Mutex<Option<VersionStamp>>,
}

impl VersionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest workspace version, or `None` when the precise new
    /// version is not yet known.
    pub fn record_change(&self, version: Option<VersionStamp>) {
        let mut latest = self.latest.lock();
        debug!(?version, previous = ?*latest, "workspace change recorded");
        *latest = version;
    }

    /// Whether the workspace has (or may have) changed relative to
    /// `baseline`. True when no version has been recorded, when the caller
    /// has no baseline, or when the recorded version is newer than it.
    pub fn has_changed_since(&self, baseline: Option<VersionStamp>) -> bool {
        let latest = self.latest.lock();
        match (*latest, baseline) {
            (None, _) => true,
            (Some(_), None) => true,
            (Some(latest), Some(baseline)) => latest > baseline,
        }
    }

    /// The currently recorded version, if an authoritative one exists.
    pub fn current(&self) -> Option<VersionStamp> {
        *self.latest.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecorded_gate_is_always_changed() {
        let gate = VersionGate::new();
        assert!(gate.has_changed_since(None));
        assert!(gate.has_changed_since(Some(VersionStamp(5))));
    }

    #[test]
    fn newer_version_is_a_change() {
        let gate = VersionGate::new();
        gate.record_change(Some(VersionStamp(3)));
        assert!(gate.has_changed_since(Some(VersionStamp(2))));
        assert!(!gate.has_changed_since(Some(VersionStamp(3))));
        assert!(!gate.has_changed_since(Some(VersionStamp(4))));
    }

    #[test]
    fn missing_baseline_is_always_stale() {
        let gate = VersionGate::new();
        gate.record_change(Some(VersionStamp(1)));
        assert!(gate.has_changed_since(None));
    }

    #[test]
    fn none_record_is_conservative() {
        let gate = VersionGate::new();
        gate.record_change(Some(VersionStamp(9)));
        assert!(!gate.has_changed_since(Some(VersionStamp(9))));
        gate.record_change(None);
        assert!(gate.has_changed_since(Some(VersionStamp(9))));
    }
}
