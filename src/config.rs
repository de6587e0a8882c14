//! Support for sync engine configuration options

use chrono::{DateTime, Duration, Utc};

/// What to do with device events that carry no correlation key
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ImportPolicy {
    /// Create a remote counterpart and link the device event to it
    Import,
    /// Leave them alone
    Ignore,
}

impl Default for ImportPolicy {
    fn default() -> Self {
        ImportPolicy::Import
    }
}

/// Tunables of the [`SyncEngine`](crate::engine::SyncEngine)
#[derive(Clone, Debug)]
pub struct SyncConfig {
    /// Half-width of the reconciliation window, in days around "now".
    /// Events starting outside the window are not reconciled.
    pub window_days: i64,
    /// How to treat device events with no correlation key
    pub import_policy: ImportPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            window_days: 90,
            import_policy: ImportPolicy::default(),
        }
    }
}

impl SyncConfig {
    /// The reconciliation window around the given instant
    pub fn window(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let half = Duration::days(self.window_days);
        (now - half, now + half)
    }
}
