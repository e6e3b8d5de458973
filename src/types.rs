//! Core types for the transaction log.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position in an entity's canonical history.
///
/// An operation tagged with revision `R` turns the state at `R - 1` into the
/// state at `R`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Revision(pub i64);

impl fmt::Debug for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rev({})", self.0)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Revision {
    /// Saturates at `i64::MAX`.
    pub fn next(self) -> Self {
        Revision(self.0.saturating_add(1))
    }

    pub fn prev(self) -> Self {
        Revision(self.0.saturating_sub(1))
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }
}

impl From<i64> for Revision {
    fn from(value: i64) -> Self {
        Revision(value)
    }
}

/// Log configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Memoize `state_at` results only for revisions that are a multiple of
    /// this value. `1` memoizes every queried revision, `0` never memoizes.
    pub snapshot_interval: u64,

    /// Maximum number of memoized snapshots kept alongside the base snapshot.
    /// `None` keeps every snapshot until it is purged.
    pub max_snapshots: Option<usize>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            snapshot_interval: 1,
            max_snapshots: Some(256),
        }
    }
}

impl LogConfig {
    /// Keep every snapshot ever produced, like a log without any cap.
    pub fn unbounded() -> Self {
        Self {
            snapshot_interval: 1,
            max_snapshots: None,
        }
    }

    pub fn with_snapshot_interval(mut self, interval: u64) -> Self {
        self.snapshot_interval = interval;
        self
    }

    pub fn with_max_snapshots(mut self, max: Option<usize>) -> Self {
        self.max_snapshots = max;
        self
    }

    /// Whether a state computed for `revision` should be kept as a snapshot.
    pub(crate) fn should_memoize(&self, revision: Revision) -> bool {
        match self.snapshot_interval {
            0 => false,
            1 => true,
            n => i128::from(revision.0).rem_euclid(i128::from(n)) == 0,
        }
    }
}

/// Point-in-time counters describing a log.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogStats {
    pub operation_count: usize,
    pub canonical_count: usize,
    pub snapshot_count: usize,
    pub base_revision: Revision,
    pub last_revision: Option<Revision>,
    pub dirty: bool,
}
