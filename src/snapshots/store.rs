//! Ordered snapshot storage.

use crate::types::Revision;
use lru::LruCache;
use std::num::NonZeroUsize;

/// A state materialized at a revision.
#[derive(Clone, Debug)]
pub struct StateSnapshot<S> {
    revision: Revision,
    state: S,
}

impl<S> StateSnapshot<S> {
    pub fn new(revision: Revision, state: S) -> Self {
        Self { revision, state }
    }

    pub fn revision(&self) -> Revision {
        self.revision
    }

    pub fn state(&self) -> &S {
        &self.state
    }
}

/// Snapshots in strictly increasing revision order.
///
/// The snapshot at index 0 is the base: it is never evicted and never purged
/// while it is the only one left. Only `clear` empties the store. Every other
/// snapshot is tracked in an LRU so a cap can drop the least useful one.
pub struct SnapshotStore<S> {
    snapshots: Vec<StateSnapshot<S>>,
    recency: LruCache<Revision, ()>,
    /// Some(0) disables memoization entirely.
    max_memoized: Option<usize>,
}

impl<S> SnapshotStore<S> {
    pub fn new(base: StateSnapshot<S>, max_memoized: Option<usize>) -> Self {
        let recency = match max_memoized.and_then(NonZeroUsize::new) {
            Some(cap) => LruCache::new(cap),
            None => LruCache::unbounded(),
        };

        Self {
            snapshots: vec![base],
            recency,
            max_memoized,
        }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn revisions(&self) -> Vec<Revision> {
        self.snapshots.iter().map(|s| s.revision).collect()
    }

    pub fn base(&self) -> Option<&StateSnapshot<S>> {
        self.snapshots.first()
    }

    /// The newest snapshot whose revision is `<= revision`.
    pub fn latest_at_or_before(&mut self, revision: Revision) -> Option<&StateSnapshot<S>> {
        let idx = self.snapshots.partition_point(|s| s.revision <= revision);
        if idx == 0 {
            return None;
        }

        let found = self.snapshots[idx - 1].revision;
        self.recency.promote(&found);
        self.snapshots.get(idx - 1)
    }

    /// Memoize a state. Returns false if the revision already has a snapshot
    /// or memoization is disabled.
    pub fn insert(&mut self, revision: Revision, state: S) -> bool {
        if self.max_memoized == Some(0) {
            return false;
        }

        let idx = match self.snapshots.binary_search_by(|s| s.revision.cmp(&revision)) {
            Ok(_) => return false,
            Err(idx) => idx,
        };

        if idx == 0 {
            // Older than the base. Replay could never have produced it.
            return false;
        }

        self.snapshots.insert(idx, StateSnapshot::new(revision, state));

        if let Some((evicted, ())) = self.recency.push(revision, ()) {
            if evicted != revision {
                self.remove(evicted);
                tracing::trace!(revision = %evicted, "evicted snapshot");
            }
        }

        true
    }

    /// Drop leading snapshots older than `revision`, always keeping one.
    pub fn purge_before(&mut self, revision: Revision) -> usize {
        if self.snapshots.len() <= 1 {
            return 0;
        }

        let older = self.snapshots.partition_point(|s| s.revision < revision);
        let count = older.min(self.snapshots.len() - 1);
        for snapshot in self.snapshots.drain(..count) {
            self.recency.pop(&snapshot.revision);
        }

        self.untrack_base();
        count
    }

    /// Drop memoized snapshots at or after `revision`. The base is kept.
    pub fn invalidate_from(&mut self, revision: Revision) -> usize {
        let start = self.snapshots.partition_point(|s| s.revision < revision).max(1);
        if start >= self.snapshots.len() {
            return 0;
        }

        let removed: Vec<_> = self.snapshots.drain(start..).collect();
        for snapshot in &removed {
            self.recency.pop(&snapshot.revision);
        }
        removed.len()
    }

    /// Drop every snapshot, the base included.
    pub fn clear(&mut self) -> usize {
        let count = self.snapshots.len();
        self.snapshots.clear();
        self.recency.clear();
        count
    }

    fn remove(&mut self, revision: Revision) {
        if let Ok(idx) = self.snapshots.binary_search_by(|s| s.revision.cmp(&revision)) {
            if idx > 0 {
                self.snapshots.remove(idx);
            }
        }
    }

    /// The base is exempt from eviction.
    fn untrack_base(&mut self) {
        if let Some(base) = self.snapshots.first() {
            self.recency.pop(&base.revision);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(cap: Option<usize>) -> SnapshotStore<&'static str> {
        SnapshotStore::new(StateSnapshot::new(Revision(0), "s0"), cap)
    }

    #[test]
    fn test_latest_at_or_before() {
        let mut snapshots = store(None);
        snapshots.insert(Revision(5), "s5");
        snapshots.insert(Revision(2), "s2");

        assert_eq!(snapshots.revisions(), vec![Revision(0), Revision(2), Revision(5)]);
        assert_eq!(snapshots.latest_at_or_before(Revision(4)).unwrap().revision(), Revision(2));
        assert_eq!(*snapshots.latest_at_or_before(Revision(5)).unwrap().state(), "s5");
        assert_eq!(snapshots.latest_at_or_before(Revision(100)).unwrap().revision(), Revision(5));
        assert!(snapshots.latest_at_or_before(Revision(-1)).is_none());
    }

    #[test]
    fn test_insert_existing_revision_is_ignored() {
        let mut snapshots = store(None);
        assert!(snapshots.insert(Revision(3), "first"));
        assert!(!snapshots.insert(Revision(3), "second"));
        assert_eq!(*snapshots.latest_at_or_before(Revision(3)).unwrap().state(), "first");
        assert!(!snapshots.insert(Revision(0), "base again"));
    }

    #[test]
    fn test_lru_eviction_keeps_base() {
        let mut snapshots = store(Some(2));
        snapshots.insert(Revision(1), "s1");
        snapshots.insert(Revision(2), "s2");

        // Touch 1 so 2 becomes least recently used
        snapshots.latest_at_or_before(Revision(1));
        snapshots.insert(Revision(3), "s3");

        assert_eq!(snapshots.revisions(), vec![Revision(0), Revision(1), Revision(3)]);
    }

    #[test]
    fn test_zero_cap_disables_memoization() {
        let mut snapshots = store(Some(0));
        assert!(!snapshots.insert(Revision(1), "s1"));
        assert_eq!(snapshots.len(), 1);
    }

    #[test]
    fn test_purge_keeps_last_snapshot() {
        let mut snapshots = store(None);
        snapshots.insert(Revision(2), "s2");
        snapshots.insert(Revision(4), "s4");

        assert_eq!(snapshots.purge_before(Revision(3)), 2);
        assert_eq!(snapshots.revisions(), vec![Revision(4)]);

        // Sole snapshot survives any purge
        assert_eq!(snapshots.purge_before(Revision(10)), 0);
        assert_eq!(snapshots.revisions(), vec![Revision(4)]);
    }

    #[test]
    fn test_purge_never_empties() {
        let mut snapshots = store(None);
        snapshots.insert(Revision(1), "s1");

        assert_eq!(snapshots.purge_before(Revision(50)), 1);
        assert_eq!(snapshots.revisions(), vec![Revision(1)]);
    }

    #[test]
    fn test_invalidate_from_keeps_base() {
        let mut snapshots = store(None);
        snapshots.insert(Revision(2), "s2");
        snapshots.insert(Revision(4), "s4");

        assert_eq!(snapshots.invalidate_from(Revision(3)), 1);
        assert_eq!(snapshots.revisions(), vec![Revision(0), Revision(2)]);

        assert_eq!(snapshots.invalidate_from(Revision(-5)), 1);
        assert_eq!(snapshots.revisions(), vec![Revision(0)]);
    }

    #[test]
    fn test_clear_drops_base() {
        let mut snapshots = store(Some(2));
        snapshots.insert(Revision(3), "s3");

        assert_eq!(snapshots.clear(), 2);
        assert!(snapshots.is_empty());
        assert!(snapshots.latest_at_or_before(Revision(3)).is_none());
        // Nothing to sort after, so nothing can be memoized
        assert!(!snapshots.insert(Revision(4), "s4"));
    }
}
