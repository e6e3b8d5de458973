//! Revision-indexed operation log for one entity.

use crate::entity::Entity;
use crate::error::{LogError, Result};
use crate::operation::Operation;
use crate::snapshots::{SnapshotStore, StateSnapshot};
use crate::types::{LogConfig, LogStats, Revision};
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::sync::{Arc, Weak};

type Ops<S> = Arc<Vec<Arc<Operation<S>>>>;

/// Everything guarded by the log's lock.
struct LogInner<S> {
    /// Revision ascending. Copy-on-write so a clean canonical read can hand
    /// out the live sequence.
    operations: Ops<S>,
    snapshots: SnapshotStore<S>,
    /// Set while the sequence may hold non-canonical entries.
    dirty: bool,
    /// Newest revision whose operations have been purged.
    base: Revision,
    /// Set once a purge has removed operations or snapshots.
    truncated: bool,
}

impl<S> LogInner<S> {
    fn last_canonical_revision(&self) -> Option<Revision> {
        self.operations
            .iter()
            .rev()
            .find(|op| op.is_canon())
            .map(|op| op.revision())
    }

    fn operations_mut(&mut self) -> &mut Vec<Arc<Operation<S>>> {
        Arc::make_mut(&mut self.operations)
    }

    fn collect_since(
        &self,
        from: Revision,
        include_non_canon: bool,
    ) -> Result<Vec<Arc<Operation<S>>>> {
        let Some(last) = self.operations.last() else {
            return Ok(Vec::new());
        };

        let mut collected = Vec::new();
        for op in self.operations.iter().rev() {
            if !include_non_canon && !op.is_canon() {
                continue;
            }
            if op.revision() == from {
                collected.reverse();
                return Ok(collected);
            }
            collected.push(Arc::clone(op));
        }

        if last.revision().0.checked_add(1) == Some(from.0) {
            return Ok(Vec::new());
        }

        if from == self.base {
            collected.reverse();
            return Ok(collected);
        }

        tracing::debug!(revision = %from, base = %self.base, "revision not in log");
        Err(LogError::RevisionNotFound(from))
    }

    fn canonical(&self) -> Ops<S> {
        if !self.dirty {
            return Arc::clone(&self.operations);
        }

        Arc::new(
            self.operations
                .iter()
                .filter(|op| op.is_canon())
                .cloned()
                .collect(),
        )
    }

    /// Drop snapshots that include history rewritten from `revision` on.
    fn invalidate_from(&mut self, revision: Revision) -> usize {
        let mut invalidated = self.snapshots.invalidate_from(revision);

        // After a purge the base may itself be memoized replay output. With
        // nothing older left to rebuild from, it has to go too.
        let stale_base = self
            .snapshots
            .base()
            .is_some_and(|snapshot| snapshot.revision() >= revision);
        if self.truncated && stale_base {
            invalidated += self.snapshots.clear();
            tracing::warn!(revision = %revision, "rewrote history under the only snapshot");
        }
        invalidated
    }
}

/// The transaction log of a single entity.
///
/// A single mutex guards the whole log. Every public method holds it for its
/// full duration, including `state_at`, which may record a snapshot.
pub struct TransactionLog<E: Entity> {
    entity: Weak<E>,
    config: LogConfig,
    inner: Mutex<LogInner<E::State>>,
}

impl<E: Entity> TransactionLog<E> {
    /// Create a log for `entity`, seeding the base snapshot from its current
    /// revision and state.
    pub fn create(entity: &Arc<E>) -> Self {
        Self::create_with_config(entity, LogConfig::default())
    }

    pub fn create_with_config(entity: &Arc<E>, config: LogConfig) -> Self {
        Self::attach(
            Arc::downgrade(entity),
            entity.current_revision(),
            entity.current_state(),
            config,
        )
    }

    /// Build a log for an entity that is still being constructed.
    pub(crate) fn attach(
        entity: Weak<E>,
        revision: Revision,
        state: E::State,
        config: LogConfig,
    ) -> Self {
        let snapshots =
            SnapshotStore::new(StateSnapshot::new(revision, state), config.max_snapshots);

        Self {
            entity,
            config,
            inner: Mutex::new(LogInner {
                operations: Arc::new(Vec::new()),
                snapshots,
                dirty: false,
                base: revision,
                truncated: false,
            }),
        }
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Take the log's lock for a sequence of reads that must see the same
    /// history.
    ///
    /// Every other method blocks until the view is dropped, so do not call
    /// back into this log while holding one.
    pub fn lock(&self) -> LogView<'_, E::State> {
        LogView {
            inner: self.inner.lock(),
        }
    }

    // --- Queries ---

    /// Operations after `from`, oldest first.
    ///
    /// The log is scanned from the tail until the operation at `from` is met;
    /// that operation is the caller's own position and is not returned. Asking
    /// for the revision right after the last operation, or for the base
    /// revision, is not an error.
    pub fn log_at(
        &self,
        from: Revision,
        include_non_canon: bool,
    ) -> Result<Vec<Arc<Operation<E::State>>>> {
        self.inner.lock().collect_since(from, include_non_canon)
    }

    /// The authoritative operations.
    ///
    /// A clean log shares its live sequence. A dirty log returns a filtered
    /// copy and stays dirty until `compact`.
    pub fn canonical_log(&self) -> Arc<Vec<Arc<Operation<E::State>>>> {
        self.inner.lock().canonical()
    }

    /// Reconstruct the state at `revision`.
    ///
    /// Replays canonical operations after the nearest snapshot, up to and
    /// including `revision`, then memoizes the result as a new snapshot.
    /// Revisions whose history was purged fail with `RevisionNotFound`.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn state_at(&self, revision: Revision) -> Result<E::State> {
        let mut inner = self.inner.lock();
        let base = inner.base;
        let truncated = inner.truncated;

        let (from, mut state) = match inner.snapshots.latest_at_or_before(revision) {
            Some(snapshot) => (snapshot.revision(), snapshot.state().clone()),
            None if truncated => {
                tracing::debug!(revision = %revision, "state purged");
                return Err(LogError::RevisionNotFound(revision));
            }
            None => {
                tracing::error!(revision = %revision, "no parent snapshot");
                return Err(LogError::NoParentSnapshot(revision));
            }
        };

        if from < base {
            // Operations between the snapshot and the target were purged.
            return Err(LogError::RevisionNotFound(revision));
        }

        let mut replayed = 0usize;
        for op in inner.operations.iter() {
            if !op.is_canon() || op.revision() <= from || op.revision() > revision {
                continue;
            }
            op.apply_to(&mut state);
            replayed += 1;
        }

        tracing::trace!(snapshot = %from, replayed, "replayed operations");

        // Only logged history can back a snapshot
        let head = inner.last_canonical_revision().unwrap_or(base);
        if revision != from && revision <= head && self.config.should_memoize(revision) {
            inner.snapshots.insert(revision, state.clone());
        }

        Ok(state)
    }

    // --- Mutations ---

    /// Append an operation. No-op operations are dropped.
    pub fn append(&self, operation: Arc<Operation<E::State>>) {
        if operation.is_noop() {
            tracing::trace!(revision = %operation.revision(), "dropping noop operation");
            return;
        }

        let mut inner = self.inner.lock();
        if operation.is_canon() {
            if let Some(last) = inner.last_canonical_revision() {
                if operation.revision() != last.next() {
                    tracing::warn!(
                        revision = %operation.revision(),
                        last = %last,
                        "canonical revision out of sequence"
                    );
                }
            }
        } else {
            inner.dirty = true;
        }

        inner.operations_mut().push(operation);
    }

    /// Substitute the operation logged at `revision`.
    ///
    /// Searches from the tail. Returns false, changing nothing, if no
    /// operation has that revision.
    pub fn replace_at(&self, revision: Revision, operation: Arc<Operation<E::State>>) -> bool {
        let mut inner = self.inner.lock();
        let Some(idx) = inner
            .operations
            .iter()
            .rposition(|op| op.revision() == revision)
        else {
            return false;
        };

        if !operation.is_canon() {
            inner.dirty = true;
        }
        inner.operations_mut()[idx] = operation;

        let invalidated = inner.invalidate_from(revision);
        tracing::debug!(revision = %revision, invalidated, "replaced operation");
        true
    }

    /// Roll back `operation` and every operation after it.
    ///
    /// Each rolled-back operation decrements the entity's revision and leaves
    /// canonical history, but stays in the log until `compact`. Does nothing
    /// if `operation` is not in the log.
    pub fn prune_from(&self, operation: &Arc<Operation<E::State>>) {
        let mut inner = self.inner.lock();
        let Some(idx) = inner
            .operations
            .iter()
            .position(|op| Arc::ptr_eq(op, operation))
        else {
            tracing::trace!(revision = %operation.revision(), "prune target not in log");
            return;
        };

        let entity = self.entity.upgrade();
        if entity.is_none() {
            tracing::warn!("entity dropped, pruning without revision updates");
        }

        let ops = Arc::clone(&inner.operations);
        for op in &ops[idx..] {
            if let Some(entity) = &entity {
                entity.decrement_revision();
            }
            op.mark_non_canon();
        }
        inner.dirty = true;

        let from = operation.revision();
        let pruned = ops.len() - idx;
        let invalidated = inner.invalidate_from(from);
        tracing::debug!(revision = %from, pruned, invalidated, "pruned operations");
    }

    /// Discard history older than `revision`.
    ///
    /// Removes leading operations with a lower revision and leading snapshots
    /// with a lower revision, always keeping at least one snapshot. Returns
    /// the number of operations removed. Negative revisions are ignored.
    pub fn purge_to(&self, revision: Revision) -> usize {
        if revision.is_negative() {
            return 0;
        }

        let mut inner = self.inner.lock();
        let purged = inner
            .operations
            .iter()
            .take_while(|op| op.revision() < revision)
            .count();

        if purged > 0 {
            let newest = inner.operations[..purged].iter().map(|op| op.revision()).max();
            if let Some(newest) = newest {
                inner.base = inner.base.max(newest);
            }
            inner.operations_mut().drain(..purged);
        }

        let snapshots = inner.snapshots.purge_before(revision);
        if purged > 0 || snapshots > 0 {
            inner.truncated = true;
        }
        tracing::debug!(
            revision = %revision,
            purged,
            snapshots,
            base = %inner.base,
            "purged history"
        );
        purged
    }

    /// Force the next `canonical_log` to filter.
    pub fn mark_dirty(&self) {
        self.inner.lock().dirty = true;
    }

    /// Physically remove non-canonical operations. Returns how many were removed.
    pub fn compact(&self) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.operations.len();
        if inner.operations.iter().any(|op| !op.is_canon()) {
            inner.operations_mut().retain(|op| op.is_canon());
        }
        inner.dirty = false;

        let removed = before - inner.operations.len();
        tracing::debug!(removed, "compacted log");
        removed
    }

    // --- Inspection ---

    pub fn len(&self) -> usize {
        self.inner.lock().operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().operations.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.lock().dirty
    }

    /// Revision of the last logged operation, canonical or not.
    pub fn last_revision(&self) -> Option<Revision> {
        self.inner.lock().operations.last().map(|op| op.revision())
    }

    /// Oldest revision incremental replay can start from.
    pub fn base_revision(&self) -> Revision {
        self.inner.lock().base
    }

    pub fn snapshot_revisions(&self) -> Vec<Revision> {
        self.inner.lock().snapshots.revisions()
    }

    pub fn stats(&self) -> LogStats {
        let inner = self.inner.lock();
        LogStats {
            operation_count: inner.operations.len(),
            canonical_count: inner.operations.iter().filter(|op| op.is_canon()).count(),
            snapshot_count: inner.snapshots.len(),
            base_revision: inner.base,
            last_revision: inner.operations.last().map(|op| op.revision()),
            dirty: inner.dirty,
        }
    }

    /// Check that adjacent canonical operations have consecutive revisions.
    pub fn verify(&self) -> Result<()> {
        let inner = self.inner.lock();
        let mut previous: Option<Revision> = None;

        for op in inner.operations.iter().filter(|op| op.is_canon()) {
            if let Some(prev) = previous {
                if op.revision() != prev.next() {
                    return Err(LogError::InvariantViolation {
                        revision: op.revision(),
                        reason: format!(
                            "expected revision {}, found {}",
                            prev.next(),
                            op.revision()
                        ),
                    });
                }
            }
            previous = Some(op.revision());
        }

        let revisions = inner.snapshots.revisions();
        if let Some(pair) = revisions.windows(2).find(|w| w[0] >= w[1]) {
            return Err(LogError::InvariantViolation {
                revision: pair[1],
                reason: "snapshots out of order".into(),
            });
        }

        Ok(())
    }
}

/// A locked log. See [`TransactionLog::lock`].
pub struct LogView<'a, S> {
    inner: MutexGuard<'a, LogInner<S>>,
}

impl<S> LogView<'_, S> {
    /// Same as [`TransactionLog::log_at`].
    pub fn log_at(
        &self,
        from: Revision,
        include_non_canon: bool,
    ) -> Result<Vec<Arc<Operation<S>>>> {
        self.inner.collect_since(from, include_non_canon)
    }

    pub fn canonical_log(&self) -> Arc<Vec<Arc<Operation<S>>>> {
        self.inner.canonical()
    }

    pub fn last_revision(&self) -> Option<Revision> {
        self.inner.operations.last().map(|op| op.revision())
    }

    pub fn base_revision(&self) -> Revision {
        self.inner.base
    }

    pub fn len(&self) -> usize {
        self.inner.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.operations.is_empty()
    }
}

/// Canonical revisions, oldest first: `[1, 2, 3]`.
impl<E: Entity> fmt::Display for TransactionLog<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let canonical = self.canonical_log();
        f.write_str("[")?;
        for (i, op) in canonical.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", op.revision())?;
        }
        f.write_str("]")
    }
}

impl<E: Entity> fmt::Debug for TransactionLog<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let canonical: Vec<Revision> =
            self.canonical_log().iter().map(|op| op.revision()).collect();
        f.debug_struct("TransactionLog")
            .field("canonical", &canonical)
            .field("snapshots", &self.snapshot_revisions())
            .finish()
    }
}
