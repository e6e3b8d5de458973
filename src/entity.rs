//! Entities that own a transaction log.

use crate::error::Result;
use crate::log::TransactionLog;
use crate::operation::Operation;
use crate::types::{LogConfig, Revision};
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// The upstream owner of a log.
///
/// The log reads the revision and state once when it is created and calls
/// `decrement_revision` for every operation it prunes. Implementations must
/// not call back into the log from these methods.
pub trait Entity: Send + Sync + 'static {
    type State: Clone + Send + Sync + 'static;

    fn current_revision(&self) -> Revision;

    fn decrement_revision(&self);

    fn current_state(&self) -> Self::State;
}

/// A shared entity with a live state, a revision counter, and its own log.
pub struct OtEntity<S>
where
    S: Clone + Send + Sync + 'static,
{
    revision: AtomicI64,
    state: RwLock<S>,
    log: TransactionLog<OtEntity<S>>,
}

impl<S> OtEntity<S>
where
    S: Clone + Send + Sync + 'static,
{
    /// Create an entity at `revision` with the default log configuration.
    pub fn new(revision: Revision, state: S) -> Arc<Self> {
        Self::with_config(revision, state, LogConfig::default())
    }

    pub fn with_config(revision: Revision, state: S, config: LogConfig) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            revision: AtomicI64::new(revision.0),
            log: TransactionLog::attach(weak.clone(), revision, state.clone(), config),
            state: RwLock::new(state),
        })
    }

    pub fn log(&self) -> &TransactionLog<Self> {
        &self.log
    }

    /// The revision the next operation should carry.
    pub fn next_revision(&self) -> Revision {
        self.current_revision().next()
    }

    /// Apply an operation to the live state and record it.
    ///
    /// No-op operations change nothing and are not logged. Returns the
    /// entity's revision afterwards.
    pub fn apply(&self, operation: Arc<Operation<S>>) -> Revision {
        if operation.is_noop() {
            return self.current_revision();
        }

        // Held across the append so live state and log order agree.
        let mut state = self.state.write();
        operation.apply_to(&mut state);
        let revision = operation.revision();
        // Logged first so the revision never runs ahead of the log
        self.log.append(operation);
        self.revision.store(revision.0, Ordering::SeqCst);
        revision
    }

    /// Roll back `operation` and everything after it, then rebuild the live
    /// state from the log at the decremented revision.
    pub fn rollback(&self, operation: &Arc<Operation<S>>) -> Result<Revision> {
        let mut state = self.state.write();
        self.log.prune_from(operation);

        let revision = self.current_revision();
        *state = self.log.state_at(revision)?;
        Ok(revision)
    }
}

impl<S> Entity for OtEntity<S>
where
    S: Clone + Send + Sync + 'static,
{
    type State = S;

    fn current_revision(&self) -> Revision {
        Revision(self.revision.load(Ordering::SeqCst))
    }

    fn decrement_revision(&self) {
        self.revision.fetch_sub(1, Ordering::SeqCst);
    }

    fn current_state(&self) -> S {
        self.state.read().clone()
    }
}

impl<S> fmt::Debug for OtEntity<S>
where
    S: Clone + Send + Sync + fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OtEntity")
            .field("revision", &self.current_revision())
            .field("state", &*self.state.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::Mutation;

    #[derive(Debug)]
    struct Push(char);

    impl Mutation<String> for Push {
        fn apply(&self, state: &mut String) {
            state.push(self.0);
        }
    }

    #[test]
    fn test_apply_advances_revision_and_logs() {
        let entity = OtEntity::new(Revision(0), String::new());

        entity.apply(Operation::<String>::shared(entity.next_revision(), vec![Push('a')]));
        entity.apply(Operation::<String>::shared(entity.next_revision(), vec![Push('b')]));

        assert_eq!(entity.current_revision(), Revision(2));
        assert_eq!(entity.current_state(), "ab");
        assert_eq!(entity.log().len(), 2);
    }

    #[test]
    fn test_revision_matches_logged_head() {
        let entity = OtEntity::new(Revision(0), String::new());
        for c in ['a', 'b', 'c'] {
            let revision =
                entity.apply(Operation::<String>::shared(entity.next_revision(), vec![Push(c)]));
            assert_eq!(entity.log().last_revision(), Some(revision));
            assert_eq!(entity.log().state_at(revision).unwrap(), entity.current_state());
        }
    }

    #[test]
    fn test_apply_ignores_noop() {
        let entity = OtEntity::new(Revision(3), String::from("x"));
        let revision = entity.apply(Arc::new(Operation::noop(Revision(4))));

        assert_eq!(revision, Revision(3));
        assert!(entity.log().is_empty());
    }

    #[test]
    fn test_rollback_restores_state() {
        let entity = OtEntity::new(Revision(0), String::new());
        let mut ops = Vec::new();
        for c in ['a', 'b', 'c', 'd'] {
            let op = Operation::<String>::shared(entity.next_revision(), vec![Push(c)]);
            entity.apply(Arc::clone(&op));
            ops.push(op);
        }

        let revision = entity.rollback(&ops[2]).unwrap();

        assert_eq!(revision, Revision(2));
        assert_eq!(entity.current_state(), "ab");
        assert_eq!(entity.log().canonical_log().len(), 2);
    }
}
