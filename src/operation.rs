//! Operations and the mutations they carry.

use crate::types::Revision;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// An atomic edit applied to a state of type `S`.
///
/// Replay always starts from a fresh snapshot clone, so a mutation is applied
/// to any given state value exactly once.
pub trait Mutation<S>: Send + Sync + fmt::Debug {
    fn apply(&self, state: &mut S);

    /// Whether applying this mutation leaves every state unchanged.
    fn is_noop(&self) -> bool {
        false
    }
}

/// An ordered bundle of mutations at one revision.
///
/// Operations are shared as `Arc<Operation<S>>`; the log identifies them by
/// pointer, so two operations with equal contents are still distinct entries.
pub struct Operation<S> {
    revision: Revision,
    mutations: Vec<Arc<dyn Mutation<S>>>,
    canon: AtomicBool,
}

impl<S> Operation<S> {
    /// Create a canonical operation.
    pub fn new(revision: Revision, mutations: Vec<Arc<dyn Mutation<S>>>) -> Self {
        Self {
            revision,
            mutations,
            canon: AtomicBool::new(true),
        }
    }

    /// Create a shared canonical operation from concrete mutations.
    pub fn shared<M>(revision: Revision, mutations: impl IntoIterator<Item = M>) -> Arc<Self>
    where
        M: Mutation<S> + 'static,
    {
        let mutations = mutations
            .into_iter()
            .map(|m| Arc::new(m) as Arc<dyn Mutation<S>>)
            .collect();
        Arc::new(Self::new(revision, mutations))
    }

    /// An operation carrying no mutations.
    pub fn noop(revision: Revision) -> Self {
        Self::new(revision, Vec::new())
    }

    pub fn revision(&self) -> Revision {
        self.revision
    }

    pub fn mutations(&self) -> &[Arc<dyn Mutation<S>>] {
        &self.mutations
    }

    pub fn is_canon(&self) -> bool {
        self.canon.load(Ordering::Acquire)
    }

    /// True when the operation has no effective mutations.
    pub fn is_noop(&self) -> bool {
        self.mutations.iter().all(|m| m.is_noop())
    }

    /// Remove this operation from canonical history.
    pub fn mark_non_canon(&self) {
        self.canon.store(false, Ordering::Release);
    }

    /// Apply every mutation, in order, to `state`.
    pub fn apply_to(&self, state: &mut S) {
        for mutation in &self.mutations {
            mutation.apply(state);
        }
    }
}

impl<S> fmt::Debug for Operation<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("revision", &self.revision)
            .field("canon", &self.is_canon())
            .field("mutations", &self.mutations)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Add(i64);

    impl Mutation<i64> for Add {
        fn apply(&self, state: &mut i64) {
            *state += self.0;
        }

        fn is_noop(&self) -> bool {
            self.0 == 0
        }
    }

    #[test]
    fn test_apply_in_order() {
        let op = Operation::<i64>::shared(Revision(1), vec![Add(2), Add(3)]);
        let mut state = 10;
        op.apply_to(&mut state);
        assert_eq!(state, 15);
        assert_eq!(op.mutations().len(), 2);
    }

    #[test]
    fn test_noop_detection() {
        assert!(Operation::<i64>::noop(Revision(1)).is_noop());
        assert!(Operation::<i64>::shared(Revision(1), vec![Add(0), Add(0)]).is_noop());
        assert!(!Operation::<i64>::shared(Revision(1), vec![Add(0), Add(1)]).is_noop());
    }

    #[test]
    fn test_mark_non_canon() {
        let op = Operation::<i64>::shared(Revision(4), vec![Add(1)]);
        assert!(op.is_canon());
        op.mark_non_canon();
        assert!(!op.is_canon());
        assert_eq!(op.revision(), Revision(4));
    }
}
