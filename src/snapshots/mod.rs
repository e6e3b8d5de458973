//! Materialized states used to bound replay cost.
//!
//! The first snapshot (the base) is seeded from the entity when the log is
//! created. Further snapshots are memoized by `state_at` and dropped by
//! purge, invalidation, or least-recently-used eviction when a cap is set.

mod store;

pub use store::{SnapshotStore, StateSnapshot};
