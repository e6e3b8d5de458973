//! The transaction log.
//!
//! Operations are kept in revision order next to a sparse set of state
//! snapshots. Canonical history is what replay and `canonical_log` see;
//! pruned operations stay in place as non-canonical entries until `compact`
//! removes them.

mod transaction_log;

pub use transaction_log::{LogView, TransactionLog};
