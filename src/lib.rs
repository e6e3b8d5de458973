//! # otlog
//!
//! The transaction log of an operational-transformation engine: a
//! revision-indexed history of the operations applied to one shared entity.
//!
//! ## Core Concepts
//!
//! - **Operations**: ordered bundles of mutations tagged with a revision and
//!   a canonical flag
//! - **Snapshots**: materialized states that bound replay cost
//! - **Prune**: roll back a suffix of speculative history
//! - **Purge**: discard history older than a revision
//!
//! ## Example
//!
//! ```ignore
//! use otlog::{empty_document, DocumentMutation, Operation, Revision};
//!
//! let doc = empty_document();
//! doc.apply(Operation::shared(Revision(1), vec![DocumentMutation::set("x", 1)]));
//! doc.apply(Operation::shared(Revision(2), vec![DocumentMutation::set("x", 2)]));
//!
//! // What did the document look like at revision 1?
//! let state = doc.log().state_at(Revision(1))?;
//!
//! // Everything a client at revision 1 is missing
//! let missing = doc.log().log_at(Revision(1), false)?;
//! ```

pub mod entity;
pub mod error;
pub mod log;
pub mod operation;
pub mod snapshots;
pub mod state;
pub mod types;

// Re-exports
pub use entity::{Entity, OtEntity};
pub use error::{LogError, Result};
pub use log::{LogView, TransactionLog};
pub use operation::{Mutation, Operation};
pub use snapshots::{SnapshotStore, StateSnapshot};
pub use state::{document_with_config, empty_document, Document, DocumentMutation};
pub use types::*;

/// Create a log for `entity`, seeding its first snapshot from the entity's
/// current revision and state.
pub fn create_transaction_log<E: Entity>(entity: &std::sync::Arc<E>) -> TransactionLog<E> {
    TransactionLog::create(entity)
}
