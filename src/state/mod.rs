//! JSON document state.
//!
//! A ready-made state model: a `serde_json::Value` object edited by
//! `DocumentMutation`s. Any `Clone + Send + Sync` type works with the log;
//! this one exists so documents can be edited without writing a field model.

mod operations;

pub use operations::DocumentMutation;

use crate::entity::OtEntity;
use crate::types::{LogConfig, Revision};
use std::sync::Arc;

/// An entity whose state is a JSON object.
pub type Document = OtEntity<serde_json::Value>;

/// Create an empty document at revision 0.
pub fn empty_document() -> Arc<Document> {
    Document::new(Revision(0), serde_json::Value::Object(serde_json::Map::new()))
}

/// Create a document from an initial value with a custom log configuration.
pub fn document_with_config(
    revision: Revision,
    initial: serde_json::Value,
    config: LogConfig,
) -> Arc<Document> {
    Document::with_config(revision, initial, config)
}
