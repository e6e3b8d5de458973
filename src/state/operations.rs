//! Mutations on JSON document state.

use crate::operation::Mutation;
use serde_json::{Map, Value};

/// An edit to a top-level field of a JSON object document.
///
/// Mutations never fail. A document that is not an object is replaced by an
/// empty object before the edit, and text positions are clamped to the
/// field's length.
#[derive(Clone, Debug, PartialEq)]
pub enum DocumentMutation {
    /// Set a field to a value.
    Set { field: String, value: Value },

    /// Remove a field.
    Remove { field: String },

    /// Push an item onto an array field, creating the array if needed.
    Append { field: String, item: Value },

    /// Insert text at a character position of a string field.
    InsertText {
        field: String,
        index: usize,
        text: String,
    },

    /// Delete `len` characters starting at a character position.
    DeleteText {
        field: String,
        index: usize,
        len: usize,
    },
}

impl DocumentMutation {
    pub fn set(field: impl Into<String>, value: impl Into<Value>) -> Self {
        DocumentMutation::Set {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn remove(field: impl Into<String>) -> Self {
        DocumentMutation::Remove {
            field: field.into(),
        }
    }

    pub fn append(field: impl Into<String>, item: impl Into<Value>) -> Self {
        DocumentMutation::Append {
            field: field.into(),
            item: item.into(),
        }
    }

    pub fn insert_text(field: impl Into<String>, index: usize, text: impl Into<String>) -> Self {
        DocumentMutation::InsertText {
            field: field.into(),
            index,
            text: text.into(),
        }
    }

    pub fn delete_text(field: impl Into<String>, index: usize, len: usize) -> Self {
        DocumentMutation::DeleteText {
            field: field.into(),
            index,
            len,
        }
    }
}

impl Mutation<Value> for DocumentMutation {
    fn apply(&self, state: &mut Value) {
        let obj = as_object(state);

        match self {
            DocumentMutation::Set { field, value } => {
                obj.insert(field.clone(), value.clone());
            }

            DocumentMutation::Remove { field } => {
                obj.remove(field);
            }

            DocumentMutation::Append { field, item } => {
                let slot = obj.entry(field.clone()).or_insert_with(|| Value::Array(Vec::new()));
                match slot {
                    Value::Array(items) => items.push(item.clone()),
                    // Scalars are wrapped rather than lost
                    other => {
                        let previous = other.take();
                        *other = Value::Array(vec![previous, item.clone()]);
                    }
                }
            }

            DocumentMutation::InsertText { field, index, text } => {
                let current = text_field(obj, field);
                let at = byte_offset(&current, *index);
                let mut updated = current;
                updated.insert_str(at, text);
                obj.insert(field.clone(), Value::String(updated));
            }

            DocumentMutation::DeleteText { field, index, len } => {
                let current = text_field(obj, field);
                let start = byte_offset(&current, *index);
                let end = byte_offset(&current, index.saturating_add(*len));
                let mut updated = current;
                updated.replace_range(start..end, "");
                obj.insert(field.clone(), Value::String(updated));
            }
        }
    }

    fn is_noop(&self) -> bool {
        match self {
            DocumentMutation::InsertText { text, .. } => text.is_empty(),
            DocumentMutation::DeleteText { len, .. } => *len == 0,
            _ => false,
        }
    }
}

fn as_object(state: &mut Value) -> &mut Map<String, Value> {
    if !state.is_object() {
        *state = Value::Object(Map::new());
    }
    match state {
        Value::Object(obj) => obj,
        _ => unreachable!("state was just replaced by an object"),
    }
}

fn text_field(obj: &Map<String, Value>, field: &str) -> String {
    match obj.get(field) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Byte offset of the `index`th character, clamped to the end.
fn byte_offset(s: &str, index: usize) -> usize {
    s.char_indices().nth(index).map(|(i, _)| i).unwrap_or(s.len())
}
