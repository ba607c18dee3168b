//! Index records produced by field materialization.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::schema::{FieldStorage, IndexingMode};

/// Payload carried by a single index record.
///
/// Numbers keep their native width so companion fields support numeric
/// range comparisons; everything else is text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RecordPayload {
    /// Text payload.
    Str(String),
    /// 64-bit integer payload.
    I64(i64),
    /// 64-bit float payload.
    F64(f64),
}

impl RecordPayload {
    /// The payload rendered as the term text an engine matches against.
    pub fn term_text(&self) -> String {
        match self {
            RecordPayload::Str(s) => s.clone(),
            RecordPayload::I64(i) => i.to_string(),
            RecordPayload::F64(f) => f.to_string(),
        }
    }
}

impl fmt::Display for RecordPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordPayload::Str(s) => write!(f, "{s}"),
            RecordPayload::I64(i) => write!(f, "{i}"),
            RecordPayload::F64(v) => write!(f, "{v}"),
        }
    }
}

/// One materialized index record: a named payload plus its resolved
/// indexing and storage modes.
///
/// Names are `Arc<str>` handles interned by the batch arena; cloning a
/// record does not reallocate the name.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRecord {
    /// Field name, interned per batch.
    pub name: Arc<str>,
    /// The value to index and/or store.
    pub payload: RecordPayload,
    /// Resolved indexing mode.
    pub indexing: IndexingMode,
    /// Resolved storage mode.
    pub storage: FieldStorage,
}

impl FieldRecord {
    /// Create a record.
    pub fn new(
        name: Arc<str>,
        payload: RecordPayload,
        indexing: IndexingMode,
        storage: FieldStorage,
    ) -> Self {
        FieldRecord {
            name,
            payload,
            indexing,
            storage,
        }
    }

    /// Whether the record participates in term matching.
    pub fn is_indexed(&self) -> bool {
        self.indexing != IndexingMode::No
    }

    /// Whether the record's payload is retrievable from search results.
    pub fn is_stored(&self) -> bool {
        self.storage == FieldStorage::Yes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_term_text_formats() {
        assert_eq!(RecordPayload::Str("abc".into()).term_text(), "abc");
        assert_eq!(RecordPayload::I64(-42).term_text(), "-42");
        assert_eq!(RecordPayload::F64(39.99).term_text(), "39.99");
        // float rendering is minimal round-trip form
        assert_eq!(RecordPayload::F64(1.0).term_text(), "1");
        assert_eq!(RecordPayload::F64(1.5).term_text(), "1.5");
    }

    #[test]
    fn test_record_flags() {
        let record = FieldRecord::new(
            Arc::from("title"),
            RecordPayload::Str("x".into()),
            IndexingMode::No,
            FieldStorage::Yes,
        );
        assert!(!record.is_indexed());
        assert!(record.is_stored());
    }
}
