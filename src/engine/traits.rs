//! Segment engine contract.
//!
//! The coordination layer drives an inverted-index engine through these
//! traits and depends only on the guarantees stated here: `commit` is
//! durable, `optimize` consolidates segments, and `repair_index` restores a
//! structurally valid index. The baseline implementation is
//! [`FlatEngine`](crate::engine::flat::FlatEngine).

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::analysis::Analyzer;
use crate::error::Result;
use crate::fields::{FieldRecord, RecordPayload};
use crate::storage::Storage;

/// Primary writer lock file, owned by the engine for the writer's lifetime.
pub const WRITE_LOCK_NAME: &str = "write.lock";

/// An exact field/value pair used for upserts, deletes and lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Term {
    /// Field name.
    pub field: String,

    /// Term value, matched verbatim against recorded terms.
    pub value: String,
}

impl Term {
    /// Create a new term.
    pub fn new<F: Into<String>, V: Into<String>>(field: F, value: V) -> Self {
        Term {
            field: field.into(),
            value: value.into(),
        }
    }
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.field, self.value)
    }
}

/// The stored portion of a matched document, in record order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    /// Stored field records as name/payload pairs.
    pub fields: Vec<(String, RecordPayload)>,
}

impl StoredDocument {
    /// First payload stored under the given field name.
    pub fn get(&self, name: &str) -> Option<&RecordPayload> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, payload)| payload)
    }

    /// All payloads stored under the given field name.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a RecordPayload> {
        self.fields
            .iter()
            .filter(move |(field, _)| field == name)
            .map(|(_, payload)| payload)
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the document carries no stored records.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Outcome of a structural index check.
#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    /// Whether every segment passed validation.
    pub clean: bool,

    /// Number of segments that were readable.
    pub segments_checked: u64,

    /// Total rows seen across readable segments.
    pub total_rows: u64,

    /// Segment files that failed validation.
    pub bad_segments: Vec<String>,

    /// Human-readable findings, one per problem.
    pub problems: Vec<String>,
}

impl std::fmt::Display for CheckReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.clean {
            write!(
                f,
                "clean ({} segments, {} rows)",
                self.segments_checked, self.total_rows
            )
        } else {
            write!(
                f,
                "{} problem(s) across {} bad segment(s): {}",
                self.problems.len(),
                self.bad_segments.len(),
                self.problems.join("; ")
            )
        }
    }
}

/// Trait for segment engines.
///
/// One engine instance serves every index in a registry; all per-index state
/// lives in the index's own [`Storage`]. Implementations must be safe to
/// share behind an `Arc`.
pub trait SegmentEngine: Send + Sync + std::fmt::Debug {
    /// Check whether an index structure exists in the storage.
    fn index_exists(&self, storage: &dyn Storage) -> bool;

    /// Create a fresh, empty index structure.
    fn create_index(&self, storage: &dyn Storage) -> Result<()>;

    /// Open the single writer for the index.
    ///
    /// The analyzer is used to tokenize analyzed records for the writer's
    /// lifetime. Fails if the writer lock is already held.
    fn open_writer(
        &self,
        storage: Arc<dyn Storage>,
        analyzer: Arc<dyn Analyzer>,
    ) -> Result<Box<dyn EngineWriter>>;

    /// Clear a stale writer lock left behind by a dead process.
    fn force_unlock(&self, storage: &dyn Storage) -> Result<()>;

    /// Validate the index structure without modifying it.
    fn check_index(&self, storage: &dyn Storage) -> Result<CheckReport>;

    /// Drop the segments a check flagged as bad. Returns how many were
    /// removed from the index.
    fn repair_index(&self, storage: &dyn Storage, report: &CheckReport) -> Result<u64>;

    /// Open a read-only searcher over the committed state.
    fn open_searcher(&self, storage: &dyn Storage) -> Result<Box<dyn EngineSearcher>>;
}

/// Trait for engine writers.
///
/// A writer buffers mutations until `commit` makes them durable and visible
/// to searchers opened afterwards. There is at most one writer per index;
/// the coordination layer serializes all access to it.
pub trait EngineWriter: Send + std::fmt::Debug {
    /// Replace any document matching the identifier term with the given
    /// records, as one unit.
    fn upsert(&mut self, id_term: &Term, records: Vec<FieldRecord>) -> Result<()>;

    /// Delete every document matching the term. Returns how many documents
    /// the writer's current view held for it.
    fn delete_by_term(&mut self, term: &Term) -> Result<u64>;

    /// Durably commit all pending mutations.
    fn commit(&mut self) -> Result<()>;

    /// Consolidate the index into the smallest number of segments.
    fn optimize(&mut self) -> Result<()>;

    /// Open a searcher over the committed state as of the last commit.
    fn searcher(&self) -> Result<Box<dyn EngineSearcher>>;

    /// Close the writer, committing pending mutations and releasing the
    /// writer lock.
    fn close(&mut self) -> Result<()>;
}

/// Trait for read-only searchers over one committed snapshot.
///
/// A searcher owns an immutable view; commits that happen after it was
/// opened are never visible through it. `close` takes `&self` because the
/// snapshot handoff closes searchers from whichever thread releases the
/// last reference.
pub trait EngineSearcher: Send + Sync + std::fmt::Debug {
    /// Number of live documents in this snapshot.
    fn doc_count(&self) -> u64;

    /// Find all documents matching the field/value pair, returning their
    /// stored records.
    fn find_by_term(&self, field: &str, value: &str) -> Result<Vec<StoredDocument>>;

    /// Release the snapshot. Idempotent; a second close is a no-op.
    fn close(&self) -> Result<()>;

    /// Whether the snapshot has been released.
    fn is_closed(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_term_display() {
        let term = Term::new("__document_id", "orders/1");
        assert_eq!(term.to_string(), "__document_id:orders/1");
    }

    #[test]
    fn test_stored_document_lookup() {
        let doc = StoredDocument {
            fields: vec![
                ("title".to_string(), RecordPayload::Str("first".into())),
                ("title".to_string(), RecordPayload::Str("second".into())),
                ("count".to_string(), RecordPayload::I64(3)),
            ],
        };

        assert_eq!(doc.get("title"), Some(&RecordPayload::Str("first".into())));
        assert_eq!(doc.get_all("title").count(), 2);
        assert_eq!(doc.get("missing"), None);
        assert_eq!(doc.len(), 3);
    }

    #[test]
    fn test_check_report_display() {
        let clean = CheckReport {
            clean: true,
            segments_checked: 2,
            total_rows: 10,
            ..CheckReport::default()
        };
        assert_eq!(clean.to_string(), "clean (2 segments, 10 rows)");

        let dirty = CheckReport {
            clean: false,
            segments_checked: 1,
            total_rows: 5,
            bad_segments: vec!["seg_000002.dat".to_string()],
            problems: vec!["segment seg_000002.dat: checksum mismatch".to_string()],
        };
        assert!(dirty.to_string().contains("1 problem(s)"));
        assert!(dirty.to_string().contains("checksum mismatch"));
    }
}
