//! Segment file format and manifest for the flat engine.
//!
//! A segment is one bincode-encoded [`SegmentData`] followed by a 4-byte
//! little-endian crc32 of the encoded bytes. The manifest (`segments.json`)
//! lists the live segments in application order and is replaced atomically
//! through a temp file and rename on every commit.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::engine::traits::Term;
use crate::error::{Result, ShrikeError};
use crate::fields::RecordPayload;
use crate::schema::{FieldStorage, IndexingMode};
use crate::storage::Storage;

/// Manifest file listing the live segments.
pub const MANIFEST_NAME: &str = "segments.json";

/// One field record as persisted in a segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Field name.
    pub name: String,

    /// Record payload.
    pub payload: RecordPayload,

    /// How the record was indexed.
    pub indexing: IndexingMode,

    /// Whether the record is returned from searches.
    pub storage: FieldStorage,

    /// Terms produced at write time for analyzed records, empty otherwise.
    pub tokens: Vec<String>,
}

impl StoredRecord {
    /// Whether a term value matches this record.
    pub fn matches(&self, value: &str) -> bool {
        match self.indexing {
            IndexingMode::No => false,
            IndexingMode::NotAnalyzed => self.payload.term_text() == value,
            IndexingMode::Analyzed => self.tokens.iter().any(|token| token == value),
        }
    }

    /// Whether the record is returned from searches.
    pub fn is_stored(&self) -> bool {
        self.storage == FieldStorage::Yes
    }
}

/// One document row keyed by its identifier term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentRow {
    /// Identifier term the row was upserted under.
    pub key: Term,

    /// The document's records in materialization order.
    pub records: Vec<StoredRecord>,
}

impl SegmentRow {
    /// Whether the row matches a term, either by its key or by any indexed
    /// record under the term's field.
    pub fn matches_term(&self, term: &Term) -> bool {
        if self.key == *term {
            return true;
        }
        self.records
            .iter()
            .any(|record| record.name == term.field && record.matches(&term.value))
    }
}

/// The mutations carried by one segment: deletes first, then rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentData {
    /// Terms whose matching rows are removed before this segment's rows
    /// are applied.
    pub deletes: Vec<Term>,

    /// Rows added or replaced by this segment.
    pub rows: Vec<SegmentRow>,
}

impl SegmentData {
    /// Whether the segment carries no mutations.
    pub fn is_empty(&self) -> bool {
        self.deletes.is_empty() && self.rows.is_empty()
    }
}

/// The list of live segments and the next segment sequence number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Live segment file names in application order.
    pub segments: Vec<String>,

    /// Sequence number for the next segment file.
    pub next_seq: u64,
}

impl Default for Manifest {
    fn default() -> Self {
        Manifest {
            segments: Vec::new(),
            next_seq: 1,
        }
    }
}

impl Manifest {
    /// Whether a manifest exists in the storage.
    pub fn exists(storage: &dyn Storage) -> bool {
        storage.file_exists(MANIFEST_NAME)
    }

    /// Load the manifest from storage.
    pub fn load(storage: &dyn Storage) -> Result<Manifest> {
        let mut input = storage.open_input(MANIFEST_NAME)?;
        let mut bytes = Vec::new();
        input.read_to_end(&mut bytes)?;
        input.close()?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Store the manifest atomically via a temp file and rename.
    pub fn store(&self, storage: &dyn Storage) -> Result<()> {
        let temp_name = format!("{MANIFEST_NAME}.tmp");
        let bytes = serde_json::to_vec_pretty(self)?;
        let mut output = storage.create_output(&temp_name)?;
        output.write_all(&bytes)?;
        output.close()?;
        storage.rename_file(&temp_name, MANIFEST_NAME)?;
        storage.sync()
    }
}

/// File name of the segment with the given sequence number.
pub fn segment_file_name(prefix: &str, seq: u64) -> String {
    format!("{prefix}_{seq:06}.dat")
}

/// Write a segment file: encoded data plus trailing crc32.
pub fn write_segment(storage: &dyn Storage, name: &str, data: &SegmentData) -> Result<()> {
    let bytes =
        bincode::serialize(data).map_err(|e| ShrikeError::serialization(e.to_string()))?;
    let checksum = crc32fast::hash(&bytes);

    let mut output = storage.create_output(name)?;
    output.write_all(&bytes)?;
    output.write_all(&checksum.to_le_bytes())?;
    output.close()?;
    Ok(())
}

/// Read and validate a segment file.
pub fn read_segment(storage: &dyn Storage, name: &str) -> Result<SegmentData> {
    let mut input = storage.open_input(name)?;
    let mut bytes = Vec::new();
    input.read_to_end(&mut bytes)?;
    input.close()?;

    if bytes.len() < 4 {
        return Err(ShrikeError::engine(format!("segment {name} is truncated")));
    }
    let (payload, tail) = bytes.split_at(bytes.len() - 4);
    let expected = u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]);
    if crc32fast::hash(payload) != expected {
        return Err(ShrikeError::engine(format!(
            "segment {name} failed checksum validation"
        )));
    }
    bincode::deserialize(payload).map_err(|e| ShrikeError::serialization(e.to_string()))
}

/// Apply one segment's mutations to an accumulated row set.
pub fn apply_segment(rows: &mut Vec<SegmentRow>, data: SegmentData) {
    for delete in &data.deletes {
        rows.retain(|row| !row.matches_term(delete));
    }
    for row in data.rows {
        upsert_row(rows, row);
    }
}

/// Insert a row, replacing any existing row with the same key in place.
pub fn upsert_row(rows: &mut Vec<SegmentRow>, row: SegmentRow) {
    match rows.iter().position(|existing| existing.key == row.key) {
        Some(pos) => rows[pos] = row,
        None => rows.push(row),
    }
}

/// Fold every live segment into the current row set.
pub fn fold(storage: &dyn Storage, manifest: &Manifest) -> Result<Vec<SegmentRow>> {
    let mut rows = Vec::new();
    for name in &manifest.segments {
        apply_segment(&mut rows, read_segment(storage, name)?);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, StorageConfig};

    fn stored(name: &str, value: &str, indexing: IndexingMode) -> StoredRecord {
        StoredRecord {
            name: name.to_string(),
            payload: RecordPayload::Str(value.to_string()),
            indexing,
            storage: FieldStorage::Yes,
            tokens: Vec::new(),
        }
    }

    fn row(id: &str, records: Vec<StoredRecord>) -> SegmentRow {
        SegmentRow {
            key: Term::new("__document_id", id),
            records,
        }
    }

    #[test]
    fn test_segment_round_trip() {
        let storage = MemoryStorage::new(StorageConfig::default());
        let data = SegmentData {
            deletes: vec![Term::new("__document_id", "orders/1")],
            rows: vec![row(
                "orders/1",
                vec![stored("status", "open", IndexingMode::NotAnalyzed)],
            )],
        };

        write_segment(&storage, "seg_000001.dat", &data).unwrap();
        let loaded = read_segment(&storage, "seg_000001.dat").unwrap();
        assert_eq!(loaded, data);
    }

    #[test]
    fn test_corrupted_segment_fails_checksum() {
        let storage = MemoryStorage::new(StorageConfig::default());
        let data = SegmentData {
            deletes: Vec::new(),
            rows: vec![row(
                "orders/1",
                vec![stored("status", "open", IndexingMode::NotAnalyzed)],
            )],
        };
        write_segment(&storage, "seg_000001.dat", &data).unwrap();

        let mut input = storage.open_input("seg_000001.dat").unwrap();
        let mut bytes = Vec::new();
        input.read_to_end(&mut bytes).unwrap();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0xFF;
        let mut output = storage.create_output("seg_000001.dat").unwrap();
        output.write_all(&bytes).unwrap();
        output.close().unwrap();

        let err = read_segment(&storage, "seg_000001.dat").unwrap_err();
        assert!(err.to_string().contains("checksum"));
    }

    #[test]
    fn test_truncated_segment_is_rejected() {
        let storage = MemoryStorage::new(StorageConfig::default());
        let mut output = storage.create_output("seg_000001.dat").unwrap();
        output.write_all(&[1, 2]).unwrap();
        output.close().unwrap();

        let err = read_segment(&storage, "seg_000001.dat").unwrap_err();
        assert!(err.to_string().contains("truncated"));
    }

    #[test]
    fn test_manifest_store_is_atomic() {
        let storage = MemoryStorage::new(StorageConfig::default());
        let manifest = Manifest {
            segments: vec!["seg_000001.dat".to_string()],
            next_seq: 2,
        };

        manifest.store(&storage).unwrap();
        assert!(!storage.file_exists("segments.json.tmp"));
        assert_eq!(Manifest::load(&storage).unwrap(), manifest);
    }

    #[test]
    fn test_apply_segment_replaces_by_key() {
        let mut rows = Vec::new();
        apply_segment(
            &mut rows,
            SegmentData {
                deletes: Vec::new(),
                rows: vec![
                    row("a", vec![stored("v", "1", IndexingMode::NotAnalyzed)]),
                    row("b", vec![stored("v", "2", IndexingMode::NotAnalyzed)]),
                ],
            },
        );
        apply_segment(
            &mut rows,
            SegmentData {
                deletes: vec![Term::new("__document_id", "a")],
                rows: vec![row("a", vec![stored("v", "3", IndexingMode::NotAnalyzed)])],
            },
        );

        assert_eq!(rows.len(), 2);
        // the delete removed the old row, so the replacement appends at the end
        assert_eq!(rows[1].key.value, "a");
        assert_eq!(rows[1].records[0].payload, RecordPayload::Str("3".into()));
    }

    #[test]
    fn test_delete_matches_by_indexed_record() {
        let mut rows = vec![
            row("a", vec![stored("tag", "red", IndexingMode::NotAnalyzed)]),
            row("b", vec![stored("tag", "blue", IndexingMode::NotAnalyzed)]),
        ];
        apply_segment(
            &mut rows,
            SegmentData {
                deletes: vec![Term::new("tag", "red")],
                rows: Vec::new(),
            },
        );

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].key.value, "b");
    }

    #[test]
    fn test_analyzed_record_matches_by_token() {
        let record = StoredRecord {
            name: "title".to_string(),
            payload: RecordPayload::Str("Quick Brown Fox".to_string()),
            indexing: IndexingMode::Analyzed,
            storage: FieldStorage::No,
            tokens: vec!["quick".to_string(), "brown".to_string(), "fox".to_string()],
        };

        assert!(record.matches("brown"));
        assert!(!record.matches("Quick Brown Fox"));
    }

    #[test]
    fn test_unindexed_record_never_matches() {
        let record = StoredRecord {
            name: "raw".to_string(),
            payload: RecordPayload::Str("x".to_string()),
            indexing: IndexingMode::No,
            storage: FieldStorage::Yes,
            tokens: Vec::new(),
        };
        assert!(!record.matches("x"));
    }

    #[test]
    fn test_segment_file_name_is_zero_padded() {
        assert_eq!(segment_file_name("seg", 1), "seg_000001.dat");
        assert_eq!(segment_file_name("seg", 123456), "seg_123456.dat");
    }
}
