//! Writer for the flat engine.

use std::mem;
use std::sync::Arc;

use log::warn;

use crate::analysis::{Analyzer, PerFieldAnalyzer};
use crate::engine::flat::engine::FlatEngineConfig;
use crate::engine::flat::searcher::FlatSearcher;
use crate::engine::flat::segment::{
    apply_segment, fold, segment_file_name, upsert_row, write_segment, Manifest, SegmentData,
    SegmentRow, StoredRecord,
};
use crate::engine::traits::{EngineSearcher, EngineWriter, Term, WRITE_LOCK_NAME};
use crate::error::{Result, ShrikeError};
use crate::fields::FieldRecord;
use crate::schema::IndexingMode;
use crate::storage::{Storage, StorageError};

/// The flat engine's single writer.
///
/// Mutations accumulate in a pending segment; `commit` appends it to the
/// manifest in one step. The writer holds `write.lock` for its lifetime and
/// removes it when closed or dropped.
#[derive(Debug)]
pub struct FlatWriter {
    storage: Arc<dyn Storage>,
    analyzer: Arc<dyn Analyzer>,
    config: FlatEngineConfig,
    manifest: Manifest,
    pending: SegmentData,
    closed: bool,
}

impl FlatWriter {
    /// Open the writer, acquiring the writer lock.
    pub fn open(
        storage: Arc<dyn Storage>,
        analyzer: Arc<dyn Analyzer>,
        config: FlatEngineConfig,
    ) -> Result<FlatWriter> {
        if storage.file_exists(WRITE_LOCK_NAME) {
            return Err(StorageError::LockFailed(WRITE_LOCK_NAME.to_string()).into());
        }
        let mut lock = storage.create_output(WRITE_LOCK_NAME)?;
        lock.close()?;

        let manifest = Manifest::load(storage.as_ref())?;
        Ok(FlatWriter {
            storage,
            analyzer,
            config,
            manifest,
            pending: SegmentData::default(),
            closed: false,
        })
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(ShrikeError::engine("writer is closed"));
        }
        Ok(())
    }

    /// Terms for an analyzed record, computed once at write time.
    fn tokens_for(&self, record: &FieldRecord) -> Result<Vec<String>> {
        if record.indexing != IndexingMode::Analyzed {
            return Ok(Vec::new());
        }
        let text = record.payload.term_text();
        let stream = match self.analyzer.as_any().downcast_ref::<PerFieldAnalyzer>() {
            Some(per_field) => per_field.analyze_field(&record.name, &text)?,
            None => self.analyzer.analyze(&text)?,
        };
        Ok(stream.map(|token| token.text).collect())
    }

    /// The writer's logical view: committed segments plus pending mutations.
    fn current_view(&self) -> Result<Vec<SegmentRow>> {
        let mut rows = fold(self.storage.as_ref(), &self.manifest)?;
        apply_segment(&mut rows, self.pending.clone());
        Ok(rows)
    }
}

impl EngineWriter for FlatWriter {
    fn upsert(&mut self, id_term: &Term, records: Vec<FieldRecord>) -> Result<()> {
        self.check_open()?;

        let mut stored = Vec::with_capacity(records.len());
        for record in records {
            let tokens = self.tokens_for(&record)?;
            stored.push(StoredRecord {
                name: record.name.to_string(),
                payload: record.payload,
                indexing: record.indexing,
                storage: record.storage,
                tokens,
            });
        }

        self.pending.deletes.push(id_term.clone());
        upsert_row(
            &mut self.pending.rows,
            SegmentRow {
                key: id_term.clone(),
                records: stored,
            },
        );
        Ok(())
    }

    fn delete_by_term(&mut self, term: &Term) -> Result<u64> {
        self.check_open()?;

        let matched = self
            .current_view()?
            .iter()
            .filter(|row| row.matches_term(term))
            .count() as u64;
        self.pending.deletes.push(term.clone());
        self.pending.rows.retain(|row| !row.matches_term(term));
        Ok(matched)
    }

    fn commit(&mut self) -> Result<()> {
        self.check_open()?;
        if self.pending.is_empty() {
            return Ok(());
        }

        let name = segment_file_name(&self.config.segment_prefix, self.manifest.next_seq);
        write_segment(self.storage.as_ref(), &name, &self.pending)?;
        self.manifest.segments.push(name);
        self.manifest.next_seq += 1;
        self.manifest.store(self.storage.as_ref())?;
        self.pending = SegmentData::default();
        Ok(())
    }

    fn optimize(&mut self) -> Result<()> {
        self.check_open()?;
        if self.manifest.segments.len() <= 1 && self.pending.is_empty() {
            return Ok(());
        }

        let mut rows = fold(self.storage.as_ref(), &self.manifest)?;
        apply_segment(&mut rows, mem::take(&mut self.pending));
        let folded = SegmentData {
            deletes: Vec::new(),
            rows,
        };

        let name = segment_file_name(&self.config.segment_prefix, self.manifest.next_seq);
        write_segment(self.storage.as_ref(), &name, &folded)?;
        let old_segments = mem::replace(&mut self.manifest.segments, vec![name]);
        self.manifest.next_seq += 1;
        self.manifest.store(self.storage.as_ref())?;

        // old files are unreferenced once the manifest swap is durable
        for old in old_segments {
            if let Err(e) = self.storage.delete_file(&old) {
                warn!("failed to delete folded segment {old}: {e}");
            }
        }
        Ok(())
    }

    fn searcher(&self) -> Result<Box<dyn EngineSearcher>> {
        self.check_open()?;
        Ok(Box::new(FlatSearcher::open(self.storage.as_ref())?))
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.commit()?;
        self.storage.delete_file(WRITE_LOCK_NAME)?;
        self.closed = true;
        Ok(())
    }
}

impl Drop for FlatWriter {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.storage.delete_file(WRITE_LOCK_NAME) {
                warn!("failed to remove {WRITE_LOCK_NAME} on writer drop: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{LowercaseKeywordAnalyzer, StandardAnalyzer};
    use crate::fields::{FieldArena, RecordPayload};
    use crate::schema::FieldStorage;
    use crate::storage::{MemoryStorage, StorageConfig};

    fn test_storage() -> Arc<dyn Storage> {
        let storage = MemoryStorage::new(StorageConfig::default());
        Manifest::default().store(&storage).unwrap();
        Arc::new(storage)
    }

    fn open_writer(storage: &Arc<dyn Storage>) -> FlatWriter {
        FlatWriter::open(
            Arc::clone(storage),
            Arc::new(LowercaseKeywordAnalyzer::new()),
            FlatEngineConfig::default(),
        )
        .unwrap()
    }

    fn id_term(id: &str) -> Term {
        Term::new("__document_id", id)
    }

    fn record(
        arena: &mut FieldArena,
        name: &str,
        value: &str,
        indexing: IndexingMode,
    ) -> FieldRecord {
        FieldRecord::new(
            arena.intern(name, Some(indexing), FieldStorage::Yes),
            RecordPayload::Str(value.to_string()),
            indexing,
            FieldStorage::Yes,
        )
    }

    #[test]
    fn test_open_acquires_lock_and_rejects_second_writer() {
        let storage = test_storage();
        let writer = open_writer(&storage);
        assert!(storage.file_exists(WRITE_LOCK_NAME));

        let second = FlatWriter::open(
            Arc::clone(&storage),
            Arc::new(LowercaseKeywordAnalyzer::new()),
            FlatEngineConfig::default(),
        );
        assert!(second.is_err());
        drop(writer);
    }

    #[test]
    fn test_drop_releases_lock() {
        let storage = test_storage();
        let writer = open_writer(&storage);
        drop(writer);
        assert!(!storage.file_exists(WRITE_LOCK_NAME));
    }

    #[test]
    fn test_upsert_commit_read_back() {
        let storage = test_storage();
        let mut writer = open_writer(&storage);
        let mut arena = FieldArena::new();

        writer
            .upsert(
                &id_term("orders/1"),
                vec![record(&mut arena, "status", "open", IndexingMode::NotAnalyzed)],
            )
            .unwrap();
        writer.commit().unwrap();

        let searcher = writer.searcher().unwrap();
        assert_eq!(searcher.doc_count(), 1);
        let hits = searcher.find_by_term("status", "open").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].get("status"), Some(&RecordPayload::Str("open".into())));
        writer.close().unwrap();
    }

    #[test]
    fn test_upsert_same_id_replaces() {
        let storage = test_storage();
        let mut writer = open_writer(&storage);
        let mut arena = FieldArena::new();

        writer
            .upsert(
                &id_term("orders/1"),
                vec![record(&mut arena, "status", "open", IndexingMode::NotAnalyzed)],
            )
            .unwrap();
        writer.commit().unwrap();
        writer
            .upsert(
                &id_term("orders/1"),
                vec![record(&mut arena, "status", "closed", IndexingMode::NotAnalyzed)],
            )
            .unwrap();
        writer.commit().unwrap();

        let searcher = writer.searcher().unwrap();
        assert_eq!(searcher.doc_count(), 1);
        assert!(searcher.find_by_term("status", "open").unwrap().is_empty());
        assert_eq!(searcher.find_by_term("status", "closed").unwrap().len(), 1);
        writer.close().unwrap();
    }

    #[test]
    fn test_delete_by_term_counts_committed_and_pending() {
        let storage = test_storage();
        let mut writer = open_writer(&storage);
        let mut arena = FieldArena::new();

        writer
            .upsert(
                &id_term("orders/1"),
                vec![record(&mut arena, "tag", "red", IndexingMode::NotAnalyzed)],
            )
            .unwrap();
        writer.commit().unwrap();
        writer
            .upsert(
                &id_term("orders/2"),
                vec![record(&mut arena, "tag", "red", IndexingMode::NotAnalyzed)],
            )
            .unwrap();

        let deleted = writer.delete_by_term(&Term::new("tag", "red")).unwrap();
        assert_eq!(deleted, 2);
        writer.commit().unwrap();

        let searcher = writer.searcher().unwrap();
        assert_eq!(searcher.doc_count(), 0);
        writer.close().unwrap();
    }

    #[test]
    fn test_empty_commit_writes_no_segment() {
        let storage = test_storage();
        let mut writer = open_writer(&storage);

        let files_before = storage.list_files().unwrap();
        writer.commit().unwrap();
        assert_eq!(storage.list_files().unwrap(), files_before);
        writer.close().unwrap();
    }

    #[test]
    fn test_optimize_folds_to_single_segment() {
        let storage = test_storage();
        let mut writer = open_writer(&storage);
        let mut arena = FieldArena::new();

        for i in 0..3 {
            writer
                .upsert(
                    &id_term(&format!("orders/{i}")),
                    vec![record(&mut arena, "tag", "red", IndexingMode::NotAnalyzed)],
                )
                .unwrap();
            writer.commit().unwrap();
        }

        let segments_before = storage
            .list_files()
            .unwrap()
            .into_iter()
            .filter(|f| f.ends_with(".dat"))
            .count();
        assert_eq!(segments_before, 3);

        writer.optimize().unwrap();
        let segments_after = storage
            .list_files()
            .unwrap()
            .into_iter()
            .filter(|f| f.ends_with(".dat"))
            .count();
        assert_eq!(segments_after, 1);

        let searcher = writer.searcher().unwrap();
        assert_eq!(searcher.doc_count(), 3);
        writer.close().unwrap();
    }

    #[test]
    fn test_close_commits_pending_and_releases_lock() {
        let storage = test_storage();
        let mut writer = open_writer(&storage);
        let mut arena = FieldArena::new();

        writer
            .upsert(
                &id_term("orders/1"),
                vec![record(&mut arena, "status", "open", IndexingMode::NotAnalyzed)],
            )
            .unwrap();
        writer.close().unwrap();
        assert!(!storage.file_exists(WRITE_LOCK_NAME));

        let searcher = FlatSearcher::open(storage.as_ref()).unwrap();
        assert_eq!(searcher.doc_count(), 1);
    }

    #[test]
    fn test_analyzed_records_match_by_token() {
        let storage = test_storage();
        let mut writer = FlatWriter::open(
            Arc::clone(&storage),
            Arc::new(StandardAnalyzer::new()),
            FlatEngineConfig::default(),
        )
        .unwrap();
        let mut arena = FieldArena::new();

        writer
            .upsert(
                &id_term("docs/1"),
                vec![record(
                    &mut arena,
                    "title",
                    "The Quick Brown Fox",
                    IndexingMode::Analyzed,
                )],
            )
            .unwrap();
        writer.commit().unwrap();

        let searcher = writer.searcher().unwrap();
        assert_eq!(searcher.find_by_term("title", "quick").unwrap().len(), 1);
        assert!(searcher
            .find_by_term("title", "The Quick Brown Fox")
            .unwrap()
            .is_empty());
        writer.close().unwrap();
    }

    #[test]
    fn test_operations_fail_after_close() {
        let storage = test_storage();
        let mut writer = open_writer(&storage);
        writer.close().unwrap();

        assert!(writer.commit().is_err());
        assert!(writer
            .delete_by_term(&Term::new("tag", "red"))
            .is_err());
        // a second close stays a no-op
        assert!(writer.close().is_ok());
    }
}
