//! One named index: serialized write pipeline, snapshot publication and
//! best-effort teardown.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use parking_lot::{Mutex, RwLock};

use crate::analysis::{
    Analyzer, KeywordAnalyzer, LowercaseKeywordAnalyzer, PerFieldAnalyzer, StandardAnalyzer,
    analyzer_by_name,
};
use crate::document::{Document, ID_FIELD};
use crate::engine::{EngineWriter, SegmentEngine, Term};
use crate::error::{Result, ShrikeError};
use crate::fields::{FieldArena, FieldMaterializer, FieldRecord, RecordPayload};
use crate::index::slot::{SearcherLease, SearcherSlot};
use crate::schema::{FieldIndexing, FieldStorage, IndexDefinition, IndexingMode};
use crate::storage::Storage;

/// Advisory lock present only while a mutation is in flight. Finding it on
/// disk at startup means a process died mid-write.
pub const WRITING_LOCK_NAME: &str = "writing-to-index.lock";

/// How long `close` politely waits for the write lock before logging the
/// current activity and blocking.
const CLOSE_LOCK_PATIENCE: Duration = Duration::from_millis(100);

/// How long `close` waits for the final searcher generation to drain.
const CLOSE_DRAIN_PATIENCE: Duration = Duration::from_secs(5);

/// Counters for one mutation batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkStats {
    /// Documents the batch tried to index.
    pub attempts: u64,

    /// Documents accepted by the writer.
    pub successes: u64,

    /// Documents that failed and aborted the batch.
    pub errors: u64,
}

/// One failed teardown step.
#[derive(Debug)]
pub struct CloseFailure {
    /// Which step failed.
    pub step: String,

    /// The error it failed with.
    pub error: ShrikeError,
}

/// Aggregate outcome of a best-effort teardown.
///
/// Every step runs regardless of earlier failures; each failure is
/// recorded here instead of aborting the remaining steps.
#[derive(Debug, Default)]
pub struct CloseReport {
    /// Failures in the order the steps ran.
    pub failures: Vec<CloseFailure>,
}

impl CloseReport {
    /// Whether every step succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Record one failed step.
    pub fn record<S: Into<String>>(&mut self, step: S, error: ShrikeError) {
        self.failures.push(CloseFailure {
            step: step.into(),
            error,
        });
    }

    /// Fold another report into this one, prefixing its steps.
    pub fn absorb(&mut self, prefix: &str, other: CloseReport) {
        for failure in other.failures {
            self.failures.push(CloseFailure {
                step: format!("{prefix}: {}", failure.step),
                error: failure.error,
            });
        }
    }
}

/// Clears the activity descriptor when the guarded section ends.
struct ActivityGuard<'a> {
    activity: &'a Mutex<Option<&'static str>>,
}

impl<'a> ActivityGuard<'a> {
    fn begin(activity: &'a Mutex<Option<&'static str>>, label: &'static str) -> Self {
        *activity.lock() = Some(label);
        ActivityGuard { activity }
    }
}

impl Drop for ActivityGuard<'_> {
    fn drop(&mut self) {
        *self.activity.lock() = None;
    }
}

/// On-disk marker for an in-flight mutation, removed on every exit path.
struct AdvisoryLock {
    storage: Arc<dyn Storage>,
}

impl AdvisoryLock {
    fn engage(storage: &Arc<dyn Storage>) -> Result<AdvisoryLock> {
        let mut output = storage.create_output(WRITING_LOCK_NAME)?;
        output.close()?;
        Ok(AdvisoryLock {
            storage: Arc::clone(storage),
        })
    }
}

impl Drop for AdvisoryLock {
    fn drop(&mut self) {
        if let Err(e) = self.storage.delete_file(WRITING_LOCK_NAME) {
            warn!("failed to remove {WRITING_LOCK_NAME}: {e}");
        }
    }
}

/// A single open index.
///
/// The handle owns the index's storage, its lazily created engine writer
/// and the snapshot slot readers acquire searchers from. All operations
/// take `&self`; handles are shared behind an `Arc`. Mutations are
/// serialized by the writer lock, reads never touch it.
#[derive(Debug)]
pub struct IndexHandle {
    name: String,
    definition: IndexDefinition,
    storage: Arc<dyn Storage>,
    engine: Arc<dyn SegmentEngine>,
    writer: Mutex<Option<Box<dyn EngineWriter>>>,
    slot: SearcherSlot,
    activity: Mutex<Option<&'static str>>,
    disposed: AtomicBool,
    docs_since_merge: AtomicU64,
    last_write_time: RwLock<Option<DateTime<Utc>>>,
}

impl IndexHandle {
    /// Open a handle over an existing on-disk index.
    ///
    /// Publishes an initial searcher so the index is readable before the
    /// first write.
    pub fn open(
        definition: IndexDefinition,
        storage: Arc<dyn Storage>,
        engine: Arc<dyn SegmentEngine>,
    ) -> Result<IndexHandle> {
        let name = definition.name.clone();
        let slot = SearcherSlot::new(&name);
        slot.publish(engine.open_searcher(storage.as_ref())?);

        Ok(IndexHandle {
            name,
            definition,
            storage,
            engine,
            writer: Mutex::new(None),
            slot,
            activity: Mutex::new(None),
            disposed: AtomicBool::new(false),
            docs_since_merge: AtomicU64::new(0),
            last_write_time: RwLock::new(None),
        })
    }

    /// Name of the index.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The definition the index was opened with.
    pub fn definition(&self) -> &IndexDefinition {
        &self.definition
    }

    /// When the last mutation started, if any.
    pub fn last_write_time(&self) -> Option<DateTime<Utc>> {
        *self.last_write_time.read()
    }

    /// Documents changed since the last segment merge. Input for the
    /// caller's merge policy; nothing in the handle acts on it.
    pub fn docs_since_merge(&self) -> u64 {
        self.docs_since_merge.load(Ordering::SeqCst)
    }

    /// Number of searcher publications so far.
    pub fn searcher_generation(&self) -> u64 {
        self.slot.generation()
    }

    /// Acquire a lease on the current searcher generation.
    pub fn searcher(&self) -> Result<SearcherLease> {
        self.slot.acquire()
    }

    /// Index a batch of documents, replacing previous versions by
    /// identifier. The whole batch is committed as one unit; any failure
    /// aborts it before the commit and nothing of the batch is applied.
    /// Returns the number of documents written.
    pub fn index_documents(&self, docs: &[Document]) -> Result<u64> {
        let definition = &self.definition;
        self.write(move |writer, stats| {
            let materializer = FieldMaterializer::new(definition);
            let mut arena = FieldArena::new();

            let mut batch = Vec::with_capacity(docs.len());
            for doc in docs {
                stats.attempts += 1;
                match materialize_document(&materializer, &mut arena, doc) {
                    Ok(entry) => batch.push(entry),
                    Err(e) => {
                        stats.errors += 1;
                        return Err(e);
                    }
                }
            }

            let mut changed = 0u64;
            for (id_term, records) in batch {
                log_indexed_document(&id_term.value, &records);
                if let Err(e) = writer.upsert(&id_term, records) {
                    stats.errors += 1;
                    return Err(e);
                }
                stats.successes += 1;
                changed += 1;
            }
            Ok(changed)
        })
    }

    /// Commit any pending writer state. A no-op when the index is disposed
    /// or nothing was ever written; never republishes a searcher.
    pub fn flush(&self) -> Result<()> {
        if self.disposed.load(Ordering::SeqCst) {
            return Ok(());
        }
        let mut writer_cell = self.writer.lock();
        match writer_cell.as_deref_mut() {
            Some(writer) => {
                let _activity = ActivityGuard::begin(&self.activity, "Flush");
                writer.commit()
            }
            None => Ok(()),
        }
    }

    /// Consolidate the index into fewer segments and reset the
    /// changed-documents counter. Runs only when explicitly called.
    pub fn merge_segments(&self) -> Result<()> {
        self.check_not_disposed()?;
        let mut writer_cell = self.writer.lock();
        self.check_not_disposed()?;
        let _activity = ActivityGuard::begin(&self.activity, "Merge / Optimize");

        let writer = self.ensure_writer(&mut writer_cell)?;
        info!("optimizing index '{}'", self.name);
        writer.optimize()?;
        self.docs_since_merge.store(0, Ordering::SeqCst);
        Ok(())
    }

    /// Run one serialized mutation against the writer.
    ///
    /// The advisory lock brackets the mutation and the commit; a fresh
    /// searcher is published only when at least one document changed.
    fn write<F>(&self, mutation: F) -> Result<u64>
    where
        F: FnOnce(&mut dyn EngineWriter, &mut WorkStats) -> Result<u64>,
    {
        self.check_not_disposed()?;
        *self.last_write_time.write() = Some(Utc::now());

        let mut writer_cell = self.writer.lock();
        // close may have won the race for the lock
        self.check_not_disposed()?;
        let _activity = ActivityGuard::begin(&self.activity, "Write");
        let writer = self.ensure_writer(&mut writer_cell)?;

        let advisory = AdvisoryLock::engage(&self.storage)?;
        let mut stats = WorkStats::default();
        let changed = match mutation(&mut *writer, &mut stats) {
            Ok(changed) => changed,
            Err(e) => {
                // pending mutations of the failed batch must not leak into
                // a later commit; the next write reopens the writer
                warn!("discarding writer for '{}' after a failed mutation: {e}", self.name);
                *writer_cell = None;
                return Err(e);
            }
        };
        if let Err(e) = writer.commit() {
            warn!("discarding writer for '{}' after a failed commit: {e}", self.name);
            *writer_cell = None;
            return Err(e);
        }
        drop(advisory);

        debug!("write on '{}' finished: {:?}", self.name, stats);
        if changed > 0 {
            self.docs_since_merge.fetch_add(changed, Ordering::SeqCst);
            self.slot.publish(writer.searcher()?);
        }
        Ok(changed)
    }

    /// Close the index: retire the snapshot slot, close the writer, close
    /// the storage. Every step runs regardless of earlier failures; the
    /// report collects whatever went wrong. A second close is a no-op.
    pub fn close(&self) -> CloseReport {
        let mut report = CloseReport::default();
        if self.disposed.load(Ordering::SeqCst) {
            return report;
        }

        let mut writer_cell = match self.writer.try_lock_for(CLOSE_LOCK_PATIENCE) {
            Some(guard) => guard,
            None => {
                let activity = *self.activity.lock();
                info!(
                    "index '{}' is busy with '{}'; waiting for the write lock to close it",
                    self.name,
                    activity.unwrap_or("Unknown")
                );
                self.writer.lock()
            }
        };

        if self.disposed.swap(true, Ordering::SeqCst) {
            return report;
        }
        info!("closing index '{}'", self.name);

        if let Some(wait) = self.slot.retire() {
            if !wait.wait(CLOSE_DRAIN_PATIENCE) {
                warn!(
                    "a searcher for '{}' is still leased after {:?}; its last reader will close it",
                    self.name, CLOSE_DRAIN_PATIENCE
                );
            }
        }

        if let Some(mut writer) = writer_cell.take() {
            if let Err(e) = writer.close() {
                error!("failed to close the writer for '{}': {e}", self.name);
                report.record("close writer", e);
            }
        }

        if let Err(e) = self.storage.close() {
            error!("failed to close the storage for '{}': {e}", self.name);
            report.record("close storage", e);
        }

        report
    }

    fn check_not_disposed(&self) -> Result<()> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(ShrikeError::disposed(&self.name));
        }
        Ok(())
    }

    /// Create the engine writer on first use.
    fn ensure_writer<'a>(
        &self,
        cell: &'a mut Option<Box<dyn EngineWriter>>,
    ) -> Result<&'a mut (dyn EngineWriter + 'static)> {
        if cell.is_none() {
            let analyzer = build_write_analyzer(&self.definition)?;
            *cell = Some(
                self.engine
                    .open_writer(Arc::clone(&self.storage), Arc::new(analyzer))?,
            );
        }
        cell.as_deref_mut()
            .ok_or_else(|| ShrikeError::internal("writer cell is empty after creation"))
    }
}

/// Assemble the write-side analyzer for a definition.
///
/// Undeclared fields use the lowercase keyword analyzer. Fields with a
/// declared analyzer resolve it by name; fields marked analyzed or
/// not-analyzed without one get the standard and keyword analyzers. One
/// shared instance per analyzer kind.
fn build_write_analyzer(definition: &IndexDefinition) -> Result<PerFieldAnalyzer> {
    let mut per_field = PerFieldAnalyzer::new(Arc::new(LowercaseKeywordAnalyzer::new()));

    for (field, analyzer_name) in &definition.analyzers {
        per_field.add_analyzer(field.clone(), analyzer_by_name(analyzer_name)?);
    }

    let keyword: Arc<dyn Analyzer> = Arc::new(KeywordAnalyzer::new());
    let standard: Arc<dyn Analyzer> = Arc::new(StandardAnalyzer::new());
    for (field, indexing) in &definition.indexes {
        if definition.analyzers.contains_key(field) {
            continue;
        }
        match indexing {
            FieldIndexing::NotAnalyzed => {
                per_field.add_analyzer(field.clone(), Arc::clone(&keyword));
            }
            FieldIndexing::Analyzed => {
                per_field.add_analyzer(field.clone(), Arc::clone(&standard));
            }
            FieldIndexing::Default | FieldIndexing::No => {}
        }
    }
    Ok(per_field)
}

/// Materialize one document into its identifier term and field records.
///
/// The identifier is lowercased so upserts behave case-insensitively, and
/// indexed verbatim under [`ID_FIELD`].
fn materialize_document(
    materializer: &FieldMaterializer<'_>,
    arena: &mut FieldArena,
    doc: &Document,
) -> Result<(Term, Vec<FieldRecord>)> {
    if doc.id().trim().is_empty() {
        return Err(ShrikeError::invalid_argument(
            "document identifier must not be empty",
        ));
    }
    let id = doc.id().to_lowercase();
    let id_term = Term::new(ID_FIELD, id.clone());

    let mut records = Vec::new();
    records.push(FieldRecord::new(
        arena.intern(ID_FIELD, Some(IndexingMode::NotAnalyzed), FieldStorage::Yes),
        RecordPayload::Str(id),
        IndexingMode::NotAnalyzed,
        FieldStorage::Yes,
    ));
    for (name, value) in doc.fields() {
        materializer.create_fields(arena, name, value, FieldStorage::No, &mut records)?;
    }
    Ok((id_term, records))
}

/// Record-level logging for one indexed document, gated on the debug level.
fn log_indexed_document(id: &str, records: &[FieldRecord]) {
    if !log::log_enabled!(log::Level::Debug) {
        return;
    }
    for record in records {
        debug!(
            "indexing '{id}' record {} (indexed: {}, stored: {}): {}",
            record.name,
            record.is_indexed(),
            record.is_stored(),
            record.payload
        );
    }
}
