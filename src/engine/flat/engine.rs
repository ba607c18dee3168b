//! Baseline segment engine over checksummed flat segment files.

use std::sync::Arc;

use log::warn;

use crate::analysis::Analyzer;
use crate::engine::flat::searcher::FlatSearcher;
use crate::engine::flat::segment::{read_segment, Manifest};
use crate::engine::flat::writer::FlatWriter;
use crate::engine::traits::{
    CheckReport, EngineSearcher, EngineWriter, SegmentEngine, WRITE_LOCK_NAME,
};
use crate::error::Result;
use crate::storage::Storage;

/// Configuration for the flat engine.
#[derive(Debug, Clone)]
pub struct FlatEngineConfig {
    /// Prefix of segment file names.
    pub segment_prefix: String,
}

impl Default for FlatEngineConfig {
    fn default() -> Self {
        FlatEngineConfig {
            segment_prefix: "seg".to_string(),
        }
    }
}

/// The baseline [`SegmentEngine`].
///
/// Stores documents as whole rows in append-only segments; a manifest swap
/// makes commits atomic and the trailing checksum makes torn segment writes
/// detectable. There is no term dictionary or scoring; lookups scan the
/// folded rows.
#[derive(Debug, Clone, Default)]
pub struct FlatEngine {
    config: FlatEngineConfig,
}

impl FlatEngine {
    /// Create an engine with the given configuration.
    pub fn new(config: FlatEngineConfig) -> Self {
        FlatEngine { config }
    }
}

impl SegmentEngine for FlatEngine {
    fn index_exists(&self, storage: &dyn Storage) -> bool {
        Manifest::exists(storage)
    }

    fn create_index(&self, storage: &dyn Storage) -> Result<()> {
        Manifest::default().store(storage)
    }

    fn open_writer(
        &self,
        storage: Arc<dyn Storage>,
        analyzer: Arc<dyn Analyzer>,
    ) -> Result<Box<dyn EngineWriter>> {
        Ok(Box::new(FlatWriter::open(
            storage,
            analyzer,
            self.config.clone(),
        )?))
    }

    fn force_unlock(&self, storage: &dyn Storage) -> Result<()> {
        if storage.file_exists(WRITE_LOCK_NAME) {
            storage.delete_file(WRITE_LOCK_NAME)?;
        }
        Ok(())
    }

    fn check_index(&self, storage: &dyn Storage) -> Result<CheckReport> {
        let manifest = Manifest::load(storage)?;
        let mut report = CheckReport {
            clean: true,
            ..CheckReport::default()
        };

        for name in &manifest.segments {
            match read_segment(storage, name) {
                Ok(data) => {
                    report.segments_checked += 1;
                    report.total_rows += data.rows.len() as u64;
                }
                Err(e) => {
                    report.clean = false;
                    report.bad_segments.push(name.clone());
                    report.problems.push(format!("segment {name}: {e}"));
                }
            }
        }
        Ok(report)
    }

    fn repair_index(&self, storage: &dyn Storage, report: &CheckReport) -> Result<u64> {
        if report.bad_segments.is_empty() {
            return Ok(0);
        }

        let mut manifest = Manifest::load(storage)?;
        manifest
            .segments
            .retain(|segment| !report.bad_segments.contains(segment));
        manifest.store(storage)?;

        for bad in &report.bad_segments {
            if storage.file_exists(bad) {
                if let Err(e) = storage.delete_file(bad) {
                    warn!("failed to delete bad segment {bad}: {e}");
                }
            }
        }
        Ok(report.bad_segments.len() as u64)
    }

    fn open_searcher(&self, storage: &dyn Storage) -> Result<Box<dyn EngineSearcher>> {
        Ok(Box::new(FlatSearcher::open(storage)?))
    }
}
