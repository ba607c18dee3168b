//! Read-only searcher for the flat engine.

use parking_lot::RwLock;

use crate::engine::flat::segment::{fold, Manifest, SegmentRow};
use crate::engine::traits::{EngineSearcher, StoredDocument};
use crate::error::{Result, ShrikeError};
use crate::storage::Storage;

/// A searcher over one committed snapshot of a flat index.
///
/// The whole fold is loaded at open, so the searcher stays usable even
/// after the segment files it came from are consolidated away. `close`
/// drops the loaded rows; it never fails and a second close is a no-op.
#[derive(Debug)]
pub struct FlatSearcher {
    rows: RwLock<Option<Vec<SegmentRow>>>,
}

impl FlatSearcher {
    /// Load the committed state from storage.
    pub fn open(storage: &dyn Storage) -> Result<FlatSearcher> {
        let manifest = Manifest::load(storage)?;
        let rows = fold(storage, &manifest)?;
        Ok(FlatSearcher {
            rows: RwLock::new(Some(rows)),
        })
    }
}

impl EngineSearcher for FlatSearcher {
    fn doc_count(&self) -> u64 {
        self.rows.read().as_ref().map_or(0, |rows| rows.len() as u64)
    }

    fn find_by_term(&self, field: &str, value: &str) -> Result<Vec<StoredDocument>> {
        let guard = self.rows.read();
        let rows = guard
            .as_ref()
            .ok_or_else(|| ShrikeError::engine("searcher is closed"))?;

        Ok(rows
            .iter()
            .filter(|row| {
                (row.key.field == field && row.key.value == value)
                    || row
                        .records
                        .iter()
                        .any(|record| record.name == field && record.matches(value))
            })
            .map(|row| StoredDocument {
                fields: row
                    .records
                    .iter()
                    .filter(|record| record.is_stored())
                    .map(|record| (record.name.clone(), record.payload.clone()))
                    .collect(),
            })
            .collect())
    }

    fn close(&self) -> Result<()> {
        *self.rows.write() = None;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.rows.read().is_none()
    }
}
