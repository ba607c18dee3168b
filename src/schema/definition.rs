//! Index definition and per-field option resolution.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::schema::field::{FieldIndexing, FieldStorage, IndexingMode, SortOption};

/// Catch-all field name: an entry under this key applies to every field
/// without a more specific entry.
pub const ALL_FIELDS: &str = "__all_fields";

/// Suffix of the numeric companion field emitted next to numeric values.
///
/// Sort option lookup strips this suffix so a hint configured for the base
/// field also covers its companion.
pub const RANGE_SUFFIX: &str = "_Range";

/// Definition of a single index: its name plus per-field options.
///
/// All maps are keyed by field name and may carry an [`ALL_FIELDS`] entry.
/// A definition with empty maps is valid; every field then gets defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDefinition {
    /// Name of the index. Registry lookups treat it case-insensitively.
    pub name: String,

    /// Per-field indexing options.
    #[serde(default)]
    pub indexes: HashMap<String, FieldIndexing>,

    /// Per-field storage options.
    #[serde(default)]
    pub stores: HashMap<String, FieldStorage>,

    /// Per-field sort hints.
    #[serde(default)]
    pub sort_options: HashMap<String, SortOption>,

    /// Per-field analyzer names, resolved against the built-in analyzer set.
    #[serde(default)]
    pub analyzers: HashMap<String, String>,
}

impl IndexDefinition {
    /// Create a definition with the given name and no field options.
    pub fn new<S: Into<String>>(name: S) -> Self {
        IndexDefinition {
            name: name.into(),
            indexes: HashMap::new(),
            stores: HashMap::new(),
            sort_options: HashMap::new(),
            analyzers: HashMap::new(),
        }
    }

    /// Set the indexing option for a field.
    pub fn with_indexing<S: Into<String>>(mut self, field: S, indexing: FieldIndexing) -> Self {
        self.indexes.insert(field.into(), indexing);
        self
    }

    /// Set the storage option for a field.
    pub fn with_storage<S: Into<String>>(mut self, field: S, storage: FieldStorage) -> Self {
        self.stores.insert(field.into(), storage);
        self
    }

    /// Set the sort hint for a field.
    pub fn with_sort_option<S: Into<String>>(mut self, field: S, option: SortOption) -> Self {
        self.sort_options.insert(field.into(), option);
        self
    }

    /// Set the analyzer name for a field.
    pub fn with_analyzer<S: Into<String>, A: Into<String>>(mut self, field: S, analyzer: A) -> Self {
        self.analyzers.insert(field.into(), analyzer.into());
        self
    }

    /// Resolve the indexing mode for `name`.
    ///
    /// Looks up the field, then the [`ALL_FIELDS`] override. A field with a
    /// custom analyzer but no indexing entry is analyzed; anything else falls
    /// back to `default`, and finally to [`IndexingMode::Analyzed`].
    pub fn indexing_for(&self, name: &str, default: Option<IndexingMode>) -> IndexingMode {
        let configured = self.indexes.get(name).or_else(|| self.indexes.get(ALL_FIELDS));
        let Some(configured) = configured else {
            if self.analyzers.contains_key(name) || self.analyzers.contains_key(ALL_FIELDS) {
                // a custom analyzer means the value should be analyzed
                return IndexingMode::Analyzed;
            }
            return default.unwrap_or(IndexingMode::Analyzed);
        };
        match configured {
            FieldIndexing::No => IndexingMode::No,
            FieldIndexing::Analyzed => IndexingMode::Analyzed,
            FieldIndexing::NotAnalyzed => IndexingMode::NotAnalyzed,
            FieldIndexing::Default => default.unwrap_or(IndexingMode::Analyzed),
        }
    }

    /// Resolve the storage mode for `name`, falling back to the
    /// [`ALL_FIELDS`] override and then to `default`.
    pub fn storage_for(&self, name: &str, default: FieldStorage) -> FieldStorage {
        self.stores
            .get(name)
            .or_else(|| self.stores.get(ALL_FIELDS))
            .copied()
            .unwrap_or(default)
    }

    /// Resolve the sort hint for `name`, if one is configured.
    ///
    /// Companion fields carrying [`RANGE_SUFFIX`] inherit the hint of their
    /// base field.
    pub fn sort_option_for(&self, name: &str) -> Option<SortOption> {
        if let Some(option) = self
            .sort_options
            .get(name)
            .or_else(|| self.sort_options.get(ALL_FIELDS))
        {
            return Some(*option);
        }
        if let Some(base) = name.strip_suffix(RANGE_SUFFIX) {
            return self
                .sort_options
                .get(base)
                .or_else(|| self.sort_options.get(ALL_FIELDS))
                .copied();
        }
        None
    }

    /// Analyzer name configured for `name`, if any, with the
    /// [`ALL_FIELDS`] fallback.
    pub fn analyzer_for(&self, name: &str) -> Option<&str> {
        self.analyzers
            .get(name)
            .or_else(|| self.analyzers.get(ALL_FIELDS))
            .map(String::as_str)
    }
}
