//! Field option enums used by index definitions.

use serde::{Deserialize, Serialize};

/// Configured indexing behavior for a field.
///
/// `Default` defers to whatever the materializer considers appropriate for
/// the value type at hand; the other variants force a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldIndexing {
    /// Use the per-value-type default.
    Default,
    /// Do not index the field at all.
    No,
    /// Run the field through an analyzer before indexing.
    Analyzed,
    /// Index the field as a single verbatim term.
    NotAnalyzed,
}

impl Default for FieldIndexing {
    fn default() -> Self {
        FieldIndexing::Default
    }
}

/// Resolved indexing mode carried on individual index records.
///
/// Resolution never yields a "default" here; [`FieldIndexing::Default`] is
/// replaced by the supplied fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexingMode {
    /// Stored only, not searchable.
    No,
    /// Tokenized through an analyzer.
    Analyzed,
    /// A single verbatim term.
    NotAnalyzed,
}

/// Whether a field value is stored for retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldStorage {
    /// The value is stored and retrievable from search results.
    Yes,
    /// The value is indexed only.
    No,
}

impl Default for FieldStorage {
    fn default() -> Self {
        FieldStorage::No
    }
}

/// Sort hint for a field.
///
/// Carried as definition metadata for engines that distinguish numeric
/// widths; the baseline pipeline stores native 64-bit payloads either way.
/// Companion fields resolve to their base field's hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOption {
    /// Lexicographic string ordering.
    String,
    /// 32-bit integer ordering.
    Int,
    /// 32-bit float ordering.
    Float,
    /// 64-bit integer ordering.
    Long,
    /// 64-bit float ordering.
    Double,
}
