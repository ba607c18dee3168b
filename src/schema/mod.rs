//! Index definitions: per-field indexing, storage, sorting and analyzer
//! configuration.
//!
//! Documents themselves are schema-free. An [`IndexDefinition`] overlays
//! per-field options onto whatever fields show up, with a catch-all
//! [`ALL_FIELDS`] entry and sensible defaults for everything unnamed.

pub mod definition;
pub mod field;

pub use definition::{ALL_FIELDS, IndexDefinition, RANGE_SUFFIX};
pub use field::{FieldIndexing, FieldStorage, IndexingMode, SortOption};
