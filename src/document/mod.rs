//! Documents handed to an index for storage.
//!
//! A [`Document`] is an identifier plus an ordered collection of named
//! [`FieldValue`]s. Field names may repeat; nested arrays are modeled as
//! [`FieldValue::Array`]. Documents are schema-free: the index definition
//! decides per field how a value is indexed and stored.

pub mod document;
pub mod field_value;

pub use document::{Document, DocumentBuilder};
pub use field_value::FieldValue;

/// Reserved field under which every document's identifier is indexed.
///
/// The identifier is lowercased before indexing, so lookups and upserts by
/// id are case-insensitive.
pub const ID_FIELD: &str = "__document_id";
