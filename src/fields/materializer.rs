//! Materialization rules from document values to index records.

use chrono::{DateTime, Utc};

use crate::document::FieldValue;
use crate::error::{Result, ShrikeError};
use crate::fields::arena::FieldArena;
use crate::fields::record::{FieldRecord, RecordPayload};
use crate::schema::{FieldStorage, IndexDefinition, IndexingMode, RANGE_SUFFIX};

/// Sentinel term indexed for explicit null values.
pub const NULL_VALUE: &str = "NULL_VALUE";

/// Sentinel term indexed for empty strings.
pub const EMPTY_STRING: &str = "EMPTY_STRING";

/// Suffix of the marker field emitted once per stored array value.
pub const IS_ARRAY_SUFFIX: &str = "_IsArray";

/// Turns document field values into index records under one definition.
///
/// Given a name and a value, materialization behaves as follows:
/// * arrays index every element under the same field name, tagging stored
///   arrays with a `{name}_IsArray` marker
/// * null becomes a single unanalyzed [`NULL_VALUE`] record
/// * the empty string becomes a single unanalyzed [`EMPTY_STRING`] record
/// * text is analyzed unless the definition says otherwise
/// * timestamps are rendered to a sortable fixed-width form
/// * integers and floats produce the plain record plus a `{name}_Range`
///   companion carrying the numeric payload for range scans
pub struct FieldMaterializer<'a> {
    definition: &'a IndexDefinition,
}

impl<'a> FieldMaterializer<'a> {
    /// Create a materializer over an index definition.
    pub fn new(definition: &'a IndexDefinition) -> Self {
        FieldMaterializer { definition }
    }

    /// Materialize `value` under `name`, appending records to `out`.
    ///
    /// `default_storage` applies to fields without a configured storage
    /// option. Fails on empty or whitespace-only names and on byte
    /// payloads; no records are appended in that case beyond those already
    /// produced for earlier values.
    pub fn create_fields(
        &self,
        arena: &mut FieldArena,
        name: &str,
        value: &FieldValue,
        default_storage: FieldStorage,
        out: &mut Vec<FieldRecord>,
    ) -> Result<()> {
        self.create_fields_inner(arena, name, value, default_storage, false, out)
    }

    fn create_fields_inner(
        &self,
        arena: &mut FieldArena,
        name: &str,
        value: &FieldValue,
        default_storage: FieldStorage,
        nested_array: bool,
        out: &mut Vec<FieldRecord>,
    ) -> Result<()> {
        if name.trim().is_empty() {
            return Err(ShrikeError::field(
                "field name must not be empty or whitespace",
            ));
        }
        let name = normalize_name(name);
        let name = name.as_ref();

        // resolved up front: an explicit NotAnalyzed entry changes the shape
        // of several branches below
        let indexing_options = self.definition.indexing_for(name, None);
        let explicit_not_analyzed = indexing_options == IndexingMode::NotAnalyzed;
        let storage = self.definition.storage_for(name, default_storage);
        let not_analyzed = self
            .definition
            .indexing_for(name, Some(IndexingMode::NotAnalyzed));

        match value {
            FieldValue::Null => {
                self.push(arena, name, RecordPayload::Str(NULL_VALUE.into()), storage, not_analyzed, out);
                Ok(())
            }
            FieldValue::Text(s) if s.is_empty() => {
                self.push(arena, name, RecordPayload::Str(EMPTY_STRING.into()), storage, not_analyzed, out);
                Ok(())
            }
            FieldValue::Bytes(_) => Err(ShrikeError::field(format!(
                "binary fields are not supported: {name}"
            ))),
            FieldValue::Array(items) => {
                let mut sent_array_marker = false;
                let mut position: u32 = 1;
                for item in items {
                    if !nested_array && storage == FieldStorage::Yes && !sent_array_marker {
                        sent_array_marker = true;
                        let marker_name = format!("{name}{IS_ARRAY_SUFFIX}");
                        self.push(
                            arena,
                            &marker_name,
                            RecordPayload::Str("true".into()),
                            FieldStorage::Yes,
                            IndexingMode::NotAnalyzed,
                            out,
                        );
                    }
                    if can_index_array_element(item, indexing_options) {
                        arena.push_array_position(position);
                        position += 1;
                        let result =
                            self.create_fields_inner(arena, name, item, storage, true, out);
                        arena.pop_array_position();
                        result?;
                    }
                }
                Ok(())
            }
            FieldValue::Text(s) => {
                let index = if explicit_not_analyzed {
                    not_analyzed
                } else {
                    self.definition.indexing_for(name, Some(IndexingMode::Analyzed))
                };
                self.push(arena, name, RecordPayload::Str(s.clone()), storage, index, out);
                Ok(())
            }
            FieldValue::DateTime(dt) => {
                self.push(
                    arena,
                    name,
                    RecordPayload::Str(format_timestamp(dt)),
                    storage,
                    not_analyzed,
                    out,
                );
                Ok(())
            }
            FieldValue::Boolean(b) => {
                let text = if *b { "true" } else { "false" };
                self.push(arena, name, RecordPayload::Str(text.into()), storage, not_analyzed, out);
                Ok(())
            }
            FieldValue::Integer(i) => {
                self.push(arena, name, RecordPayload::Str(i.to_string()), storage, not_analyzed, out);
                if !explicit_not_analyzed {
                    self.push_numeric_companion(arena, name, RecordPayload::I64(*i), storage, out);
                }
                Ok(())
            }
            FieldValue::Float(f) => {
                self.push(arena, name, RecordPayload::Str(f.to_string()), storage, not_analyzed, out);
                if !explicit_not_analyzed {
                    self.push_numeric_companion(arena, name, RecordPayload::F64(*f), storage, out);
                }
                Ok(())
            }
        }
    }

    fn push(
        &self,
        arena: &mut FieldArena,
        name: &str,
        payload: RecordPayload,
        storage: FieldStorage,
        indexing: IndexingMode,
        out: &mut Vec<FieldRecord>,
    ) {
        let interned = arena.intern(name, Some(indexing), storage);
        out.push(FieldRecord::new(interned, payload, indexing, storage));
    }

    fn push_numeric_companion(
        &self,
        arena: &mut FieldArena,
        name: &str,
        payload: RecordPayload,
        storage: FieldStorage,
        out: &mut Vec<FieldRecord>,
    ) {
        let companion = format!("{name}{RANGE_SUFFIX}");
        // companion records share the numeric intern key shape: no indexing
        // mode, keyed by the base field's storage
        let interned = arena.intern(&companion, None, storage);
        out.push(FieldRecord::new(
            interned,
            payload,
            IndexingMode::NotAnalyzed,
            storage,
        ));
    }
}

/// Prefix names that do not start with a letter or underscore.
fn normalize_name(name: &str) -> std::borrow::Cow<'_, str> {
    match name.chars().next() {
        Some(first) if first.is_alphabetic() || first == '_' => std::borrow::Cow::Borrowed(name),
        _ => std::borrow::Cow::Owned(format!("_{name}")),
    }
}

/// Array elements are skipped when they cannot produce terms: an analyzed
/// null has nothing to analyze.
fn can_index_array_element(value: &FieldValue, indexing_options: IndexingMode) -> bool {
    if indexing_options != IndexingMode::Analyzed {
        return true;
    }
    !value.is_null()
}

/// Fixed-width timestamp rendering with 100ns precision, always UTC.
fn format_timestamp(dt: &DateTime<Utc>) -> String {
    format!(
        "{}.{:07}Z",
        dt.format("%Y-%m-%dT%H:%M:%S"),
        dt.timestamp_subsec_nanos() / 100
    )
}
