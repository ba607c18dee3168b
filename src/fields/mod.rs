//! Field materialization: turning document values into index records.
//!
//! The [`FieldMaterializer`] applies an index definition to raw
//! [`FieldValue`](crate::document::FieldValue)s and produces the flat
//! [`FieldRecord`]s an engine writer consumes. Sentinel terms keep null and
//! empty values findable, numeric values get a range-query companion field,
//! and stored arrays are tagged so readers can reconstruct them.
//!
//! Name allocations are interned in a per-batch [`FieldArena`] so repeated
//! fields across a batch share one allocation.

pub mod arena;
pub mod materializer;
pub mod record;

pub use arena::FieldArena;
pub use materializer::{EMPTY_STRING, FieldMaterializer, IS_ARRAY_SUFFIX, NULL_VALUE};
pub use record::{FieldRecord, RecordPayload};
