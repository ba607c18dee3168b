//! Segment engine contract and the baseline flat implementation.
//!
//! The index coordination layer in [`crate::index`] is engine-agnostic: it
//! drives whatever implements [`SegmentEngine`]. The [`flat`] module
//! provides the baseline engine used by default.

pub mod flat;
pub mod traits;

pub use flat::{FlatEngine, FlatEngineConfig, FlatSearcher, FlatWriter};
pub use traits::{
    CheckReport, EngineSearcher, EngineWriter, SegmentEngine, StoredDocument, Term,
    WRITE_LOCK_NAME,
};
