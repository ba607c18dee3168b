//! Flat baseline engine: checksummed row segments plus a JSON manifest.

pub mod engine;
pub mod searcher;
pub mod segment;
pub mod writer;

pub use engine::{FlatEngine, FlatEngineConfig};
pub use searcher::FlatSearcher;
pub use writer::FlatWriter;
