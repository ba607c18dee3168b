//! Per-batch interning arena for field names.

use std::sync::Arc;

use ahash::AHashMap;

use crate::schema::{FieldStorage, IndexingMode};

/// Key under which a name allocation is interned.
///
/// Two records share an allocation only when name, resolved modes and the
/// position path through nested arrays all match, so records that differ in
/// any of these stay distinguishable to callers holding the `Arc`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FieldKey {
    name: String,
    indexing: Option<IndexingMode>,
    storage: FieldStorage,
    array_path: Vec<u32>,
}

/// Interning arena scoped to one indexing batch.
///
/// Also tracks the current nested-array position path while the
/// materializer recurses; the path participates in the interning key.
#[derive(Debug, Default)]
pub struct FieldArena {
    names: AHashMap<FieldKey, Arc<str>>,
    array_path: Vec<u32>,
}

impl FieldArena {
    /// Create an empty arena.
    pub fn new() -> Self {
        FieldArena {
            names: AHashMap::new(),
            array_path: Vec::new(),
        }
    }

    /// Intern `name` under the given modes and the current array path.
    pub fn intern(
        &mut self,
        name: &str,
        indexing: Option<IndexingMode>,
        storage: FieldStorage,
    ) -> Arc<str> {
        let key = FieldKey {
            name: name.to_string(),
            indexing,
            storage,
            array_path: self.array_path.clone(),
        };
        if let Some(existing) = self.names.get(&key) {
            return Arc::clone(existing);
        }
        let interned: Arc<str> = Arc::from(name);
        self.names.insert(key, Arc::clone(&interned));
        interned
    }

    /// Enter an array element at `position` (1-based within its array).
    pub fn push_array_position(&mut self, position: u32) {
        self.array_path.push(position);
    }

    /// Leave the current array element.
    pub fn pop_array_position(&mut self) {
        self.array_path.pop();
    }

    /// The current nested-array position path.
    pub fn array_path(&self) -> &[u32] {
        &self.array_path
    }

    /// Number of distinct interned entries.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether nothing has been interned yet.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
