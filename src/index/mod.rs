//! Index lifecycle: the registry, per-index handles and searcher snapshots.

pub mod handle;
pub mod registry;
pub mod slot;

pub use handle::{CloseFailure, CloseReport, IndexHandle, WRITING_LOCK_NAME, WorkStats};
pub use registry::{
    CRASH_MARKER, DEFINITION_FILE, INDEX_VERSION, IndexRegistry, RegistryConfig, StartupState,
    VERSION_FILE, fixup_index_name,
};
pub use slot::{DisposalWait, SearcherLease, SearcherSlot};
