//! The registry of named indexes: crash-aware startup, directory naming and
//! aggregate shutdown.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use ahash::AHashMap;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use log::{info, warn};
use sha2::{Digest, Sha256};

use crate::engine::{FlatEngine, SegmentEngine, WRITE_LOCK_NAME};
use crate::error::{Result, ShrikeError};
use crate::index::handle::{CloseReport, IndexHandle, WRITING_LOCK_NAME};
use crate::schema::IndexDefinition;
use crate::storage::{FileStorage, Storage, StorageConfig};

/// Version stamp written into every index directory.
pub const INDEX_VERSION: &str = "1.0";

/// File holding the version stamp.
pub const VERSION_FILE: &str = "index.version";

/// Stored copy of the definition an index was created with.
pub const DEFINITION_FILE: &str = "definition.json";

/// Root-level marker proving the previous session ended without a graceful
/// shutdown.
pub const CRASH_MARKER: &str = "indexing.crash-marker";

/// Directory names longer than this (root included) are replaced by a hash.
const PATH_BUDGET: usize = 230;

/// Hard per-name limit in bytes, independent of the root.
const MAX_NAME_BYTES: usize = 255;

/// How the previous session ended, as detected (or injected) at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupState {
    /// The previous session shut down gracefully.
    Clean,
    /// The previous session died without removing the crash marker.
    Unclean,
}

/// Configuration for opening a registry.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Directory every index lives under.
    pub root: PathBuf,

    /// Storage settings applied to each index directory.
    pub storage: StorageConfig,

    /// Engine every index is opened with.
    pub engine: Arc<dyn SegmentEngine>,
}

impl RegistryConfig {
    /// Configuration rooted at the given directory, with the flat engine.
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        RegistryConfig {
            root: root.into(),
            storage: StorageConfig::default(),
            engine: Arc::new(FlatEngine::default()),
        }
    }

    /// Replace the engine.
    pub fn with_engine(mut self, engine: Arc<dyn SegmentEngine>) -> Self {
        self.engine = engine;
        self
    }

    /// Replace the storage settings.
    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }
}

/// Held-open marker file whose removal signals a graceful shutdown.
#[derive(Debug)]
struct CrashMarker {
    path: PathBuf,
    armed: bool,
    _file: File,
}

impl CrashMarker {
    fn engage(root: &Path) -> Result<CrashMarker> {
        let path = root.join(CRASH_MARKER);
        let file = File::create(&path)?;
        Ok(CrashMarker {
            path,
            armed: true,
            _file: file,
        })
    }

    /// Leave the marker on disk so the next startup sees an unclean end.
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for CrashMarker {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("failed to remove {}: {e}", self.path.display());
        }
    }
}

/// The set of open indexes, keyed case-insensitively by name.
///
/// Opening the registry engages a crash marker for the lifetime of the
/// value; finding one already present means the previous session died and
/// every index opened this session gets validated before use.
#[derive(Debug)]
pub struct IndexRegistry {
    root: PathBuf,
    storage_config: StorageConfig,
    engine: Arc<dyn SegmentEngine>,
    indexes: AHashMap<String, Arc<IndexHandle>>,
    forced_validation: bool,
    marker: Option<CrashMarker>,
}

impl IndexRegistry {
    /// Open a registry, detecting how the previous session ended.
    pub fn open(config: RegistryConfig) -> Result<IndexRegistry> {
        fs::create_dir_all(&config.root)?;
        let startup = if config.root.join(CRASH_MARKER).exists() {
            StartupState::Unclean
        } else {
            StartupState::Clean
        };
        Self::open_with_startup(config, startup)
    }

    /// Open a registry with the startup detection outcome supplied by the
    /// caller.
    pub fn open_with_startup(
        config: RegistryConfig,
        startup: StartupState,
    ) -> Result<IndexRegistry> {
        fs::create_dir_all(&config.root)?;
        let forced_validation = startup == StartupState::Unclean;
        if forced_validation {
            warn!(
                "unclean shutdown detected under {}; every index opened this session will be validated",
                config.root.display()
            );
        }
        let marker = CrashMarker::engage(&config.root)?;

        Ok(IndexRegistry {
            root: config.root,
            storage_config: config.storage,
            engine: config.engine,
            indexes: AHashMap::new(),
            forced_validation,
            marker: Some(marker),
        })
    }

    /// Whether indexes opened this session get validated before use.
    pub fn forced_validation(&self) -> bool {
        self.forced_validation
    }

    /// The directory every index lives under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Open (or create) the index described by the definition and register
    /// it under its name.
    ///
    /// A structurally broken index is deleted and recreated once; if that
    /// also fails the error names the index and carries the cause.
    pub fn open_index(&mut self, definition: IndexDefinition) -> Result<Arc<IndexHandle>> {
        let trimmed = definition.name.trim();
        if trimmed.is_empty() {
            return Err(ShrikeError::invalid_argument("index name must not be empty"));
        }
        let key = trimmed.to_lowercase();
        if self.indexes.contains_key(&key) {
            return Err(ShrikeError::index(format!(
                "an index named '{trimmed}' is already registered"
            )));
        }

        let directory = self.root.join(fixup_index_name(&self.root, trimmed));
        let handle = match self.try_open(&definition, &directory) {
            Ok(handle) => handle,
            Err(first) => {
                warn!(
                    "failed to open index '{trimmed}': {first}; resetting {}",
                    directory.display()
                );
                if directory.exists() {
                    if let Err(e) = fs::remove_dir_all(&directory) {
                        return Err(ShrikeError::initialization(trimmed, e.into()));
                    }
                }
                match self.try_open(&definition, &directory) {
                    Ok(handle) => handle,
                    Err(second) => {
                        return Err(ShrikeError::initialization(trimmed, second));
                    }
                }
            }
        };

        let handle = Arc::new(handle);
        self.indexes.insert(key, Arc::clone(&handle));
        Ok(handle)
    }

    /// Look up an open index by name, case-insensitively.
    pub fn get(&self, name: &str) -> Option<Arc<IndexHandle>> {
        self.indexes.get(&name.trim().to_lowercase()).cloned()
    }

    /// Names of every open index, sorted.
    pub fn index_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .indexes
            .values()
            .map(|handle| handle.name().to_string())
            .collect();
        names.sort_unstable();
        names
    }

    /// Number of open indexes.
    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    /// Whether no index is open.
    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// Close every index, best-effort, and aggregate whatever failed.
    ///
    /// One index's failure never stops the others. The crash marker is
    /// removed only when every step succeeded; otherwise it stays on disk
    /// and the next startup runs with forced validation.
    pub fn close(&mut self) -> CloseReport {
        let mut report = CloseReport::default();
        for (_, handle) in self.indexes.drain() {
            let name = handle.name().to_string();
            report.absorb(&name, handle.close());
        }

        match self.marker.take() {
            Some(mut marker) if !report.is_clean() => {
                warn!(
                    "shutdown finished with {} failure(s); leaving {CRASH_MARKER} in place",
                    report.failures.len()
                );
                marker.disarm();
            }
            _ => {}
        }
        report
    }

    /// Run the open protocol against one index directory.
    fn try_open(&self, definition: &IndexDefinition, directory: &Path) -> Result<IndexHandle> {
        let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(
            directory,
            self.storage_config.clone(),
        )?);

        if !self.engine.index_exists(storage.as_ref()) {
            self.engine.create_index(storage.as_ref())?;
            write_text(storage.as_ref(), VERSION_FILE, INDEX_VERSION)?;
            info!(
                "created index '{}' at {}",
                definition.name,
                directory.display()
            );
        } else {
            let version = read_text(storage.as_ref(), VERSION_FILE)?;
            if version.trim() != INDEX_VERSION {
                return Err(ShrikeError::storage(format!(
                    "index version mismatch on {}: found '{}', expected '{INDEX_VERSION}'",
                    directory.display(),
                    version.trim()
                )));
            }
            if storage.file_exists(WRITE_LOCK_NAME) {
                warn!(
                    "clearing stale {WRITE_LOCK_NAME} on {}",
                    directory.display()
                );
                self.engine.force_unlock(storage.as_ref())?;
            }
            if storage.file_exists(WRITING_LOCK_NAME) {
                self.recover_interrupted_write(definition, storage.as_ref(), directory)?;
            }
        }

        write_definition(storage.as_ref(), definition)?;
        IndexHandle::open(definition.clone(), storage, Arc::clone(&self.engine))
    }

    /// Deal with an advisory lock left behind by an interrupted mutation.
    fn recover_interrupted_write(
        &self,
        definition: &IndexDefinition,
        storage: &dyn Storage,
        directory: &Path,
    ) -> Result<()> {
        if self.forced_validation {
            return Err(ShrikeError::index(format!(
                "rude shutdown detected on: {}",
                directory.display()
            )));
        }

        info!(
            target: "shrike::startup",
            "found {WRITING_LOCK_NAME} on '{}'; validating segments",
            definition.name
        );
        let started = Instant::now();
        let report = self.engine.check_index(storage)?;
        if report.clean {
            info!(
                target: "shrike::startup",
                "index '{}' checked out clean in {:?}",
                definition.name,
                started.elapsed()
            );
        } else {
            warn!(
                target: "shrike::startup",
                "index '{}' failed validation in {:?}: {report}",
                definition.name,
                started.elapsed()
            );
            let dropped = self.engine.repair_index(storage, &report)?;
            info!(
                target: "shrike::startup",
                "repaired index '{}': dropped {dropped} segment(s)",
                definition.name
            );
        }
        storage.delete_file(WRITING_LOCK_NAME)?;
        Ok(())
    }
}

/// Map an index name to a directory name that fits the filesystem.
///
/// Short names pass through trimmed. A name that would push the full path
/// past the budget, or that is itself too long, is replaced by the
/// url-safe base64 form of its sha-256 digest, which is fixed-length and
/// deterministic.
pub fn fixup_index_name(root: &Path, name: &str) -> String {
    let name = name.trim();
    let root_len = root.as_os_str().len();
    if root_len + name.len() > PATH_BUDGET || name.len() >= MAX_NAME_BYTES {
        let digest = Sha256::digest(name.as_bytes());
        return URL_SAFE_NO_PAD.encode(digest);
    }
    name.to_string()
}

fn write_text(storage: &dyn Storage, name: &str, text: &str) -> Result<()> {
    let mut output = storage.create_output(name)?;
    output.write_all(text.as_bytes())?;
    output.close()
}

fn read_text(storage: &dyn Storage, name: &str) -> Result<String> {
    let mut input = storage.open_input(name)?;
    let mut text = String::new();
    input.read_to_string(&mut text)?;
    input.close()?;
    Ok(text)
}

fn write_definition(storage: &dyn Storage, definition: &IndexDefinition) -> Result<()> {
    let json = serde_json::to_vec_pretty(definition)?;
    let mut output = storage.create_output(DEFINITION_FILE)?;
    output.write_all(&json)?;
    output.close()
}
