//! In-memory storage backend, primarily for tests.

use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::error::{Result, ShrikeError};
use crate::storage::traits::{Storage, StorageConfig, StorageError, StorageInput, StorageOutput};

type FileMap = Arc<RwLock<AHashMap<String, Arc<Vec<u8>>>>>;

/// Storage that keeps all files in memory.
///
/// Reads see an immutable snapshot taken when the input is opened; an output
/// becomes visible atomically when it is flushed or closed.
pub struct MemoryStorage {
    files: FileMap,
    config: StorageConfig,
    closed: AtomicBool,
}

impl MemoryStorage {
    /// Create an empty in-memory storage.
    pub fn new(config: StorageConfig) -> Self {
        MemoryStorage {
            files: Arc::new(RwLock::new(AHashMap::new())),
            config,
            closed: AtomicBool::new(false),
        }
    }

    fn check_closed(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StorageError::StorageClosed.into());
        }
        Ok(())
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new(StorageConfig::default())
    }
}

impl std::fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStorage")
            .field("files", &self.files.read().len())
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

impl Storage for MemoryStorage {
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>> {
        self.check_closed()?;
        let data = self
            .files
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ShrikeError::from(StorageError::FileNotFound(name.to_string())))?;
        Ok(Box::new(MemoryInput {
            name: name.to_string(),
            data,
            position: 0,
        }))
    }

    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>> {
        self.check_closed()?;
        Ok(Box::new(MemoryOutput {
            name: name.to_string(),
            buffer: Vec::with_capacity(self.config.buffer_size),
            files: Arc::clone(&self.files),
        }))
    }

    fn file_exists(&self, name: &str) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }
        self.files.read().contains_key(name)
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        self.check_closed()?;
        self.files
            .write()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ShrikeError::from(StorageError::FileNotFound(name.to_string())))
    }

    fn list_files(&self) -> Result<Vec<String>> {
        self.check_closed()?;
        let mut names: Vec<String> = self.files.read().keys().cloned().collect();
        names.sort_unstable();
        Ok(names)
    }

    fn file_size(&self, name: &str) -> Result<u64> {
        self.check_closed()?;
        self.files
            .read()
            .get(name)
            .map(|data| data.len() as u64)
            .ok_or_else(|| ShrikeError::from(StorageError::FileNotFound(name.to_string())))
    }

    fn rename_file(&self, old_name: &str, new_name: &str) -> Result<()> {
        self.check_closed()?;
        let mut files = self.files.write();
        let data = files
            .remove(old_name)
            .ok_or_else(|| ShrikeError::from(StorageError::FileNotFound(old_name.to_string())))?;
        files.insert(new_name.to_string(), data);
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        self.check_closed()
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Reader over an immutable snapshot of one in-memory file.
struct MemoryInput {
    name: String,
    data: Arc<Vec<u8>>,
    position: u64,
}

impl std::fmt::Debug for MemoryInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryInput")
            .field("name", &self.name)
            .field("size", &self.data.len())
            .finish()
    }
}

impl Read for MemoryInput {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let start = self.position.min(self.data.len() as u64) as usize;
        let remaining = &self.data[start..];
        let count = remaining.len().min(buf.len());
        buf[..count].copy_from_slice(&remaining[..count]);
        self.position += count as u64;
        Ok(count)
    }
}

impl Seek for MemoryInput {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let size = self.data.len() as i64;
        let target = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::End(offset) => size + offset,
            SeekFrom::Current(offset) => self.position as i64 + offset,
        };
        if target < 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "seek before start",
            ));
        }
        self.position = target as u64;
        Ok(self.position)
    }
}

impl StorageInput for MemoryInput {
    fn size(&self) -> Result<u64> {
        Ok(self.data.len() as u64)
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Writer that publishes its buffer into the file map on flush or close.
struct MemoryOutput {
    name: String,
    buffer: Vec<u8>,
    files: FileMap,
}

impl MemoryOutput {
    fn publish(&self) {
        self.files
            .write()
            .insert(self.name.clone(), Arc::new(self.buffer.clone()));
    }
}

impl std::fmt::Debug for MemoryOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryOutput")
            .field("name", &self.name)
            .field("buffered", &self.buffer.len())
            .finish()
    }
}

impl Write for MemoryOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.publish();
        Ok(())
    }
}

impl StorageOutput for MemoryOutput {
    fn flush_and_sync(&mut self) -> Result<()> {
        self.publish();
        Ok(())
    }

    fn position(&self) -> Result<u64> {
        Ok(self.buffer.len() as u64)
    }

    fn close(&mut self) -> Result<()> {
        self.publish();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read_round_trip() {
        let storage = MemoryStorage::new(StorageConfig::default());

        let mut output = storage.create_output("data.bin").unwrap();
        output.write_all(b"in memory").unwrap();
        output.close().unwrap();

        let mut input = storage.open_input("data.bin").unwrap();
        let mut content = Vec::new();
        input.read_to_end(&mut content).unwrap();
        assert_eq!(content, b"in memory");
    }

    #[test]
    fn test_input_sees_snapshot() {
        let storage = MemoryStorage::new(StorageConfig::default());

        let mut output = storage.create_output("data.bin").unwrap();
        output.write_all(b"first").unwrap();
        output.close().unwrap();

        let mut input = storage.open_input("data.bin").unwrap();

        let mut output = storage.create_output("data.bin").unwrap();
        output.write_all(b"second!").unwrap();
        output.close().unwrap();

        let mut content = Vec::new();
        input.read_to_end(&mut content).unwrap();
        assert_eq!(content, b"first");
    }

    #[test]
    fn test_seek() {
        let storage = MemoryStorage::new(StorageConfig::default());
        let mut output = storage.create_output("data.bin").unwrap();
        output.write_all(b"0123456789").unwrap();
        output.close().unwrap();

        let mut input = storage.open_input("data.bin").unwrap();
        input.seek(SeekFrom::End(-4)).unwrap();
        let mut tail = String::new();
        input.read_to_string(&mut tail).unwrap();
        assert_eq!(tail, "6789");
    }

    #[test]
    fn test_rename_and_delete() {
        let storage = MemoryStorage::new(StorageConfig::default());
        storage.create_output("a").unwrap().close().unwrap();

        storage.rename_file("a", "b").unwrap();
        assert!(!storage.file_exists("a"));
        assert!(storage.file_exists("b"));

        storage.delete_file("b").unwrap();
        assert!(!storage.file_exists("b"));
        assert!(storage.delete_file("b").is_err());
    }

    #[test]
    fn test_operations_fail_after_close() {
        let storage = MemoryStorage::new(StorageConfig::default());
        storage.close().unwrap();
        assert!(storage.open_input("x").is_err());
        assert!(storage.list_files().is_err());
    }
}
