//! Single-slot guard for the file currently being written
//!
//! Only one upload can be open at a time. Starting a new one closes the
//! previous handle first, and appends with nothing open are dropped.

use alloc::string::String;

use crate::storage::traits::{Storage, StorageError};

/// Outcome of an append through the guard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written(usize),
    /// No file was open, data discarded
    NotOpen,
}

struct OpenFile<W> {
    path: String,
    writer: W,
    written: usize,
}

/// Holder of the one writable file handle
pub struct ActiveFile<S: Storage> {
    slot: Option<OpenFile<S::Writer>>,
}

impl<S: Storage> ActiveFile<S> {
    pub const fn new() -> Self {
        Self { slot: None }
    }

    /// Close any open handle, then create `path` for writing.
    ///
    /// If creation fails the slot stays empty and later appends are no-ops.
    pub fn start_write(&mut self, storage: &mut S, path: &str) -> Result<(), StorageError> {
        if let Some(previous) = self.slot.take() {
            log::warn!(
                "start_write: closing unfinished {} ({} bytes)",
                previous.path,
                previous.written
            );
            if let Err(e) = storage.close(previous.writer) {
                log::error!("start_write: close {} failed: {}", previous.path, e);
            }
        }

        let writer = storage.create(path).map_err(|e| {
            log::error!("start_write: open {} failed: {}", path, e);
            e
        })?;
        self.slot = Some(OpenFile {
            path: String::from(path),
            writer,
            written: 0,
        });
        Ok(())
    }

    /// Append to the open file, or log and drop the data if nothing is open.
    pub fn update_write(&mut self, storage: &mut S, data: &[u8]) -> Result<WriteOutcome, StorageError> {
        let Some(open) = self.slot.as_mut() else {
            log::warn!("update_write: file not opened, dropping {} bytes", data.len());
            return Ok(WriteOutcome::NotOpen);
        };

        storage.append(&mut open.writer, data).map_err(|e| {
            log::error!("update_write: {} short write: {}", open.path, e);
            e
        })?;
        open.written += data.len();
        Ok(WriteOutcome::Written(data.len()))
    }

    /// Close the open file. Returns its path and length, or `None` if nothing
    /// was open.
    pub fn end_write(&mut self, storage: &mut S) -> Result<Option<(String, usize)>, StorageError> {
        let Some(open) = self.slot.take() else {
            log::warn!("end_write: file not opened");
            return Ok(None);
        };
        storage.close(open.writer)?;
        log::info!("end_write: {} ({} bytes)", open.path, open.written);
        Ok(Some((open.path, open.written)))
    }

    /// Close and delete a half-written file
    pub fn abort(&mut self, storage: &mut S) -> Option<String> {
        let open = self.slot.take()?;
        if let Err(e) = storage.close(open.writer) {
            log::error!("abort: close {} failed: {}", open.path, e);
        }
        if let Err(e) = storage.remove(&open.path) {
            log::warn!("abort: remove {} failed: {}", open.path, e);
        }
        log::info!("abort: discarded partial {}", open.path);
        Some(open.path)
    }

    pub fn is_open(&self) -> bool {
        self.slot.is_some()
    }

    pub fn path(&self) -> Option<&str> {
        self.slot.as_ref().map(|open| open.path.as_str())
    }
}

impl<S: Storage> Default for ActiveFile<S> {
    fn default() -> Self {
        Self::new()
    }
}
