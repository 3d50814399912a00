//! File upload session
//!
//! The phone uploads a file in three phases on the file control
//! characteristic: `start` opens the file named on the name characteristic
//! and writes the data characteristic's current payload, each `update`
//! appends the current payload, and `end` closes the file. There is no size
//! negotiation or checksum; integrity is the phone's responsibility.

use alloc::string::String;
use alloc::vec::Vec;

use crate::storage::guard::{ActiveFile, WriteOutcome};
use crate::storage::traits::{normalize_path, Storage, StorageError};

/// One upload step, as queued by the GATT task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEvent {
    /// Open `name` and write `first_chunk` to it
    Start { name: String, first_chunk: Vec<u8> },
    /// Append a chunk
    Update(Vec<u8>),
    /// Close the file
    End,
    /// Connection lost: close and delete the partial file
    Abort,
}

/// Upload state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveState<'a> {
    Idle,
    Open { path: &'a str },
}

/// Result of applying one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Opened { path: String },
    Appended(usize),
    /// Data arrived with no file open and was dropped
    Ignored,
    Closed { path: String, len: usize },
    Aborted { path: String },
}

/// Drives the single upload slot
pub struct FileReceiveSession<S: Storage> {
    file: ActiveFile<S>,
}

impl<S: Storage> FileReceiveSession<S> {
    pub const fn new() -> Self {
        Self {
            file: ActiveFile::new(),
        }
    }

    pub fn state(&self) -> ReceiveState<'_> {
        match self.file.path() {
            Some(path) => ReceiveState::Open { path },
            None => ReceiveState::Idle,
        }
    }

    /// Apply one event.
    ///
    /// A `Start` while a file is open closes the old file first. Out-of-order
    /// events (`Update` or `End` with nothing open) are logged no-ops.
    pub fn apply(&mut self, storage: &mut S, event: FileEvent) -> Result<FileOutcome, StorageError> {
        match event {
            FileEvent::Start { name, first_chunk } => {
                let path = normalize_path(&name);
                log::info!("file: receiving {}", path);
                self.file.start_write(storage, &path)?;
                if !first_chunk.is_empty() {
                    self.file.update_write(storage, &first_chunk)?;
                }
                Ok(FileOutcome::Opened { path })
            }
            FileEvent::Update(data) => match self.file.update_write(storage, &data)? {
                WriteOutcome::Written(n) => Ok(FileOutcome::Appended(n)),
                WriteOutcome::NotOpen => Ok(FileOutcome::Ignored),
            },
            FileEvent::End => match self.file.end_write(storage)? {
                Some((path, len)) => Ok(FileOutcome::Closed { path, len }),
                None => Ok(FileOutcome::Ignored),
            },
            FileEvent::Abort => match self.file.abort(storage) {
                Some(path) => Ok(FileOutcome::Aborted { path }),
                None => Ok(FileOutcome::Ignored),
            },
        }
    }
}

impl<S: Storage> Default for FileReceiveSession<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::traits::mock::MemoryStorage;
    use alloc::vec;

    fn start(name: &str, chunk: &[u8]) -> FileEvent {
        FileEvent::Start {
            name: String::from(name),
            first_chunk: chunk.to_vec(),
        }
    }

    #[test]
    fn test_upload_concatenates_chunks() {
        let mut storage = MemoryStorage::new();
        let mut session = FileReceiveSession::new();

        let chunks: [&[u8]; 4] = [b"Once ", b"upon ", b"a ", b"time"];
        session.apply(&mut storage, start("/novel/a.txt", chunks[0])).unwrap();
        assert_eq!(session.state(), ReceiveState::Open { path: "/novel/a.txt" });
        for chunk in &chunks[1..] {
            session
                .apply(&mut storage, FileEvent::Update(chunk.to_vec()))
                .unwrap();
        }
        let closed = session.apply(&mut storage, FileEvent::End).unwrap();

        assert_eq!(
            closed,
            FileOutcome::Closed {
                path: String::from("/novel/a.txt"),
                len: 16
            }
        );
        assert_eq!(storage.contents("/novel/a.txt"), Some(&b"Once upon a time"[..]));
        assert_eq!(session.state(), ReceiveState::Idle);
    }

    #[test]
    fn test_start_with_empty_payload() {
        let mut storage = MemoryStorage::new();
        let mut session = FileReceiveSession::new();

        session.apply(&mut storage, start("b.txt", b"")).unwrap();
        session
            .apply(&mut storage, FileEvent::Update(b"x".to_vec()))
            .unwrap();
        session.apply(&mut storage, FileEvent::End).unwrap();

        assert_eq!(storage.contents("/b.txt"), Some(&b"x"[..]));
    }

    #[test]
    fn test_mount_prefix_is_stripped() {
        let mut storage = MemoryStorage::new();
        let mut session = FileReceiveSession::new();

        let opened = session
            .apply(&mut storage, start("/sdcard/an/7.json", b"{}"))
            .unwrap();
        assert_eq!(
            opened,
            FileOutcome::Opened {
                path: String::from("/an/7.json")
            }
        );
    }

    #[test]
    fn test_update_before_start_is_ignored() {
        let mut storage = MemoryStorage::new();
        let mut session: FileReceiveSession<MemoryStorage> = FileReceiveSession::new();

        assert_eq!(
            session.apply(&mut storage, FileEvent::Update(vec![1, 2])),
            Ok(FileOutcome::Ignored)
        );
        assert_eq!(session.apply(&mut storage, FileEvent::End), Ok(FileOutcome::Ignored));
        assert!(storage.paths().is_empty());
    }

    #[test]
    fn test_second_start_closes_first_file() {
        let mut storage = MemoryStorage::new();
        let mut session = FileReceiveSession::new();

        session.apply(&mut storage, start("/a.txt", b"aaa")).unwrap();
        session.apply(&mut storage, start("/b.txt", b"bbb")).unwrap();
        session.apply(&mut storage, FileEvent::End).unwrap();

        assert_eq!(storage.contents("/a.txt"), Some(&b"aaa"[..]));
        assert_eq!(storage.contents("/b.txt"), Some(&b"bbb"[..]));
        assert_eq!(storage.open_writers(), 0);
    }

    #[test]
    fn test_abort_discards_partial_upload() {
        let mut storage = MemoryStorage::new();
        let mut session = FileReceiveSession::new();

        session.apply(&mut storage, start("/json/x.json", b"{\"a")).unwrap();
        assert_eq!(
            session.apply(&mut storage, FileEvent::Abort),
            Ok(FileOutcome::Aborted {
                path: String::from("/json/x.json")
            })
        );
        assert!(!storage.exists("/json/x.json"));
        assert_eq!(session.apply(&mut storage, FileEvent::Abort), Ok(FileOutcome::Ignored));
    }

    #[test]
    fn test_write_error_propagates() {
        let mut storage = MemoryStorage::new();
        let mut session = FileReceiveSession::new();

        session.apply(&mut storage, start("/a.txt", b"")).unwrap();
        storage.set_fail_append(true);
        assert_eq!(
            session.apply(&mut storage, FileEvent::Update(b"x".to_vec())),
            Err(StorageError::Full)
        );
    }
}
