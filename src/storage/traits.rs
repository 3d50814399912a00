//! Storage trait for the SD card filesystem
//!
//! The card is driven by blocking SPI transactions, so the trait is
//! synchronous. Callers share it between tasks through an async mutex.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::config::storage::MOUNT_PREFIX;

/// Errors from filesystem operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// File or directory does not exist
    NotFound,
    /// Path names a directory where a file was expected
    IsDirectory,
    /// Name cannot be represented on the card
    InvalidName,
    /// Card or volume is full
    Full,
    /// File is larger than the caller allows
    TooLarge,
    /// Buffer allocation failed
    OutOfMemory,
    /// Underlying block device or FAT error
    Io,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::IsDirectory => write!(f, "is a directory"),
            Self::InvalidName => write!(f, "invalid file name"),
            Self::Full => write!(f, "storage full"),
            Self::TooLarge => write!(f, "file too large"),
            Self::OutOfMemory => write!(f, "out of memory"),
            Self::Io => write!(f, "i/o error"),
        }
    }
}

/// Filesystem operations used by the firmware.
///
/// Paths are absolute (`/json/a.json`). Writes always truncate: there is no
/// way to reopen a file for append, so a file is written through exactly one
/// [`Storage::Writer`] from [`create`](Storage::create) to
/// [`close`](Storage::close).
pub trait Storage {
    /// Handle to a file open for writing
    type Writer;

    fn exists(&mut self, path: &str) -> bool;

    fn is_dir(&mut self, path: &str) -> bool;

    /// File length in bytes
    fn size(&mut self, path: &str) -> Result<usize, StorageError>;

    /// Read up to `buf.len()` bytes starting at `offset`. Returns 0 at EOF.
    fn read_at(&mut self, path: &str, offset: usize, buf: &mut [u8])
        -> Result<usize, StorageError>;

    /// Create or truncate `path` for writing
    fn create(&mut self, path: &str) -> Result<Self::Writer, StorageError>;

    fn append(&mut self, writer: &mut Self::Writer, data: &[u8]) -> Result<(), StorageError>;

    fn close(&mut self, writer: Self::Writer) -> Result<(), StorageError>;

    fn remove(&mut self, path: &str) -> Result<(), StorageError>;

    /// Absolute paths of the regular files directly inside `dir`
    fn list(&mut self, dir: &str) -> Result<Vec<String>, StorageError>;
}

/// Read a whole file into memory, refusing files longer than `max`.
pub fn read_to_vec<S: Storage>(
    storage: &mut S,
    path: &str,
    max: usize,
) -> Result<Vec<u8>, StorageError> {
    let len = storage.size(path)?;
    if len > max {
        return Err(StorageError::TooLarge);
    }

    let mut data = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|_| StorageError::OutOfMemory)?;
    data.resize(len, 0);

    let mut filled = 0;
    while filled < len {
        let n = storage.read_at(path, filled, &mut data[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    data.truncate(filled);
    Ok(data)
}

/// Create `path` holding exactly `data`
pub fn write_file<S: Storage>(storage: &mut S, path: &str, data: &[u8]) -> Result<(), StorageError> {
    let mut writer = storage.create(path)?;
    let appended = storage.append(&mut writer, data);
    let closed = storage.close(writer);
    appended.and(closed)
}

/// Turn a name written by the phone into an absolute card path.
///
/// The app addresses files under the `/sdcard` mount point and sometimes
/// omits the leading slash.
pub fn normalize_path(name: &str) -> String {
    let name = name.trim_end_matches('\0').trim();
    let name = match name.strip_prefix(MOUNT_PREFIX) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => name,
    };
    if name.starts_with('/') {
        String::from(name)
    } else {
        alloc::format!("/{}", name)
    }
}

/// File name component of a path
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}


#[cfg(test)]
mod tests {
    use super::mock::MemoryStorage;
    use super::*;

    #[test]
    fn test_read_to_vec() {
        let mut storage = MemoryStorage::new().with_file("/a.txt", b"abcdef");
        assert_eq!(read_to_vec(&mut storage, "/a.txt", 64).unwrap(), b"abcdef");
    }

    #[test]
    fn test_read_to_vec_limits() {
        let mut storage = MemoryStorage::new().with_file("/a.txt", b"abcdef");
        assert_eq!(
            read_to_vec(&mut storage, "/a.txt", 3),
            Err(StorageError::TooLarge)
        );
        assert_eq!(
            read_to_vec(&mut storage, "/missing", 3),
            Err(StorageError::NotFound)
        );
    }

    #[test]
    fn test_write_file_and_list() {
        let mut storage = MemoryStorage::new();
        write_file(&mut storage, "/json/a.json", b"{}").unwrap();
        write_file(&mut storage, "/json/b.json", b"[]").unwrap();
        write_file(&mut storage, "/json/sub/c.json", b"1").unwrap();

        let listed = storage.list("/json").unwrap();
        assert_eq!(listed, ["/json/a.json", "/json/b.json"]);
        assert_eq!(storage.open_writers(), 0);
        assert!(storage.is_dir("/json"));
        assert_eq!(storage.size("/json"), Err(StorageError::IsDirectory));
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/sdcard/an/1.json"), "/an/1.json");
        assert_eq!(normalize_path("book.txt"), "/book.txt");
        assert_eq!(normalize_path("/json/a.json\0\0"), "/json/a.json");
        assert_eq!(normalize_path("/sdcardx/a.txt"), "/sdcardx/a.txt");
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("/picture/IMG_0001.jpg"), "IMG_0001.jpg");
        assert_eq!(file_name("book.txt"), "book.txt");
    }
}
