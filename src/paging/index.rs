//! Sidecar page index
//!
//! The index is a text file with one `L<page>:<offset>\n` record for every
//! page after the first, giving the byte offset the page starts at. Page 0
//! always starts at offset 0 and has no record.

use alloc::format;
use alloc::vec::Vec;
use core::fmt;

use crate::config::storage::READ_BLOCK;
use crate::paging::layout::{CellReader, LineWrapper, PageLayout, Placement};
use crate::storage::traits::{Storage, StorageError};

/// Errors from building or reading documents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagingError {
    /// Source document missing
    NotFound,
    /// JSON could not be parsed or lacks the text field
    InvalidJson,
    Storage(StorageError),
}

impl From<StorageError> for PagingError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound => Self::NotFound,
            other => Self::Storage(other),
        }
    }
}

impl fmt::Display for PagingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "document not found"),
            Self::InvalidJson => write!(f, "document has no text to display"),
            Self::Storage(e) => write!(f, "storage: {}", e),
        }
    }
}

/// Parse one index record
pub fn parse_record(line: &[u8]) -> Option<(u32, usize)> {
    let line = core::str::from_utf8(line).ok()?.trim_end_matches('\r');
    let rest = line.strip_prefix('L')?;
    let (page, offset) = rest.split_once(':')?;
    Some((page.parse().ok()?, offset.parse().ok()?))
}

/// Scan `source` once and write the page index to `index_path`.
///
/// Returns the number of records written, which is also the highest page
/// number.
pub fn build_index<S: Storage>(
    storage: &mut S,
    source: &str,
    index_path: &str,
    layout: PageLayout,
) -> Result<u32, PagingError> {
    if !storage.exists(source) {
        return Err(PagingError::NotFound);
    }

    let mut records: Vec<(u32, usize)> = Vec::new();
    {
        let mut reader = CellReader::new(storage, source, 0);
        let mut wrapper = LineWrapper::new(layout);
        while let Some((offset, cell)) = reader.next_cell()? {
            if wrapper.place(&cell) == Placement::PageFull {
                records.push((records.len() as u32 + 1, offset));
                wrapper.reset();
                wrapper.place(&cell);
            }
        }
    }

    let mut writer = storage.create(index_path)?;
    let mut pending = Vec::with_capacity(READ_BLOCK);
    let mut result = Ok(());
    for (page, offset) in &records {
        pending.extend_from_slice(format!("L{}:{}\n", page, offset).as_bytes());
        if pending.len() >= READ_BLOCK {
            result = storage.append(&mut writer, &pending);
            pending.clear();
            if result.is_err() {
                break;
            }
        }
    }
    if result.is_ok() && !pending.is_empty() {
        result = storage.append(&mut writer, &pending);
    }
    storage.close(writer)?;
    result?;

    log::info!("index: {} -> {} ({} pages)", source, index_path, records.len() + 1);
    Ok(records.len() as u32)
}

/// What the index says about one page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexLookup {
    /// Start offset of the requested page, 0 if it has no record
    pub offset: usize,
    /// Highest page number recorded
    pub last_page: u32,
}

/// Look up `page` and the page count in one pass over the index.
///
/// A missing index reads as a single page.
pub fn lookup<S: Storage>(storage: &mut S, index_path: &str, page: u32) -> Result<IndexLookup, PagingError> {
    let mut result = IndexLookup {
        offset: 0,
        last_page: 0,
    };
    if !storage.exists(index_path) {
        log::warn!("index: {} missing", index_path);
        return Ok(result);
    }

    let mut found = false;
    for_each_line(storage, index_path, |line| {
        if let Some((n, offset)) = parse_record(line) {
            if n == page && page != 0 && !found {
                result.offset = offset;
                found = true;
            }
            result.last_page = result.last_page.max(n);
        }
    })?;
    Ok(result)
}

/// Byte offset of `page`
pub fn page_offset<S: Storage>(storage: &mut S, index_path: &str, page: u32) -> Result<usize, PagingError> {
    lookup(storage, index_path, page).map(|l| l.offset)
}

/// Highest page number in the index
pub fn total_pages<S: Storage>(storage: &mut S, index_path: &str) -> Result<u32, PagingError> {
    lookup(storage, index_path, 0).map(|l| l.last_page)
}

/// Stream the lines of a small text file without loading it whole
fn for_each_line<S: Storage>(
    storage: &mut S,
    path: &str,
    mut f: impl FnMut(&[u8]),
) -> Result<(), StorageError> {
    let mut block = [0u8; READ_BLOCK];
    let mut line: Vec<u8> = Vec::new();
    let mut offset = 0;
    loop {
        let n = storage.read_at(path, offset, &mut block)?;
        if n == 0 {
            break;
        }
        offset += n;
        for &byte in &block[..n] {
            if byte == b'\n' {
                f(&line);
                line.clear();
            } else {
                line.push(byte);
            }
        }
    }
    if !line.is_empty() {
        f(&line);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::traits::mock::MemoryStorage;
    use alloc::string::String;

    const SMALL: PageLayout = PageLayout::new(2, 10);

    #[test]
    fn test_parse_record() {
        assert_eq!(parse_record(b"L3:1200"), Some((3, 1200)));
        assert_eq!(parse_record(b"L12:7\r"), Some((12, 7)));
        assert_eq!(parse_record(b"X3:1200"), None);
        assert_eq!(parse_record(b"L3"), None);
        assert_eq!(parse_record(b"Lx:5"), None);
    }

    #[test]
    fn test_build_index_records_page_starts() {
        // Two lines per page, one line per "lineN\n"
        let text = "line0\nline1\nline2\nline3\nline4\n";
        let mut storage = MemoryStorage::new().with_file("/b.txt", text.as_bytes());

        let last = build_index(&mut storage, "/b.txt", "/b.txt.sy", SMALL).unwrap();
        assert_eq!(last, 2);
        assert_eq!(
            storage.contents("/b.txt.sy"),
            Some(&b"L1:12\nL2:24\n"[..])
        );
    }

    #[test]
    fn test_single_page_document_has_empty_index() {
        let mut storage = MemoryStorage::new().with_file("/s.txt", b"short");
        assert_eq!(build_index(&mut storage, "/s.txt", "/s.txt.sy", SMALL).unwrap(), 0);
        assert_eq!(storage.contents("/s.txt.sy"), Some(&b""[..]));
        assert_eq!(total_pages(&mut storage, "/s.txt.sy").unwrap(), 0);
    }

    #[test]
    fn test_exactly_full_page_has_no_trailing_empty_page() {
        let mut storage = MemoryStorage::new().with_file("/f.txt", b"aaaa\nbbbb\n");
        assert_eq!(build_index(&mut storage, "/f.txt", "/f.sy", SMALL).unwrap(), 0);
    }

    #[test]
    fn test_total_matches_record_count() {
        let mut text = String::new();
        for i in 0..50 {
            text.push_str(&format!("row {}\n", i));
        }
        let mut storage = MemoryStorage::new().with_file("/n.txt", text.as_bytes());
        let last = build_index(&mut storage, "/n.txt", "/n.sy", SMALL).unwrap();

        let records = storage
            .contents("/n.sy")
            .unwrap()
            .split(|&b| b == b'\n')
            .filter(|l| l.starts_with(b"L"))
            .count() as u32;
        assert_eq!(last, records);
        assert_eq!(total_pages(&mut storage, "/n.sy").unwrap(), records);
        assert_eq!(last, 24);
    }

    #[test]
    fn test_lookup() {
        let mut storage = MemoryStorage::new().with_file("/x.sy", b"L1:100\nL2:250\nL3:400\n");

        assert_eq!(
            lookup(&mut storage, "/x.sy", 2).unwrap(),
            IndexLookup {
                offset: 250,
                last_page: 3
            }
        );
        assert_eq!(page_offset(&mut storage, "/x.sy", 0).unwrap(), 0);
        assert_eq!(page_offset(&mut storage, "/x.sy", 9).unwrap(), 0);
    }

    #[test]
    fn test_missing_index_reads_as_one_page() {
        let mut storage = MemoryStorage::new();
        assert_eq!(total_pages(&mut storage, "/none.sy").unwrap(), 0);
        assert_eq!(page_offset(&mut storage, "/none.sy", 4).unwrap(), 0);
    }

    #[test]
    fn test_missing_source() {
        let mut storage = MemoryStorage::new();
        assert_eq!(
            build_index(&mut storage, "/none.txt", "/none.sy", SMALL),
            Err(PagingError::NotFound)
        );
    }
}
