//! Paged documents
//!
//! A text document is paged directly. A JSON document first has its
//! `analysis_result` string extracted into `<name>.txt`, which is then paged
//! like any text file. The extracted text and the index are built once and
//! reused as long as they exist; they are not rebuilt when the source
//! changes.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use serde::Deserialize;

use crate::config::text::{EXTRACTED_SUFFIX, INDEX_SUFFIX, MAX_JSON_BYTES};
use crate::paging::index::{build_index, lookup, PagingError};
use crate::paging::layout::{Cell, CellReader, LineWrapper, PageLayout, Placement};
use crate::storage::traits::{read_to_vec, write_file, Storage};

/// Shape of an uploaded answer document
#[derive(Deserialize)]
struct AnalysisDocument {
    analysis_result: String,
}

/// Extract the display text of a JSON document into `text_path`
pub fn extract_json<S: Storage>(storage: &mut S, json_path: &str, text_path: &str) -> Result<usize, PagingError> {
    let raw = read_to_vec(storage, json_path, MAX_JSON_BYTES)?;
    let doc: AnalysisDocument = serde_json::from_slice(&raw).map_err(|e| {
        log::error!("json: {} unusable: {}", json_path, e);
        PagingError::InvalidJson
    })?;
    drop(raw);

    write_file(storage, text_path, doc.analysis_result.as_bytes())?;
    log::info!("json: extracted {} bytes to {}", doc.analysis_result.len(), text_path);
    Ok(doc.analysis_result.len())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Text,
    Json,
}

/// One rendered page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    /// Page actually rendered; 0 if the request ran past the end
    pub page: u32,
    /// Highest page number of the document
    pub last_page: u32,
    /// Exactly one entry per display line, unused lines empty
    pub lines: Vec<String>,
}

impl RenderedPage {
    /// The lines joined for the panel's content area
    pub fn content(&self) -> String {
        self.lines.join("\n")
    }

    /// Returns true if the requested page was past the end
    pub fn wrapped(&self, requested: u32) -> bool {
        requested != self.page
    }
}

/// A stored document with its derived files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagedDocument {
    kind: DocumentKind,
    source: String,
    text_path: String,
    index_path: String,
}

impl PagedDocument {
    pub fn text(path: &str) -> Self {
        Self {
            kind: DocumentKind::Text,
            source: String::from(path),
            text_path: String::from(path),
            index_path: format!("{}{}", path, INDEX_SUFFIX),
        }
    }

    pub fn json(path: &str) -> Self {
        Self {
            kind: DocumentKind::Json,
            source: String::from(path),
            text_path: format!("{}{}", path, EXTRACTED_SUFFIX),
            index_path: format!("{}{}", path, INDEX_SUFFIX),
        }
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn text_path(&self) -> &str {
        &self.text_path
    }

    pub fn index_path(&self) -> &str {
        &self.index_path
    }

    /// Make sure the text and index exist, creating whichever is missing
    pub fn prepare<S: Storage>(&self, storage: &mut S, layout: PageLayout) -> Result<(), PagingError> {
        if !storage.exists(&self.text_path) {
            match self.kind {
                DocumentKind::Text => {
                    log::warn!("document: {} does not exist", self.text_path);
                    return Err(PagingError::NotFound);
                }
                DocumentKind::Json => {
                    extract_json(storage, &self.source, &self.text_path)?;
                }
            }
        }

        if !storage.exists(&self.index_path) {
            log::info!("document: creating index {}", self.index_path);
            build_index(storage, &self.text_path, &self.index_path, layout)?;
        }
        Ok(())
    }

    /// Render one page. A page past the end renders page 0.
    pub fn render<S: Storage>(&self, storage: &mut S, page: u32, layout: PageLayout) -> Result<RenderedPage, PagingError> {
        self.prepare(storage, layout)?;

        let found = lookup(storage, &self.index_path, page)?;
        let page = if page > found.last_page { 0 } else { page };
        let lines = render_lines(storage, &self.text_path, found.offset, layout)?;

        Ok(RenderedPage {
            page,
            last_page: found.last_page,
            lines,
        })
    }
}

/// Lay out one page of text starting at `offset`
pub fn render_lines<S: Storage>(
    storage: &mut S,
    path: &str,
    offset: usize,
    layout: PageLayout,
) -> Result<Vec<String>, PagingError> {
    let mut raw: Vec<Vec<u8>> = (0..layout.lines_per_page).map(|_| Vec::new()).collect();
    let mut reader = CellReader::new(storage, path, offset);
    let mut wrapper = LineWrapper::new(layout);

    while let Some((_, cell)) = reader.next_cell()? {
        match wrapper.place(&cell) {
            Placement::PageFull => break,
            Placement::Placed { line } => {
                if cell != Cell::Newline {
                    raw[line].extend_from_slice(cell.bytes());
                }
            }
        }
        if wrapper.is_full() {
            break;
        }
    }

    Ok(raw
        .into_iter()
        .map(|line| String::from_utf8_lossy(&line).into_owned())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::traits::mock::MemoryStorage;

    const LAYOUT: PageLayout = PageLayout::new(6, 60);

    fn numbered_lines(n: usize) -> String {
        let mut text = String::new();
        for i in 0..n {
            text.push_str(&format!("line {}\n", i));
        }
        text
    }

    #[test]
    fn test_text_paths() {
        let doc = PagedDocument::text("/novel/book.txt");
        assert_eq!(doc.index_path(), "/novel/book.txt.sy");
        assert_eq!(doc.text_path(), "/novel/book.txt");

        let doc = PagedDocument::json("/json/a.json");
        assert_eq!(doc.text_path(), "/json/a.json.txt");
        assert_eq!(doc.index_path(), "/json/a.json.sy");
    }

    #[test]
    fn test_render_pages() {
        let mut storage = MemoryStorage::new().with_file("/b.txt", numbered_lines(14).as_bytes());
        let doc = PagedDocument::text("/b.txt");

        let first = doc.render(&mut storage, 0, LAYOUT).unwrap();
        assert_eq!(first.last_page, 2);
        assert_eq!(first.lines[0], "line 0");
        assert_eq!(first.lines[5], "line 5");

        let third = doc.render(&mut storage, 2, LAYOUT).unwrap();
        assert_eq!(third.page, 2);
        assert_eq!(third.lines[0], "line 12");
        assert_eq!(third.lines[1], "line 13");
        assert_eq!(third.lines[2], "");
        assert_eq!(third.lines.len(), 6);
    }

    #[test]
    fn test_render_is_idempotent() {
        let mut storage = MemoryStorage::new().with_file("/b.txt", numbered_lines(30).as_bytes());
        let doc = PagedDocument::text("/b.txt");

        let a = doc.render(&mut storage, 3, LAYOUT).unwrap();
        let b = doc.render(&mut storage, 3, LAYOUT).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_page_past_end_renders_first_page() {
        let mut storage = MemoryStorage::new().with_file("/b.txt", numbered_lines(8).as_bytes());
        let doc = PagedDocument::text("/b.txt");

        let page = doc.render(&mut storage, 7, LAYOUT).unwrap();
        assert_eq!(page.page, 0);
        assert!(page.wrapped(7));
        assert_eq!(page.lines[0], "line 0");
    }

    #[test]
    fn test_wide_text_wraps_without_splitting() {
        // 21 three-byte characters: 20 fit in 60 bytes, the 21st wraps
        let text: String = core::iter::repeat('中').take(21).collect();
        let mut storage = MemoryStorage::new().with_file("/c.txt", text.as_bytes());
        let doc = PagedDocument::text("/c.txt");

        let page = doc.render(&mut storage, 0, LAYOUT).unwrap();
        assert_eq!(page.lines[0].chars().count(), 20);
        assert_eq!(page.lines[1], "中");
    }

    #[test]
    fn test_long_line_wraps_at_budget() {
        let text: String = core::iter::repeat('a').take(130).collect();
        let mut storage = MemoryStorage::new().with_file("/l.txt", text.as_bytes());

        let lines = render_lines(&mut storage, "/l.txt", 0, LAYOUT).unwrap();
        assert_eq!(lines[0].len(), 60);
        assert_eq!(lines[1].len(), 60);
        assert_eq!(lines[2].len(), 10);
    }

    #[test]
    fn test_pages_cover_whole_text() {
        let text = numbered_lines(40);
        let mut storage = MemoryStorage::new().with_file("/b.txt", text.as_bytes());
        let doc = PagedDocument::text("/b.txt");

        let mut seen = Vec::new();
        let last = doc.render(&mut storage, 0, LAYOUT).unwrap().last_page;
        for p in 0..=last {
            let page = doc.render(&mut storage, p, LAYOUT).unwrap();
            seen.extend(page.lines.into_iter().filter(|l| !l.is_empty()));
        }
        let expected: Vec<String> = (0..40).map(|i| format!("line {}", i)).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_missing_text_document() {
        let mut storage = MemoryStorage::new();
        let doc = PagedDocument::text("/none.txt");
        assert_eq!(doc.render(&mut storage, 0, LAYOUT), Err(PagingError::NotFound));
        assert!(!storage.exists("/none.txt.sy"));
    }

    #[test]
    fn test_json_document_is_extracted_once() {
        let json = br#"{"id": 7, "analysis_result": "first line\nsecond line"}"#;
        let mut storage = MemoryStorage::new().with_file("/json/a.json", json);
        let doc = PagedDocument::json("/json/a.json");

        let page = doc.render(&mut storage, 0, LAYOUT).unwrap();
        assert_eq!(page.lines[0], "first line");
        assert_eq!(page.lines[1], "second line");
        assert_eq!(
            storage.contents("/json/a.json.txt"),
            Some(&b"first line\nsecond line"[..])
        );

        // A stale extraction is kept even after the source changes
        storage = storage.with_file("/json/a.json", br#"{"analysis_result": "changed"}"#);
        let page = doc.render(&mut storage, 0, LAYOUT).unwrap();
        assert_eq!(page.lines[0], "first line");
    }

    #[test]
    fn test_json_without_text_field() {
        let mut storage = MemoryStorage::new().with_file("/json/b.json", br#"{"other": 1}"#);
        let doc = PagedDocument::json("/json/b.json");
        assert_eq!(doc.render(&mut storage, 0, LAYOUT), Err(PagingError::InvalidJson));
        assert!(!storage.exists("/json/b.json.txt"));
    }

    #[test]
    fn test_missing_index_is_rebuilt() {
        let mut storage = MemoryStorage::new().with_file("/b.txt", numbered_lines(10).as_bytes());
        let doc = PagedDocument::text("/b.txt");
        doc.render(&mut storage, 0, LAYOUT).unwrap();

        storage.remove("/b.txt.sy").unwrap();
        let page = doc.render(&mut storage, 1, LAYOUT).unwrap();
        assert_eq!(page.lines[0], "line 6");
        assert!(storage.exists("/b.txt.sy"));
    }
}
