//! Paged text rendering
//!
//! Documents are laid out in fixed pages of display lines. A sidecar index
//! maps each page to its byte offset so a page can be rendered without
//! rescanning the file from the start.

pub mod document;
pub mod index;
pub mod layout;

pub use document::{extract_json, DocumentKind, PagedDocument, RenderedPage};
pub use index::{build_index, lookup, page_offset, total_pages, IndexLookup, PagingError};
pub use layout::{LineWrapper, PageLayout};
