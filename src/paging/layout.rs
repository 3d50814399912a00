//! Line wrapping for the text display
//!
//! Text is laid out in display cells. A lead byte in `0xB0..=0xF7` starts a
//! three-byte wide character (the display assumes all non-ASCII text is
//! three-byte UTF-8), every other byte except `\n` is one narrow cell.
//! The same [`LineWrapper`] drives both index construction and page
//! rendering so a page always starts exactly where the index says it does.

use crate::config::storage::READ_BLOCK;
use crate::config::text::{LINES_PER_PAGE, LINE_BYTES};
use crate::storage::traits::{Storage, StorageError};

/// Page geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLayout {
    pub lines_per_page: usize,
    /// Byte budget of one line
    pub line_bytes: usize,
}

impl PageLayout {
    pub const fn new(lines_per_page: usize, line_bytes: usize) -> Self {
        Self {
            lines_per_page,
            line_bytes,
        }
    }
}

impl Default for PageLayout {
    fn default() -> Self {
        Self::new(LINES_PER_PAGE, LINE_BYTES)
    }
}

/// Returns true if `byte` starts a wide (three-byte) character
pub fn is_wide_lead(byte: u8) -> bool {
    (0xB0..=0xF7).contains(&byte)
}

/// One display cell read from the source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Newline,
    Narrow(u8),
    /// Wide character; `len` is 3 unless the file ends mid-character
    Wide { bytes: [u8; 3], len: u8 },
}

impl Cell {
    /// Bytes the cell occupies in the file
    pub fn encoded_len(&self) -> usize {
        match self {
            Self::Newline | Self::Narrow(_) => 1,
            Self::Wide { len, .. } => *len as usize,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            Self::Newline => b"\n",
            Self::Narrow(b) => core::slice::from_ref(b),
            Self::Wide { bytes, len } => &bytes[..*len as usize],
        }
    }
}

/// Where a cell went
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Cell placed on `line` (for a newline: the line it terminated)
    Placed { line: usize },
    /// The page is full; the cell belongs to the next page and was not consumed
    PageFull,
}

/// Line/column state for one page
#[derive(Debug, Clone)]
pub struct LineWrapper {
    layout: PageLayout,
    line: usize,
    col: usize,
}

impl LineWrapper {
    pub fn new(layout: PageLayout) -> Self {
        Self {
            layout,
            line: 0,
            col: 0,
        }
    }

    /// Start a new page
    pub fn reset(&mut self) {
        self.line = 0;
        self.col = 0;
    }

    pub fn is_full(&self) -> bool {
        self.line >= self.layout.lines_per_page
    }

    fn break_line(&mut self) {
        self.line += 1;
        self.col = 0;
    }

    /// Place one cell.
    ///
    /// A wide character is never split: it moves to the next line when its
    /// three bytes do not fit in the remaining budget. A line also ends as
    /// soon as its budget is used up.
    pub fn place(&mut self, cell: &Cell) -> Placement {
        if self.is_full() {
            return Placement::PageFull;
        }

        let width = match cell {
            Cell::Newline => {
                let line = self.line;
                self.break_line();
                return Placement::Placed { line };
            }
            Cell::Narrow(_) => 1,
            Cell::Wide { .. } => 3,
        };

        if self.col + width > self.layout.line_bytes && self.col > 0 {
            self.break_line();
            if self.is_full() {
                return Placement::PageFull;
            }
        }

        let line = self.line;
        self.col += width;
        if self.col >= self.layout.line_bytes {
            self.break_line();
        }
        Placement::Placed { line }
    }
}

/// Buffered cell reader over a stored file
pub struct CellReader<'a, S: Storage> {
    storage: &'a mut S,
    path: &'a str,
    buf: [u8; READ_BLOCK],
    /// File offset of `buf[0]`
    base: usize,
    pos: usize,
    len: usize,
    eof: bool,
}

impl<'a, S: Storage> CellReader<'a, S> {
    pub fn new(storage: &'a mut S, path: &'a str, offset: usize) -> Self {
        Self {
            storage,
            path,
            buf: [0; READ_BLOCK],
            base: offset,
            pos: 0,
            len: 0,
            eof: false,
        }
    }

    /// File offset of the next unread byte
    pub fn offset(&self) -> usize {
        self.base + self.pos
    }

    fn next_byte(&mut self) -> Result<Option<u8>, StorageError> {
        if self.pos == self.len {
            if self.eof {
                return Ok(None);
            }
            self.base += self.len;
            self.pos = 0;
            self.len = self.storage.read_at(self.path, self.base, &mut self.buf)?;
            if self.len == 0 {
                self.eof = true;
                return Ok(None);
            }
        }
        let byte = self.buf[self.pos];
        self.pos += 1;
        Ok(Some(byte))
    }

    /// Next cell and the file offset it starts at
    pub fn next_cell(&mut self) -> Result<Option<(usize, Cell)>, StorageError> {
        let start = self.offset();
        let Some(lead) = self.next_byte()? else {
            return Ok(None);
        };

        let cell = if lead == b'\n' {
            Cell::Newline
        } else if is_wide_lead(lead) {
            let mut bytes = [lead, 0, 0];
            let mut len = 1u8;
            while (len as usize) < bytes.len() {
                match self.next_byte()? {
                    Some(b) => {
                        bytes[len as usize] = b;
                        len += 1;
                    }
                    None => break,
                }
            }
            Cell::Wide { bytes, len }
        } else {
            Cell::Narrow(lead)
        };
        Ok(Some((start, cell)))
    }
}
