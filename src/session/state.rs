//! Session state shared by the BLE, capture and controller tasks

use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::image::transfer::ImageTransfer;

/// Phone link state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connection {
    Disconnected,
    /// Connected; `generation` increments on every new connection
    Connected { generation: u32 },
}

/// What the display is currently paging through
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DisplayMode {
    #[default]
    None,
    Text(String),
    Json(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DisplayState {
    pub mode: DisplayMode,
    pub page: u32,
}

/// All per-connection state.
///
/// `file_name` and `file_data` shadow the last value written to the name and
/// data characteristics; the control characteristic reads them.
#[derive(Debug)]
pub struct SessionState {
    connection: Connection,
    generation: u32,
    pub display: DisplayState,
    pub file_name: String,
    pub file_data: Vec<u8>,
    pub image: ImageTransfer,
}

impl SessionState {
    pub const fn new() -> Self {
        Self {
            connection: Connection::Disconnected,
            generation: 0,
            display: DisplayState {
                mode: DisplayMode::None,
                page: 0,
            },
            file_name: String::new(),
            file_data: Vec::new(),
            image: ImageTransfer::Idle,
        }
    }

    pub fn connection(&self) -> Connection {
        self.connection
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.connection, Connection::Connected { .. })
    }

    /// Generation of the current (or most recent) connection
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Start a new connection. A prepared image from an earlier connection
    /// is dropped; a capture still running will be discarded on completion
    /// because its generation no longer matches.
    pub fn connect(&mut self) -> u32 {
        self.generation = self.generation.wrapping_add(1);
        self.connection = Connection::Connected {
            generation: self.generation,
        };
        self.image.release();
        self.generation
    }

    /// End the connection. Returns true if a prepared image was freed.
    pub fn disconnect(&mut self) -> bool {
        self.connection = Connection::Disconnected;
        self.file_data = Vec::new();
        self.image.release()
    }

    /// Switch the display to a new document at page 0
    pub fn open_document(&mut self, mode: DisplayMode) {
        self.display = DisplayState { mode, page: 0 };
    }

    /// Advance the page of the current document. Returns false if nothing is
    /// being displayed.
    pub fn next_page(&mut self) -> bool {
        if self.display.mode == DisplayMode::None {
            return false;
        }
        self.display.page = self.display.page.saturating_add(1);
        true
    }

    /// Step back one page, stopping at 0
    pub fn previous_page(&mut self) -> bool {
        if self.display.mode == DisplayMode::None {
            return false;
        }
        self.display.page = self.display.page.saturating_sub(1);
        true
    }

    /// Wrap the page counter to 0 if it ran past the end of the document
    /// that is still being displayed.
    pub fn clamp_page(&mut self, mode: &DisplayMode, last_page: u32) {
        if &self.display.mode == mode && self.display.page > last_page {
            self.display.page = 0;
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Session state behind a critical-section mutex. Every lock is short and
/// performs no I/O.
pub type SharedSession = Mutex<CriticalSectionRawMutex, RefCell<SessionState>>;

pub const fn new_shared_session() -> SharedSession {
    Mutex::new(RefCell::new(SessionState::new()))
}

/// Run `f` with exclusive access to the session
pub fn with_session<R>(session: &SharedSession, f: impl FnOnce(&mut SessionState) -> R) -> R {
    session.lock(|cell| f(&mut cell.borrow_mut()))
}
