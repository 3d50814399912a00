//! Frame tags used on the panel link
//!
//! Inbound frames are classified by [`LinkTag`]. Outbound display updates are
//! built as [`PanelMessage`] values and encoded with [`PanelMessage::to_frame`].

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use crate::protocol::framing::{FrameError, FramedMessage};

/// Panel text shown while a phone is connected
pub const BLE_CONNECTED_TEXT: &str = "蓝牙\n已连接";

/// Panel text shown while no phone is connected
pub const BLE_DISCONNECTED_TEXT: &str = "蓝牙\n未连接";

/// Payload kinds carried on the link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkTag {
    /// `a` UTF-8 string
    String,
    /// `b` raw binary
    Binary,
    /// `c` RGB565 image
    Rgb565,
    /// `d` JPEG image
    Jpeg,
    /// `e` PNG image
    Png,
    /// `f` timestamp
    Timestamp,
    /// `g` JSON text
    Json,
    /// `h` plain text
    Text,
    /// `i` progress bar percentage as ASCII decimal
    Progress,
}

impl LinkTag {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'a' => Some(Self::String),
            b'b' => Some(Self::Binary),
            b'c' => Some(Self::Rgb565),
            b'd' => Some(Self::Jpeg),
            b'e' => Some(Self::Png),
            b'f' => Some(Self::Timestamp),
            b'g' => Some(Self::Json),
            b'h' => Some(Self::Text),
            b'i' => Some(Self::Progress),
            _ => None,
        }
    }

    /// Returns true if the payload is meant to be read as text
    pub fn is_textual(self) -> bool {
        matches!(self, Self::String | Self::Json | Self::Text | Self::Progress)
    }
}

/// Display update sent to the panel.
///
/// The panel firmware assigns its own meaning to each tag slot, so these
/// variants reuse the link tags rather than the inbound payload kinds. Only
/// the slots the glasses drive are listed; the clock, date and bottom-line
/// slots (`d`, `g`, `h`) are left to the panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelMessage {
    /// Main content area (`a`)
    Content(String),
    /// Pager text, 1-based `page/total` (`b`)
    Pages { page: u32, total: u32 },
    /// Document name (`c`)
    Name(String),
    /// Phone link indicator (`e`)
    BleState(bool),
    /// Battery indicator in percent (`f`)
    Battery(u8),
    /// Progress bar percentage (`i`)
    Progress(u8),
}

impl PanelMessage {
    /// Pager update for a zero-based page out of a zero-based last page
    pub fn pages(page: u32, last_page: u32) -> Self {
        Self::Pages {
            page: page + 1,
            total: last_page + 1,
        }
    }

    /// Progress through a document, zero-based page of zero-based last page
    pub fn progress(page: u32, last_page: u32) -> Self {
        let percent = (page as u64 + 1) * 100 / (last_page as u64 + 1);
        Self::Progress(percent.min(100) as u8)
    }

    pub fn cmd(&self) -> u8 {
        match self {
            Self::Content(_) => b'a',
            Self::Pages { .. } => b'b',
            Self::Name(_) => b'c',
            Self::BleState(_) => b'e',
            Self::Battery(_) => b'f',
            Self::Progress(_) => b'i',
        }
    }

    /// Payload bytes as the panel expects them
    pub fn payload(&self) -> Vec<u8> {
        match self {
            Self::Content(s) | Self::Name(s) => s.as_bytes().to_vec(),
            Self::Pages { page, total } => format!("{}/{}", page, total).into_bytes(),
            Self::BleState(true) => BLE_CONNECTED_TEXT.as_bytes().to_vec(),
            Self::BleState(false) => BLE_DISCONNECTED_TEXT.as_bytes().to_vec(),
            Self::Battery(percent) => format!("电量\n{}%", percent).into_bytes(),
            Self::Progress(percent) => format!("{}", percent).into_bytes(),
        }
    }

    pub fn to_frame(&self) -> Result<FramedMessage, FrameError> {
        FramedMessage::new(self.cmd(), &self.payload())
    }
}
