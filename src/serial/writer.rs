//! Panel link writer

use core::fmt;

use crate::protocol::framing::{encode_header, FrameError};
use crate::protocol::panel::PanelMessage;
use crate::serial::traits::{SerialError, SerialWrite};

/// Failure to put a frame on the link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    Frame(FrameError),
    Serial(SerialError),
}

impl From<FrameError> for LinkError {
    fn from(e: FrameError) -> Self {
        Self::Frame(e)
    }
}

impl From<SerialError> for LinkError {
    fn from(e: SerialError) -> Self {
        Self::Serial(e)
    }
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Frame(e) => write!(f, "frame: {}", e),
            Self::Serial(e) => write!(f, "serial: {}", e),
        }
    }
}

/// Writes frames to the panel link.
///
/// The header and payload are written separately so a large payload is
/// never copied into a second buffer.
pub struct LinkWriter {
    sent: u32,
}

impl LinkWriter {
    pub fn new() -> Self {
        Self { sent: 0 }
    }

    /// Write one raw frame and flush
    pub async fn send_raw<S: SerialWrite>(
        &mut self,
        serial: &mut S,
        cmd: u8,
        payload: &[u8],
    ) -> Result<(), LinkError> {
        let header = encode_header(cmd, payload.len())?;
        serial.write(&header).await?;
        if !payload.is_empty() {
            serial.write(payload).await?;
        }
        serial.flush().await?;

        self.sent = self.sent.wrapping_add(1);
        log::debug!("link: sent '{}' ({} bytes)", cmd as char, payload.len());
        Ok(())
    }

    /// Write one panel update
    pub async fn send<S: SerialWrite>(
        &mut self,
        serial: &mut S,
        msg: &PanelMessage,
    ) -> Result<(), LinkError> {
        self.send_raw(serial, msg.cmd(), &msg.payload()).await
    }

    /// Frames written since start-up
    pub fn sent(&self) -> u32 {
        self.sent
    }
}

impl Default for LinkWriter {
    fn default() -> Self {
        Self::new()
    }
}
