//! Length-prefixed framing for the panel serial link
//!
//! Every frame is a 9-byte ASCII header followed by the raw payload:
//! ```text
//! [cmd: 1 byte][length: 8 decimal digits, zero padded][payload: length bytes]
//! ```
//!
//! There is no checksum and no resync marker. A corrupted length field
//! leaves the decoder desynchronised until [`FrameDecoder::reset`] is called.

use alloc::vec::Vec;
use core::fmt;

use crate::config::link::{HEADER_LEN, LENGTH_DIGITS, MAX_PAYLOAD_LEN, MAX_RX_PAYLOAD};
use crate::protocol::panel::LinkTag;

/// Errors produced while encoding or decoding frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Payload longer than the 8-digit length field can express
    PayloadTooLarge,
    /// Command byte is not printable ASCII
    InvalidCommand,
    /// Header length field is not 8 decimal digits
    InvalidLength,
    /// A previous header was malformed; the stream is lost until reset
    Desynchronized,
    /// Payload buffer could not be allocated; the payload is being skipped
    OutOfMemory,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PayloadTooLarge => write!(f, "payload exceeds 99999999 bytes"),
            Self::InvalidCommand => write!(f, "command byte is not printable ASCII"),
            Self::InvalidLength => write!(f, "length field is not 8 decimal digits"),
            Self::Desynchronized => write!(f, "link desynchronised, reset required"),
            Self::OutOfMemory => write!(f, "no memory for frame payload"),
        }
    }
}

/// One decoded or outbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramedMessage {
    /// Command tag byte
    pub cmd: u8,
    /// Payload bytes; the header length is always `payload.len()`
    pub payload: Vec<u8>,
}

impl FramedMessage {
    /// Build a message, rejecting payloads the header cannot describe.
    pub fn new(cmd: u8, payload: &[u8]) -> Result<Self, FrameError> {
        validate(cmd, payload.len())?;
        Ok(Self {
            cmd,
            payload: payload.to_vec(),
        })
    }

    /// Payload length as carried in the header
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Returns true for a header-only frame
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Classify the command byte against the known tag table
    pub fn tag(&self) -> Option<LinkTag> {
        LinkTag::from_byte(self.cmd)
    }

    /// Payload as text, if it is valid UTF-8
    pub fn as_text(&self) -> Option<&str> {
        core::str::from_utf8(&self.payload).ok()
    }

    /// Encode header and payload into one buffer
    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        encode(self.cmd, &self.payload)
    }
}

fn validate(cmd: u8, len: usize) -> Result<(), FrameError> {
    if !cmd.is_ascii_graphic() {
        return Err(FrameError::InvalidCommand);
    }
    if len > MAX_PAYLOAD_LEN {
        return Err(FrameError::PayloadTooLarge);
    }
    Ok(())
}

/// Encode only the 9-byte header for a payload of `len` bytes.
pub fn encode_header(cmd: u8, len: usize) -> Result<[u8; HEADER_LEN], FrameError> {
    validate(cmd, len)?;

    let mut header = [b'0'; HEADER_LEN];
    header[0] = cmd;

    let mut remaining = len;
    for slot in header[1..].iter_mut().rev() {
        *slot = b'0' + (remaining % 10) as u8;
        remaining /= 10;
    }

    Ok(header)
}

/// Encode a complete frame.
pub fn encode(cmd: u8, payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    let header = encode_header(cmd, payload.len())?;
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&header);
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Parse the length digits of a header
fn parse_length(digits: &[u8]) -> Result<usize, FrameError> {
    if digits.len() != LENGTH_DIGITS {
        return Err(FrameError::InvalidLength);
    }
    digits.iter().try_fold(0usize, |acc, &d| {
        if d.is_ascii_digit() {
            Ok(acc * 10 + (d - b'0') as usize)
        } else {
            Err(FrameError::InvalidLength)
        }
    })
}

/// Result of feeding bytes to the decoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A full frame has arrived
    Complete(FramedMessage),
    /// More bytes are needed
    Incomplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    /// Collecting header bytes
    Header,
    /// Collecting `len` payload bytes for `cmd`
    Payload { cmd: u8, len: usize },
    /// Skipping a payload that could not be buffered
    Discarding { remaining: usize },
    /// Malformed header seen, nothing more can be trusted
    Desynchronized,
}

/// Incremental frame decoder.
///
/// Bytes may be supplied in any split, including one at a time. The decoder
/// reports [`Decoded::Incomplete`] until a whole frame is buffered.
pub struct FrameDecoder {
    state: DecodeState,
    header: [u8; HEADER_LEN],
    header_len: usize,
    payload: Vec<u8>,
    max_payload: usize,
}

impl FrameDecoder {
    /// Create a decoder that buffers payloads up to the configured RX cap.
    pub fn new() -> Self {
        Self::with_max_payload(MAX_RX_PAYLOAD)
    }

    /// Create a decoder with a custom payload cap
    pub fn with_max_payload(max_payload: usize) -> Self {
        Self {
            state: DecodeState::Header,
            header: [0; HEADER_LEN],
            header_len: 0,
            payload: Vec::new(),
            max_payload,
        }
    }

    /// Push one byte.
    ///
    /// Returns an error once when a header is rejected or a payload cannot be
    /// buffered. After [`FrameError::InvalidLength`] or
    /// [`FrameError::InvalidCommand`] every further byte is refused with
    /// [`FrameError::Desynchronized`] until [`reset`](Self::reset).
    pub fn push(&mut self, byte: u8) -> Result<Decoded, FrameError> {
        match self.state {
            DecodeState::Desynchronized => Err(FrameError::Desynchronized),
            DecodeState::Header => {
                self.header[self.header_len] = byte;
                self.header_len += 1;
                if self.header_len < HEADER_LEN {
                    return Ok(Decoded::Incomplete);
                }
                self.header_len = 0;
                self.begin_payload()
            }
            DecodeState::Payload { cmd, len } => {
                self.payload.push(byte);
                if self.payload.len() == len {
                    self.state = DecodeState::Header;
                    return Ok(Decoded::Complete(FramedMessage {
                        cmd,
                        payload: core::mem::take(&mut self.payload),
                    }));
                }
                Ok(Decoded::Incomplete)
            }
            DecodeState::Discarding { remaining } => {
                self.state = if remaining <= 1 {
                    DecodeState::Header
                } else {
                    DecodeState::Discarding {
                        remaining: remaining - 1,
                    }
                };
                Ok(Decoded::Incomplete)
            }
        }
    }

    /// Feed a slice, stopping at the first complete frame or error.
    ///
    /// Returns how many bytes were consumed alongside the decode result, so
    /// the caller can resume with the unconsumed tail.
    pub fn feed(&mut self, bytes: &[u8]) -> (usize, Result<Decoded, FrameError>) {
        for (i, &byte) in bytes.iter().enumerate() {
            match self.push(byte) {
                Ok(Decoded::Incomplete) => continue,
                other => return (i + 1, other),
            }
        }
        (bytes.len(), Ok(Decoded::Incomplete))
    }

    fn begin_payload(&mut self) -> Result<Decoded, FrameError> {
        let cmd = self.header[0];
        if !cmd.is_ascii_graphic() {
            self.state = DecodeState::Desynchronized;
            return Err(FrameError::InvalidCommand);
        }

        let len = match parse_length(&self.header[1..]) {
            Ok(len) => len,
            Err(e) => {
                self.state = DecodeState::Desynchronized;
                return Err(e);
            }
        };

        if len == 0 {
            self.state = DecodeState::Header;
            return Ok(Decoded::Complete(FramedMessage {
                cmd,
                payload: Vec::new(),
            }));
        }

        if len > self.max_payload || self.payload.try_reserve_exact(len).is_err() {
            log::error!("link: dropping '{}' frame of {} bytes", cmd as char, len);
            self.state = DecodeState::Discarding { remaining: len };
            return Err(FrameError::OutOfMemory);
        }

        self.state = DecodeState::Payload { cmd, len };
        Ok(Decoded::Incomplete)
    }

    /// Reset the decoder, discarding any partial frame and clearing desync.
    pub fn reset(&mut self) {
        self.state = DecodeState::Header;
        self.header_len = 0;
        self.payload = Vec::new();
    }

    /// Returns true if a malformed header has stopped the decoder
    pub fn is_desynchronized(&self) -> bool {
        self.state == DecodeState::Desynchronized
    }

    /// Returns true if no partial frame is in progress
    pub fn is_idle(&self) -> bool {
        self.state == DecodeState::Header && self.header_len == 0
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}
