//! Host-side view of the glasses' wire formats.

#![allow(dead_code)]

use anyhow::{bail, Result};
use uuid::Uuid;

pub const FILE_DATA_UUID: Uuid = Uuid::from_u128(0xaabb0101_0000_1000_8000_00805f9b34fb);
pub const FILE_CONTROL_UUID: Uuid = Uuid::from_u128(0xaabb0102_0000_1000_8000_00805f9b34fb);
pub const FILE_NAME_UUID: Uuid = Uuid::from_u128(0xaabb0103_0000_1000_8000_00805f9b34fb);
pub const IMAGE_LENGTH_UUID: Uuid = Uuid::from_u128(0xaabb0201_0000_1000_8000_00805f9b34fb);
pub const IMAGE_CONTROL_UUID: Uuid = Uuid::from_u128(0xaabb0202_0000_1000_8000_00805f9b34fb);
pub const IMAGE_DATA_UUID: Uuid = Uuid::from_u128(0xaabb0203_0000_1000_8000_00805f9b34fb);
pub const STATUS_BATTERY_UUID: Uuid = Uuid::from_u128(0xaabb0301_0000_1000_8000_00805f9b34fb);
pub const STATUS_CONTROL_UUID: Uuid = Uuid::from_u128(0xaabb0302_0000_1000_8000_00805f9b34fb);
pub const STATUS_NOTIFY_UUID: Uuid = Uuid::from_u128(0xaabb0303_0000_1000_8000_00805f9b34fb);

/// Bytes per image-data notification
pub const CHUNK_SIZE: usize = 400;

/// Panel link header: tag byte + 8 zero-padded decimal digits
pub const HEADER_LEN: usize = 9;

/// One frame seen on the panel link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelFrame {
    pub tag: u8,
    pub payload: Vec<u8>,
}

impl PanelFrame {
    /// Human-readable name of the tag slot the firmware writes
    pub fn slot(&self) -> &'static str {
        match self.tag {
            b'a' => "content",
            b'b' => "pages",
            b'c' => "name",
            b'd' => "time",
            b'e' => "ble",
            b'f' => "battery",
            b'g' => "date",
            b'h' => "bottom",
            b'i' => "progress",
            _ => "unknown",
        }
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Encode a frame the way the firmware does
pub fn encode_frame(tag: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = format!("{}{:08}", tag as char, payload.len()).into_bytes();
    out.extend_from_slice(payload);
    out
}

/// Pull complete frames off the front of `buf`
pub fn take_frames(buf: &mut Vec<u8>) -> Result<Vec<PanelFrame>> {
    let mut frames = Vec::new();
    while buf.len() >= HEADER_LEN {
        let digits = std::str::from_utf8(&buf[1..HEADER_LEN])?;
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            bail!("bad length field {:?}", digits);
        }
        let len: usize = digits.parse()?;
        if buf.len() < HEADER_LEN + len {
            break;
        }
        let frame: Vec<u8> = buf.drain(..HEADER_LEN + len).collect();
        frames.push(PanelFrame {
            tag: frame[0],
            payload: frame[HEADER_LEN..].to_vec(),
        });
    }
    Ok(frames)
}

/// Expected chunk sizes for an image of `len` bytes: full chunks, then the
/// remainder (which may be empty)
pub fn expected_chunks(len: usize) -> Vec<usize> {
    let mut sizes = vec![CHUNK_SIZE; len / CHUNK_SIZE];
    sizes.push(len % CHUNK_SIZE);
    sizes
}
