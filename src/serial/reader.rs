//! Panel link reader
//!
//! Reads bytes from a serial port and feeds them through a [`FrameDecoder`]
//! until a complete frame is available.

use core::future::Future;

use embassy_futures::select::{select, Either};

use crate::protocol::framing::{Decoded, FrameDecoder, FrameError, FramedMessage};
use crate::serial::traits::{SerialError, SerialRead};

/// Size of the intermediate read buffer
const READ_CHUNK: usize = 64;

/// Result of attempting to read a frame
#[derive(Debug, PartialEq, Eq)]
pub enum ReadResult {
    /// A complete frame arrived
    Message(FramedMessage),
    /// The decoder rejected the stream
    LinkError(FrameError),
    /// The port failed
    SerialError(SerialError),
    /// The port had no data
    Idle,
}

/// Panel link reader
///
/// Bytes read past the end of one frame are kept for the next call, so
/// back-to-back frames delivered in a single UART read are not lost.
pub struct LinkReader {
    decoder: FrameDecoder,
    buf: [u8; READ_CHUNK],
    start: usize,
    end: usize,
}

impl LinkReader {
    pub fn new() -> Self {
        Self::with_decoder(FrameDecoder::new())
    }

    pub fn with_decoder(decoder: FrameDecoder) -> Self {
        Self {
            decoder,
            buf: [0; READ_CHUNK],
            start: 0,
            end: 0,
        }
    }

    /// Read until a complete frame, an error, or an empty read.
    ///
    /// Once the decoder is desynchronised every call returns
    /// [`FrameError::Desynchronized`] until [`reset`](Self::reset).
    pub async fn read_message<S: SerialRead>(&mut self, serial: &mut S) -> ReadResult {
        loop {
            if self.start < self.end {
                let (used, result) = self.decoder.feed(&self.buf[self.start..self.end]);
                self.start += used;
                match result {
                    Ok(Decoded::Complete(msg)) => return ReadResult::Message(msg),
                    Ok(Decoded::Incomplete) => {}
                    Err(e) => return ReadResult::LinkError(e),
                }
            }

            let bytes_read = match serial.read(&mut self.buf).await {
                Ok(n) => n,
                Err(e) => return ReadResult::SerialError(e),
            };
            if bytes_read == 0 {
                return ReadResult::Idle;
            }
            self.start = 0;
            self.end = bytes_read;
        }
    }

    /// Returns true if the link needs a reset before it can decode again
    pub fn is_desynchronized(&self) -> bool {
        self.decoder.is_desynchronized()
    }

    /// Recover from a desync on an idle gap.
    ///
    /// Everything the port delivers is dropped until a read has been beaten
    /// by `gap()` (or the port reports nothing pending), then the decoder is
    /// cleared so the next byte is taken as a header. The panel sends frames
    /// in bursts, so a quiet line means no frame is in flight. Returns the
    /// number of bytes dropped.
    pub async fn resync<S, F, Fut>(&mut self, serial: &mut S, mut gap: F) -> usize
    where
        S: SerialRead,
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        let mut dropped = self.end - self.start;
        loop {
            match select(serial.read(&mut self.buf), gap()).await {
                Either::First(Ok(0)) | Either::Second(()) => break,
                Either::First(Ok(n)) => dropped += n,
                Either::First(Err(e)) => {
                    log::warn!("link: uart {} during resync", e);
                    break;
                }
            }
        }
        self.reset();
        dropped
    }

    /// Drop buffered bytes and any partial frame, clearing desync
    pub fn reset(&mut self) {
        self.decoder.reset();
        self.start = 0;
        self.end = 0;
    }
}

impl Default for LinkReader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::framing::encode;
    use crate::serial::traits::mock::MockSerialPort;

    #[test]
    fn test_read_single_frame() {
        let mut reader = LinkReader::new();
        let mut port = MockSerialPort::new();

        futures::executor::block_on(async {
            port.queue_rx_data(&encode(b'h', b"plain text").unwrap());

            match reader.read_message(&mut port).await {
                ReadResult::Message(msg) => {
                    assert_eq!(msg.cmd, b'h');
                    assert_eq!(msg.as_text(), Some("plain text"));
                }
                other => panic!("Expected message, got {:?}", other),
            }
        });
    }

    #[test]
    fn test_read_slow_arrival() {
        let mut reader = LinkReader::new();
        let mut port = MockSerialPort::new().with_chunk(1);

        futures::executor::block_on(async {
            port.queue_rx_data(&encode(b'a', b"hello").unwrap());

            match reader.read_message(&mut port).await {
                ReadResult::Message(msg) => assert_eq!(msg.payload.as_slice(), b"hello"),
                other => panic!("Expected message, got {:?}", other),
            }
        });
    }

    #[test]
    fn test_back_to_back_frames_in_one_read() {
        let mut reader = LinkReader::new();
        let mut port = MockSerialPort::new();

        futures::executor::block_on(async {
            port.queue_rx_data(&encode(b'g', br#"{"k":1}"#).unwrap());
            port.queue_rx_data(&encode(b'i', b"50").unwrap());

            match reader.read_message(&mut port).await {
                ReadResult::Message(msg) => assert_eq!(msg.cmd, b'g'),
                other => panic!("Expected json frame, got {:?}", other),
            }
            match reader.read_message(&mut port).await {
                ReadResult::Message(msg) => {
                    assert_eq!(msg.cmd, b'i');
                    assert_eq!(msg.payload.as_slice(), b"50");
                }
                other => panic!("Expected progress frame, got {:?}", other),
            }
            assert_eq!(reader.read_message(&mut port).await, ReadResult::Idle);
        });
    }

    #[test]
    fn test_partial_frame_is_idle() {
        let mut reader = LinkReader::new();
        let mut port = MockSerialPort::new();

        futures::executor::block_on(async {
            port.queue_rx_data(b"a000000");
            assert_eq!(reader.read_message(&mut port).await, ReadResult::Idle);

            port.queue_rx_data(b"02ok");
            match reader.read_message(&mut port).await {
                ReadResult::Message(msg) => assert_eq!(msg.payload.as_slice(), b"ok"),
                other => panic!("Expected message, got {:?}", other),
            }
        });
    }

    #[test]
    fn test_desync_persists_until_reset() {
        let mut reader = LinkReader::new();
        let mut port = MockSerialPort::new();

        futures::executor::block_on(async {
            port.queue_rx_data(b"aXXXXXXXX");
            assert_eq!(
                reader.read_message(&mut port).await,
                ReadResult::LinkError(FrameError::InvalidLength)
            );
            assert!(reader.is_desynchronized());

            port.queue_rx_data(&encode(b'a', b"ok").unwrap());
            assert_eq!(
                reader.read_message(&mut port).await,
                ReadResult::LinkError(FrameError::Desynchronized)
            );

            reader.reset();
            port.queue_rx_data(&encode(b'a', b"ok").unwrap());
            assert!(matches!(
                reader.read_message(&mut port).await,
                ReadResult::Message(_)
            ));
        });
    }

    #[test]
    fn test_resync_waits_for_quiet_line() {
        let mut reader = LinkReader::new();
        let mut port = MockSerialPort::new().with_chunk(4);

        futures::executor::block_on(async {
            port.queue_rx_data(b"aXXXXXXXX");
            assert_eq!(
                reader.read_message(&mut port).await,
                ReadResult::LinkError(FrameError::InvalidLength)
            );

            // Tail of the corrupted burst still arriving
            port.queue_rx_data(b"garbage tail");
            let dropped = reader.resync(&mut port, core::future::pending::<()>).await;
            assert_eq!(dropped, 12);
            assert!(!reader.is_desynchronized());

            port.queue_rx_data(&encode(b'h', b"back").unwrap());
            match reader.read_message(&mut port).await {
                ReadResult::Message(msg) => assert_eq!(msg.as_text(), Some("back")),
                other => panic!("Expected message, got {:?}", other),
            }
        });
    }

    #[test]
    fn test_serial_error_is_reported() {
        let mut reader = LinkReader::new();
        let mut port = MockSerialPort::new();

        futures::executor::block_on(async {
            port.set_next_read_error(SerialError::OverflowError);
            assert_eq!(
                reader.read_message(&mut port).await,
                ReadResult::SerialError(SerialError::OverflowError)
            );
        });
    }
}
