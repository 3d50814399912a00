//! Serial port traits for the panel link
//!
//! The receive and transmit halves are separate traits so the UART can be
//! split between the link reader and writer tasks. Both halves can be
//! swapped for [`mock::MockSerialPort`] in tests.

use core::fmt;
use core::future::Future;

/// Errors that can occur during serial operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialError {
    /// Framing or parity error reported by the UART
    FramingError,
    /// Receive FIFO or buffer overflow
    OverflowError,
    /// Any other receive failure
    ReadError,
    /// Write error
    WriteError,
}

impl fmt::Display for SerialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FramingError => write!(f, "uart framing error"),
            Self::OverflowError => write!(f, "uart overflow"),
            Self::ReadError => write!(f, "uart read failed"),
            Self::WriteError => write!(f, "uart write failed"),
        }
    }
}

/// Receive half of a serial port
pub trait SerialRead {
    /// Read bytes into buffer
    ///
    /// Returns the number of bytes actually read. May return fewer bytes
    /// than the buffer size if data is not immediately available.
    fn read(&mut self, buf: &mut [u8]) -> impl Future<Output = Result<usize, SerialError>>;
}

/// Transmit half of a serial port
pub trait SerialWrite {
    /// Write all bytes from buffer
    fn write(&mut self, data: &[u8]) -> impl Future<Output = Result<(), SerialError>>;

    /// Flush the write buffer
    fn flush(&mut self) -> impl Future<Output = Result<(), SerialError>>;
}

/// Adapter from `embedded-io-async` streams (UART halves) to the link traits
#[cfg(feature = "embedded")]
pub struct IoPort<T>(pub T);

#[cfg(feature = "embedded")]
impl<T: embedded_io_async::Read> SerialRead for IoPort<T> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        self.0.read(buf).await.map_err(|e| {
            use embedded_io::{Error, ErrorKind};
            match e.kind() {
                ErrorKind::InvalidData => SerialError::FramingError,
                ErrorKind::OutOfMemory => SerialError::OverflowError,
                _ => SerialError::ReadError,
            }
        })
    }
}

#[cfg(feature = "embedded")]
impl<T: embedded_io_async::Write> SerialWrite for IoPort<T> {
    async fn write(&mut self, data: &[u8]) -> Result<(), SerialError> {
        self.0
            .write_all(data)
            .await
            .map_err(|_| SerialError::WriteError)
    }

    async fn flush(&mut self) -> Result<(), SerialError> {
        self.0.flush().await.map_err(|_| SerialError::WriteError)
    }
}
