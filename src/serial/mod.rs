//! Panel serial link
//!
//! Serial port abstraction plus the frame reader and writer built on it.

pub mod reader;
pub mod traits;
pub mod writer;

pub use reader::{LinkReader, ReadResult};
pub use traits::{SerialError, SerialRead, SerialWrite};
pub use writer::{LinkError, LinkWriter};
