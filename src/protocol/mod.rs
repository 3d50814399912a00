//! Panel serial link protocol
//!
//! The glasses drive their display panel over a UART carrying
//! length-prefixed frames (see [`framing`]). [`panel`] names the frame tags.

pub mod framing;
pub mod panel;

pub use framing::{encode, Decoded, FrameDecoder, FrameError, FramedMessage};
pub use panel::{LinkTag, PanelMessage};
