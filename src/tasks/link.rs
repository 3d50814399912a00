//! Panel link tasks
//!
//! The writer drains the panel queue onto the UART. The reader decodes
//! frames the panel sends back; they are only logged. A desynchronised
//! reader stays dead until the line goes quiet for
//! [`RESYNC_GAP_MS`](crate::config::link::RESYNC_GAP_MS), then starts over.

use embassy_time::{Duration, Timer};

use crate::config::link::RESYNC_GAP_MS;
use crate::dispatcher::PANEL;
use crate::serial::reader::{LinkReader, ReadResult};
use crate::serial::traits::{SerialRead, SerialWrite};
use crate::serial::writer::LinkWriter;

/// Pause after a UART error before reading again
const ERROR_BACKOFF_MS: u64 = 10;

pub async fn link_writer_task<W: SerialWrite>(mut port: W) {
    let mut writer = LinkWriter::new();
    loop {
        let msg = PANEL.receive().await;
        if let Err(e) = writer.send(&mut port, &msg).await {
            log::error!("link: panel update '{}' lost: {}", msg.cmd() as char, e);
        }
    }
}

pub async fn link_reader_task<R: SerialRead>(mut port: R) {
    let mut reader = LinkReader::new();
    loop {
        match reader.read_message(&mut port).await {
            ReadResult::Message(msg) => match msg.tag() {
                Some(tag) if tag.is_textual() => {
                    log::info!("link: panel sent {:?}: {}", tag, msg.as_text().unwrap_or("<invalid utf-8>"))
                }
                Some(tag) => log::info!("link: panel sent {:?} ({} bytes)", tag, msg.len()),
                None => log::warn!("link: unknown frame '{}' ({} bytes)", msg.cmd as char, msg.len()),
            },
            ReadResult::LinkError(e) if reader.is_desynchronized() => {
                log::error!("link: {}, waiting for an idle gap", e);
                let dropped = reader
                    .resync(&mut port, || Timer::after(Duration::from_millis(RESYNC_GAP_MS)))
                    .await;
                log::warn!("link: resynchronised, {} bytes dropped", dropped);
            }
            ReadResult::LinkError(e) => log::warn!("link: {}", e),
            ReadResult::SerialError(e) => {
                log::warn!("link: uart {}", e);
                Timer::after(Duration::from_millis(ERROR_BACKOFF_MS)).await;
            }
            ReadResult::Idle => {}
        }
    }
}
