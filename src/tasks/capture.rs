//! Capture task
//!
//! Polls the capture request and tells the phone when an image is ready
//! to pull.

use embassy_time::{Duration, Timer};

use crate::config::image::CAPTURE_POLL_MS;
use crate::dispatcher::{StatusMessage, CAPTURE_REQUEST, NOTIFY, SESSION};
use crate::image::{CaptureOutcome, CapturePipeline, FrameSource};

pub async fn capture_task<F: FrameSource>(source: F) {
    let mut pipeline = CapturePipeline::new(&SESSION, &CAPTURE_REQUEST, source);
    loop {
        if let CaptureOutcome::Ready(len) = pipeline.poll_once().await {
            if NOTIFY.try_send(StatusMessage::ImageReady).is_err() {
                log::warn!("capture: notify queue full, {} byte image not announced", len);
            }
        }
        Timer::after(Duration::from_millis(CAPTURE_POLL_MS)).await;
    }
}
