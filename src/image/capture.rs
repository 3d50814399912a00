//! Capture producer
//!
//! A capture request (button or `takeimage`) raises [`CaptureRequest`]. The
//! capture task polls it with [`CapturePipeline::poll_once`], fills a buffer
//! from a [`FrameSource`] outside any lock, and hands it to the session as a
//! prepared image.

use alloc::vec::Vec;
use core::fmt;
use core::future::Future;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

use crate::config::image::MAX_IMAGE_BYTES;
use crate::session::state::{with_session, SharedSession};
use crate::storage::pictures::PictureStore;
use crate::storage::traits::{read_to_vec, Storage, StorageError};
use crate::storage::SharedStorage;

/// Single-slot capture request flag
pub type CaptureRequest = Signal<CriticalSectionRawMutex, ()>;

/// Errors from an image producer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureError {
    /// Nothing to capture (no stored picture, sensor returned no frame)
    NoImage,
    /// Sensor failed
    Sensor,
    /// Buffer allocation failed
    OutOfMemory,
    Storage(StorageError),
}

impl From<StorageError> for CaptureError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::OutOfMemory => Self::OutOfMemory,
            other => Self::Storage(other),
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoImage => write!(f, "no image available"),
            Self::Sensor => write!(f, "camera sensor error"),
            Self::OutOfMemory => write!(f, "no memory for image buffer"),
            Self::Storage(e) => write!(f, "storage: {}", e),
        }
    }
}

/// Producer of a complete image
pub trait FrameSource {
    fn capture(&mut self) -> impl Future<Output = Result<Vec<u8>, CaptureError>>;
}

/// Camera sensor driver contract: one JPEG frame per call
pub trait CameraSensor {
    fn grab_jpeg(&mut self) -> impl Future<Output = Result<Vec<u8>, CaptureError>>;
}

/// Serves the newest picture stored under `/picture`
pub struct StoredImageSource<'a, S: Storage> {
    storage: &'a SharedStorage<S>,
}

impl<'a, S: Storage> StoredImageSource<'a, S> {
    pub fn new(storage: &'a SharedStorage<S>) -> Self {
        Self { storage }
    }
}

impl<S: Storage> FrameSource for StoredImageSource<'_, S> {
    async fn capture(&mut self) -> Result<Vec<u8>, CaptureError> {
        let mut storage = self.storage.lock().await;
        let path = PictureStore::scan(&mut *storage)
            .latest_path()
            .ok_or(CaptureError::NoImage)?;
        let data = read_to_vec(&mut *storage, &path, MAX_IMAGE_BYTES)?;
        log::info!("capture: loaded {} ({} bytes)", path, data.len());
        Ok(data)
    }
}

/// Grabs a frame from the camera and keeps a copy on the card
pub struct CameraSource<'a, C, S: Storage> {
    camera: C,
    storage: &'a SharedStorage<S>,
    pictures: PictureStore,
}

impl<'a, C: CameraSensor, S: Storage> CameraSource<'a, C, S> {
    pub fn new(camera: C, storage: &'a SharedStorage<S>, pictures: PictureStore) -> Self {
        Self {
            camera,
            storage,
            pictures,
        }
    }
}

impl<C: CameraSensor, S: Storage> FrameSource for CameraSource<'_, C, S> {
    async fn capture(&mut self) -> Result<Vec<u8>, CaptureError> {
        let frame = self.camera.grab_jpeg().await?;
        if frame.is_empty() {
            return Err(CaptureError::NoImage);
        }

        // A failed save still leaves a frame to send
        let mut storage = self.storage.lock().await;
        if let Err(e) = self.pictures.save(&mut *storage, &frame) {
            log::warn!("capture: saving frame failed: {}", e);
        }
        Ok(frame)
    }
}

/// Ask for a new capture on behalf of the phone or the button.
///
/// Refused while a capture is running. Otherwise any image prepared earlier
/// is released so the next `getimage` cannot serve a stale frame.
pub fn request_capture(session: &SharedSession, request: &CaptureRequest) -> bool {
    let accepted = with_session(session, |s| {
        if s.image.is_capturing() {
            return false;
        }
        s.image.release();
        true
    });
    if accepted {
        request.signal(());
    }
    accepted
}

/// Result of one poll of the capture loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// No request pending
    Idle,
    /// A request is pending but no phone is connected; it stays pending
    WaitingForPeer,
    /// A capture was already running; the request was dropped
    Rejected,
    /// An image of this many bytes is ready to pull
    Ready(usize),
    /// The phone disconnected during capture; the image was dropped
    Discarded,
    Failed(CaptureError),
}

/// Polls the capture request and runs the producer
pub struct CapturePipeline<'a, F> {
    session: &'a SharedSession,
    request: &'a CaptureRequest,
    source: F,
}

impl<'a, F: FrameSource> CapturePipeline<'a, F> {
    pub fn new(session: &'a SharedSession, request: &'a CaptureRequest, source: F) -> Self {
        Self {
            session,
            request,
            source,
        }
    }

    /// Serve at most one capture request.
    ///
    /// At most one capture runs at a time: the session's image state is set
    /// to capturing before the producer runs and every other request is
    /// rejected until it completes.
    pub async fn poll_once(&mut self) -> CaptureOutcome {
        if !self.request.signaled() {
            return CaptureOutcome::Idle;
        }
        if !with_session(self.session, |s| s.is_connected()) {
            return CaptureOutcome::WaitingForPeer;
        }
        if self.request.try_take().is_none() {
            return CaptureOutcome::Idle;
        }

        let started = with_session(self.session, |s| {
            let generation = s.generation();
            s.image.begin_capture(generation).then_some(generation)
        });
        let Some(generation) = started else {
            log::warn!("capture: request rejected, capture in progress");
            return CaptureOutcome::Rejected;
        };

        log::info!("capture: started");
        let result = self.source.capture().await;

        with_session(self.session, |s| match result {
            Ok(buffer) => {
                let len = buffer.len();
                let current = if s.is_connected() {
                    s.generation()
                } else {
                    generation.wrapping_add(1)
                };
                if s.image.complete_capture(current, buffer) {
                    log::info!("capture: image ready, {} bytes", len);
                    CaptureOutcome::Ready(len)
                } else {
                    log::warn!("capture: peer gone, image dropped");
                    CaptureOutcome::Discarded
                }
            }
            Err(e) => {
                s.image.fail_capture();
                log::error!("capture: failed: {}", e);
                CaptureOutcome::Failed(e)
            }
        })
    }
}


#[cfg(test)]
mod tests {
    use super::mock::{HookedSource, MockCamera, MockFrameSource};
    use super::*;
    use crate::session::state::new_shared_session;
    use crate::storage::traits::mock::MemoryStorage;
    use alloc::vec;
    use embassy_sync::mutex::Mutex;
    use futures::executor::block_on;

    #[test]
    fn test_idle_without_request() {
        let session = new_shared_session();
        let request = CaptureRequest::new();
        let mut pipeline = CapturePipeline::new(&session, &request, MockFrameSource::new());

        assert_eq!(block_on(pipeline.poll_once()), CaptureOutcome::Idle);
    }

    #[test]
    fn test_request_waits_for_connection() {
        let session = new_shared_session();
        let request = CaptureRequest::new();
        let source = MockFrameSource::new().with_image(&[1, 2, 3]);
        let mut pipeline = CapturePipeline::new(&session, &request, source);

        request.signal(());
        assert_eq!(block_on(pipeline.poll_once()), CaptureOutcome::WaitingForPeer);
        assert!(request.signaled());

        with_session(&session, |s| s.connect());
        assert_eq!(block_on(pipeline.poll_once()), CaptureOutcome::Ready(3));
        assert!(with_session(&session, |s| s.image.is_prepared()));
        assert!(!request.signaled());
    }

    #[test]
    fn test_rejected_while_capturing() {
        let session = new_shared_session();
        let request = CaptureRequest::new();
        let mut pipeline = CapturePipeline::new(&session, &request, MockFrameSource::new());

        with_session(&session, |s| {
            let generation = s.connect();
            s.image.begin_capture(generation);
        });
        request.signal(());

        assert_eq!(block_on(pipeline.poll_once()), CaptureOutcome::Rejected);
        assert!(!request.signaled());
    }

    #[test]
    fn test_failure_releases_buffer() {
        let session = new_shared_session();
        let request = CaptureRequest::new();
        let source = MockFrameSource::new().with_error(CaptureError::OutOfMemory);
        let mut pipeline = CapturePipeline::new(&session, &request, source);

        with_session(&session, |s| s.connect());
        request.signal(());

        assert_eq!(
            block_on(pipeline.poll_once()),
            CaptureOutcome::Failed(CaptureError::OutOfMemory)
        );
        assert!(with_session(&session, |s| s.image.is_idle()));
    }

    #[test]
    fn test_disconnect_during_capture_discards_image() {
        let session = new_shared_session();
        let request = CaptureRequest::new();
        let source = HookedSource {
            hook: || {
                with_session(&session, |s| {
                    s.disconnect();
                });
            },
            data: vec![9; 64],
        };
        let mut pipeline = CapturePipeline::new(&session, &request, source);

        with_session(&session, |s| s.connect());
        request.signal(());

        assert_eq!(block_on(pipeline.poll_once()), CaptureOutcome::Discarded);
        assert!(with_session(&session, |s| s.image.is_idle()));
    }

    #[test]
    fn test_reconnect_during_capture_discards_image() {
        let session = new_shared_session();
        let request = CaptureRequest::new();
        let source = HookedSource {
            hook: || {
                with_session(&session, |s| {
                    s.disconnect();
                    s.connect();
                });
            },
            data: vec![9; 64],
        };
        let mut pipeline = CapturePipeline::new(&session, &request, source);

        with_session(&session, |s| s.connect());
        request.signal(());

        assert_eq!(block_on(pipeline.poll_once()), CaptureOutcome::Discarded);
        assert_eq!(with_session(&session, |s| s.image.remaining()), 0);
    }

    #[test]
    fn test_request_capture_releases_prepared_image() {
        let session = new_shared_session();
        let request = CaptureRequest::new();
        with_session(&session, |s| {
            let generation = s.connect();
            s.image.begin_capture(generation);
            s.image.complete_capture(generation, vec![1; 10]);
        });

        assert!(request_capture(&session, &request));
        assert!(request.signaled());
        assert!(with_session(&session, |s| s.image.is_idle()));
    }

    #[test]
    fn test_request_capture_refused_while_capturing() {
        let session = new_shared_session();
        let request = CaptureRequest::new();
        with_session(&session, |s| {
            let generation = s.connect();
            s.image.begin_capture(generation);
        });

        assert!(!request_capture(&session, &request));
        assert!(!request.signaled());
    }

    #[test]
    fn test_stored_source_serves_latest_picture() {
        let storage: SharedStorage<MemoryStorage> = Mutex::new(
            MemoryStorage::new()
                .with_file("/picture/IMG_0001.jpg", b"old")
                .with_file("/picture/IMG_0002.jpg", b"new"),
        );
        let mut source = StoredImageSource::new(&storage);
        assert_eq!(block_on(source.capture()).unwrap(), b"new");
    }

    #[test]
    fn test_stored_source_without_pictures() {
        let storage: SharedStorage<MemoryStorage> = Mutex::new(MemoryStorage::new());
        let mut source = StoredImageSource::new(&storage);
        assert_eq!(block_on(source.capture()), Err(CaptureError::NoImage));
    }

    #[test]
    fn test_camera_source_saves_frame() {
        let storage: SharedStorage<MemoryStorage> = Mutex::new(MemoryStorage::new());
        let pictures = block_on(async { PictureStore::scan(&mut *storage.lock().await) });
        let camera = MockCamera {
            frame: vec![0xff, 0xd8, 0x01],
        };
        let mut source = CameraSource::new(camera, &storage, pictures);

        assert_eq!(block_on(source.capture()).unwrap(), vec![0xff, 0xd8, 0x01]);
        let saved = block_on(async {
            storage
                .lock()
                .await
                .contents("/picture/IMG_0001.jpg")
                .map(|d| d.to_vec())
        });
        assert_eq!(saved, Some(vec![0xff, 0xd8, 0x01]));
    }
}
