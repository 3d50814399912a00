//! Image capture and chunked transfer

pub mod capture;
pub mod transfer;

pub use capture::{
    CameraSensor, CameraSource, CaptureError, CaptureOutcome, CapturePipeline, CaptureRequest,
    FrameSource, StoredImageSource,
};
pub use capture::request_capture;
pub use transfer::{ChunkStep, ImageTransfer};
