//! Task wiring
//!
//! The BLE task never does I/O itself. Commands that may be superseded go
//! through the single [`COMMANDS`] slot, work that must not be lost
//! (upload chunks, deletes, volume steps) is queued on [`JOBS`], and
//! status strings for the phone come back on [`NOTIFY`].

pub mod handler;

use alloc::string::String;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;

use crate::audio::VolumeStep;
use crate::image::CaptureRequest;
use crate::protocol::PanelMessage;
use crate::session::command::CommandSlot;
use crate::session::file_receive::FileEvent;
use crate::session::state::{new_shared_session, SharedSession};

pub use handler::{CommandDispatcher, Outcome};

const JOB_QUEUE_SIZE: usize = 8;
const NOTIFY_QUEUE_SIZE: usize = 4;
const PANEL_QUEUE_SIZE: usize = 8;

/// Ordered work for the controller task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    File(FileEvent),
    /// Remove one file if it exists
    DeleteFile(String),
    Volume(VolumeStep),
}

/// Status strings sent on the status notify characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusMessage {
    /// A captured image is ready to pull
    ImageReady,
    /// The last image chunk has been sent
    ImageEnd,
    /// Double click: the phone should start an assistant query
    AiWork,
}

impl StatusMessage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ImageReady => "image_ready",
            Self::ImageEnd => "image_end",
            Self::AiWork => "ai_work",
        }
    }
}

pub static SESSION: SharedSession = new_shared_session();

pub static COMMANDS: CommandSlot = CommandSlot::new();

pub static CAPTURE_REQUEST: CaptureRequest = Signal::new();

/// Ordered queue of [`Job`]s
pub type JobQueue = Channel<CriticalSectionRawMutex, Job, JOB_QUEUE_SIZE>;

pub static JOBS: JobQueue = Channel::new();

pub static NOTIFY: Channel<CriticalSectionRawMutex, StatusMessage, NOTIFY_QUEUE_SIZE> = Channel::new();

/// Updates for the panel, drained by the link writer task
pub static PANEL: Channel<CriticalSectionRawMutex, PanelMessage, PANEL_QUEUE_SIZE> = Channel::new();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_strings() {
        assert_eq!(StatusMessage::ImageReady.as_str(), "image_ready");
        assert_eq!(StatusMessage::ImageEnd.as_str(), "image_end");
        assert_eq!(StatusMessage::AiWork.as_str(), "ai_work");
    }

    #[test]
    fn test_jobs_queue_in_order() {
        JOBS.try_send(Job::Volume(VolumeStep::Up)).unwrap();
        JOBS.try_send(Job::DeleteFile(String::from("/a.txt"))).unwrap();
        assert_eq!(JOBS.try_receive(), Ok(Job::Volume(VolumeStep::Up)));
        assert_eq!(JOBS.try_receive(), Ok(Job::DeleteFile(String::from("/a.txt"))));
        assert!(JOBS.try_receive().is_err());
    }
}
