//! Single-slot mailbox for main-loop commands
//!
//! The GATT task posts at most one [`PendingCommand`] and the controller
//! task takes it. Posting while a command is still waiting replaces it: the
//! phone is expected to wait for the result of one command before sending
//! the next, and a command overtaken before it ran is dropped.

use alloc::string::String;
use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;

/// Work deferred from the GATT event path to the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingCommand {
    /// Render `page` of a plain text file
    DisplayText { name: String, page: u32 },
    /// Render `page` of the text extracted from a JSON document
    DisplayJson { name: String, page: u32 },
    /// Start playing an audio file
    PlayAudio { name: String },
    StopAudio,
    /// Delete every uploaded JSON document
    DeleteAll,
    /// Flash the firmware image stored on the card
    OtaUpdate,
}

impl PendingCommand {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DisplayText { .. } => "display_text",
            Self::DisplayJson { .. } => "display_json",
            Self::PlayAudio { .. } => "play_audio",
            Self::StopAudio => "stop_audio",
            Self::DeleteAll => "delete_all",
            Self::OtaUpdate => "ota_update",
        }
    }
}

/// Last-write-wins command slot with a wake-up signal
pub struct CommandSlot {
    slot: Mutex<CriticalSectionRawMutex, RefCell<Option<PendingCommand>>>,
    ready: Signal<CriticalSectionRawMutex, ()>,
}

impl CommandSlot {
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(RefCell::new(None)),
            ready: Signal::new(),
        }
    }

    /// Store `command`, returning the unconsumed command it replaced.
    pub fn post(&self, command: PendingCommand) -> Option<PendingCommand> {
        let superseded = self.slot.lock(|slot| slot.borrow_mut().replace(command));
        if let Some(dropped) = &superseded {
            log::warn!("command: {} dropped, superseded before it ran", dropped.kind());
        }
        self.ready.signal(());
        superseded
    }

    /// Take the waiting command without blocking
    pub fn take(&self) -> Option<PendingCommand> {
        self.slot.lock(|slot| slot.borrow_mut().take())
    }

    pub fn is_pending(&self) -> bool {
        self.slot.lock(|slot| slot.borrow().is_some())
    }

    /// Wait for a command and take it
    pub async fn wait(&self) -> PendingCommand {
        loop {
            if let Some(command) = self.take() {
                self.ready.reset();
                return command;
            }
            self.ready.wait().await;
        }
    }

    /// Wait until a command is waiting, without taking it
    pub async fn ready(&self) {
        while !self.is_pending() {
            self.ready.wait().await;
        }
    }
}

impl Default for CommandSlot {
    fn default() -> Self {
        Self::new()
    }
}
