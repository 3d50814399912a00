//! Firmware update from the SD card
//!
//! The phone uploads `/update.bin` through the normal file channel and then
//! sends `ota_update`. The image is streamed into the inactive app slot and
//! the file is removed whether or not the update succeeded.

#[cfg(feature = "embedded")]
pub mod flash;

use core::fmt;

use crate::config::storage::{READ_BLOCK, UPDATE_IMAGE};
use crate::storage::{Storage, StorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtaError {
    /// Image larger than the target slot
    TooLarge,
    /// Flash erase/write failed
    Flash,
    /// Image did not validate when activated
    Invalid,
    Storage(StorageError),
}

impl From<StorageError> for OtaError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl fmt::Display for OtaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooLarge => write!(f, "image too large for slot"),
            Self::Flash => write!(f, "flash write failed"),
            Self::Invalid => write!(f, "image rejected"),
            Self::Storage(e) => write!(f, "storage: {}", e),
        }
    }
}

/// Writer for the inactive firmware slot
pub trait FirmwareUpdater {
    /// Prepare a slot for an image of `size` bytes
    fn begin(&mut self, size: usize) -> Result<(), OtaError>;

    /// Append image bytes
    fn write(&mut self, data: &[u8]) -> Result<(), OtaError>;

    /// Mark the written slot as the boot slot
    fn finish(&mut self) -> Result<(), OtaError>;

    /// Abandon a partial image
    fn abort(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtaOutcome {
    /// No usable image on the card
    NoImage,
    /// Image flashed; a reboot activates it
    Updated { bytes: usize },
}

/// Flash `/update.bin` if present
pub fn update_from_storage<S: Storage, U: FirmwareUpdater>(
    storage: &mut S,
    updater: &mut U,
) -> Result<OtaOutcome, OtaError> {
    if storage.is_dir(UPDATE_IMAGE) || !storage.exists(UPDATE_IMAGE) {
        log::warn!("ota: {} not found", UPDATE_IMAGE);
        return Ok(OtaOutcome::NoImage);
    }

    let size = storage.size(UPDATE_IMAGE)?;
    if size == 0 {
        log::warn!("ota: {} is empty", UPDATE_IMAGE);
        let _ = storage.remove(UPDATE_IMAGE);
        return Ok(OtaOutcome::NoImage);
    }

    log::info!("ota: flashing {} bytes", size);
    let result = flash(storage, updater, size);
    if result.is_err() {
        updater.abort();
    }

    if let Err(e) = storage.remove(UPDATE_IMAGE) {
        log::warn!("ota: could not remove {}: {}", UPDATE_IMAGE, e);
    }

    match result {
        Ok(()) => {
            log::info!("ota: update written, reboot to apply");
            Ok(OtaOutcome::Updated { bytes: size })
        }
        Err(e) => {
            log::error!("ota: update failed: {}", e);
            Err(e)
        }
    }
}

fn flash<S: Storage, U: FirmwareUpdater>(storage: &mut S, updater: &mut U, size: usize) -> Result<(), OtaError> {
    updater.begin(size)?;
    let mut block = [0u8; READ_BLOCK];
    let mut offset = 0;
    while offset < size {
        let n = storage.read_at(UPDATE_IMAGE, offset, &mut block)?;
        if n == 0 {
            break;
        }
        updater.write(&block[..n])?;
        offset += n;
    }
    if offset != size {
        return Err(OtaError::Storage(StorageError::Io));
    }
    updater.finish()
}
