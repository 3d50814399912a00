//! OTA writer for the inactive app partition
//!
//! Image bytes are collected into flash sectors and written to the next OTA
//! slot one sector at a time. The partition table is re-read for every
//! sector since the region handle borrows the updater.

use alloc::vec::Vec;

use embedded_storage::{ReadStorage, Storage as _};
use esp_bootloader_esp_idf::ota::OtaImageState;
use esp_bootloader_esp_idf::ota_updater::OtaUpdater;
use esp_bootloader_esp_idf::partitions::PARTITION_TABLE_MAX_LEN;
use esp_storage::FlashStorage;

use crate::ota::{FirmwareUpdater, OtaError};

const SECTOR_SIZE: usize = 4096;

pub struct FlashUpdater<'d> {
    flash: FlashStorage<'d>,
    pending: Vec<u8>,
    /// Bytes already written to the slot
    written: u32,
    size: usize,
}

impl<'d> FlashUpdater<'d> {
    pub fn new(flash: FlashStorage<'d>) -> Self {
        Self {
            flash,
            pending: Vec::new(),
            written: 0,
            size: 0,
        }
    }

    /// Write `data` at `offset` in the next slot, returning the slot size
    fn write_slot(&mut self, offset: u32, data: &[u8]) -> Result<usize, OtaError> {
        let mut table = [0u8; PARTITION_TABLE_MAX_LEN];
        let mut ota = OtaUpdater::new(&mut self.flash, &mut table).map_err(|_| OtaError::Flash)?;
        let (mut region, _) = ota.next_partition().map_err(|_| OtaError::Flash)?;
        let capacity = region.capacity();
        if offset as usize + data.len() > capacity {
            return Err(OtaError::TooLarge);
        }
        if !data.is_empty() {
            region.write(offset, data).map_err(|_| OtaError::Flash)?;
        }
        Ok(capacity)
    }

    fn flush(&mut self) -> Result<(), OtaError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let pending = core::mem::take(&mut self.pending);
        self.write_slot(self.written, &pending)?;
        self.written += pending.len() as u32;
        self.pending = pending;
        self.pending.clear();
        Ok(())
    }
}

impl FirmwareUpdater for FlashUpdater<'_> {
    fn begin(&mut self, size: usize) -> Result<(), OtaError> {
        let capacity = self.write_slot(0, &[])?;
        if size > capacity {
            log::error!("ota: image of {} bytes exceeds slot of {}", size, capacity);
            return Err(OtaError::TooLarge);
        }
        self.pending.clear();
        self.pending
            .try_reserve_exact(SECTOR_SIZE)
            .map_err(|_| OtaError::Flash)?;
        self.written = 0;
        self.size = size;
        Ok(())
    }

    fn write(&mut self, mut data: &[u8]) -> Result<(), OtaError> {
        while !data.is_empty() {
            let take = (SECTOR_SIZE - self.pending.len()).min(data.len());
            self.pending.extend_from_slice(&data[..take]);
            data = &data[take..];
            if self.pending.len() == SECTOR_SIZE {
                self.flush()?;
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), OtaError> {
        self.flush()?;
        if self.written as usize != self.size {
            return Err(OtaError::Invalid);
        }
        let mut table = [0u8; PARTITION_TABLE_MAX_LEN];
        let mut ota = OtaUpdater::new(&mut self.flash, &mut table).map_err(|_| OtaError::Flash)?;
        ota.activate_next_partition().map_err(|_| OtaError::Invalid)?;
        ota.set_current_ota_state(OtaImageState::New)
            .map_err(|_| OtaError::Flash)?;
        log::info!("ota: {} bytes written, next slot activated", self.written);
        Ok(())
    }

    fn abort(&mut self) {
        self.pending = Vec::new();
        self.written = 0;
        self.size = 0;
    }
}
