//! GATT services exposed to the phone
//!
//! - File service aabb0100: data (write), control (write), name (write)
//! - Image service aabb0200: length (read), control (write), data (notify)
//! - Status service aabb0300: battery (read), control (write), notify (notify)
//!
//! Write values are variable length; the dispatcher only ever looks at the
//! bytes of the write event itself.

use trouble_host::prelude::*;

use crate::config::ble::{MAX_NAME_LEN, MAX_WRITE_LEN};
use crate::config::image::CHUNK_SIZE;

/// Longest control string (`display_json`, `takeimage`, ...)
pub const CONTROL_LEN: usize = 32;

/// Read values and status strings
pub const TEXT_LEN: usize = 16;
pub const STATUS_LEN: usize = 32;

pub type WriteValue = heapless::Vec<u8, MAX_WRITE_LEN>;
pub type ControlValue = heapless::Vec<u8, CONTROL_LEN>;
pub type NameValue = heapless::Vec<u8, MAX_NAME_LEN>;
pub type TextValue = heapless::String<TEXT_LEN>;
pub type StatusValue = heapless::String<STATUS_LEN>;
pub type ChunkValue = heapless::Vec<u8, CHUNK_SIZE>;

/// File upload: name, data chunk and start/update/end trigger
#[gatt_service(uuid = "aabb0100-0000-1000-8000-00805f9b34fb")]
pub struct FileService {
    #[characteristic(uuid = "aabb0101-0000-1000-8000-00805f9b34fb", write, write_without_response, value = heapless::Vec::new())]
    pub data: WriteValue,

    #[characteristic(uuid = "aabb0102-0000-1000-8000-00805f9b34fb", write, write_without_response, value = heapless::Vec::new())]
    pub control: ControlValue,

    #[characteristic(uuid = "aabb0103-0000-1000-8000-00805f9b34fb", write, write_without_response, value = heapless::Vec::new())]
    pub name: NameValue,
}

/// Image pull: remaining length, takeimage/getimage trigger, chunks
#[gatt_service(uuid = "aabb0200-0000-1000-8000-00805f9b34fb")]
pub struct ImageService {
    #[characteristic(uuid = "aabb0201-0000-1000-8000-00805f9b34fb", read, value = heapless::String::new())]
    pub length: TextValue,

    #[characteristic(uuid = "aabb0202-0000-1000-8000-00805f9b34fb", write, write_without_response, value = heapless::Vec::new())]
    pub control: ControlValue,

    #[characteristic(uuid = "aabb0203-0000-1000-8000-00805f9b34fb", notify, value = heapless::Vec::new())]
    pub data: ChunkValue,
}

/// Battery, control commands and status notifications
#[gatt_service(uuid = "aabb0300-0000-1000-8000-00805f9b34fb")]
pub struct StatusService {
    #[characteristic(uuid = "aabb0301-0000-1000-8000-00805f9b34fb", read, value = heapless::String::new())]
    pub battery: TextValue,

    #[characteristic(uuid = "aabb0302-0000-1000-8000-00805f9b34fb", write, write_without_response, value = heapless::Vec::new())]
    pub control: ControlValue,

    #[characteristic(uuid = "aabb0303-0000-1000-8000-00805f9b34fb", notify, value = heapless::String::new())]
    pub notify: StatusValue,
}
