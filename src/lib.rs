#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod audio;
pub mod config;
pub mod dispatcher;
pub mod image;
pub mod input;
pub mod ota;
pub mod paging;
pub mod power;
pub mod protocol;
pub mod serial;
pub mod session;
pub mod storage;

// Hardware-facing modules need the ESP HAL and BLE stack
#[cfg(feature = "embedded")]
pub mod ble;
#[cfg(feature = "embedded")]
pub mod tasks;
