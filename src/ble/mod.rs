//! Bluetooth Low Energy module
//!
//! Declares the three GATT services the companion app talks to. Event
//! handling lives in `session::gatt`, the connection loop in `tasks::ble`.

pub mod service;

pub use service::{FileService, ImageService, StatusService};
