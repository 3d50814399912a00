//! Embassy tasks
//!
//! Plain async functions, wrapped in `#[embassy_executor::task]` by
//! `main.rs` with concrete hardware types.

pub mod ble;
pub mod button;
pub mod capture;
pub mod controller;
pub mod diagnostics;
pub mod link;

pub use ble::ble_task;
pub use button::button_task;
pub use capture::capture_task;
pub use controller::controller_task;
pub use diagnostics::diagnostics_task;
pub use link::{link_reader_task, link_writer_task};
