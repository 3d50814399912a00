//! Phone session
//!
//! Per-connection state, the command slot between the BLE task and the
//! controller, the file upload state machine and the GATT dispatcher.

pub mod command;
pub mod file_receive;
pub mod gatt;
pub mod state;

pub use command::{CommandSlot, PendingCommand};
pub use file_receive::{FileEvent, FileOutcome, FileReceiveSession, ReceiveState};
pub use gatt::{Characteristic, ControlCommand, Effect, Effects, GattDispatcher};
pub use state::{with_session, Connection, DisplayMode, SessionState, SharedSession};
