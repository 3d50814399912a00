//! GATT event dispatch
//!
//! Every characteristic has exactly one behaviour, so writes and reads go
//! through a single match on [`Characteristic`]. Handlers only touch the
//! session under its lock, post to the command slot or signal the capture
//! task; everything that needs I/O comes back as an [`Effect`] for the BLE
//! task to forward.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write;

use crate::audio::VolumeStep;
use crate::config::ble::{self, MAX_NAME_LEN, MAX_WRITE_LEN};
use crate::config::image::CHUNK_SIZE;
use crate::dispatcher::{Job, StatusMessage};
use crate::image::{request_capture, CaptureRequest, ChunkStep};
use crate::power::{battery_text, PowerMonitor};
use crate::protocol::PanelMessage;
use crate::session::command::{CommandSlot, PendingCommand};
use crate::session::file_receive::FileEvent;
use crate::session::state::{with_session, DisplayMode, SessionState, SharedSession};
use crate::storage::normalize_path;

/// The nine characteristics of the three services
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Characteristic {
    FileData,
    FileControl,
    FileName,
    ImageLength,
    ImageControl,
    ImageData,
    StatusBattery,
    StatusControl,
    StatusNotify,
}

impl Characteristic {
    pub const ALL: [Characteristic; 9] = [
        Self::FileData,
        Self::FileControl,
        Self::FileName,
        Self::ImageLength,
        Self::ImageControl,
        Self::ImageData,
        Self::StatusBattery,
        Self::StatusControl,
        Self::StatusNotify,
    ];

    pub fn uuid(&self) -> &'static str {
        match self {
            Self::FileData => ble::FILE_DATA_UUID,
            Self::FileControl => ble::FILE_CONTROL_UUID,
            Self::FileName => ble::FILE_NAME_UUID,
            Self::ImageLength => ble::IMAGE_LENGTH_UUID,
            Self::ImageControl => ble::IMAGE_CONTROL_UUID,
            Self::ImageData => ble::IMAGE_DATA_UUID,
            Self::StatusBattery => ble::STATUS_BATTERY_UUID,
            Self::StatusControl => ble::STATUS_CONTROL_UUID,
            Self::StatusNotify => ble::STATUS_NOTIFY_UUID,
        }
    }

    pub fn from_uuid(uuid: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.uuid().eq_ignore_ascii_case(uuid))
    }
}

/// Control strings are compared after dropping trailing NULs and whitespace
fn trigger(data: &[u8]) -> &[u8] {
    let end = data
        .iter()
        .rposition(|b| *b != 0 && !b.is_ascii_whitespace())
        .map_or(0, |i| i + 1);
    &data[..end]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileControl {
    Start,
    Update,
    End,
}

impl FileControl {
    pub fn parse(data: &[u8]) -> Option<Self> {
        match trigger(data) {
            b"start" => Some(Self::Start),
            b"update" => Some(Self::Update),
            b"end" => Some(Self::End),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageControl {
    TakeImage,
    GetImage,
}

impl ImageControl {
    pub fn parse(data: &[u8]) -> Option<Self> {
        match trigger(data) {
            b"takeimage" => Some(Self::TakeImage),
            b"getimage" => Some(Self::GetImage),
            _ => None,
        }
    }
}

/// Status control vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    DisplayText,
    DisplayJson,
    NextPage,
    PreviousPage,
    PlayAudio,
    StopAudio,
    DeleteJson,
    OtaUpdate,
    VolumeUp,
    VolumeDown,
    DeleteFile,
}

impl ControlCommand {
    pub fn parse(data: &[u8]) -> Option<Self> {
        match trigger(data) {
            b"display_txt" => Some(Self::DisplayText),
            b"display_json" => Some(Self::DisplayJson),
            b"next_page" => Some(Self::NextPage),
            b"pre_page" => Some(Self::PreviousPage),
            b"play_mp3" => Some(Self::PlayAudio),
            b"stop_mp3" => Some(Self::StopAudio),
            b"delete_json" => Some(Self::DeleteJson),
            // The shipped app spells it "ota_updata"
            b"ota_update" | b"ota_updata" => Some(Self::OtaUpdate),
            b"vol_up" => Some(Self::VolumeUp),
            b"vol_down" => Some(Self::VolumeDown),
            b"delete_file" => Some(Self::DeleteFile),
            _ => None,
        }
    }
}

/// Work the BLE task performs after a handler returns
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Queue for the controller
    Job(Job),
    /// Send on the status notify characteristic
    Notify(StatusMessage),
    /// Send on the image data characteristic
    ImageChunk(Vec<u8>),
    /// Send to the panel over the serial link
    Panel(PanelMessage),
}

pub type Effects = heapless::Vec<Effect, 4>;

/// Value computed for a read
pub type ReadValue = heapless::String<16>;

/// Routes GATT events into the session
pub struct GattDispatcher<'a> {
    session: &'a SharedSession,
    commands: &'a CommandSlot,
    capture: &'a CaptureRequest,
}

impl<'a> GattDispatcher<'a> {
    pub fn new(session: &'a SharedSession, commands: &'a CommandSlot, capture: &'a CaptureRequest) -> Self {
        Self {
            session,
            commands,
            capture,
        }
    }

    pub fn on_connect(&self) -> Effects {
        let generation = with_session(self.session, |s| s.connect());
        log::info!("ble: connected (session {})", generation);
        effects([Effect::Panel(PanelMessage::BleState(true))])
    }

    /// Drop per-connection state. An open upload is aborted by the
    /// controller so its partial file does not survive.
    pub fn on_disconnect(&self) -> Effects {
        let freed = with_session(self.session, |s| s.disconnect());
        if freed {
            log::info!("ble: disconnected, prepared image released");
        } else {
            log::info!("ble: disconnected");
        }
        effects([
            Effect::Job(Job::File(FileEvent::Abort)),
            Effect::Panel(PanelMessage::BleState(false)),
        ])
    }

    pub fn on_write(&self, characteristic: Characteristic, data: &[u8]) -> Effects {
        match characteristic {
            Characteristic::FileData => {
                self.store_data(data);
                Effects::new()
            }
            Characteristic::FileName => {
                self.store_name(data);
                Effects::new()
            }
            Characteristic::FileControl => match FileControl::parse(data) {
                Some(control) => self.file_control(control),
                None => ignored(characteristic, data),
            },
            Characteristic::ImageControl => match ImageControl::parse(data) {
                Some(ImageControl::TakeImage) => self.take_image(),
                Some(ImageControl::GetImage) => self.get_image(),
                None => ignored(characteristic, data),
            },
            Characteristic::StatusControl => match ControlCommand::parse(data) {
                Some(command) => self.control(command),
                None => ignored(characteristic, data),
            },
            Characteristic::ImageLength
            | Characteristic::ImageData
            | Characteristic::StatusBattery
            | Characteristic::StatusNotify => {
                log::warn!("ble: write to read-only {:?}", characteristic);
                Effects::new()
            }
        }
    }

    /// Compute a read value. `None` for characteristics without one.
    pub fn on_read<P: PowerMonitor>(&self, characteristic: Characteristic, power: &mut P) -> Option<ReadValue> {
        match characteristic {
            Characteristic::StatusBattery => {
                let mut value = ReadValue::new();
                let _ = value.push_str(&battery_text(power));
                Some(value)
            }
            Characteristic::ImageLength => {
                let remaining = with_session(self.session, |s| s.image.remaining());
                let mut value = ReadValue::new();
                let _ = write!(value, "{}", remaining);
                Some(value)
            }
            _ => None,
        }
    }

    fn store_data(&self, data: &[u8]) {
        let data = &data[..data.len().min(MAX_WRITE_LEN)];
        with_session(self.session, |s| {
            s.file_data.clear();
            s.file_data.extend_from_slice(data);
        });
    }

    fn store_name(&self, data: &[u8]) {
        let data = trigger(data);
        if data.len() > MAX_NAME_LEN {
            log::warn!("ble: file name truncated to {} bytes", MAX_NAME_LEN);
        }
        let name = String::from_utf8_lossy(&data[..data.len().min(MAX_NAME_LEN)]).into_owned();
        log::debug!("ble: file name {}", name);
        with_session(self.session, |s| s.file_name = name);
    }

    fn file_control(&self, control: FileControl) -> Effects {
        let event = with_session(self.session, |s| match control {
            FileControl::Start => FileEvent::Start {
                name: s.file_name.clone(),
                first_chunk: s.file_data.clone(),
            },
            FileControl::Update => FileEvent::Update(s.file_data.clone()),
            FileControl::End => FileEvent::End,
        });
        effects([Effect::Job(Job::File(event))])
    }

    fn take_image(&self) -> Effects {
        if request_capture(self.session, self.capture) {
            log::info!("ble: capture requested");
        } else {
            log::warn!("ble: capture already in progress, request rejected");
        }
        Effects::new()
    }

    fn get_image(&self) -> Effects {
        match with_session(self.session, |s| s.image.next_chunk(CHUNK_SIZE)) {
            Some(ChunkStep::Chunk(data)) => effects([Effect::ImageChunk(data)]),
            Some(ChunkStep::Last(data)) => {
                log::info!("ble: image transfer complete");
                effects([
                    Effect::ImageChunk(data),
                    Effect::Notify(StatusMessage::ImageEnd),
                ])
            }
            None => {
                log::warn!("ble: getimage with no image prepared");
                Effects::new()
            }
        }
    }

    fn control(&self, command: ControlCommand) -> Effects {
        log::info!("ble: control {:?}", command);
        match command {
            ControlCommand::DisplayText | ControlCommand::DisplayJson => {
                let pending = with_session(self.session, |s| {
                    let name = normalize_path(&s.file_name);
                    let mode = if command == ControlCommand::DisplayText {
                        DisplayMode::Text(name)
                    } else {
                        DisplayMode::Json(name)
                    };
                    s.open_document(mode);
                    display_command(s)
                });
                if let Some(pending) = pending {
                    self.commands.post(pending);
                }
            }
            ControlCommand::NextPage | ControlCommand::PreviousPage => {
                let pending = with_session(self.session, |s| {
                    let moved = if command == ControlCommand::NextPage {
                        s.next_page()
                    } else {
                        s.previous_page()
                    };
                    if moved {
                        display_command(s)
                    } else {
                        None
                    }
                });
                match pending {
                    Some(pending) => {
                        self.commands.post(pending);
                    }
                    None => log::warn!("ble: no document displayed"),
                }
            }
            ControlCommand::PlayAudio => {
                let name = with_session(self.session, |s| normalize_path(&s.file_name));
                self.commands.post(PendingCommand::PlayAudio { name });
            }
            ControlCommand::StopAudio => {
                self.commands.post(PendingCommand::StopAudio);
            }
            ControlCommand::DeleteJson => {
                self.commands.post(PendingCommand::DeleteAll);
            }
            ControlCommand::OtaUpdate => {
                self.commands.post(PendingCommand::OtaUpdate);
            }
            ControlCommand::VolumeUp => return effects([Effect::Job(Job::Volume(VolumeStep::Up))]),
            ControlCommand::VolumeDown => return effects([Effect::Job(Job::Volume(VolumeStep::Down))]),
            ControlCommand::DeleteFile => {
                let name = with_session(self.session, |s| normalize_path(&s.file_name));
                return effects([Effect::Job(Job::DeleteFile(name))]);
            }
        }
        Effects::new()
    }
}

/// Render command for the document and page currently selected
fn display_command(s: &SessionState) -> Option<PendingCommand> {
    let page = s.display.page;
    match &s.display.mode {
        DisplayMode::None => None,
        DisplayMode::Text(name) => Some(PendingCommand::DisplayText {
            name: name.clone(),
            page,
        }),
        DisplayMode::Json(name) => Some(PendingCommand::DisplayJson {
            name: name.clone(),
            page,
        }),
    }
}

fn effects<const N: usize>(items: [Effect; N]) -> Effects {
    let mut out = Effects::new();
    for item in items {
        let _ = out.push(item);
    }
    out
}

fn ignored(characteristic: Characteristic, data: &[u8]) -> Effects {
    log::warn!(
        "ble: unknown trigger on {:?}: {}",
        characteristic,
        String::from_utf8_lossy(trigger(data))
    );
    Effects::new()
}
