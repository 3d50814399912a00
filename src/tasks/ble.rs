//! BLE host task
//!
//! Advertises as `AR_GLASS`, accepts one phone at a time and routes GATT
//! events through [`GattDispatcher`]. Effects coming back from the
//! dispatcher are forwarded to the controller queue, the panel queue or out
//! as notifications.

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use trouble_host::prelude::*;

use crate::ble::service::{ChunkValue, StatusValue};
use crate::ble::{FileService, ImageService, StatusService};
use crate::config::ble::DEVICE_NAME;
use crate::dispatcher::{StatusMessage, CAPTURE_REQUEST, COMMANDS, JOBS, NOTIFY, PANEL, SESSION};
use crate::power::{PowerMonitor, SharedPower};
use crate::session::gatt::{Characteristic, Effect, Effects, GattDispatcher, ReadValue};

/// Number of maximum concurrent connections
const CONNECTIONS_MAX: usize = 1;
/// Number of L2CAP channels
const L2CAP_CHANNELS_MAX: usize = 3;

#[gatt_server(mutex_type = CriticalSectionRawMutex)]
struct Server {
    file: FileService,
    image: ImageService,
    status: StatusService,
}

impl Server<'_> {
    fn characteristic(&self, handle: u16) -> Option<Characteristic> {
        let table = [
            (self.file.data.handle, Characteristic::FileData),
            (self.file.control.handle, Characteristic::FileControl),
            (self.file.name.handle, Characteristic::FileName),
            (self.image.length.handle, Characteristic::ImageLength),
            (self.image.control.handle, Characteristic::ImageControl),
            (self.image.data.handle, Characteristic::ImageData),
            (self.status.battery.handle, Characteristic::StatusBattery),
            (self.status.control.handle, Characteristic::StatusControl),
            (self.status.notify.handle, Characteristic::StatusNotify),
        ];
        table.into_iter().find(|(h, _)| *h == handle).map(|(_, c)| c)
    }

    /// Store a computed value so the pending read returns it
    fn set_read_value(&self, characteristic: Characteristic, value: &ReadValue) {
        let result = match characteristic {
            Characteristic::StatusBattery => self.set(&self.status.battery, value),
            Characteristic::ImageLength => self.set(&self.image.length, value),
            _ => Ok(()),
        };
        if result.is_err() {
            log::warn!("ble: could not set {:?}", characteristic);
        }
    }
}

type Connection<'a, 'b> = GattConnection<'a, 'b, DefaultPacketPool>;

async fn notify_status(server: &Server<'_>, conn: &Connection<'_, '_>, status: StatusMessage) {
    let mut value = StatusValue::new();
    let _ = value.push_str(status.as_str());
    if server.status.notify.notify(conn, &value).await.is_err() {
        log::warn!("ble: status notify {} failed", status.as_str());
    }
}

/// Hand dispatcher effects to the tasks that perform them
async fn forward(server: &Server<'_>, conn: &Connection<'_, '_>, effects: Effects) {
    for effect in effects {
        match effect {
            Effect::Job(job) => JOBS.send(job).await,
            Effect::Panel(msg) => {
                if PANEL.try_send(msg).is_err() {
                    log::warn!("ble: panel queue full, update dropped");
                }
            }
            Effect::Notify(status) => notify_status(server, conn, status).await,
            Effect::ImageChunk(data) => {
                let chunk = ChunkValue::from_slice(&data).unwrap_or_default();
                if server.image.data.notify(conn, &chunk).await.is_err() {
                    log::warn!("ble: image chunk notify failed");
                }
            }
        }
    }
}

/// Serve GATT events until the phone disconnects
async fn serve<P: PowerMonitor>(
    server: &Server<'_>,
    conn: &Connection<'_, '_>,
    dispatcher: &GattDispatcher<'_>,
    power: &SharedPower<P>,
) {
    // Statuses queued while nobody was listening are stale
    while NOTIFY.try_receive().is_ok() {}
    forward(server, conn, dispatcher.on_connect()).await;

    loop {
        match select(conn.next(), NOTIFY.receive()).await {
            Either::First(GattConnectionEvent::Disconnected { reason }) => {
                log::info!("ble: disconnected ({:?})", reason);
                forward(server, conn, dispatcher.on_disconnect()).await;
                return;
            }
            Either::First(GattConnectionEvent::Gatt { event }) => match event {
                GattEvent::Write(write_event) => {
                    let effects = match server.characteristic(write_event.handle()) {
                        Some(characteristic) => dispatcher.on_write(characteristic, write_event.data()),
                        None => Effects::new(),
                    };
                    match write_event.accept() {
                        Ok(reply) => reply.send().await,
                        Err(_) => log::warn!("ble: write reply failed"),
                    }
                    forward(server, conn, effects).await;
                }
                GattEvent::Read(read_event) => {
                    if let Some(characteristic) = server.characteristic(read_event.handle()) {
                        let value = {
                            let mut power = power.lock().await;
                            dispatcher.on_read(characteristic, &mut *power)
                        };
                        if let Some(value) = value {
                            server.set_read_value(characteristic, &value);
                        }
                    }
                    match read_event.accept() {
                        Ok(reply) => reply.send().await,
                        Err(_) => log::warn!("ble: read reply failed"),
                    }
                }
                GattEvent::Other(other_event) => {
                    if let Ok(reply) = other_event.accept() {
                        reply.send().await;
                    }
                }
            },
            Either::First(_) => {}
            Either::Second(status) => notify_status(server, conn, status).await,
        }
    }
}

/// Main BLE task: advertise, accept, serve, repeat
pub async fn ble_task<C: Controller, P: PowerMonitor>(controller: C, address: [u8; 6], power: &SharedPower<P>) {
    log::info!("ble: starting as '{}'", DEVICE_NAME);

    let mut resources: HostResources<DefaultPacketPool, CONNECTIONS_MAX, L2CAP_CHANNELS_MAX> =
        HostResources::new();
    let stack = trouble_host::new(controller, &mut resources).set_random_address(Address::random(address));
    let Host {
        mut peripheral,
        mut runner,
        ..
    } = stack.build();

    let gap = GapConfig::Peripheral(PeripheralConfig {
        name: DEVICE_NAME,
        appearance: &appearance::UNKNOWN,
    });
    let server = match Server::new_with_config(gap) {
        Ok(s) => s,
        Err(_) => {
            log::error!("ble: GATT server setup failed");
            return;
        }
    };

    let dispatcher = GattDispatcher::new(&SESSION, &COMMANDS, &CAPTURE_REQUEST);

    let peripheral_task = async {
        let mut adv_data = [0u8; 31];
        let len = match AdStructure::encode_slice(
            &[
                AdStructure::Flags(LE_GENERAL_DISCOVERABLE | BR_EDR_NOT_SUPPORTED),
                AdStructure::CompleteLocalName(DEVICE_NAME.as_bytes()),
            ],
            &mut adv_data,
        ) {
            Ok(l) => l,
            Err(_) => return,
        };

        loop {
            log::debug!("ble: advertising");
            let advertiser = match peripheral
                .advertise(
                    &Default::default(),
                    Advertisement::ConnectableScannableUndirected {
                        adv_data: &adv_data[..len],
                        scan_data: &[],
                    },
                )
                .await
            {
                Ok(a) => a,
                Err(_) => continue,
            };

            let acceptor = match advertiser.accept().await {
                Ok(a) => a,
                Err(_) => continue,
            };
            let conn = match acceptor.with_attribute_server(&*server) {
                Ok(c) => c,
                Err(_) => continue,
            };

            serve(&server, &conn, &dispatcher, power).await;
        }
    };

    select(runner.run(), peripheral_task).await;
}
