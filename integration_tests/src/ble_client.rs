//! BLE client for the glasses' file, image and status services.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use btleplug::api::{Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::time::timeout;
use uuid::Uuid;

use crate::protocol::*;

/// Notifications received since the last clear
#[derive(Default)]
struct Inbox {
    statuses: Vec<String>,
    chunks: Vec<Vec<u8>>,
}

pub struct GlassesClient {
    peripheral: Peripheral,
    characteristics: Vec<Characteristic>,
    inbox: Arc<Mutex<Inbox>>,
}

impl GlassesClient {
    /// Scan for a device by name and connect.
    pub async fn connect_by_name(name: &str, scan_timeout: Duration) -> Result<Self> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No Bluetooth adapters found"))?;

        adapter.start_scan(ScanFilter::default()).await?;
        let peripheral = Self::find_device_by_name(&adapter, name, scan_timeout).await?;
        adapter.stop_scan().await?;

        peripheral.connect().await?;
        peripheral.discover_services().await?;
        let characteristics: Vec<Characteristic> = peripheral.characteristics().into_iter().collect();

        let client = Self {
            peripheral,
            characteristics,
            inbox: Arc::new(Mutex::new(Inbox::default())),
        };
        client.peripheral.subscribe(&client.characteristic(IMAGE_DATA_UUID)?).await?;
        client.peripheral.subscribe(&client.characteristic(STATUS_NOTIFY_UUID)?).await?;

        let inbox = client.inbox.clone();
        let mut stream = client.peripheral.notifications().await?;
        tokio::spawn(async move {
            while let Some(data) = stream.next().await {
                let mut inbox = inbox.lock().await;
                if data.uuid == IMAGE_DATA_UUID {
                    inbox.chunks.push(data.value);
                } else if data.uuid == STATUS_NOTIFY_UUID {
                    inbox.statuses.push(String::from_utf8_lossy(&data.value).into_owned());
                }
            }
        });

        Ok(client)
    }

    async fn find_device_by_name(adapter: &Adapter, name: &str, scan_timeout: Duration) -> Result<Peripheral> {
        let start = std::time::Instant::now();
        while start.elapsed() < scan_timeout {
            for peripheral in adapter.peripherals().await? {
                if let Some(props) = peripheral.properties().await? {
                    if props.local_name.as_deref() == Some(name) {
                        return Ok(peripheral);
                    }
                }
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        Err(anyhow!("Device '{}' not found within timeout", name))
    }

    fn characteristic(&self, uuid: Uuid) -> Result<Characteristic> {
        self.characteristics
            .iter()
            .find(|c| c.uuid == uuid)
            .cloned()
            .ok_or_else(|| anyhow!("characteristic {} not found", uuid))
    }

    pub async fn write(&self, uuid: Uuid, data: &[u8]) -> Result<()> {
        let characteristic = self.characteristic(uuid)?;
        self.peripheral
            .write(&characteristic, data, WriteType::WithResponse)
            .await?;
        Ok(())
    }

    pub async fn read_text(&self, uuid: Uuid) -> Result<String> {
        let value = self.peripheral.read(&self.characteristic(uuid)?).await?;
        Ok(String::from_utf8_lossy(&value).into_owned())
    }

    pub async fn control(&self, command: &str) -> Result<()> {
        self.write(STATUS_CONTROL_UUID, command.as_bytes()).await
    }

    /// Upload `data` as `name` using start/update/end
    pub async fn upload(&self, name: &str, data: &[u8], chunk: usize) -> Result<()> {
        self.write(FILE_NAME_UUID, name.as_bytes()).await?;
        let mut chunks = data.chunks(chunk);
        self.write(FILE_DATA_UUID, chunks.next().unwrap_or(&[])).await?;
        self.write(FILE_CONTROL_UUID, b"start").await?;
        for piece in chunks {
            self.write(FILE_DATA_UUID, piece).await?;
            self.write(FILE_CONTROL_UUID, b"update").await?;
        }
        self.write(FILE_CONTROL_UUID, b"end").await
    }

    /// Wait for a status string to arrive
    pub async fn wait_for_status(&self, status: &str, limit: Duration) -> Result<()> {
        let result = timeout(limit, async {
            loop {
                {
                    let mut inbox = self.inbox.lock().await;
                    if let Some(pos) = inbox.statuses.iter().position(|s| s == status) {
                        inbox.statuses.remove(pos);
                        return;
                    }
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await;
        result.map_err(|_| anyhow!("Timeout waiting for status '{}'", status))
    }

    /// Pull a prepared image with repeated `getimage` until `image_end`
    pub async fn pull_image(&self, limit: Duration) -> Result<Vec<Vec<u8>>> {
        self.clear().await;
        let start = std::time::Instant::now();
        loop {
            self.write(IMAGE_CONTROL_UUID, b"getimage").await?;
            tokio::time::sleep(Duration::from_millis(30)).await;
            let mut inbox = self.inbox.lock().await;
            if let Some(pos) = inbox.statuses.iter().position(|s| s == "image_end") {
                inbox.statuses.remove(pos);
                return Ok(std::mem::take(&mut inbox.chunks));
            }
            if start.elapsed() > limit {
                return Err(anyhow!("image pull did not finish"));
            }
        }
    }

    pub async fn chunks(&self) -> usize {
        self.inbox.lock().await.chunks.len()
    }

    pub async fn clear(&self) {
        let mut inbox = self.inbox.lock().await;
        inbox.statuses.clear();
        inbox.chunks.clear();
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.peripheral.disconnect().await?;
        Ok(())
    }
}
