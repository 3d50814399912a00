//! Periodic power diagnostics
//!
//! Logs the power rail state and keeps the panel's battery indicator
//! current.

use embassy_time::{Duration, Timer};

use crate::config::power::DIAGNOSTICS_INTERVAL_MS;
use crate::dispatcher::PANEL;
use crate::power::{PowerMonitor, SharedPower};
use crate::protocol::PanelMessage;

pub async fn diagnostics_task<P: PowerMonitor>(power: &SharedPower<P>) {
    loop {
        Timer::after(Duration::from_millis(DIAGNOSTICS_INTERVAL_MS)).await;

        let status = power.lock().await.status();
        match status {
            Ok(status) => {
                log::info!("power: {}", status);
                if status.battery_present && PANEL.try_send(PanelMessage::Battery(status.battery_percent)).is_err() {
                    log::debug!("power: panel queue full, battery update skipped");
                }
            }
            Err(e) => log::warn!("power: {}", e),
        }
    }
}
