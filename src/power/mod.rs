//! Power management chip interface
//!
//! The battery characteristic is computed when it is read, and the
//! diagnostics task samples the same monitor on a timer.

#[cfg(feature = "embedded")]
pub mod axp2101;

use core::fmt;
use core::fmt::Write;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;

use crate::config::power::NO_BATTERY;

/// Power monitor shared by the BLE and diagnostics tasks
pub type SharedPower<P> = Mutex<CriticalSectionRawMutex, P>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerError {
    /// Chip did not answer or returned the wrong ID
    NotResponding,
    /// Bus transfer failed
    Bus,
}

impl fmt::Display for PowerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotResponding => write!(f, "power chip not responding"),
            Self::Bus => write!(f, "power chip bus error"),
        }
    }
}

/// One sample of the power rail state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerStatus {
    pub charging: bool,
    pub vbus_present: bool,
    pub battery_present: bool,
    pub battery_mv: u16,
    pub battery_percent: u8,
}

pub trait PowerMonitor {
    /// Battery charge in percent, `None` when no cell is fitted
    fn battery_percent(&mut self) -> Result<Option<u8>, PowerError>;

    fn status(&mut self) -> Result<PowerStatus, PowerError>;
}

/// Text served on the battery characteristic
pub fn battery_text<P: PowerMonitor>(power: &mut P) -> heapless::String<8> {
    let value = match power.battery_percent() {
        Ok(Some(percent)) => percent as i16,
        Ok(None) => NO_BATTERY,
        Err(e) => {
            log::warn!("power: battery read failed: {}", e);
            NO_BATTERY
        }
    };
    let mut text = heapless::String::new();
    let _ = write!(text, "{}", value);
    text
}

impl fmt::Display for PowerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "charging={} vbus={} battery={}",
            self.charging, self.vbus_present, self.battery_present
        )?;
        if self.battery_present {
            write!(f, " {}mV {}%", self.battery_mv, self.battery_percent)?;
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::mock::MockPowerMonitor;
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_battery_text() {
        assert_eq!(battery_text(&mut MockPowerMonitor::with_battery(87)).as_str(), "87");
        assert_eq!(battery_text(&mut MockPowerMonitor::with_battery(100)).as_str(), "100");
        assert_eq!(battery_text(&mut MockPowerMonitor::without_battery()).as_str(), "-1");

        let mut failing = MockPowerMonitor::with_battery(50);
        failing.fail = true;
        assert_eq!(battery_text(&mut failing).as_str(), "-1");
    }

    #[test]
    fn test_status_report() {
        let status = MockPowerMonitor::with_battery(64).status;
        assert_eq!(
            status.to_string(),
            "charging=false vbus=false battery=true 3900mV 64%"
        );
        let status = MockPowerMonitor::without_battery().status;
        assert_eq!(status.to_string(), "charging=false vbus=true battery=false");
    }
}
