//! AXP2101 power management chip
//!
//! Only the status, battery voltage and fuel gauge registers are used.

use embedded_hal::i2c::I2c;

use crate::config::power::AXP2101_ADDRESS;
use crate::power::{PowerError, PowerMonitor, PowerStatus};

mod reg {
    pub const STATUS1: u8 = 0x00;
    pub const STATUS2: u8 = 0x01;
    pub const CHIP_ID: u8 = 0x03;
    pub const FUEL_GAUGE_CTRL: u8 = 0x18;
    pub const ADC_ENABLE: u8 = 0x30;
    pub const VBAT_H: u8 = 0x34;
    pub const VBAT_L: u8 = 0x35;
    pub const BATTERY_PERCENT: u8 = 0xA4;
}

const CHIP_ID: u8 = 0x4A;

/// STATUS1 bits
const VBUS_GOOD: u8 = 1 << 5;
const BATTERY_PRESENT: u8 = 1 << 3;

/// STATUS2 charge state field, bits 6:5
const CHARGE_STATE_SHIFT: u8 = 5;
const CHARGING: u8 = 0b01;

const FUEL_GAUGE_ENABLE: u8 = 1 << 3;
const VBAT_ADC_ENABLE: u8 = 1 << 0;

pub struct Axp2101<I> {
    i2c: I,
}

impl<I: I2c> Axp2101<I> {
    /// Probe the chip and enable the battery measurements.
    pub fn new(i2c: I) -> Result<Self, PowerError> {
        let mut chip = Self { i2c };
        let id = chip.read(reg::CHIP_ID)?;
        if id != CHIP_ID {
            log::error!("axp2101: unexpected chip id {:#04x}", id);
            return Err(PowerError::NotResponding);
        }
        chip.set_bits(reg::ADC_ENABLE, VBAT_ADC_ENABLE)?;
        chip.set_bits(reg::FUEL_GAUGE_CTRL, FUEL_GAUGE_ENABLE)?;
        log::info!("axp2101: ready");
        Ok(chip)
    }

    fn read(&mut self, register: u8) -> Result<u8, PowerError> {
        let mut value = [0u8];
        self.i2c
            .write_read(AXP2101_ADDRESS, &[register], &mut value)
            .map_err(|_| PowerError::Bus)?;
        Ok(value[0])
    }

    fn write(&mut self, register: u8, value: u8) -> Result<(), PowerError> {
        self.i2c
            .write(AXP2101_ADDRESS, &[register, value])
            .map_err(|_| PowerError::Bus)
    }

    fn set_bits(&mut self, register: u8, bits: u8) -> Result<(), PowerError> {
        let value = self.read(register)?;
        self.write(register, value | bits)
    }

    fn battery_mv(&mut self) -> Result<u16, PowerError> {
        let high = self.read(reg::VBAT_H)? as u16;
        let low = self.read(reg::VBAT_L)? as u16;
        Ok(((high & 0x3F) << 8) | low)
    }
}

impl<I: I2c> PowerMonitor for Axp2101<I> {
    fn battery_percent(&mut self) -> Result<Option<u8>, PowerError> {
        if self.read(reg::STATUS1)? & BATTERY_PRESENT == 0 {
            return Ok(None);
        }
        Ok(Some(self.read(reg::BATTERY_PERCENT)?.min(100)))
    }

    fn status(&mut self) -> Result<PowerStatus, PowerError> {
        let status1 = self.read(reg::STATUS1)?;
        let status2 = self.read(reg::STATUS2)?;
        let battery_present = status1 & BATTERY_PRESENT != 0;
        let (battery_mv, battery_percent) = if battery_present {
            (self.battery_mv()?, self.read(reg::BATTERY_PERCENT)?.min(100))
        } else {
            (0, 0)
        };
        Ok(PowerStatus {
            charging: (status2 >> CHARGE_STATE_SHIFT) & 0b11 == CHARGING,
            vbus_present: status1 & VBUS_GOOD != 0,
            battery_present,
            battery_mv,
            battery_percent,
        })
    }
}
