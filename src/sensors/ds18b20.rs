//! DS18B20 probe array on one one-wire bus.
//!
//! Implements [`SensorBusPort`]. Enumeration counts only devices whose ROM
//! CRC checks out; [`SensorBusPort::address`] re-runs the search and
//! returns the `index`-th valid ROM, so a device that drops off (or flakes
//! its CRC) between enumeration and lookup shows up as a ghost (`None`)
//! rather than shifting the later columns.
//!
//! Readings use the 12-bit default resolution (0.0625 °C, 750 ms
//! conversion).

use log::{debug, warn};

use crate::app::ports::{RomAddress, SensorBusPort, SensorError};

use super::onewire::{OneWireBus, RomSearch, crc8, rom_crc_valid};

/// Function command: start a temperature conversion.
pub const CMD_CONVERT_T: u8 = 0x44;
/// Function command: read the 9-byte scratchpad.
pub const CMD_READ_SCRATCHPAD: u8 = 0xBE;

/// Worst-case 12-bit conversion time.
const CONVERSION_MS: u32 = 750;
/// Poll interval while waiting for a conversion to finish.
const CONVERSION_POLL_MS: u32 = 10;

/// DS18S20 reports in 0.5 °C steps.
const FAMILY_DS18S20: u8 = 0x10;

/// Convert a raw scratchpad reading to °C for the given family code.
pub fn raw_to_celsius(family: u8, raw: i16, config: u8) -> f32 {
    if family == FAMILY_DS18S20 {
        return f32::from(raw) / 2.0;
    }
    // Undefined low bits at reduced resolution.
    let masked = match (config >> 5) & 0x03 {
        0 => raw & !0x07,
        1 => raw & !0x03,
        2 => raw & !0x01,
        _ => raw,
    };
    f32::from(masked) / 16.0
}

pub struct Ds18b20Array<B> {
    bus: B,
    count: usize,
}

impl<B: OneWireBus> Ds18b20Array<B> {
    pub fn new(bus: B) -> Self {
        Self { bus, count: 0 }
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Walk the whole bus, counting valid ROMs.
    fn enumerate(&mut self) -> usize {
        let mut search = RomSearch::new();
        let mut valid = 0;
        loop {
            match search.next(&mut self.bus) {
                Ok(Some(rom)) if rom_crc_valid(&rom) => valid += 1,
                Ok(Some(rom)) => debug!("Skipping ROM with bad CRC: {}", RomAddress(rom)),
                Ok(None) => break,
                Err(e) => {
                    warn!("Bus search aborted: {}", e);
                    break;
                }
            }
        }
        valid
    }

    fn read_scratchpad(&mut self, rom: &RomAddress) -> Result<[u8; 9], SensorError> {
        self.bus.select(rom)?;
        self.bus.write_byte(CMD_READ_SCRATCHPAD)?;
        let mut pad = [0u8; 9];
        for b in pad.iter_mut() {
            *b = self.bus.read_byte()?;
        }
        if pad.iter().all(|&b| b == 0) {
            return Err(SensorError::NoPresence);
        }
        if crc8(&pad[..8]) != pad[8] {
            return Err(SensorError::CrcMismatch);
        }
        Ok(pad)
    }
}

impl<B: OneWireBus> SensorBusPort for Ds18b20Array<B> {
    fn device_count(&mut self) -> usize {
        self.count = self.enumerate();
        self.count
    }

    fn address(&mut self, index: usize) -> Option<RomAddress> {
        let mut search = RomSearch::new();
        let mut seen = 0;
        while let Ok(Some(rom)) = search.next(&mut self.bus) {
            if !rom_crc_valid(&rom) {
                continue;
            }
            if seen == index {
                return Some(RomAddress(rom));
            }
            seen += 1;
        }
        None
    }

    fn request_conversion(&mut self) -> Result<(), SensorError> {
        self.bus.skip()?;
        self.bus.write_byte(CMD_CONVERT_T)?;
        // Devices hold the line low until the conversion is done.
        let mut waited = 0;
        while waited < CONVERSION_MS {
            if self.bus.read_bit()? {
                return Ok(());
            }
            self.bus.delay_ms(CONVERSION_POLL_MS);
            waited += CONVERSION_POLL_MS;
        }
        Ok(())
    }

    fn temperature_c(&mut self, rom: &RomAddress) -> Result<f32, SensorError> {
        let pad = self.read_scratchpad(rom)?;
        let raw = i16::from_le_bytes([pad[0], pad[1]]);
        Ok(raw_to_celsius(rom.0[0], raw, pad[4]))
    }
}
