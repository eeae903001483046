//! Bit-banged one-wire bus master.
//!
//! Standard-speed timing from Maxim AN126 over any `embedded-hal` 1.0
//! pin that can both drive and sense the line (an open-drain GPIO with
//! the external 4.7 kOhm pull-up). Driving low pulls the bus; driving
//! high releases it.
//!
//! ```text
//!  reset   ▔▔\____480us____/▔▔70▔▔[sample presence]▔▔410▔▔
//!  write 1 ▔▔\_6_/▔▔▔▔▔▔▔64▔▔▔▔▔▔▔
//!  write 0 ▔▔\_____60_____/▔▔10▔▔
//!  read    ▔▔\_6_/▔9▔[sample]▔▔55▔▔
//! ```
//!
//! The ROM search follows Maxim AN187 and is generic over [`OneWireBus`],
//! so it runs unchanged against the simulated bus.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::app::ports::{RomAddress, SensorError};

/// ROM command: enumerate devices bit by bit.
pub const CMD_SEARCH_ROM: u8 = 0xF0;
/// ROM command: address one device by its 64-bit code.
pub const CMD_MATCH_ROM: u8 = 0x55;
/// ROM command: address every device at once.
pub const CMD_SKIP_ROM: u8 = 0xCC;

/// Dallas/Maxim CRC-8 (polynomial x^8 + x^5 + x^4 + 1, reflected).
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in data {
        let mut b = byte;
        for _ in 0..8 {
            let mix = (crc ^ b) & 0x01;
            crc >>= 1;
            if mix != 0 {
                crc ^= 0x8C;
            }
            b >>= 1;
        }
    }
    crc
}

/// A ROM code is valid when its last byte is the CRC of the first seven.
pub fn rom_crc_valid(rom: &[u8; 8]) -> bool {
    crc8(&rom[..7]) == rom[7]
}

// ───────────────────────────────────────────────────────────────
// Bus trait
// ───────────────────────────────────────────────────────────────

/// Bit-level access to a one-wire bus. Byte helpers are LSB first.
pub trait OneWireBus {
    /// Reset pulse. `Ok(true)` when at least one device answered with a
    /// presence pulse.
    fn reset(&mut self) -> Result<bool, SensorError>;

    fn write_bit(&mut self, bit: bool) -> Result<(), SensorError>;

    fn read_bit(&mut self) -> Result<bool, SensorError>;

    /// Wait while a device works (temperature conversion).
    fn delay_ms(&mut self, ms: u32);

    fn write_byte(&mut self, byte: u8) -> Result<(), SensorError> {
        for i in 0..8 {
            self.write_bit(byte & (1 << i) != 0)?;
        }
        Ok(())
    }

    fn read_byte(&mut self) -> Result<u8, SensorError> {
        let mut byte = 0u8;
        for i in 0..8 {
            if self.read_bit()? {
                byte |= 1 << i;
            }
        }
        Ok(byte)
    }

    /// Reset, then address `rom`.
    fn select(&mut self, rom: &RomAddress) -> Result<(), SensorError> {
        if !self.reset()? {
            return Err(SensorError::NoPresence);
        }
        self.write_byte(CMD_MATCH_ROM)?;
        for b in rom.0 {
            self.write_byte(b)?;
        }
        Ok(())
    }

    /// Reset, then address every device.
    fn skip(&mut self) -> Result<(), SensorError> {
        if !self.reset()? {
            return Err(SensorError::NoPresence);
        }
        self.write_byte(CMD_SKIP_ROM)
    }
}

// ───────────────────────────────────────────────────────────────
// GPIO implementation
// ───────────────────────────────────────────────────────────────

/// One-wire master on a single open-drain pin.
pub struct GpioOneWire<P, D> {
    pin: P,
    delay: D,
}

impl<P, D> GpioOneWire<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    /// Take the pin and release the line.
    pub fn new(mut pin: P, delay: D) -> Result<Self, SensorError> {
        pin.set_high().map_err(|_| SensorError::BusFault)?;
        Ok(Self { pin, delay })
    }

    fn low(&mut self) -> Result<(), SensorError> {
        self.pin.set_low().map_err(|_| SensorError::BusFault)
    }

    fn release(&mut self) -> Result<(), SensorError> {
        self.pin.set_high().map_err(|_| SensorError::BusFault)
    }

    fn sample(&mut self) -> Result<bool, SensorError> {
        self.pin.is_high().map_err(|_| SensorError::BusFault)
    }
}

impl<P, D> OneWireBus for GpioOneWire<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    fn reset(&mut self) -> Result<bool, SensorError> {
        self.release()?;
        // A line that never rises is shorted or missing its pull-up.
        let mut retries = 125;
        while !self.sample()? {
            retries -= 1;
            if retries == 0 {
                return Err(SensorError::BusFault);
            }
            self.delay.delay_us(2);
        }
        self.low()?;
        self.delay.delay_us(480);
        self.release()?;
        self.delay.delay_us(70);
        let presence = !self.sample()?;
        self.delay.delay_us(410);
        Ok(presence)
    }

    fn write_bit(&mut self, bit: bool) -> Result<(), SensorError> {
        self.low()?;
        if bit {
            self.delay.delay_us(6);
            self.release()?;
            self.delay.delay_us(64);
        } else {
            self.delay.delay_us(60);
            self.release()?;
            self.delay.delay_us(10);
        }
        Ok(())
    }

    fn read_bit(&mut self) -> Result<bool, SensorError> {
        self.low()?;
        self.delay.delay_us(6);
        self.release()?;
        self.delay.delay_us(9);
        let bit = self.sample()?;
        self.delay.delay_us(55);
        Ok(bit)
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }
}

// ───────────────────────────────────────────────────────────────
// ROM search (AN187)
// ───────────────────────────────────────────────────────────────

/// Iterative ROM search state. One [`next`](Self::next) call yields one
/// device; devices come out in ascending bit-reversed ROM order.
#[derive(Debug, Default)]
pub struct RomSearch {
    rom: [u8; 8],
    last_discrepancy: u8,
    last_device: bool,
}

impl RomSearch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next ROM on the bus, or `None` once every device was returned.
    /// The CRC is not checked here.
    pub fn next<B: OneWireBus + ?Sized>(
        &mut self,
        bus: &mut B,
    ) -> Result<Option<[u8; 8]>, SensorError> {
        if self.last_device {
            return Ok(None);
        }
        if !bus.reset()? {
            *self = Self::default();
            return Ok(None);
        }
        bus.write_byte(CMD_SEARCH_ROM)?;

        let mut last_zero = 0u8;
        for bit_number in 1..=64u8 {
            let byte = usize::from((bit_number - 1) / 8);
            let mask = 1u8 << ((bit_number - 1) % 8);

            let id_bit = bus.read_bit()?;
            let cmp_bit = bus.read_bit()?;
            if id_bit && cmp_bit {
                // Nobody answered this bit.
                *self = Self::default();
                return Ok(None);
            }

            let direction = if id_bit != cmp_bit {
                id_bit
            } else {
                let dir = if bit_number < self.last_discrepancy {
                    self.rom[byte] & mask != 0
                } else {
                    bit_number == self.last_discrepancy
                };
                if !dir {
                    last_zero = bit_number;
                }
                dir
            };

            if direction {
                self.rom[byte] |= mask;
            } else {
                self.rom[byte] &= !mask;
            }
            bus.write_bit(direction)?;
        }

        self.last_discrepancy = last_zero;
        if last_zero == 0 {
            self.last_device = true;
        }
        Ok(Some(self.rom))
    }
}
