//! Simulated one-wire bus with DS18B20 device models.
//!
//! Answers the ROM search, match/skip addressing, convert and read
//! scratchpad at bit level, so [`Ds18b20Array`](super::ds18b20::Ds18b20Array)
//! runs unchanged against it on the host.

use crate::app::ports::SensorError;

use super::ds18b20::{CMD_CONVERT_T, CMD_READ_SCRATCHPAD};
use super::onewire::{CMD_MATCH_ROM, CMD_SEARCH_ROM, CMD_SKIP_ROM, OneWireBus, crc8};

/// DS18B20 family code.
const FAMILY_DS18B20: u8 = 0x28;

/// One simulated probe.
#[derive(Debug, Clone, PartialEq)]
pub struct SimProbe {
    pub rom: [u8; 8],
    pub celsius: f32,
    /// Flip the scratchpad CRC on every read.
    pub corrupt_scratchpad: bool,
}

impl SimProbe {
    /// A DS18B20 with a 48-bit `serial` and a valid ROM CRC.
    pub fn ds18b20(serial: u64, celsius: f32) -> Self {
        let mut rom = [0u8; 8];
        rom[0] = FAMILY_DS18B20;
        rom[1..7].copy_from_slice(&serial.to_le_bytes()[..6]);
        rom[7] = crc8(&rom[..7]);
        Self {
            rom,
            celsius,
            corrupt_scratchpad: false,
        }
    }

    /// Same probe with a broken ROM CRC.
    pub fn with_bad_rom_crc(mut self) -> Self {
        self.rom[7] ^= 0xFF;
        self
    }

    pub fn with_corrupt_scratchpad(mut self) -> Self {
        self.corrupt_scratchpad = true;
        self
    }

    fn rom_bit(&self, index: usize) -> bool {
        self.rom[index / 8] & (1 << (index % 8)) != 0
    }

    fn scratchpad(&self) -> [u8; 9] {
        let raw = (self.celsius * 16.0).round() as i16;
        let [lo, hi] = raw.to_le_bytes();
        let mut pad = [lo, hi, 0x4B, 0x46, 0x7F, 0xFF, 0x0C, 0x10, 0];
        pad[8] = crc8(&pad[..8]);
        if self.corrupt_scratchpad {
            pad[8] ^= 0xFF;
        }
        pad
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum SearchStep {
    IdBit,
    Complement,
    Direction,
}

#[derive(Debug, Clone, PartialEq)]
enum Phase {
    /// No reset yet, or the transaction ended.
    Idle,
    /// Reset done; next byte is a ROM command.
    RomCommand,
    Search { bit: usize, step: SearchStep },
    MatchRom { rom: [u8; 8], received: usize },
    /// Devices selected; next byte is a function command.
    Function,
    Converting,
    ReadScratchpad { data: [u8; 9], bit: usize },
}

/// Bus model shared by every probe on it.
pub struct SimBus {
    probes: Vec<SimProbe>,
    active: Vec<bool>,
    phase: Phase,
    shift: u8,
    shift_bits: u8,
    last_byte: Option<u8>,
    fault: bool,
}

impl SimBus {
    pub fn new(probes: Vec<SimProbe>) -> Self {
        let active = vec![false; probes.len()];
        Self {
            probes,
            active,
            phase: Phase::Idle,
            shift: 0,
            shift_bits: 0,
            last_byte: None,
            fault: false,
        }
    }

    /// Make every bus operation fail as a shorted line would.
    pub fn set_fault(&mut self, fault: bool) {
        self.fault = fault;
    }

    pub fn probes_mut(&mut self) -> &mut Vec<SimProbe> {
        self.active = vec![false; self.probes.len()];
        &mut self.probes
    }

    /// Last complete byte the master wrote.
    pub fn last_byte_written(&self) -> Option<u8> {
        self.last_byte
    }

    fn check(&self) -> Result<(), SensorError> {
        if self.fault {
            Err(SensorError::BusFault)
        } else {
            Ok(())
        }
    }

    fn active_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.active
            .iter()
            .enumerate()
            .filter(|(_, a)| **a)
            .map(|(i, _)| i)
    }

    fn on_byte(&mut self, byte: u8) {
        self.last_byte = Some(byte);
        self.phase = match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::RomCommand => match byte {
                CMD_SEARCH_ROM => Phase::Search {
                    bit: 0,
                    step: SearchStep::IdBit,
                },
                CMD_SKIP_ROM => Phase::Function,
                CMD_MATCH_ROM => Phase::MatchRom {
                    rom: [0; 8],
                    received: 0,
                },
                _ => Phase::Idle,
            },
            Phase::MatchRom { mut rom, received } => {
                rom[received] = byte;
                if received + 1 < 8 {
                    Phase::MatchRom {
                        rom,
                        received: received + 1,
                    }
                } else {
                    for (i, probe) in self.probes.iter().enumerate() {
                        self.active[i] = probe.rom == rom;
                    }
                    Phase::Function
                }
            }
            Phase::Function => match byte {
                CMD_CONVERT_T => Phase::Converting,
                CMD_READ_SCRATCHPAD => {
                    let mut selected = self.active_indices();
                    match (selected.next(), selected.next()) {
                        (Some(i), None) => Phase::ReadScratchpad {
                            data: self.probes[i].scratchpad(),
                            bit: 0,
                        },
                        // Nobody (or a collision) drives the line: all ones.
                        _ => Phase::ReadScratchpad {
                            data: [0xFF; 9],
                            bit: 0,
                        },
                    }
                }
                _ => Phase::Idle,
            },
            other => other,
        };
    }
}

impl OneWireBus for SimBus {
    fn reset(&mut self) -> Result<bool, SensorError> {
        self.check()?;
        self.active = vec![true; self.probes.len()];
        self.shift = 0;
        self.shift_bits = 0;
        self.phase = Phase::RomCommand;
        Ok(!self.probes.is_empty())
    }

    fn write_bit(&mut self, bit: bool) -> Result<(), SensorError> {
        self.check()?;
        if let Phase::Search { bit: index, step } = self.phase {
            if step == SearchStep::Direction {
                for i in 0..self.probes.len() {
                    if self.active[i] && self.probes[i].rom_bit(index) != bit {
                        self.active[i] = false;
                    }
                }
                self.phase = if index + 1 < 64 {
                    Phase::Search {
                        bit: index + 1,
                        step: SearchStep::IdBit,
                    }
                } else {
                    Phase::Idle
                };
            }
            return Ok(());
        }

        if bit {
            self.shift |= 1 << self.shift_bits;
        }
        self.shift_bits += 1;
        if self.shift_bits == 8 {
            let byte = self.shift;
            self.shift = 0;
            self.shift_bits = 0;
            self.on_byte(byte);
        }
        Ok(())
    }

    fn read_bit(&mut self) -> Result<bool, SensorError> {
        self.check()?;
        match self.phase.clone() {
            Phase::Search { bit, step } => {
                // Wired-AND: any device driving 0 wins.
                let value = match step {
                    SearchStep::IdBit => self
                        .active_indices()
                        .all(|i| self.probes[i].rom_bit(bit)),
                    SearchStep::Complement => self
                        .active_indices()
                        .all(|i| !self.probes[i].rom_bit(bit)),
                    SearchStep::Direction => true,
                };
                let next = match step {
                    SearchStep::IdBit => SearchStep::Complement,
                    _ => SearchStep::Direction,
                };
                self.phase = Phase::Search { bit, step: next };
                Ok(value)
            }
            Phase::ReadScratchpad { data, bit } => {
                if bit >= 72 {
                    return Ok(true);
                }
                let value = data[bit / 8] & (1 << (bit % 8)) != 0;
                self.phase = Phase::ReadScratchpad { data, bit: bit + 1 };
                Ok(value)
            }
            // Conversion finishes instantly; the bus idles high.
            _ => Ok(true),
        }
    }

    fn delay_ms(&mut self, _ms: u32) {}
}
