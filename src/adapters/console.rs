//! Local serial console adapter.
//!
//! Implements [`ConsolePort`] — the bridge between the device's serial
//! port and the connected command client. Bytes a client sends are echoed
//! here; bytes typed here are forwarded to the client.
//!
//! - **`target_os = "espidf"`**: UART0 through `UartDriver`, non-blocking
//!   reads.
//! - **all other targets**: stdin (read on a helper thread) and stdout.

use log::warn;

use crate::app::ports::ConsolePort;

// ───────────────────────────────────────────────────────────────
// ESP-IDF: UART0
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub struct SerialConsole {
    uart: esp_idf_hal::uart::UartDriver<'static>,
}

#[cfg(target_os = "espidf")]
impl SerialConsole {
    pub fn new(
        uart: esp_idf_hal::uart::UART0,
        tx: esp_idf_hal::gpio::AnyIOPin,
        rx: esp_idf_hal::gpio::AnyIOPin,
        baud: u32,
    ) -> Result<Self, esp_idf_sys::EspError> {
        use esp_idf_hal::gpio::AnyIOPin;
        use esp_idf_hal::uart::{config::Config, UartDriver};
        use esp_idf_hal::units::Hertz;

        let config = Config::default().baudrate(Hertz(baud));
        let uart = UartDriver::new(
            uart,
            tx,
            rx,
            Option::<AnyIOPin>::None,
            Option::<AnyIOPin>::None,
            &config,
        )?;
        Ok(Self { uart })
    }
}

#[cfg(target_os = "espidf")]
impl ConsolePort for SerialConsole {
    fn read_byte(&mut self) -> Option<u8> {
        use esp_idf_hal::delay::NON_BLOCK;
        let mut buf = [0u8; 1];
        match self.uart.read(&mut buf, NON_BLOCK) {
            Ok(1) => Some(buf[0]),
            _ => None,
        }
    }

    fn write_byte(&mut self, byte: u8) {
        if let Err(e) = self.uart.write(&[byte]) {
            warn!("Console: write failed: {:?}", e);
        }
    }

    fn flush(&mut self) {
        use esp_idf_hal::delay::BLOCK;
        let _ = self.uart.wait_tx_done(BLOCK);
    }
}

// ───────────────────────────────────────────────────────────────
// Host: stdin / stdout
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
pub struct SerialConsole {
    rx: std::sync::mpsc::Receiver<u8>,
    out: std::io::Stdout,
}

#[cfg(not(target_os = "espidf"))]
impl SerialConsole {
    /// Spawn the stdin reader. The thread ends with stdin.
    pub fn new() -> Self {
        use std::io::Read;

        let (tx, rx) = std::sync::mpsc::channel();
        let spawned = std::thread::Builder::new()
            .name("console-stdin".into())
            .spawn(move || {
                let mut stdin = std::io::stdin().lock();
                let mut byte = [0u8; 1];
                while let Ok(1) = stdin.read(&mut byte) {
                    if tx.send(byte[0]).is_err() {
                        break;
                    }
                }
            });
        if let Err(e) = spawned {
            warn!("Console(sim): stdin reader not started: {}", e);
        }
        Self {
            rx,
            out: std::io::stdout(),
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for SerialConsole {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(target_os = "espidf"))]
impl ConsolePort for SerialConsole {
    fn read_byte(&mut self) -> Option<u8> {
        self.rx.try_recv().ok()
    }

    fn write_byte(&mut self, byte: u8) {
        use std::io::Write;
        if let Err(e) = self.out.write_all(&[byte]) {
            warn!("Console(sim): write failed: {}", e);
        }
    }

    fn flush(&mut self) {
        use std::io::Write;
        let _ = self.out.flush();
    }
}
