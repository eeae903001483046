//! Single-colour status LED.
//!
//! Lit for the first-run indication after power-on; otherwise off so it
//! costs nothing in deep sleep.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: any `embedded-hal` output pin (a `PinDriver` in practice).
//! On host/test: tracks state in-memory only.

use embedded_hal::digital::OutputPin;
use log::warn;

use crate::app::ports::IndicatorPort;

pub struct StatusLed<P> {
    pin: P,
    on: bool,
}

impl<P: OutputPin> StatusLed<P> {
    pub fn new(pin: P) -> Self {
        Self { pin, on: false }
    }

    pub fn is_on(&self) -> bool {
        self.on
    }
}

impl<P: OutputPin> IndicatorPort for StatusLed<P> {
    fn set(&mut self, on: bool) {
        let res = if on {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        match res {
            Ok(()) => self.on = on,
            Err(_) => warn!("Status LED: pin write failed"),
        }
    }
}

/// Output pin that only remembers its level (host builds).
#[derive(Debug, Default)]
pub struct MemoryPin {
    high: bool,
}

impl MemoryPin {
    pub fn is_high(&self) -> bool {
        self.high
    }
}

impl embedded_hal::digital::ErrorType for MemoryPin {
    type Error = core::convert::Infallible;
}

impl OutputPin for MemoryPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.high = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.high = true;
        Ok(())
    }
}
