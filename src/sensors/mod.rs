//! Sensor subsystem — the one-wire bus master and the DS18B20 array that
//! sits on it.
//!
//! On ESP-IDF the array drives a GPIO through [`onewire::GpioOneWire`]; on
//! the host it drives [`sim::SimBus`], which models the probes at bit
//! level so the same search and scratchpad code runs in both places.

pub mod ds18b20;
pub mod onewire;
#[cfg(not(target_os = "espidf"))]
pub mod sim;

/// Probe set the host simulator starts with.
#[cfg(not(target_os = "espidf"))]
pub fn demo_probes() -> Vec<sim::SimProbe> {
    vec![
        sim::SimProbe::ds18b20(0x0000_1A2B_3C4D, 21.5),
        sim::SimProbe::ds18b20(0x0000_5E6F_7081, 22.75),
    ]
}
