//! Application core — pure domain logic, zero I/O.
//!
//! The wake-cycle controller and the log record format live here. All
//! interaction with hardware happens through **port traits** defined in
//! [`ports`], keeping this layer fully testable without real peripherals.

pub mod cycle;
pub mod events;
pub mod ports;
pub mod record;
