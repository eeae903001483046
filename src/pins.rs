//! GPIO / peripheral pin assignments for the logger board (ESP32-WROOM).
//!
//! Single source of truth — every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Sensors
// ---------------------------------------------------------------------------

/// DS18B20 one-wire data line. Open-drain with the internal pull-up
/// enabled; a 4.7 kOhm external pull-up is still recommended on long cables.
pub const ONEWIRE_GPIO: i32 = 25;

// ---------------------------------------------------------------------------
// Mode selection / wake
// ---------------------------------------------------------------------------

/// Capacitive touch pad T0. A magnet-operated contact on the housing
/// pulls the reading down to select serving mode and wake the logger.
pub const TOUCH_GPIO: i32 = 4;

// ---------------------------------------------------------------------------
// Status LED
// ---------------------------------------------------------------------------

/// On-board LED (LED_BUILTIN on DevKit boards). Active HIGH.
pub const STATUS_LED_GPIO: i32 = 2;

// ---------------------------------------------------------------------------
// UART console
// ---------------------------------------------------------------------------

pub const UART_TX_GPIO: i32 = 1;
pub const UART_RX_GPIO: i32 = 3;
/// Console baud rate used by the serial bridge.
pub const UART_BAUD: u32 = 9_600;
