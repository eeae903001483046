//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ WakeCycle / CommandSession (domain)
//! ```
//!
//! Driven adapters (power management, one-wire sensors, flash store, Wi-Fi
//! AP, TCP listener, serial console, event sinks) implement these traits.
//! The domain consumes them through `&mut dyn` references or generics, so
//! it never touches hardware directly and runs unchanged against mocks.
//!
//! All port errors are typed — callers handle every variant explicitly.

use core::fmt;
use core::ops::ControlFlow;

use crate::config::InitialClock;

// ───────────────────────────────────────────────────────────────
// Power / wake-source port
// ───────────────────────────────────────────────────────────────

/// Low-power hardware: wake-source arming, the touch pad, and deep sleep.
pub trait PowerPort {
    /// Wake from deep sleep after `duration_us` microseconds.
    fn arm_timer_wake(&mut self, duration_us: u64);

    /// Wake from deep sleep when the touch pad reading crosses `threshold`.
    fn arm_touch_wake(&mut self, gpio: i32, threshold: u16);

    /// One raw capacitive reading of the touch pad.
    fn read_touch(&mut self, gpio: i32) -> u16;

    /// Busy/idle wait.
    fn delay_ms(&mut self, ms: u32);

    /// Enter deep sleep. Never returns: the next instruction executed is
    /// the reset vector of the following wake cycle. Close files and flush
    /// output before calling.
    fn enter_deep_sleep(&mut self) -> !;
}

// ───────────────────────────────────────────────────────────────
// Retained flag port
// ───────────────────────────────────────────────────────────────

/// A single flag that survives deep sleep but is cleared by power loss.
///
/// Backs the "first cycle since power-on" decision. The flag must live in
/// memory that is retained through deep sleep (RTC slow memory on the
/// ESP32) but not through a battery swap, so NVS is not an option.
pub trait RetainedFlag {
    /// `true` once [`set`](Self::set) has run since the last power-on.
    fn is_set(&self) -> bool;

    /// Latch the flag for the rest of this power-on period.
    fn set(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Wall clock kept by the RTC through deep sleep.
pub trait ClockPort {
    /// Set the wall clock. Called once, on the first cycle after power-on.
    fn set_time(&mut self, at: &InitialClock);

    /// Render the current time with a strftime-style pattern.
    fn format(&self, pattern: &str) -> String;
}

// ───────────────────────────────────────────────────────────────
// Sensor bus port
// ───────────────────────────────────────────────────────────────

/// 64-bit one-wire ROM code (family, 48-bit serial, CRC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RomAddress(pub [u8; 8]);

impl fmt::Display for RomAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{:02X}", b)?;
        }
        Ok(())
    }
}

/// Temperature probes on the one-wire bus.
pub trait SensorBusPort {
    /// Number of devices found by the last bus enumeration.
    fn device_count(&mut self) -> usize;

    /// Address of device `index`, or `None` when it cannot be confirmed
    /// (failed ROM CRC, device vanished since enumeration).
    fn address(&mut self, index: usize) -> Option<RomAddress>;

    /// Start a temperature conversion on every device and wait for it.
    fn request_conversion(&mut self) -> Result<(), SensorError>;

    /// Read the converted temperature of one device (°C).
    fn temperature_c(&mut self, rom: &RomAddress) -> Result<f32, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Status indicator port
// ───────────────────────────────────────────────────────────────

/// Single status LED.
pub trait IndicatorPort {
    fn set(&mut self, on: bool);
}

// ───────────────────────────────────────────────────────────────
// Log store port
// ───────────────────────────────────────────────────────────────

/// One entry of the store root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub size: u64,
}

/// Persistent flash file store holding the log.
///
/// Exactly one mount is open at a time. Every file operation requires a
/// mounted store and fails with [`StoreError::NotMounted`] otherwise.
pub trait LogStorePort {
    /// Mount the store; with `format_if_failed` an unreadable partition is
    /// formatted and mounted empty. Mounting an already mounted store is a
    /// no-op.
    fn mount(&mut self, format_if_failed: bool) -> Result<(), StoreError>;

    /// End the mount session. No-op when not mounted.
    fn unmount(&mut self);

    fn is_mounted(&self) -> bool;

    /// Append `text` to `name` (created if missing) in a single write.
    fn append(&mut self, name: &str, text: &str) -> Result<(), StoreError>;

    /// Stream `name` line by line (without line terminators) until `each`
    /// returns [`ControlFlow::Break`]. Returns the number of lines
    /// delivered.
    fn read_lines(
        &mut self,
        name: &str,
        each: &mut dyn FnMut(&str) -> ControlFlow<()>,
    ) -> Result<usize, StoreError>;

    /// Root directory entries in store enumeration order.
    fn list_entries(&mut self) -> Result<Vec<DirEntry>, StoreError>;

    /// Remove `name`. `Ok(false)` if it did not exist.
    fn remove(&mut self, name: &str) -> Result<bool, StoreError>;

    /// Whether `name` exists. `false` when not mounted.
    fn exists(&self, name: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Transport ports
// ───────────────────────────────────────────────────────────────

/// Soft access point the client joins.
pub trait AccessPointPort {
    /// Bring the AP up under `ssid` (open network).
    fn start(&mut self, ssid: &str, tx_power_dbm: f32) -> Result<(), TransportError>;
}

/// One accepted client connection — a byte stream.
pub trait Connection {
    /// `true` while the peer is connected or unread bytes remain.
    fn is_connected(&mut self) -> bool;

    /// Next received byte, non-blocking.
    fn read_byte(&mut self) -> Option<u8>;

    /// Write raw bytes.
    fn write_bytes(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Write `line` followed by CR LF.
    fn write_line(&mut self, line: &str) -> Result<(), TransportError> {
        self.write_bytes(line.as_bytes())?;
        self.write_bytes(b"\r\n")
    }

    /// Tear the connection down.
    fn close(&mut self);
}

/// Single-client listener.
pub trait ListenerPort {
    type Conn: Connection;

    /// Start listening on `port`.
    fn listen(&mut self, port: u16) -> Result<(), TransportError>;

    /// Poll for a pending connection (non-blocking).
    fn accept(&mut self) -> Option<Self::Conn>;
}

// ───────────────────────────────────────────────────────────────
// Console port
// ───────────────────────────────────────────────────────────────

/// Local serial console bridged to the connected client.
pub trait ConsolePort {
    /// Next byte typed locally, non-blocking.
    fn read_byte(&mut self) -> Option<u8>;

    /// Print one byte locally.
    fn write_byte(&mut self, byte: u8);

    /// Drain pending output (before deep sleep).
    fn flush(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Event sink port
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port. Adapters decide where they go (serial log, test
/// recorder).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`LogStorePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// The partition could not be mounted (or formatted).
    MountFailed,
    /// Operation needs a mounted store.
    NotMounted,
    /// The file could not be opened.
    OpenFailed,
    /// A write did not complete.
    WriteFailed,
    /// A read did not complete.
    ReadFailed,
    /// The file could not be removed.
    RemoveFailed,
}

/// Errors from the transport ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// Soft AP could not be configured or started.
    AccessPointFailed,
    /// Listener could not bind its port.
    BindFailed,
    /// Operation requires a connected client.
    NotConnected,
    /// Socket I/O failure.
    Io,
}

/// Errors from [`SensorBusPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// No presence pulse after bus reset.
    NoPresence,
    /// Scratchpad or ROM CRC mismatch.
    CrcMismatch,
    /// Bus line stuck or timing violated.
    BusFault,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MountFailed => write!(f, "mount failed"),
            Self::NotMounted => write!(f, "store not mounted"),
            Self::OpenFailed => write!(f, "file open failed"),
            Self::WriteFailed => write!(f, "write failed"),
            Self::ReadFailed => write!(f, "read failed"),
            Self::RemoveFailed => write!(f, "remove failed"),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AccessPointFailed => write!(f, "access point start failed"),
            Self::BindFailed => write!(f, "listener bind failed"),
            Self::NotConnected => write!(f, "no client connected"),
            Self::Io => write!(f, "socket I/O error"),
        }
    }
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoPresence => write!(f, "no presence pulse"),
            Self::CrcMismatch => write!(f, "CRC mismatch"),
            Self::BusFault => write!(f, "bus fault"),
        }
    }
}
