//! Outbound application events.
//!
//! The [`WakeCycle`](super::cycle::WakeCycle) and the
//! [`CommandSession`](crate::session::CommandSession) emit these through
//! the [`EventSink`](super::ports::EventSink) port. The serial log adapter
//! renders them; tests record them.

use super::cycle::Mode;
use super::ports::{RomAddress, StoreError};
use crate::session::protocol::Command;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// Wake cycle started; carries the averaged touch reading.
    Boot { touch_average: u32, first_cycle: bool },

    /// The mode for this cycle was decided.
    ModeSelected(Mode),

    /// The clock was set on the first cycle after power-on.
    ClockSet,

    /// The one-time header line reached the log.
    HeaderWritten,

    /// The log store could not be mounted; the cycle aborts.
    StoreUnavailable(StoreError),

    /// Bus enumeration finished.
    DevicesFound(usize),

    /// Device `index` answered with a valid address.
    DeviceAddress { index: usize, rom: RomAddress },

    /// Device `index` was counted but its address could not be read.
    GhostDevice { index: usize },

    /// One reading taken during the sampling path.
    Reading { index: usize, celsius: f32, timestamp: String },

    /// A record was appended to the log.
    RecordAppended { fields: usize },

    /// Appending the record failed; nothing was written.
    RecordFailed(StoreError),

    /// Soft AP and listener are up; waiting for a client.
    ServingReady { ssid: String, port: u16 },

    /// A client connected over TCP.
    ClientConnected,

    /// A connection was accepted but was not connected; it was closed.
    ClientRejected,

    /// The client went away; the session slot is free again.
    ClientDisconnected,

    /// A command byte was dispatched.
    CommandDispatched(Command),

    /// Last event before the chip powers down.
    EnteringDeepSleep,
}
