//! Unified error type for the logger firmware.
//!
//! Peripheral bring-up at boot is the only path that propagates failures
//! to the top level; the wake cycle and the command session handle theirs
//! locally (log and abort the cycle, or report to the client). Every error
//! that can surface during bring-up converts into [`Error`] so `main` can
//! report it uniformly.

use core::fmt;

use crate::app::ports::{SensorError, TransportError};

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Board bring-up failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The one-wire sensor bus could not be initialised.
    Sensor(SensorError),
    /// The access point driver could not be created.
    Transport(TransportError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Transport(e) => write!(f, "transport: {e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}
