//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the logger (UART on the device, stderr on the host). Every event is one
//! line with a fixed prefix so the serial output stays greppable.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Boot {
                touch_average,
                first_cycle,
            } => {
                info!(
                    "CYCLE | boot touch_avg={} first_cycle={}",
                    touch_average, first_cycle
                );
            }
            AppEvent::ModeSelected(mode) => info!("CYCLE | mode={:?}", mode),
            AppEvent::ClockSet => info!("CYCLE | clock set"),
            AppEvent::HeaderWritten => info!("CYCLE | log header written"),
            AppEvent::StoreUnavailable(e) => warn!("CYCLE | store unavailable: {}", e),
            AppEvent::DevicesFound(n) => info!("SENSE | {} devices found", n),
            AppEvent::DeviceAddress { index, rom } => {
                info!("SENSE | device {} address {}", index, rom);
            }
            AppEvent::GhostDevice { index } => {
                warn!("SENSE | device {} has no readable address", index);
            }
            AppEvent::Reading {
                index,
                celsius,
                timestamp,
            } => {
                info!(
                    "SENSE | {} device {} T={:.2}\u{00b0}C",
                    timestamp, index, celsius
                );
            }
            AppEvent::RecordAppended { fields } => {
                info!("CYCLE | record appended ({} readings)", fields);
            }
            AppEvent::RecordFailed(e) => warn!("CYCLE | record not written: {}", e),
            AppEvent::ServingReady { ssid, port } => {
                info!("SESSION | ready on '{}' port {}", ssid, port);
            }
            AppEvent::ClientConnected => info!("SESSION | client connected"),
            AppEvent::ClientRejected => info!("SESSION | stale connection dropped"),
            AppEvent::ClientDisconnected => info!("SESSION | client disconnected"),
            AppEvent::CommandDispatched(cmd) => info!("SESSION | command {:?}", cmd),
            AppEvent::EnteringDeepSleep => info!("POWER | entering deep sleep"),
        }
    }
}
