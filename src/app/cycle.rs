//! Wake-cycle controller — the dual-mode boot router.
//!
//! Every boot (power-on or deep-sleep wake) runs exactly one cycle:
//!
//! ```text
//!  boot ─▶ arm wakes ─▶ first-run setup ─▶ touch average ─▶ mount store
//!                                                              │
//!                          ┌───────────── signal ≥ threshold ──┤
//!                          ▼                                   ▼
//!                 sample + append record               start AP + listener
//!                          │                                   │
//!                     deep sleep                        CommandSession
//! ```
//!
//! Nothing except the log file and the [`RetainedFlag`] carries over to the
//! next cycle. There is no in-cycle retry: a failed mount or append ends
//! the cycle and the next scheduled wake starts again from scratch.

use log::{error, info, warn};

use crate::config::{GhostReadingPolicy, LoggerConfig};

use super::events::AppEvent;
use super::ports::{
    AccessPointPort, ClockPort, EventSink, IndicatorPort, ListenerPort, LogStorePort, PowerPort,
    RetainedFlag, RomAddress, SensorBusPort, StoreError, TransportError,
};
use super::record::{DISCONNECTED_C, LogRecord};

// ───────────────────────────────────────────────────────────────
// Mode
// ───────────────────────────────────────────────────────────────

/// Operating mode of one wake cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Read the probes, append a record, sleep.
    Sampling,
    /// Expose the log over the Wi-Fi command terminal.
    Serving,
}

impl Mode {
    /// Partition the averaged touch reading. A touched (or magnet-closed)
    /// pad reads low, so a low signal selects serving.
    pub fn from_signal(touch_average: u32, threshold: u32) -> Self {
        if touch_average >= threshold {
            Self::Sampling
        } else {
            Self::Serving
        }
    }
}

/// Average `samples` touch readings with integer division. The truncation
/// toward zero is part of the threshold calibration and is kept as is.
pub fn read_mode_signal(power: &mut dyn PowerPort, gpio: i32, samples: u32, delay_ms: u32) -> u32 {
    let samples = samples.max(1);
    let mut total: u32 = 0;
    for _ in 0..samples {
        total = total.saturating_add(u32::from(power.read_touch(gpio)));
        power.delay_ms(delay_ms);
    }
    total / samples
}

// ───────────────────────────────────────────────────────────────
// Outcome types
// ───────────────────────────────────────────────────────────────

/// Result of [`WakeCycle::execute`].
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// A record was appended; the cycle ends in deep sleep.
    Sampled(LogRecord),
    /// Serving mode was selected; control passes to the command session.
    Serve,
    /// The store was unusable; nothing was sampled or served.
    Aborted(StoreError),
}

/// Proof that this cycle selected serving mode. Only
/// [`WakeCycle::run`] hands one out.
#[derive(Debug)]
pub struct ServingHandoff(());

/// Borrowed ports a cycle drives. Grouped so a cycle call stays readable.
pub struct CyclePorts<'a> {
    pub power: &'a mut dyn PowerPort,
    pub retained: &'a mut dyn RetainedFlag,
    pub clock: &'a mut dyn ClockPort,
    pub sensors: &'a mut dyn SensorBusPort,
    pub store: &'a mut dyn LogStorePort,
    pub led: &'a mut dyn IndicatorPort,
    pub sink: &'a mut dyn EventSink,
}

// ───────────────────────────────────────────────────────────────
// WakeCycle
// ───────────────────────────────────────────────────────────────

/// Runs one boot's worth of decisions.
pub struct WakeCycle<'c> {
    config: &'c LoggerConfig,
}

impl<'c> WakeCycle<'c> {
    pub fn new(config: &'c LoggerConfig) -> Self {
        Self { config }
    }

    /// Run the cycle and, unless serving was selected, enter deep sleep.
    ///
    /// Returns only in serving mode.
    pub fn run(&self, ports: &mut CyclePorts<'_>) -> ServingHandoff {
        match self.execute(ports) {
            CycleOutcome::Serve => ServingHandoff(()),
            CycleOutcome::Sampled(_) => self.sleep(ports),
            CycleOutcome::Aborted(e) => {
                warn!("Cycle aborted ({}), sleeping until next wake", e);
                self.sleep(ports)
            }
        }
    }

    /// All decision logic of one cycle, without the final deep sleep.
    pub fn execute(&self, ports: &mut CyclePorts<'_>) -> CycleOutcome {
        let cfg = self.config;

        // ── 1. Wake sources for the *next* boot ───────────────
        ports.power.arm_timer_wake(cfg.sleep_period_us);
        ports.power.arm_touch_wake(cfg.touch_gpio, cfg.touch_wake_threshold);

        // ── 2. First cycle since power-on: clock + indicator ──
        let first_cycle = !ports.retained.is_set();
        if first_cycle {
            ports.led.set(true);
            ports.power.delay_ms(cfg.first_run_indicator_ms);
            ports.led.set(false);
            ports.clock.set_time(&cfg.initial_clock);
            ports.sink.emit(&AppEvent::ClockSet);
        }

        // ── 3. Mode signal ────────────────────────────────────
        let touch_average = read_mode_signal(
            ports.power,
            cfg.touch_gpio,
            cfg.touch_samples,
            cfg.touch_sample_delay_ms,
        );
        ports.sink.emit(&AppEvent::Boot {
            touch_average,
            first_cycle,
        });

        // ── 4. Store ──────────────────────────────────────────
        if let Err(e) = ports.store.mount(true) {
            error!("Failed to mount log store: {}", e);
            ports.sink.emit(&AppEvent::StoreUnavailable(e));
            return CycleOutcome::Aborted(e);
        }

        // ── 5. One-time header ────────────────────────────────
        if first_cycle {
            let mut header = String::from(cfg.header_line.as_str());
            header.push('\n');
            if let Err(e) = ports.store.append(&cfg.log_path, &header) {
                error!("Failed to create or open log file: {}", e);
                ports.store.unmount();
                return CycleOutcome::Aborted(e);
            }
            ports.retained.set();
            ports.sink.emit(&AppEvent::HeaderWritten);
        }

        // ── 6. Branch ─────────────────────────────────────────
        let mode = Mode::from_signal(touch_average, cfg.mode_threshold);
        ports.sink.emit(&AppEvent::ModeSelected(mode));

        match mode {
            Mode::Sampling => match self.sample(ports) {
                Ok(record) => CycleOutcome::Sampled(record),
                Err(e) => CycleOutcome::Aborted(e),
            },
            Mode::Serving => CycleOutcome::Serve,
        }
    }

    /// Enumerate, convert, read, append. Strictly sequential, once.
    fn sample(&self, ports: &mut CyclePorts<'_>) -> Result<LogRecord, StoreError> {
        let cfg = self.config;

        let count = ports.sensors.device_count();
        ports.sink.emit(&AppEvent::DevicesFound(count));

        let mut addresses: Vec<Option<RomAddress>> = Vec::with_capacity(count);
        for index in 0..count {
            let rom = ports.sensors.address(index);
            match rom {
                Some(rom) => ports.sink.emit(&AppEvent::DeviceAddress { index, rom }),
                None => ports.sink.emit(&AppEvent::GhostDevice { index }),
            }
            addresses.push(rom);
        }

        if let Err(e) = ports.sensors.request_conversion() {
            warn!("Temperature conversion request failed: {}", e);
        }

        let timestamp = ports.clock.format(&cfg.timestamp_pattern);

        // A ghost device keeps its column so later columns stay aligned.
        let mut last = 0.0_f32;
        let mut readings = Vec::with_capacity(count);
        for (index, rom) in addresses.iter().enumerate() {
            let celsius = match rom {
                Some(rom) => {
                    let celsius = ports.sensors.temperature_c(rom).unwrap_or_else(|e| {
                        warn!("Device {} read failed: {}", index, e);
                        DISCONNECTED_C
                    });
                    ports.sink.emit(&AppEvent::Reading {
                        index,
                        celsius,
                        timestamp: timestamp.clone(),
                    });
                    celsius
                }
                None => match cfg.ghost_policy {
                    GhostReadingPolicy::RetainLast => last,
                    GhostReadingPolicy::Sentinel => DISCONNECTED_C,
                },
            };
            last = celsius;
            readings.push(celsius);
        }

        let record = LogRecord::new(timestamp, readings);
        if let Err(e) = ports.store.append(&cfg.log_path, &record.to_line()) {
            error!("Failed to append record: {}", e);
            ports.sink.emit(&AppEvent::RecordFailed(e));
            ports.store.unmount();
            return Err(e);
        }
        ports.store.unmount();
        ports.sink.emit(&AppEvent::RecordAppended {
            fields: record.field_count(),
        });
        info!("Data written to {}", cfg.log_path);
        Ok(record)
    }

    /// Bring up the access point and listener, then give the user the
    /// settle period to join before the session starts polling.
    pub fn start_serving<L: ListenerPort>(
        &self,
        _handoff: ServingHandoff,
        ap: &mut dyn AccessPointPort,
        listener: &mut L,
        power: &mut dyn PowerPort,
        sink: &mut dyn EventSink,
    ) -> Result<(), TransportError> {
        let cfg = self.config;
        ap.start(&cfg.ap_ssid, cfg.ap_tx_power_dbm)?;
        listener.listen(cfg.tcp_port)?;
        sink.emit(&AppEvent::ServingReady {
            ssid: cfg.ap_ssid.as_str().into(),
            port: cfg.tcp_port,
        });

        info!("... Connect client now ...");
        for _ in 0..cfg.settle_secs {
            power.delay_ms(1_000);
        }
        Ok(())
    }

    /// Release the store and power down. Wake sources were armed at the
    /// start of the cycle.
    pub fn sleep(&self, ports: &mut CyclePorts<'_>) -> ! {
        ports.store.unmount();
        ports.sink.emit(&AppEvent::EnteringDeepSleep);
        ports.power.enter_deep_sleep()
    }
}
