//! Stream logger firmware — main entry point.
//!
//! One boot is one wake cycle:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Adapters (outer ring)                     │
//! │                                                              │
//! │  EspPower   RtcRetainedFlag   RtcClock   FlashStore          │
//! │  Ds18b20Array   StatusLed   SoftAp   TcpTransport            │
//! │  SerialConsole   LogEventSink   Watchdog                     │
//! │                                                              │
//! │  ──────────────── Port Trait Boundary ─────────────────      │
//! │                                                              │
//! │  WakeCycle ──(serving)──▶ CommandSession ──▶ deep sleep      │
//! │      └──────(sampling)──▶ append record ──▶ deep sleep       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! On the host the same flow runs against simulated hardware: set
//! `STREAMLOGGER_TOUCH` below 50 to select serving mode, and
//! `STREAMLOGGER_DATA` to choose the directory standing in for flash.

#![deny(unused_must_use)]

use std::time::Duration;

use anyhow::Result;
use log::{error, info};

use streamlogger::adapters::console::SerialConsole;
use streamlogger::adapters::flash_store::FlashStore;
use streamlogger::adapters::log_sink::LogEventSink;
use streamlogger::adapters::power::EspPower;
use streamlogger::adapters::retained::RtcRetainedFlag;
use streamlogger::adapters::tcp_transport::TcpTransport;
use streamlogger::adapters::time::RtcClock;
use streamlogger::adapters::wifi_ap::SoftAp;
use streamlogger::app::cycle::{CyclePorts, WakeCycle};
use streamlogger::config::LoggerConfig;
use streamlogger::drivers::status_led::StatusLed;
use streamlogger::drivers::watchdog::{DEFAULT_TIMEOUT_MS, Watchdog};
use streamlogger::sensors::ds18b20::Ds18b20Array;
use streamlogger::session::CommandSession;

// ── Board ─────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
type Sensors = Ds18b20Array<
    streamlogger::sensors::onewire::GpioOneWire<
        esp_idf_hal::gpio::PinDriver<
            'static,
            esp_idf_hal::gpio::AnyIOPin,
            esp_idf_hal::gpio::InputOutput,
        >,
        esp_idf_hal::delay::Ets,
    >,
>;
#[cfg(target_os = "espidf")]
type Led = StatusLed<
    esp_idf_hal::gpio::PinDriver<
        'static,
        esp_idf_hal::gpio::AnyOutputPin,
        esp_idf_hal::gpio::Output,
    >,
>;

#[cfg(not(target_os = "espidf"))]
type Sensors = Ds18b20Array<streamlogger::sensors::sim::SimBus>;
#[cfg(not(target_os = "espidf"))]
type Led = StatusLed<streamlogger::drivers::status_led::MemoryPin>;

/// Every adapter the firmware drives, built once per boot.
struct Board {
    power: EspPower,
    retained: RtcRetainedFlag,
    clock: RtcClock,
    sensors: Sensors,
    store: FlashStore,
    led: Led,
    ap: SoftAp,
    console: SerialConsole,
}

impl Board {
    fn cycle_ports<'a>(&'a mut self, sink: &'a mut LogEventSink) -> CyclePorts<'a> {
        CyclePorts {
            power: &mut self.power,
            retained: &mut self.retained,
            clock: &mut self.clock,
            sensors: &mut self.sensors,
            store: &mut self.store,
            led: &mut self.led,
            sink,
        }
    }
}

#[cfg(target_os = "espidf")]
fn init_logging() -> Result<()> {
    esp_idf_sys::link_patches();
    esp_idf_logger::init()?;
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
fn init_logging() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    Ok(())
}

#[cfg(target_os = "espidf")]
fn take_board(config: &LoggerConfig) -> Result<Board> {
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_hal::delay::Ets;
    use esp_idf_hal::gpio::{AnyIOPin, AnyOutputPin, PinDriver};
    use esp_idf_hal::prelude::Peripherals;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use streamlogger::error::Error;
    use streamlogger::pins;
    use streamlogger::sensors::onewire::GpioOneWire;

    let peripherals = Peripherals::take()?;
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take().ok();

    // SAFETY: each GPIO number is claimed exactly once, here.
    let onewire_pin = unsafe { AnyIOPin::new(config.onewire_gpio) };
    let led_pin = unsafe { AnyOutputPin::new(pins::STATUS_LED_GPIO) };

    let bus = GpioOneWire::new(PinDriver::input_output_od(onewire_pin)?, Ets)
        .map_err(Error::from)?;
    let console = SerialConsole::new(
        peripherals.uart0,
        peripherals.pins.gpio1.into(),
        peripherals.pins.gpio3.into(),
        pins::UART_BAUD,
    )?;
    let ap = SoftAp::new(peripherals.modem, sys_loop, nvs).map_err(Error::from)?;

    Ok(Board {
        power: EspPower::new(),
        retained: RtcRetainedFlag::new(),
        clock: RtcClock::new(),
        sensors: Ds18b20Array::new(bus),
        store: FlashStore::new(),
        led: StatusLed::new(PinDriver::output(led_pin)?),
        ap,
        console,
    })
}

#[cfg(not(target_os = "espidf"))]
fn take_board(_config: &LoggerConfig) -> Result<Board> {
    use streamlogger::adapters::power::sim_set_touch;
    use streamlogger::drivers::status_led::MemoryPin;
    use streamlogger::sensors::{demo_probes, sim::SimBus};

    if let Ok(raw) = std::env::var("STREAMLOGGER_TOUCH") {
        sim_set_touch(raw.trim().parse()?);
    }
    let data_dir = std::env::var("STREAMLOGGER_DATA").unwrap_or_else(|_| "spiffs-sim".into());

    Ok(Board {
        power: EspPower::new(),
        retained: RtcRetainedFlag::new(),
        clock: RtcClock::new(),
        sensors: Ds18b20Array::new(SimBus::new(demo_probes())),
        store: FlashStore::new(data_dir),
        led: StatusLed::new(MemoryPin::default()),
        ap: SoftAp::new(),
        console: SerialConsole::new(),
    })
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    init_logging()?;
    info!("Stream logger v{}", env!("CARGO_PKG_VERSION"));

    let config = LoggerConfig::default().validated_or_default();
    info!("Config: {}", serde_json::to_string(&config)?);

    let mut board = take_board(&config)?;
    let mut sink = LogEventSink::new();
    let cycle = WakeCycle::new(&config);

    // Returns only when serving mode was selected.
    let handoff = cycle.run(&mut board.cycle_ports(&mut sink));

    let mut listener = TcpTransport::new();
    if let Err(e) = cycle.start_serving(
        handoff,
        &mut board.ap,
        &mut listener,
        &mut board.power,
        &mut sink,
    ) {
        error!("Serving mode unavailable ({}), sleeping", e);
        cycle.sleep(&mut board.cycle_ports(&mut sink));
    }

    // Subscribed after the settle delay, which is longer than the timeout.
    let watchdog = Watchdog::new(DEFAULT_TIMEOUT_MS);
    let poll = Duration::from_millis(u64::from(config.poll_interval_ms));
    let mut session =
        CommandSession::new(listener, &config).with_keepalive(move || watchdog.feed());
    session.serve(
        &mut board.store,
        &mut board.console,
        &mut board.power,
        &mut sink,
        || std::thread::sleep(poll),
    )
}
