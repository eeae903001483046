//! Integration tests for the wake cycle: mode selection, first-run
//! setup, the sampling path and the hand-off into serving mode.

use super::mock_hw::{
    MemStore, MockAp, MockClock, MockLed, MockListener, MockPower, MockRetained, MockSensors,
    RecordingSink, expect_deep_sleep,
};

use streamlogger::app::cycle::{CycleOutcome, CyclePorts, Mode, WakeCycle};
use streamlogger::app::events::AppEvent;
use streamlogger::app::ports::{StoreError, TransportError};
use streamlogger::config::{GhostReadingPolicy, LoggerConfig};

const LOG: &str = "datatempC.txt";
const HEADER: &str = "... program release 1.0 ...";
const NOW: &str = "2023-06-09, 00:15:00";

struct Rig {
    power: MockPower,
    retained: MockRetained,
    clock: MockClock,
    sensors: MockSensors,
    store: MemStore,
    led: MockLed,
    sink: RecordingSink,
}

impl Rig {
    fn new(touch: u16, temps: &[f32]) -> Self {
        Self {
            power: MockPower::with_touch(touch),
            retained: MockRetained::default(),
            clock: MockClock::at(NOW),
            sensors: MockSensors::with_temps(temps),
            store: MemStore::default(),
            led: MockLed::default(),
            sink: RecordingSink::default(),
        }
    }

    /// As if a previous cycle since power-on already ran.
    fn after_first_cycle(mut self) -> Self {
        self.retained.latched = true;
        self
    }

    fn ports(&mut self) -> CyclePorts<'_> {
        CyclePorts {
            power: &mut self.power,
            retained: &mut self.retained,
            clock: &mut self.clock,
            sensors: &mut self.sensors,
            store: &mut self.store,
            led: &mut self.led,
            sink: &mut self.sink,
        }
    }

    fn execute(&mut self, config: &LoggerConfig) -> CycleOutcome {
        WakeCycle::new(config).execute(&mut self.ports())
    }
}

// ── Mode selection ────────────────────────────────────────────

#[test]
fn high_touch_samples_and_low_touch_serves() {
    let config = LoggerConfig::default();

    let mut rig = Rig::new(80, &[20.0]).after_first_cycle();
    assert!(matches!(rig.execute(&config), CycleOutcome::Sampled(_)));
    assert!(rig.sink.contains(&AppEvent::ModeSelected(Mode::Sampling)));

    let mut rig = Rig::new(10, &[20.0]).after_first_cycle();
    assert_eq!(rig.execute(&config), CycleOutcome::Serve);
    assert!(rig.sink.contains(&AppEvent::ModeSelected(Mode::Serving)));
    assert!(rig.store.lines(LOG).is_empty(), "serving must not sample");
}

#[test]
fn threshold_value_itself_samples() {
    let config = LoggerConfig::default();
    let mut rig = Rig::new(50, &[20.0]).after_first_cycle();
    assert!(matches!(rig.execute(&config), CycleOutcome::Sampled(_)));
    let mut rig = Rig::new(49, &[20.0]).after_first_cycle();
    assert_eq!(rig.execute(&config), CycleOutcome::Serve);
}

#[test]
fn mode_signal_averages_configured_samples() {
    let config = LoggerConfig::default();
    let mut rig = Rig::new(80, &[]).after_first_cycle();
    rig.execute(&config);
    assert_eq!(rig.power.touch_reads, config.touch_samples);
    assert!(rig.sink.contains(&AppEvent::Boot {
        touch_average: 80,
        first_cycle: false,
    }));
}

#[test]
fn wake_sources_are_armed_every_cycle() {
    let config = LoggerConfig::default();
    for touch in [80, 10] {
        let mut rig = Rig::new(touch, &[]).after_first_cycle();
        rig.execute(&config);
        assert_eq!(rig.power.timer_wake_us, Some(config.sleep_period_us));
        assert_eq!(
            rig.power.touch_wake,
            Some((config.touch_gpio, config.touch_wake_threshold))
        );
    }
}

// ── First cycle after power-on ────────────────────────────────

#[test]
fn first_cycle_writes_header_sets_clock_and_blinks() {
    let config = LoggerConfig::default();
    let mut rig = Rig::new(80, &[21.5]);
    rig.execute(&config);

    assert!(rig.retained.latched);
    assert_eq!(rig.led.history, vec![true, false]);
    assert_eq!(rig.clock.set_calls, vec![config.initial_clock]);
    assert!(rig.power.delays.contains(&config.first_run_indicator_ms));
    assert_eq!(rig.store.lines(LOG), vec![HEADER, "2023-06-09, 00:15:00, 21.50"]);
    assert!(rig.sink.contains(&AppEvent::HeaderWritten));
    assert!(rig.sink.contains(&AppEvent::ClockSet));
}

#[test]
fn header_is_never_duplicated() {
    let config = LoggerConfig::default();
    let mut rig = Rig::new(80, &[21.5]);
    rig.execute(&config);
    rig.execute(&config);
    rig.execute(&config);

    let lines = rig.store.lines(LOG);
    assert_eq!(lines.iter().filter(|l| *l == HEADER).count(), 1);
    assert_eq!(lines.len(), 4);
    assert_eq!(rig.clock.set_calls.len(), 1);
    assert_eq!(rig.led.history, vec![true, false]);
}

#[test]
fn first_cycle_in_serving_mode_still_writes_header() {
    let config = LoggerConfig::default();
    let mut rig = Rig::new(10, &[]);
    assert_eq!(rig.execute(&config), CycleOutcome::Serve);
    assert_eq!(rig.store.lines(LOG), vec![HEADER]);
    assert!(rig.retained.latched);
}

// ── Sampling path ─────────────────────────────────────────────

#[test]
fn scenario_two_probes_then_deep_sleep() {
    let config = LoggerConfig::default();
    let mut rig = Rig::new(80, &[21.5, 22.75]).after_first_cycle();

    expect_deep_sleep(|| {
        WakeCycle::new(&config).run(&mut rig.ports());
    });

    let lines = rig.store.lines(LOG);
    assert_eq!(lines.len(), 1);
    // The timestamp column is followed by ", " and the readings by ",".
    assert!(lines[0].ends_with(", 21.50,22.75"), "got {:?}", lines[0]);
    assert_eq!(lines[0], "2023-06-09, 00:15:00, 21.50,22.75");
    assert!(rig.power.slept);
    assert!(!rig.store.mounted, "store must be released before sleep");
    assert_eq!(rig.sensors.conversions, 1);
    assert_eq!(rig.sink.events.last(), Some(&AppEvent::EnteringDeepSleep));
}

#[test]
fn record_has_one_field_per_device() {
    let config = LoggerConfig::default();
    let mut rig = Rig::new(80, &[1.0, 2.0, 3.0, 4.0, 5.0]).after_first_cycle();
    let CycleOutcome::Sampled(record) = rig.execute(&config) else {
        panic!("expected a sampled record");
    };
    assert_eq!(record.field_count(), 5);
    let line = &rig.store.lines(LOG)[0];
    let readings = line.strip_prefix(&format!("{NOW}, ")).unwrap();
    assert_eq!(readings.split(',').count(), 5);
    assert!(!line.ends_with(','));
    assert!(rig.sink.contains(&AppEvent::RecordAppended { fields: 5 }));
}

#[test]
fn no_devices_still_appends_timestamp() {
    let config = LoggerConfig::default();
    let mut rig = Rig::new(80, &[]).after_first_cycle();
    rig.execute(&config);
    assert_eq!(rig.store.contents(LOG), Some("2023-06-09, 00:15:00, \n"));
}

#[test]
fn ghost_device_repeats_previous_reading() {
    let config = LoggerConfig::default();
    let mut rig = Rig::new(80, &[21.5, 0.0, 22.75]).after_first_cycle();
    rig.sensors = MockSensors::with_temps(&[21.5, 0.0, 22.75]).ghost(1);
    rig.execute(&config);
    assert_eq!(rig.store.lines(LOG)[0], "2023-06-09, 00:15:00, 21.50,21.50,22.75");
    assert!(rig.sink.contains(&AppEvent::GhostDevice { index: 1 }));
}

#[test]
fn leading_ghost_reads_zero_under_retain_last() {
    let config = LoggerConfig::default();
    let mut rig = Rig::new(80, &[]).after_first_cycle();
    rig.sensors = MockSensors::with_temps(&[0.0, 19.0]).ghost(0);
    rig.execute(&config);
    assert_eq!(rig.store.lines(LOG)[0], "2023-06-09, 00:15:00, 0.00,19.00");
}

#[test]
fn sentinel_policy_marks_ghosts_disconnected() {
    let mut config = LoggerConfig::default();
    config.ghost_policy = GhostReadingPolicy::Sentinel;
    let mut rig = Rig::new(80, &[]).after_first_cycle();
    rig.sensors = MockSensors::with_temps(&[21.5, 0.0]).ghost(1);
    rig.execute(&config);
    assert_eq!(rig.store.lines(LOG)[0], "2023-06-09, 00:15:00, 21.50,-127.00");
}

#[test]
fn failed_read_logs_disconnected_value() {
    let config = LoggerConfig::default();
    let mut rig = Rig::new(80, &[]).after_first_cycle();
    rig.sensors = MockSensors::with_temps(&[21.5, 22.0]).failing(0);
    rig.execute(&config);
    assert_eq!(rig.store.lines(LOG)[0], "2023-06-09, 00:15:00, -127.00,22.00");
}

// ── Store failures ────────────────────────────────────────────

#[test]
fn mount_failure_aborts_and_sleeps() {
    let config = LoggerConfig::default();
    let mut rig = Rig::new(80, &[21.5]).after_first_cycle();
    rig.store.fail_mount = true;

    assert_eq!(
        rig.execute(&config),
        CycleOutcome::Aborted(StoreError::MountFailed)
    );
    assert!(rig.sink.contains(&AppEvent::StoreUnavailable(StoreError::MountFailed)));
    assert_eq!(rig.sensors.conversions, 0);

    let mut rig = Rig::new(10, &[]).after_first_cycle();
    rig.store.fail_mount = true;
    expect_deep_sleep(|| {
        WakeCycle::new(&config).run(&mut rig.ports());
    });
}

#[test]
fn append_failure_releases_store_and_leaves_flag_clear() {
    let config = LoggerConfig::default();
    let mut rig = Rig::new(80, &[21.5]);
    rig.store.fail_append = true;
    assert_eq!(
        rig.execute(&config),
        CycleOutcome::Aborted(StoreError::WriteFailed)
    );
    assert!(!rig.retained.latched, "header retry belongs to the next cycle");
    assert!(!rig.store.mounted);

    let mut rig = Rig::new(80, &[21.5]).after_first_cycle();
    rig.store.fail_append = true;
    rig.execute(&config);
    assert!(rig.sink.contains(&AppEvent::RecordFailed(StoreError::WriteFailed)));
    assert!(!rig.store.mounted);
}

// ── Serving hand-off ──────────────────────────────────────────

#[test]
fn serving_brings_up_ap_listener_and_settles() {
    let config = LoggerConfig::default();
    let mut rig = Rig::new(10, &[]).after_first_cycle();
    let cycle = WakeCycle::new(&config);
    let handoff = cycle.run(&mut rig.ports());

    let mut ap = MockAp::default();
    let mut listener = MockListener::default();
    cycle
        .start_serving(handoff, &mut ap, &mut listener, &mut rig.power, &mut rig.sink)
        .unwrap();

    assert_eq!(ap.started, Some(("Idahostreams".into(), 11.0)));
    assert_eq!(listener.port, Some(80));
    let settle: Vec<_> = rig.power.delays.iter().filter(|d| **d == 1_000).collect();
    assert_eq!(settle.len(), config.settle_secs as usize);
    assert!(rig.sink.contains(&AppEvent::ServingReady {
        ssid: "Idahostreams".into(),
        port: 80,
    }));
    assert!(!rig.power.slept);
}

#[test]
fn serving_reports_ap_and_bind_failures() {
    let config = LoggerConfig::default();
    let cycle = WakeCycle::new(&config);

    let mut rig = Rig::new(10, &[]).after_first_cycle();
    let handoff = cycle.run(&mut rig.ports());
    let mut ap = MockAp {
        fail: true,
        ..MockAp::default()
    };
    let err = cycle
        .start_serving(handoff, &mut ap, &mut MockListener::default(), &mut rig.power, &mut rig.sink)
        .unwrap_err();
    assert_eq!(err, TransportError::AccessPointFailed);

    let mut rig = Rig::new(10, &[]).after_first_cycle();
    let handoff = cycle.run(&mut rig.ports());
    let mut listener = MockListener {
        fail_bind: true,
        ..MockListener::default()
    };
    let err = cycle
        .start_serving(handoff, &mut MockAp::default(), &mut listener, &mut rig.power, &mut rig.sink)
        .unwrap_err();
    assert_eq!(err, TransportError::BindFailed);
}
