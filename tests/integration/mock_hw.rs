//! Mock hardware adapters for integration tests.
//!
//! Every port has a recording mock so tests can drive a full wake cycle
//! or command session on the host and assert on what reached the
//! "hardware". Deep sleep unwinds with a [`DeepSleep`] payload; use
//! [`expect_deep_sleep`] to run code that must end in it.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::ops::ControlFlow;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

use streamlogger::app::events::AppEvent;
use streamlogger::app::ports::{
    AccessPointPort, ClockPort, Connection, ConsolePort, DirEntry, EventSink, IndicatorPort,
    ListenerPort, LogStorePort, PowerPort, RetainedFlag, RomAddress, SensorBusPort, SensorError,
    StoreError, TransportError,
};
use streamlogger::config::InitialClock;

// ── Deep sleep marker ─────────────────────────────────────────

/// Panic payload standing in for the chip powering down.
#[derive(Debug)]
pub struct DeepSleep;

/// Run `f`, which must end in deep sleep.
pub fn expect_deep_sleep<F: FnOnce()>(f: F) {
    let result = catch_unwind(AssertUnwindSafe(f));
    match result {
        Err(payload) if payload.is::<DeepSleep>() => {}
        Err(payload) => std::panic::resume_unwind(payload),
        Ok(()) => panic!("expected deep sleep, but the call returned"),
    }
}

// ── Power ─────────────────────────────────────────────────────

pub struct MockPower {
    pub touch: u16,
    pub timer_wake_us: Option<u64>,
    pub touch_wake: Option<(i32, u16)>,
    pub delays: Vec<u32>,
    pub touch_reads: u32,
    pub slept: bool,
}

impl MockPower {
    pub fn with_touch(touch: u16) -> Self {
        Self {
            touch,
            timer_wake_us: None,
            touch_wake: None,
            delays: Vec::new(),
            touch_reads: 0,
            slept: false,
        }
    }
}

impl PowerPort for MockPower {
    fn arm_timer_wake(&mut self, duration_us: u64) {
        self.timer_wake_us = Some(duration_us);
    }

    fn arm_touch_wake(&mut self, gpio: i32, threshold: u16) {
        self.touch_wake = Some((gpio, threshold));
    }

    fn read_touch(&mut self, _gpio: i32) -> u16 {
        self.touch_reads += 1;
        self.touch
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delays.push(ms);
    }

    fn enter_deep_sleep(&mut self) -> ! {
        self.slept = true;
        std::panic::panic_any(DeepSleep)
    }
}

// ── Retained flag ─────────────────────────────────────────────

#[derive(Default)]
pub struct MockRetained {
    pub latched: bool,
}

impl RetainedFlag for MockRetained {
    fn is_set(&self) -> bool {
        self.latched
    }

    fn set(&mut self) {
        self.latched = true;
    }
}

// ── Clock ─────────────────────────────────────────────────────

pub struct MockClock {
    pub now: String,
    pub set_calls: Vec<InitialClock>,
}

impl MockClock {
    pub fn at(now: &str) -> Self {
        Self {
            now: now.into(),
            set_calls: Vec::new(),
        }
    }
}

impl ClockPort for MockClock {
    fn set_time(&mut self, at: &InitialClock) {
        self.set_calls.push(*at);
    }

    fn format(&self, _pattern: &str) -> String {
        self.now.clone()
    }
}

// ── Sensors ───────────────────────────────────────────────────

/// One probe: `None` temperature makes its address lookup fail (ghost).
#[derive(Clone)]
pub struct MockProbe {
    pub celsius: Option<f32>,
    pub read_error: Option<SensorError>,
}

pub struct MockSensors {
    pub probes: Vec<MockProbe>,
    pub conversions: u32,
}

impl MockSensors {
    pub fn with_temps(temps: &[f32]) -> Self {
        Self {
            probes: temps
                .iter()
                .map(|t| MockProbe {
                    celsius: Some(*t),
                    read_error: None,
                })
                .collect(),
            conversions: 0,
        }
    }

    pub fn ghost(mut self, index: usize) -> Self {
        self.probes[index].celsius = None;
        self
    }

    pub fn failing(mut self, index: usize) -> Self {
        self.probes[index].read_error = Some(SensorError::CrcMismatch);
        self
    }
}

impl SensorBusPort for MockSensors {
    fn device_count(&mut self) -> usize {
        self.probes.len()
    }

    fn address(&mut self, index: usize) -> Option<RomAddress> {
        let probe = self.probes.get(index)?;
        probe.celsius?;
        Some(RomAddress([0x28, index as u8, 0, 0, 0, 0, 0, 0]))
    }

    fn request_conversion(&mut self) -> Result<(), SensorError> {
        self.conversions += 1;
        Ok(())
    }

    fn temperature_c(&mut self, rom: &RomAddress) -> Result<f32, SensorError> {
        let probe = &self.probes[usize::from(rom.0[1])];
        if let Some(e) = probe.read_error {
            return Err(e);
        }
        probe.celsius.ok_or(SensorError::NoPresence)
    }
}

// ── LED ───────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockLed {
    pub history: Vec<bool>,
}

impl IndicatorPort for MockLed {
    fn set(&mut self, on: bool) {
        self.history.push(on);
    }
}

// ── Store ─────────────────────────────────────────────────────

/// In-memory flash store. Files keep creation order.
#[derive(Default)]
pub struct MemStore {
    pub files: Vec<(String, String)>,
    pub mounted: bool,
    pub mounts: u32,
    pub unmounts: u32,
    pub fail_mount: bool,
    pub fail_append: bool,
}

impl MemStore {
    pub fn contents(&self, name: &str) -> Option<&str> {
        self.files
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c.as_str())
    }

    pub fn lines(&self, name: &str) -> Vec<String> {
        self.contents(name)
            .map(|c| c.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    fn require_mount(&self) -> Result<(), StoreError> {
        if self.mounted {
            Ok(())
        } else {
            Err(StoreError::NotMounted)
        }
    }
}

impl LogStorePort for MemStore {
    fn mount(&mut self, _format_if_failed: bool) -> Result<(), StoreError> {
        if self.fail_mount {
            return Err(StoreError::MountFailed);
        }
        if !self.mounted {
            self.mounts += 1;
        }
        self.mounted = true;
        Ok(())
    }

    fn unmount(&mut self) {
        if self.mounted {
            self.unmounts += 1;
        }
        self.mounted = false;
    }

    fn is_mounted(&self) -> bool {
        self.mounted
    }

    fn append(&mut self, name: &str, text: &str) -> Result<(), StoreError> {
        self.require_mount()?;
        if self.fail_append {
            return Err(StoreError::WriteFailed);
        }
        match self.files.iter_mut().find(|(n, _)| n == name) {
            Some((_, content)) => content.push_str(text),
            None => self.files.push((name.into(), text.into())),
        }
        Ok(())
    }

    fn read_lines(
        &mut self,
        name: &str,
        each: &mut dyn FnMut(&str) -> ControlFlow<()>,
    ) -> Result<usize, StoreError> {
        self.require_mount()?;
        let content = self.contents(name).ok_or(StoreError::OpenFailed)?.to_string();
        let mut n = 0;
        for line in content.lines() {
            n += 1;
            if each(line).is_break() {
                break;
            }
        }
        Ok(n)
    }

    fn list_entries(&mut self) -> Result<Vec<DirEntry>, StoreError> {
        self.require_mount()?;
        Ok(self
            .files
            .iter()
            .map(|(name, c)| DirEntry {
                name: name.clone(),
                size: c.len() as u64,
            })
            .collect())
    }

    fn remove(&mut self, name: &str) -> Result<bool, StoreError> {
        self.require_mount()?;
        let before = self.files.len();
        self.files.retain(|(n, _)| n != name);
        Ok(self.files.len() != before)
    }

    fn exists(&self, name: &str) -> bool {
        self.mounted && self.contents(name).is_some()
    }
}

// ── Transport ─────────────────────────────────────────────────

#[derive(Default)]
pub struct ConnState {
    pub inbound: VecDeque<u8>,
    pub outbound: Vec<u8>,
    pub connected: bool,
    pub closed: bool,
    /// Writes accepted before the peer stops reading; `None` is unlimited.
    pub write_budget: Option<usize>,
    pub write_attempts: usize,
}

/// Client connection whose state the test keeps a handle to.
#[derive(Clone)]
pub struct MockConnection(pub Rc<RefCell<ConnState>>);

impl MockConnection {
    pub fn connected() -> Self {
        Self(Rc::new(RefCell::new(ConnState {
            connected: true,
            ..ConnState::default()
        })))
    }

    pub fn stale() -> Self {
        Self(Rc::new(RefCell::new(ConnState::default())))
    }

    pub fn send(&self, bytes: &[u8]) {
        self.0.borrow_mut().inbound.extend(bytes);
    }

    pub fn hang_up(&self) {
        self.0.borrow_mut().connected = false;
    }

    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow().outbound).into_owned()
    }

    pub fn take_output(&self) -> String {
        let bytes = std::mem::take(&mut self.0.borrow_mut().outbound);
        String::from_utf8_lossy(&bytes).into_owned()
    }

    pub fn is_closed(&self) -> bool {
        self.0.borrow().closed
    }

    /// Accept `writes` more writes, then fail every later one.
    pub fn stall_after(&self, writes: usize) {
        self.0.borrow_mut().write_budget = Some(writes);
    }

    pub fn write_attempts(&self) -> usize {
        self.0.borrow().write_attempts
    }
}

impl Connection for MockConnection {
    fn is_connected(&mut self) -> bool {
        let s = self.0.borrow();
        !s.closed && (s.connected || !s.inbound.is_empty())
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.0.borrow_mut().inbound.pop_front()
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let mut s = self.0.borrow_mut();
        if s.closed || !s.connected {
            return Err(TransportError::NotConnected);
        }
        s.write_attempts += 1;
        match s.write_budget {
            Some(0) => return Err(TransportError::Io),
            Some(ref mut left) => *left -= 1,
            None => {}
        }
        s.outbound.extend_from_slice(data);
        Ok(())
    }

    fn close(&mut self) {
        self.0.borrow_mut().closed = true;
    }
}

#[derive(Default)]
pub struct MockListener {
    pub pending: VecDeque<MockConnection>,
    pub port: Option<u16>,
    pub fail_bind: bool,
}

impl MockListener {
    pub fn queue(&mut self, conn: MockConnection) {
        self.pending.push_back(conn);
    }
}

impl ListenerPort for MockListener {
    type Conn = MockConnection;

    fn listen(&mut self, port: u16) -> Result<(), TransportError> {
        if self.fail_bind {
            return Err(TransportError::BindFailed);
        }
        self.port = Some(port);
        Ok(())
    }

    fn accept(&mut self) -> Option<MockConnection> {
        self.pending.pop_front()
    }
}

#[derive(Default)]
pub struct MockAp {
    pub started: Option<(String, f32)>,
    pub fail: bool,
}

impl AccessPointPort for MockAp {
    fn start(&mut self, ssid: &str, tx_power_dbm: f32) -> Result<(), TransportError> {
        if self.fail {
            return Err(TransportError::AccessPointFailed);
        }
        self.started = Some((ssid.into(), tx_power_dbm));
        Ok(())
    }
}

// ── Console ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MockConsole {
    pub input: VecDeque<u8>,
    pub output: Vec<u8>,
    pub flushed: bool,
}

impl MockConsole {
    pub fn output_text(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

impl ConsolePort for MockConsole {
    fn read_byte(&mut self) -> Option<u8> {
        self.input.pop_front()
    }

    fn write_byte(&mut self, byte: u8) {
        self.output.push(byte);
    }

    fn flush(&mut self) {
        self.flushed = true;
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

impl RecordingSink {
    pub fn contains(&self, event: &AppEvent) -> bool {
        self.events.contains(event)
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
