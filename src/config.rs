//! Logger configuration parameters
//!
//! All tunable parameters for the stream logger. Values are compiled in;
//! [`LoggerConfig::validate`] guards against a bad edit before the first
//! wake cycle uses them.

use serde::{Deserialize, Serialize};

use crate::pins;

/// What to write in the column of a device whose address lookup failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GhostReadingPolicy {
    /// Repeat the last reading taken this cycle (0.00 before the first one).
    RetainLast,
    /// Write the DS18B20 "disconnected" value (-127.00).
    Sentinel,
}

/// Wall-clock start point applied on the first cycle after power-on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialClock {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub day: u8,
    pub month: u8,
    pub year: u16,
}

/// Core logger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerConfig {
    // --- Wake cycle ---
    /// Deep-sleep period between sampling wakes (microseconds)
    pub sleep_period_us: u64,
    /// Touch pad used both as wake source and mode selector
    pub touch_gpio: i32,
    /// Touch reading below which the pad wakes the chip from deep sleep
    pub touch_wake_threshold: u16,
    /// Averaged reading at or above which the cycle samples; below it serves
    pub mode_threshold: u32,
    /// Number of touch readings averaged into the mode signal
    pub touch_samples: u32,
    /// Pause between touch readings (milliseconds)
    pub touch_sample_delay_ms: u32,
    /// Status LED hold time on the first cycle after power-on (milliseconds)
    pub first_run_indicator_ms: u32,
    /// Clock value set on the first cycle after power-on
    pub initial_clock: InitialClock,

    // --- Sensors ---
    /// GPIO carrying the one-wire bus
    pub onewire_gpio: i32,
    /// Column value for devices whose address lookup failed
    pub ghost_policy: GhostReadingPolicy,

    // --- Log file ---
    /// Well-known log file name, relative to the store root
    pub log_path: heapless::String<32>,
    /// Line written once, before any record, on the first cycle
    pub header_line: heapless::String<64>,
    /// strftime-style pattern for the record timestamp column
    pub timestamp_pattern: heapless::String<16>,

    // --- Serving ---
    /// Soft-AP network name
    pub ap_ssid: heapless::String<32>,
    /// Soft-AP transmit power (dBm)
    pub ap_tx_power_dbm: f32,
    /// TCP port of the command terminal
    pub tcp_port: u16,
    /// Time given to the user to join the AP before polling starts (seconds)
    pub settle_secs: u32,
    /// Pause between command-session poll passes (milliseconds)
    pub poll_interval_ms: u32,
}

fn fixed<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            // Wake cycle: 14 min 58.54 s, tuned so records land ~15 min apart
            sleep_period_us: 898_542_131,
            touch_gpio: pins::TOUCH_GPIO,
            touch_wake_threshold: 20,
            mode_threshold: 50,
            touch_samples: 5,
            touch_sample_delay_ms: 2,
            first_run_indicator_ms: 4_000,
            initial_clock: InitialClock {
                hour: 0,
                minute: 0,
                second: 0,
                day: 9,
                month: 6,
                year: 2023,
            },

            // Sensors
            onewire_gpio: pins::ONEWIRE_GPIO,
            ghost_policy: GhostReadingPolicy::RetainLast,

            // Log file
            log_path: fixed("datatempC.txt"),
            header_line: fixed("... program release 1.0 ..."),
            timestamp_pattern: fixed("%F, %T"),

            // Serving
            ap_ssid: fixed("Idahostreams"),
            ap_tx_power_dbm: 11.0,
            tcp_port: 80,
            settle_secs: 29,
            poll_interval_ms: 10,
        }
    }
}

/// Reasons a [`LoggerConfig`] is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A field failed range validation; the message names it.
    ValidationFailed(&'static str),
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
        }
    }
}

impl LoggerConfig {
    /// Range-check every field that would otherwise misbehave silently.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sleep_period_us == 0 {
            return Err(ConfigError::ValidationFailed("sleep_period_us must be > 0"));
        }
        if self.touch_samples == 0 {
            return Err(ConfigError::ValidationFailed("touch_samples must be >= 1"));
        }
        if self.log_path.is_empty() || self.log_path.contains('/') {
            return Err(ConfigError::ValidationFailed(
                "log_path must be a bare file name",
            ));
        }
        if self.ap_ssid.is_empty() {
            return Err(ConfigError::ValidationFailed("ap_ssid must not be empty"));
        }
        if !(2.0..=20.0).contains(&self.ap_tx_power_dbm) {
            return Err(ConfigError::ValidationFailed(
                "ap_tx_power_dbm must be 2.0–20.0",
            ));
        }
        let c = &self.initial_clock;
        if c.hour > 23 || c.minute > 59 || c.second > 59 {
            return Err(ConfigError::ValidationFailed("initial_clock time out of range"));
        }
        if c.year < 1970
            || chrono::NaiveDate::from_ymd_opt(
                i32::from(c.year),
                u32::from(c.month),
                u32::from(c.day),
            )
            .is_none()
        {
            return Err(ConfigError::ValidationFailed("initial_clock date out of range"));
        }
        if chrono::format::StrftimeItems::new(&self.timestamp_pattern)
            .any(|item| matches!(item, chrono::format::Item::Error))
        {
            return Err(ConfigError::ValidationFailed(
                "timestamp_pattern has an unknown conversion",
            ));
        }
        Ok(())
    }

    /// Return `self` if valid, otherwise the defaults (with a warning).
    pub fn validated_or_default(self) -> Self {
        match self.validate() {
            Ok(()) => self,
            Err(e) => {
                log::warn!("Config rejected ({}), using defaults", e);
                Self::default()
            }
        }
    }
}
