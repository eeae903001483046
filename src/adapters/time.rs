//! Wall clock adapter.
//!
//! Implements [`ClockPort`] on top of the system clock, which the ESP32
//! keeps running from the RTC through deep sleep.
//!
//! - **`target_os = "espidf"`** — `settimeofday()` / `gettimeofday()`; the
//!   value survives deep sleep but not power loss.
//! - **`not(target_os = "espidf")`** — an offset over
//!   `std::time::Instant`, seeded from `SystemTime` until the first
//!   `set_time`.
//!
//! Calendar math and rendering go through `chrono` rather than libc
//! `strftime` so the output is identical on both targets. The clock runs in
//! UTC.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, NaiveDate};
use core::fmt::Write;

use crate::app::ports::ClockPort;
use crate::config::InitialClock;

/// Seconds since the Unix epoch for an [`InitialClock`], or `None` if the
/// fields do not name a real date and time.
pub fn epoch_from_civil(at: &InitialClock) -> Option<i64> {
    NaiveDate::from_ymd_opt(i32::from(at.year), u32::from(at.month), u32::from(at.day))
        .and_then(|d| {
            d.and_hms_opt(u32::from(at.hour), u32::from(at.minute), u32::from(at.second))
        })
        .map(|t| t.and_utc().timestamp())
}

/// `true` if `pattern` contains only conversions `chrono` can render.
pub fn is_valid_pattern(pattern: &str) -> bool {
    StrftimeItems::new(pattern).all(|item| !matches!(item, Item::Error))
}

/// Render `epoch_secs` (UTC) with a strftime `pattern`.
pub fn format_epoch(epoch_secs: i64, pattern: &str) -> Option<String> {
    if !is_valid_pattern(pattern) {
        return None;
    }
    let at = DateTime::from_timestamp(epoch_secs, 0)?;
    let mut out = String::with_capacity(pattern.len() + 16);
    write!(out, "{}", at.format(pattern)).ok()?;
    Some(out)
}

/// RTC-backed wall clock.
pub struct RtcClock {
    #[cfg(not(target_os = "espidf"))]
    base_epoch: i64,
    #[cfg(not(target_os = "espidf"))]
    base_instant: std::time::Instant,
}

impl Default for RtcClock {
    fn default() -> Self {
        Self::new()
    }
}

impl RtcClock {
    #[cfg(target_os = "espidf")]
    pub fn new() -> Self {
        Self {}
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Self {
        let base_epoch = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        Self {
            base_epoch,
            base_instant: std::time::Instant::now(),
        }
    }

    /// Seconds since the Unix epoch.
    #[cfg(target_os = "espidf")]
    pub fn now_epoch(&self) -> i64 {
        use core::ptr;
        let mut tv = esp_idf_sys::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        if unsafe { esp_idf_sys::gettimeofday(&mut tv, ptr::null_mut()) } != 0 {
            return 0;
        }
        tv.tv_sec as i64
    }

    /// Seconds since the Unix epoch.
    #[cfg(not(target_os = "espidf"))]
    pub fn now_epoch(&self) -> i64 {
        self.base_epoch + self.base_instant.elapsed().as_secs() as i64
    }
}

impl ClockPort for RtcClock {
    #[cfg(target_os = "espidf")]
    fn set_time(&mut self, at: &InitialClock) {
        use core::ptr;
        let Some(secs) = epoch_from_civil(at) else {
            log::warn!("Initial clock {:?} is not a valid date; clock left unset", at);
            return;
        };
        let tv = esp_idf_sys::timeval {
            tv_sec: secs as esp_idf_sys::time_t,
            tv_usec: 0,
        };
        if unsafe { esp_idf_sys::settimeofday(&tv, ptr::null()) } != 0 {
            log::warn!("settimeofday failed; timestamps will be wrong");
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn set_time(&mut self, at: &InitialClock) {
        let Some(secs) = epoch_from_civil(at) else {
            log::warn!("Initial clock {:?} is not a valid date; clock left unset", at);
            return;
        };
        self.base_epoch = secs;
        self.base_instant = std::time::Instant::now();
    }

    /// Falls back to raw epoch seconds if `pattern` cannot be rendered.
    fn format(&self, pattern: &str) -> String {
        let now = self.now_epoch();
        format_epoch(now, pattern).unwrap_or_else(|| {
            log::warn!("Timestamp pattern {:?} not renderable", pattern);
            now.to_string()
        })
    }
}
