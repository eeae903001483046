//! Task Watchdog Timer (TWDT) driver.
//!
//! Subscribes the serving loop's task to the ESP-IDF TWDT so a stalled
//! command session resets the device instead of draining the battery
//! with the radio on. The loop calls [`Watchdog::feed`] on every poll.

#[cfg(target_os = "espidf")]
use esp_idf_sys::*;

use log::info;

/// Default reset timeout for the serving loop.
pub const DEFAULT_TIMEOUT_MS: u32 = 10_000;

pub struct Watchdog {
    #[cfg(target_os = "espidf")]
    subscribed: bool,
    #[cfg(not(target_os = "espidf"))]
    feeds: core::cell::Cell<u64>,
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT_MS)
    }
}

impl Watchdog {
    /// Configure the TWDT with `timeout_ms` and subscribe the current task.
    #[cfg(target_os = "espidf")]
    pub fn new(timeout_ms: u32) -> Self {
        unsafe {
            let cfg = esp_task_wdt_config_t {
                timeout_ms,
                idle_core_mask: 0,
                trigger_panic: true,
            };
            let ret = esp_task_wdt_reconfigure(&cfg);
            if ret != ESP_OK {
                log::warn!(
                    "TWDT reconfigure returned {} (may already be configured)",
                    ret
                );
            }

            let ret = esp_task_wdt_add(core::ptr::null_mut());
            let subscribed = ret == ESP_OK;
            if subscribed {
                info!("Watchdog: subscribed ({} ms timeout)", timeout_ms);
            } else {
                log::warn!("Watchdog: failed to subscribe ({})", ret);
            }
            Self { subscribed }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new(timeout_ms: u32) -> Self {
        info!("Watchdog(sim): {} ms, not enforced", timeout_ms);
        Self {
            feeds: core::cell::Cell::new(0),
        }
    }

    /// Feed the watchdog.
    pub fn feed(&self) {
        #[cfg(target_os = "espidf")]
        {
            if self.subscribed {
                unsafe {
                    esp_task_wdt_reset();
                }
            }
        }
        #[cfg(not(target_os = "espidf"))]
        self.feeds.set(self.feeds.get() + 1);
    }

    /// Number of feeds so far (simulation only).
    #[cfg(not(target_os = "espidf"))]
    pub fn feed_count(&self) -> u64 {
        self.feeds.get()
    }
}
