//! Power management adapter.
//!
//! Implements [`PowerPort`]: wake-source arming, the capacitive touch pad
//! and deep-sleep entry.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: ESP-IDF sleep and touch-sensor drivers.
//! - **all other targets**: simulation. Touch readings come from a
//!   settable value and deep sleep exits the process, which is the host
//!   equivalent of "the next instruction is the reset vector".

use log::{debug, info, warn};

use crate::app::ports::PowerPort;

/// Map a touch-capable GPIO to its ESP32 touch pad channel.
pub fn touch_pad_for_gpio(gpio: i32) -> Option<u32> {
    match gpio {
        4 => Some(0),
        0 => Some(1),
        2 => Some(2),
        15 => Some(3),
        13 => Some(4),
        12 => Some(5),
        14 => Some(6),
        27 => Some(7),
        33 => Some(8),
        32 => Some(9),
        _ => None,
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation touch input
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
static SIM_TOUCH: core::sync::atomic::AtomicU16 = core::sync::atomic::AtomicU16::new(80);

/// Set the value every simulated touch read returns. Below the mode
/// threshold selects serving.
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_touch(value: u16) {
    SIM_TOUCH.store(value, core::sync::atomic::Ordering::Relaxed);
}

// ───────────────────────────────────────────────────────────────
// EspPower
// ───────────────────────────────────────────────────────────────

pub struct EspPower {
    touch_ready: bool,
    /// Bit per touch pad already enabled.
    #[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
    configured_pads: u16,
}

impl Default for EspPower {
    fn default() -> Self {
        Self::new()
    }
}

impl EspPower {
    pub fn new() -> Self {
        Self {
            touch_ready: false,
            configured_pads: 0,
        }
    }

    #[cfg(target_os = "espidf")]
    fn ensure_touch(&mut self) {
        use esp_idf_sys::*;
        if self.touch_ready {
            return;
        }
        unsafe {
            let ret = touch_pad_init();
            if ret != ESP_OK {
                warn!("Touch: init failed ({})", ret);
                return;
            }
            touch_pad_set_fsm_mode(touch_fsm_mode_t_TOUCH_FSM_MODE_TIMER);
        }
        self.touch_ready = true;
    }

    #[cfg(not(target_os = "espidf"))]
    fn ensure_touch(&mut self) {
        self.touch_ready = true;
    }

    #[cfg(target_os = "espidf")]
    fn platform_read_touch(&mut self, pad: u32) -> u16 {
        use esp_idf_sys::*;
        let mut value: u16 = 0;
        unsafe {
            // A pad armed for wake is already enabled with its threshold.
            if self.configured_pads & (1 << pad) == 0 {
                let _ = touch_pad_config(pad as touch_pad_t, 0);
                self.configured_pads |= 1 << pad;
            }
            let ret = touch_pad_read(pad as touch_pad_t, &mut value);
            if ret != ESP_OK {
                warn!("Touch: read pad {} failed ({})", pad, ret);
            }
        }
        value
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_read_touch(&mut self, _pad: u32) -> u16 {
        SIM_TOUCH.load(core::sync::atomic::Ordering::Relaxed)
    }
}

impl PowerPort for EspPower {
    #[cfg(target_os = "espidf")]
    fn arm_timer_wake(&mut self, duration_us: u64) {
        let ret = unsafe { esp_idf_sys::esp_sleep_enable_timer_wakeup(duration_us) };
        if ret != esp_idf_sys::ESP_OK {
            warn!("Sleep: timer wake rejected ({})", ret);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn arm_timer_wake(&mut self, duration_us: u64) {
        debug!("Sleep(sim): timer wake in {} us", duration_us);
    }

    #[cfg(target_os = "espidf")]
    fn arm_touch_wake(&mut self, gpio: i32, threshold: u16) {
        use esp_idf_sys::*;
        let Some(pad) = touch_pad_for_gpio(gpio) else {
            warn!("Sleep: GPIO{} has no touch pad, touch wake not armed", gpio);
            return;
        };
        self.ensure_touch();
        unsafe {
            let ret = touch_pad_config(pad as touch_pad_t, threshold);
            if ret != ESP_OK {
                warn!("Sleep: touch threshold rejected ({})", ret);
                return;
            }
            self.configured_pads |= 1 << pad;
            let ret = esp_sleep_enable_touchpad_wakeup();
            if ret != ESP_OK {
                warn!("Sleep: touch wake rejected ({})", ret);
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn arm_touch_wake(&mut self, gpio: i32, threshold: u16) {
        if touch_pad_for_gpio(gpio).is_none() {
            warn!("Sleep(sim): GPIO{} has no touch pad", gpio);
            return;
        }
        self.ensure_touch();
        debug!("Sleep(sim): touch wake on GPIO{} below {}", gpio, threshold);
    }

    fn read_touch(&mut self, gpio: i32) -> u16 {
        let Some(pad) = touch_pad_for_gpio(gpio) else {
            warn!("Touch: GPIO{} has no touch pad", gpio);
            return 0;
        };
        self.ensure_touch();
        self.platform_read_touch(pad)
    }

    #[cfg(target_os = "espidf")]
    fn delay_ms(&mut self, ms: u32) {
        esp_idf_hal::delay::FreeRtos::delay_ms(ms);
    }

    #[cfg(not(target_os = "espidf"))]
    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(u64::from(ms)));
    }

    #[cfg(target_os = "espidf")]
    fn enter_deep_sleep(&mut self) -> ! {
        info!("Entering deep sleep");
        unsafe {
            // Let the console drain; output still in the FIFO is lost.
            let _ = esp_idf_sys::uart_wait_tx_idle_polling(0);
            esp_idf_sys::esp_deep_sleep_start()
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn enter_deep_sleep(&mut self) -> ! {
        info!("Deep sleep(sim): exiting; rerun to simulate the next wake");
        log::logger().flush();
        std::process::exit(0)
    }
}
