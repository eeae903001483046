//! Deep-sleep retained flag.
//!
//! Implements [`RetainedFlag`] for the "first cycle since power-on"
//! decision.
//!
//! - **`target_os = "espidf"`**: a word in RTC slow memory (`.rtc.data`).
//!   The RTC domain stays powered through deep sleep and is zeroed by a
//!   power-on reset.
//! - **all other targets**: a process-wide static. The host simulator
//!   exits on deep sleep, so every run starts as a power-on.

use core::sync::atomic::{AtomicU32, Ordering};

/// Written on the first cycle; anything else means "not yet".
const MAGIC: u32 = 0x5EED_CAFE;

#[cfg(target_os = "espidf")]
#[unsafe(link_section = ".rtc.data")]
static FIRST_CYCLE_DONE: AtomicU32 = AtomicU32::new(0);

#[cfg(not(target_os = "espidf"))]
static FIRST_CYCLE_DONE: AtomicU32 = AtomicU32::new(0);

/// Handle to the retained first-cycle flag.
#[derive(Debug, Default)]
pub struct RtcRetainedFlag;

impl RtcRetainedFlag {
    pub fn new() -> Self {
        Self
    }

    /// Forget the latch, as a power loss would (simulation only).
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_power_loss() {
        FIRST_CYCLE_DONE.store(0, Ordering::SeqCst);
    }
}

impl crate::app::ports::RetainedFlag for RtcRetainedFlag {
    fn is_set(&self) -> bool {
        FIRST_CYCLE_DONE.load(Ordering::SeqCst) == MAGIC
    }

    fn set(&mut self) {
        FIRST_CYCLE_DONE.store(MAGIC, Ordering::SeqCst);
    }
}
