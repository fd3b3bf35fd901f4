//! Task Watchdog Timer (TWDT) driver.
//!
//! The drive keeps running at whatever frequency it was last given, so a
//! wedged control loop leaves the pump unsupervised: no stop at high
//! pressure, no flood override.  Subscribing the main task to the TWDT
//! turns such a stall into a reboot, and `PumpService::begin` then forces
//! the drive back to a stopped state.
//!
//! Each Modbus transaction is bounded by the 20 ms silent interval plus
//! the UART read timeout, and one control cycle makes at most six of
//! them, so [`WATCHDOG_TIMEOUT_MS`] sits well clear of a healthy cycle.
//! The loop calls `feed()` once per iteration.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::{info, warn};

/// Stall time before the TWDT panics and reboots.
pub const WATCHDOG_TIMEOUT_MS: u32 = 10_000;

pub struct Watchdog {
    #[cfg(target_os = "espidf")]
    subscribed: bool,
    feeds: u32,
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}

impl Watchdog {
    /// Initialise and subscribe the current task to the TWDT.
    pub fn new() -> Self {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task during boot.
            unsafe {
                let cfg = esp_task_wdt_config_t {
                    timeout_ms: WATCHDOG_TIMEOUT_MS,
                    idle_core_mask: 0,
                    trigger_panic: true,
                };
                let ret = esp_task_wdt_reconfigure(&cfg);
                if ret != ESP_OK {
                    warn!("TWDT reconfigure returned {} (may already be configured)", ret);
                }

                let ret = esp_task_wdt_add(core::ptr::null_mut());
                let subscribed = ret == ESP_OK;
                if subscribed {
                    info!(
                        "Watchdog: subscribed ({}ms timeout, panic on trigger)",
                        WATCHDOG_TIMEOUT_MS
                    );
                } else {
                    warn!("Watchdog: failed to subscribe ({})", ret);
                }

                Self { subscribed, feeds: 0 }
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            log::info!("Watchdog(sim): no-op");
            Self { feeds: 0 }
        }
    }

    /// Feed the watchdog.
    pub fn feed(&mut self) {
        self.feeds = self.feeds.wrapping_add(1);

        #[cfg(target_os = "espidf")]
        {
            if self.subscribed {
                // SAFETY: resets the current task's TWDT entry; main task only.
                unsafe {
                    esp_task_wdt_reset();
                }
            }
        }
    }

    /// Feeds since boot (wrapping).
    pub fn feeds(&self) -> u32 {
        self.feeds
    }
}
