//! ESP32 time adapters.
//!
//! - [`SystemTicks`]: the free-running millisecond counter behind the
//!   monotonic clock, truncated to 32 bits.  Wrap handling lives in
//!   [`MonotonicClock`](crate::clock::MonotonicClock).
//! - [`SystemDelay`]: blocking delay for the Modbus silent interval.
//!
//! **`target_os = "espidf"`** wraps `esp_timer_get_time()` and FreeRTOS
//! delays; **`not(target_os = "espidf")`** uses `std::time` for host-side
//! testing and simulation.

use embedded_hal::delay::DelayNs;

use crate::clock::TickSource;

/// Milliseconds since boot, wrapping at `u32::MAX`.
pub struct SystemTicks {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for SystemTicks {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemTicks {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }
}

impl TickSource for SystemTicks {
    #[cfg(target_os = "espidf")]
    fn millis(&mut self) -> u32 {
        // SAFETY: esp_timer_get_time reads the monotonic system timer.
        ((unsafe { esp_idf_svc::sys::esp_timer_get_time() }) / 1_000) as u32
    }

    #[cfg(not(target_os = "espidf"))]
    fn millis(&mut self) -> u32 {
        self.start.elapsed().as_millis() as u32
    }
}

/// Blocking delay that yields to the scheduler.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemDelay;

impl DelayNs for SystemDelay {
    #[cfg(target_os = "espidf")]
    fn delay_ns(&mut self, ns: u32) {
        esp_idf_hal::delay::Delay::new_default().delay_us(ns.div_ceil(1_000));
    }

    #[cfg(not(target_os = "espidf"))]
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(std::time::Duration::from_nanos(u64::from(ns)));
    }

    #[cfg(target_os = "espidf")]
    fn delay_ms(&mut self, ms: u32) {
        esp_idf_hal::delay::FreeRtos::delay_ms(ms);
    }

    #[cfg(not(target_os = "espidf"))]
    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(u64::from(ms)));
    }
}
