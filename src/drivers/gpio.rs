//! Plain GPIO output pin.
//!
//! Thin [`OutputPin`] over [`hw_init::gpio_write`] so the register channel
//! can drive the RS-485 direction lines without knowing about ESP-IDF.
//! The pin must already be configured as an output by
//! [`hw_init::init_peripherals`].

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, OutputPin};

use super::hw_init;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpioOutput {
    pin: i32,
    high: bool,
}

impl GpioOutput {
    pub fn new(pin: i32) -> Self {
        Self { pin, high: false }
    }

    pub fn pin(&self) -> i32 {
        self.pin
    }

    /// Last level written.
    pub fn is_set_high(&self) -> bool {
        self.high
    }
}

impl ErrorType for GpioOutput {
    type Error = Infallible;
}

impl OutputPin for GpioOutput {
    fn set_low(&mut self) -> Result<(), Infallible> {
        hw_init::gpio_write(self.pin, false);
        self.high = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        hw_init::gpio_write(self.pin, true);
        self.high = true;
        Ok(())
    }
}
