//! RS-485 serial transport.
//!
//! [`UartTransport`] wraps the ESP-IDF UART driver in the blocking
//! `embedded_io` traits the register channel speaks.  `ReadReady` reports
//! bytes already sitting in the driver's RX buffer.  Reads wait at most
//! the configured timeout; a read that times out with nothing received is
//! reported as [`SerialError::TimedOut`], which the channel classifies as a
//! Modbus response timeout.

use core::fmt;

use embedded_io::ErrorKind;

/// Transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialError {
    /// No byte arrived within the read timeout.
    TimedOut,
    /// The UART driver returned an ESP-IDF error code.
    Driver(i32),
}

impl fmt::Display for SerialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimedOut => write!(f, "serial read timed out"),
            Self::Driver(rc) => write!(f, "UART driver error (rc={})", rc),
        }
    }
}

impl embedded_io::Error for SerialError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::TimedOut => ErrorKind::TimedOut,
            Self::Driver(_) => ErrorKind::Other,
        }
    }
}

#[cfg(target_os = "espidf")]
pub use esp::UartTransport;

#[cfg(target_os = "espidf")]
mod esp {
    use embedded_io::{ErrorType, Read, ReadReady, Write};
    use esp_idf_hal::delay::{TickType, BLOCK};
    use esp_idf_hal::uart::UartDriver;
    use esp_idf_svc::sys::TickType_t;

    use super::SerialError;

    pub struct UartTransport<'d> {
        uart: UartDriver<'d>,
        read_timeout: TickType_t,
    }

    impl<'d> UartTransport<'d> {
        pub fn new(uart: UartDriver<'d>, read_timeout_ms: u32) -> Self {
            Self {
                uart,
                read_timeout: TickType::new_millis(u64::from(read_timeout_ms)).ticks(),
            }
        }
    }

    impl ErrorType for UartTransport<'_> {
        type Error = SerialError;
    }

    impl Read for UartTransport<'_> {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
            if buf.is_empty() {
                return Ok(0);
            }
            match self.uart.read(buf, self.read_timeout) {
                Ok(0) => Err(SerialError::TimedOut),
                Ok(n) => Ok(n),
                Err(e) => Err(SerialError::Driver(e.code())),
            }
        }
    }

    impl ReadReady for UartTransport<'_> {
        fn read_ready(&mut self) -> Result<bool, SerialError> {
            self.uart
                .remaining_read()
                .map(|n| n > 0)
                .map_err(|e| SerialError::Driver(e.code()))
        }
    }

    impl Write for UartTransport<'_> {
        fn write(&mut self, buf: &[u8]) -> Result<usize, SerialError> {
            self.uart
                .write(buf)
                .map_err(|e| SerialError::Driver(e.code()))
        }

        /// Blocks until the last stop bit has left the shift register, so
        /// the direction pins are never released mid-frame.
        fn flush(&mut self) -> Result<(), SerialError> {
            self.uart
                .wait_tx_done(BLOCK)
                .map_err(|e| SerialError::Driver(e.code()))
        }
    }
}
