//! GPIO / peripheral pin assignments for the pump controller board.
//!
//! Raw GPIO numbers used by the sys-level drivers live here.  The UART
//! pins are typed esp-idf-hal peripherals and are bound in `main`.

use crate::config::ANALOG_INPUT_COUNT;

// ---------------------------------------------------------------------------
// RS-485 link to the drive (MAX485-style half-duplex transceiver)
// ---------------------------------------------------------------------------

// UART1 on GPIO17 (TX) / GPIO18 (RX).  esp-idf-hal hands those out as
// typed peripherals, so `main` takes them by name rather than by number.

/// Transceiver driver enable (DE), HIGH while transmitting.
pub const MODBUS_DE_GPIO: i32 = 8;
/// Transceiver receiver enable (/RE), HIGH while transmitting.
pub const MODBUS_RE_GPIO: i32 = 9;

/// Per-byte read timeout on the Modbus UART.  A reply that stalls longer
/// than this counts as a response timeout.
pub const MODBUS_READ_TIMEOUT_MS: u32 = 200;

// ---------------------------------------------------------------------------
// Analog inputs (ADC1)
// ---------------------------------------------------------------------------

/// ADC1 channel behind each board label `A0`–`A5` (GPIO 1–6 on ESP32-S3).
pub const ANALOG_ADC1_CHANNELS: [u32; ANALOG_INPUT_COUNT as usize] = [0, 1, 2, 3, 4, 5];
