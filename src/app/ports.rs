//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ PumpController / PumpService (domain)
//! ```
//!
//! Driven adapters (the Modbus channel, ADC, event sinks, config storage)
//! implement these traits.  The domain consumes them via generics, so the
//! control law never touches a UART or an ADC register directly.

use core::fmt;

use crate::config::{AnalogChannel, SystemConfig};
use crate::modbus::{ModbusError, RegisterAddress};

// ───────────────────────────────────────────────────────────────
// Register port (driven adapter: domain ↔ drive)
// ───────────────────────────────────────────────────────────────

/// Blocking access to the drive's holding registers.
///
/// Every call is one complete transaction; failures are returned, never
/// retried here.
pub trait RegisterPort {
    fn read_holding_register(&mut self, reg: RegisterAddress) -> Result<u16, ModbusError>;

    fn write_register(&mut self, reg: RegisterAddress, value: u16) -> Result<(), ModbusError>;
}

// ───────────────────────────────────────────────────────────────
// Analog port (driven adapter: ADC → domain)
// ───────────────────────────────────────────────────────────────

/// Local analog inputs.  `None` means the channel could not be sampled.
pub trait AnalogPort {
    fn read_analog(&mut self, channel: AnalogChannel) -> Option<u16>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: flash → domain)
// ───────────────────────────────────────────────────────────────

/// Loads system configuration at boot.
///
/// Implementations MUST validate before returning; the caller falls back
/// to [`SystemConfig::default()`] on any error.
pub trait ConfigPort {
    fn load(&self) -> Result<SystemConfig, ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config file present.
    NotFound,
    /// The file is not a well-formed configuration document.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
