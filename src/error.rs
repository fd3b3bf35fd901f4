//! Unified error types for the pump controller firmware.
//!
//! A single `Error` enum that every subsystem can convert into, keeping
//! boot-time error handling in `main` uniform.  All variants are `Copy`
//! so they pass through the control path without allocation.

use core::fmt;

use crate::app::ports::ConfigError;
use crate::drivers::hw_init::HwInitError;
use crate::modbus::ModbusError;
use crate::scheduler::ScheduleError;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A register transaction with the drive failed.
    Modbus(ModbusError),
    /// The event queue rejected an event.
    Schedule(ScheduleError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
    /// Peripheral initialisation failed.
    Init(HwInitError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Modbus(e) => write!(f, "modbus: {e}"),
            Self::Schedule(e) => write!(f, "scheduler: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Init(e) => write!(f, "init: {e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<ModbusError> for Error {
    fn from(e: ModbusError) -> Self {
        Self::Modbus(e)
    }
}

impl From<ScheduleError> for Error {
    fn from(e: ScheduleError) -> Self {
        Self::Schedule(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<HwInitError> for Error {
    fn from(e: HwInitError) -> Self {
        Self::Init(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
