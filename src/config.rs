//! System configuration parameters
//!
//! Everything the controller needs at boot: the drive's Modbus address and
//! line speed, registers to initialise once, and the pump control law.
//! Values come from a JSON file on flash; when that file is missing or
//! invalid the firmware runs with [`SystemConfig::default()`].
//!
//! ```json
//! {
//!   "modbus_baud": 19200,
//!   "modbus_id": 1,
//!   "init_registers": [{ "reg": 8193, "value": 2 }],
//!   "run_register": 9473,
//!   "frequency_register": 9474,
//!   "pressure_input": { "register": 3098 },
//!   "flood_input": { "analog_input": "A0" },
//!   "stepper_levels": {
//!     "stop":  { "pressure": 840, "frequency": 0 },
//!     "fill":  { "pressure": 790, "frequency": 5400 },
//!     "start": { "pressure": 765, "frequency": 6000 }
//!   },
//!   "run_args": { "run": 1, "stop": 0 },
//!   "flood_trigger_value": 500,
//!   "flood_timeout": 60
//! }
//! ```

use core::time::Duration;

use heapless::Vec;
use serde::Deserialize;

use crate::app::ports::ConfigError;
use crate::modbus::RegisterAddress;

/// Most init registers a configuration may carry; extra entries are ignored.
pub const MAX_INIT_REGISTERS: usize = 8;

/// Number of analog inputs on the board (`A0`–`A5`).
pub const ANALOG_INPUT_COUNT: u8 = 6;

// ───────────────────────────────────────────────────────────────
// Control law
// ───────────────────────────────────────────────────────────────

/// One (pressure, frequency) control point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct StepperPoint {
    pub pressure: u16,
    pub frequency: u16,
}

/// The three control points.  Ordered `start < fill < stop` by pressure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct StepperLevels {
    pub stop: StepperPoint,
    pub fill: StepperPoint,
    pub start: StepperPoint,
}

/// Register values meaning "run" and "stop" on the drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RunEncoding {
    pub run: u16,
    pub stop: u16,
}

/// A local ADC input, `A0` = 0 through `A5` = 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnalogChannel(pub u8);

impl AnalogChannel {
    /// Parse a board label such as `"A3"`.
    pub fn from_label(label: &str) -> Option<Self> {
        let digit = label.strip_prefix('A')?;
        let index: u8 = digit.parse().ok()?;
        (index < ANALOG_INPUT_COUNT && digit.len() == 1).then_some(Self(index))
    }
}

/// Where a pressure or flood reading comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSource {
    /// A holding register on the drive.
    Register(RegisterAddress),
    /// A local analog input, bypassing the drive entirely.
    Analog(AnalogChannel),
}

impl InputSource {
    /// The register behind this input, if it is read from the drive.
    pub const fn register(self) -> Option<RegisterAddress> {
        match self {
            Self::Register(reg) => Some(reg),
            Self::Analog(_) => None,
        }
    }
}

/// A register written once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitRegister {
    pub reg: RegisterAddress,
    pub value: u16,
}

/// Everything the pump controller needs.  Immutable once handed over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    pub run_register: RegisterAddress,
    pub frequency_register: RegisterAddress,
    pub pressure_input: InputSource,
    pub flood_input: Option<InputSource>,
    pub levels: StepperLevels,
    pub run_args: RunEncoding,
    /// Flood readings at or below this value trip the flood override.
    pub flood_trigger: u16,
    /// How long the flood override holds the pump stopped.
    pub flood_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            run_register: RegisterAddress(0x2501),
            frequency_register: RegisterAddress(0x2502),
            pressure_input: InputSource::Register(RegisterAddress(0x0C1A)),
            flood_input: Some(InputSource::Register(RegisterAddress(0x0C19))),
            levels: StepperLevels {
                stop: StepperPoint { pressure: 840, frequency: 0 },
                fill: StepperPoint { pressure: 790, frequency: 5400 },
                start: StepperPoint { pressure: 765, frequency: 6000 },
            },
            run_args: RunEncoding { run: 1, stop: 0 },
            flood_trigger: 500,
            flood_timeout: Duration::from_secs(60 * 60),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// System configuration
// ───────────────────────────────────────────────────────────────

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemConfig {
    // --- Modbus ---
    /// Slave address of the drive (1–247)
    pub modbus_id: u8,
    /// RS-485 line speed
    pub modbus_baud: u32,
    /// Written once, in order, before the control loop starts
    pub init_registers: Vec<InitRegister, MAX_INIT_REGISTERS>,

    // --- Timing ---
    /// Pump control cycle period
    pub update_interval: Duration,

    // --- Control ---
    pub pump: ControllerConfig,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            modbus_id: 1,
            modbus_baud: 19_200,
            init_registers: Vec::new(),
            update_interval: Duration::from_millis(250), // 4 Hz
            pump: ControllerConfig::default(),
        }
    }
}

impl SystemConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json(bytes: &[u8]) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_slice(bytes).map_err(|_| ConfigError::Corrupted)?;
        let config = raw.into_config()?;
        validate_config(&config)?;
        Ok(config)
    }
}

/// Reject configurations the controller cannot run safely.
pub fn validate_config(c: &SystemConfig) -> Result<(), ConfigError> {
    if c.modbus_id == 0 || c.modbus_id > 247 {
        return Err(ConfigError::ValidationFailed("modbus_id must be 1-247"));
    }
    if c.modbus_baud == 0 {
        return Err(ConfigError::ValidationFailed("modbus_baud must be > 0"));
    }
    if c.update_interval.is_zero() {
        return Err(ConfigError::ValidationFailed("update_interval_ms must be > 0"));
    }
    let l = &c.pump.levels;
    if !(l.start.pressure < l.fill.pressure && l.fill.pressure < l.stop.pressure) {
        return Err(ConfigError::ValidationFailed(
            "stepper_levels pressures must satisfy start < fill < stop",
        ));
    }
    if c.pump.run_args.run == c.pump.run_args.stop {
        return Err(ConfigError::ValidationFailed("run_args run and stop must differ"));
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// File format
// ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RawConfig {
    modbus_baud: u32,
    modbus_id: u8,
    #[serde(default)]
    init_registers: std::vec::Vec<RawInitRegister>,
    run_register: u16,
    frequency_register: u16,
    pressure_input: RawInput,
    #[serde(default)]
    flood_input: Option<RawInput>,
    stepper_levels: StepperLevels,
    run_args: RunEncoding,
    flood_trigger_value: u16,
    /// Minutes.
    flood_timeout: u64,
    #[serde(default)]
    update_interval_ms: Option<u64>,
}

#[derive(Deserialize)]
struct RawInitRegister {
    reg: u16,
    value: u16,
}

#[derive(Deserialize)]
struct RawInput {
    #[serde(default)]
    register: Option<u16>,
    #[serde(default)]
    analog_input: Option<std::string::String>,
}

impl RawInput {
    fn into_source(self) -> Result<InputSource, ConfigError> {
        if let Some(reg) = self.register {
            return Ok(InputSource::Register(RegisterAddress(reg)));
        }
        match self.analog_input {
            Some(label) => AnalogChannel::from_label(&label)
                .map(InputSource::Analog)
                .ok_or(ConfigError::ValidationFailed("analog_input must be A0-A5")),
            None => Err(ConfigError::ValidationFailed(
                "input needs a register or analog_input",
            )),
        }
    }
}

impl RawConfig {
    fn into_config(self) -> Result<SystemConfig, ConfigError> {
        let mut init_registers = Vec::new();
        for r in self.init_registers.into_iter().take(MAX_INIT_REGISTERS) {
            // Cannot overflow: `take` bounds the iterator to the capacity.
            let _ = init_registers.push(InitRegister {
                reg: RegisterAddress(r.reg),
                value: r.value,
            });
        }

        let flood_input = match self.flood_input {
            Some(raw) => Some(raw.into_source()?),
            None => None,
        };

        Ok(SystemConfig {
            modbus_id: self.modbus_id,
            modbus_baud: self.modbus_baud,
            init_registers,
            update_interval: self
                .update_interval_ms
                .map_or(SystemConfig::default().update_interval, Duration::from_millis),
            pump: ControllerConfig {
                run_register: RegisterAddress(self.run_register),
                frequency_register: RegisterAddress(self.frequency_register),
                pressure_input: self.pressure_input.into_source()?,
                flood_input,
                levels: self.stepper_levels,
                run_args: self.run_args,
                flood_trigger: self.flood_trigger_value,
                flood_timeout: Duration::from_secs(self.flood_timeout.saturating_mul(60)),
            },
        })
    }
}
