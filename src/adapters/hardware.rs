//! Hardware adapter — bridges real peripherals to domain port traits.
//!
//! Owns the register channel to the drive and the local ADC inputs,
//! exposing them through [`RegisterPort`] and [`AnalogPort`] as the single
//! `hw` handle the pump controller takes.  On non-espidf targets the ADC
//! reads come from the cfg-gated simulation stubs in `hw_init`.

use crate::app::ports::{AnalogPort, RegisterPort};
use crate::config::AnalogChannel;
use crate::drivers::hw_init;
use crate::modbus::{ModbusError, RegisterAddress};
use crate::pins;

/// The board's analog inputs `A0`–`A5` on ADC1.
#[derive(Debug, Default, Clone, Copy)]
pub struct Adc1Inputs;

impl AnalogPort for Adc1Inputs {
    fn read_analog(&mut self, channel: AnalogChannel) -> Option<u16> {
        let adc_channel = *pins::ANALOG_ADC1_CHANNELS.get(usize::from(channel.0))?;
        hw_init::adc1_read(adc_channel)
    }
}

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter<R, A = Adc1Inputs> {
    registers: R,
    analog: A,
}

impl<R: RegisterPort, A: AnalogPort> HardwareAdapter<R, A> {
    pub fn new(registers: R, analog: A) -> Self {
        Self { registers, analog }
    }

    pub fn registers(&self) -> &R {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut R {
        &mut self.registers
    }
}

// ── RegisterPort implementation ───────────────────────────────

impl<R: RegisterPort, A> RegisterPort for HardwareAdapter<R, A> {
    fn read_holding_register(&mut self, reg: RegisterAddress) -> Result<u16, ModbusError> {
        self.registers.read_holding_register(reg)
    }

    fn write_register(&mut self, reg: RegisterAddress, value: u16) -> Result<(), ModbusError> {
        self.registers.write_register(reg, value)
    }
}

// ── AnalogPort implementation ─────────────────────────────────

impl<R, A: AnalogPort> AnalogPort for HardwareAdapter<R, A> {
    fn read_analog(&mut self, channel: AnalogChannel) -> Option<u16> {
        self.analog.read_analog(channel)
    }
}
