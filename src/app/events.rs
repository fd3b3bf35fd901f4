//! Outbound application events.
//!
//! The pump controller and service emit these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them (serial log, status display).

use crate::control::pump::Regime;
use crate::modbus::{ModbusError, RegisterAddress};

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// A register transaction failed.
    ModbusError(ModbusError),

    /// A labelled reading or output value.  `register` is the register the
    /// value belongs to, or `None` for analog inputs.
    Value {
        label: &'static str,
        register: Option<RegisterAddress>,
        value: u16,
    },

    /// Free-form status line.
    Message(&'static str),

    /// Status line carrying a number.
    MessageValue(&'static str, u32),

    /// The controller moved to a different operating regime.
    RegimeChanged { from: Regime, to: Regime },
}
