//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the `log` facade (the ESP-IDF logger on target, which goes to UART /
//! USB-CDC).  Device-level Modbus faults are logged at `error`, every other
//! protocol error at `warn`.  Per-cycle values go to `debug` to keep the
//! console readable at four cycles a second.

use log::{debug, error, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink {
    errors: u32,
}

impl LogEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Modbus errors seen since boot.
    pub fn error_count(&self) -> u32 {
        self.errors
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::ModbusError(e) => {
                self.errors = self.errors.saturating_add(1);
                if e.is_device_fault() {
                    error!("MODBUS | {} (0x{:02X})", e, e.code());
                } else {
                    warn!("MODBUS | {} (0x{:02X})", e, e.code());
                }
            }
            AppEvent::Value {
                label,
                register: Some(reg),
                value,
            } => {
                debug!("VALUE | {} @{} = {}", label, reg, value);
            }
            AppEvent::Value {
                label,
                register: None,
                value,
            } => {
                debug!("VALUE | {} = {}", label, value);
            }
            AppEvent::Message(text) => {
                info!("MSG   | {}", text);
            }
            AppEvent::MessageValue(text, value) => {
                info!("MSG   | {}{}", text, value);
            }
            AppEvent::RegimeChanged { from, to } => {
                info!("STATE | {:?} -> {:?}", from, to);
            }
        }
    }
}
