//! Pump controller — pressure hysteresis with stepped drive frequency.
//!
//! Each cycle turns one pressure reading (and optionally one flood
//! reading) into two register values on the drive: run/stop and output
//! frequency.
//!
//! ```text
//!  pressure ─▶ ≤ start ──────────────▶ run
//!              ≥ stop  ──────────────▶ stop
//!              between ──────────────▶ (unchanged, hysteresis)
//!
//!  while running:   < fill ─▶ start.frequency   (boost)
//!                   < stop ─▶ fill.frequency    (fill)
//!                   else   ─▶ stop.frequency
//! ```
//!
//! Two overrides force a full stop regardless of pressure:
//!
//! - **Degraded**: three consecutive failed pressure reads.
//! - **Flooded**: a flood reading at or below the trigger.  Held until the
//!   [`Task::FloodReset`] event scheduled at detection time fires and the
//!   service calls [`PumpController::clear_flood`].
//!
//! Nothing here is fatal.  Every register or sensor failure is reported to
//! the [`EventSink`] and the cycle always finishes with a defined desired
//! state.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{AnalogPort, EventSink, RegisterPort};
use crate::clock::Instant;
use crate::config::{ControllerConfig, InputSource};
use crate::modbus::{ModbusError, RegisterAddress};
use crate::scheduler::{EventQueue, Task};

/// Consecutive failed pressure reads that force a stop.
pub const PRESSURE_FAILURE_LIMIT: u8 = 3;

// ═══════════════════════════════════════════════════════════════
//  State
// ═══════════════════════════════════════════════════════════════

/// Operating regime, for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regime {
    Stopped,
    /// Running at the start frequency (pressure below fill).
    RunningBoost,
    /// Running at the fill frequency (pressure between fill and stop).
    RunningFill,
    /// Held stopped by the flood override.
    Flooded,
    /// Held stopped after repeated pressure read failures.
    Degraded,
}

/// One controlled register: the last value read back and the value wanted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateItem {
    pub reg: RegisterAddress,
    pub current: u16,
    pub desired: u16,
}

impl StateItem {
    pub const fn new(reg: RegisterAddress) -> Self {
        Self {
            reg,
            current: 0,
            desired: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpState {
    pub run: StateItem,
    pub frequency: StateItem,
}

/// Write `item.desired` unless the drive already reports it.  `force`
/// writes unconditionally.
pub fn push_state(hw: &mut impl RegisterPort, item: &StateItem, force: bool) -> Result<(), ModbusError> {
    if force || item.current != item.desired {
        hw.write_register(item.reg, item.desired)
    } else {
        Ok(())
    }
}

/// Refresh `item.current` from the drive.  On failure it keeps its old value.
pub fn pull_state(hw: &mut impl RegisterPort, item: &mut StateItem) -> Result<(), ModbusError> {
    item.current = hw.read_holding_register(item.reg)?;
    Ok(())
}

fn read_input(
    hw: &mut (impl RegisterPort + AnalogPort),
    source: InputSource,
    sink: &mut impl EventSink,
) -> Option<u16> {
    match source {
        InputSource::Register(reg) => match hw.read_holding_register(reg) {
            Ok(value) => Some(value),
            Err(e) => {
                sink.emit(&AppEvent::ModbusError(e));
                None
            }
        },
        InputSource::Analog(channel) => hw.read_analog(channel),
    }
}

fn report<T>(result: Result<T, ModbusError>, sink: &mut impl EventSink) {
    if let Err(e) = result {
        sink.emit(&AppEvent::ModbusError(e));
    }
}

// ═══════════════════════════════════════════════════════════════
//  Controller
// ═══════════════════════════════════════════════════════════════

pub struct PumpController {
    config: ControllerConfig,
    state: PumpState,
    failed_pressure: u8,
    degraded: bool,
    flooded: bool,
    /// A [`Task::FloodReset`] is queued for the current flood.
    flood_reset_armed: bool,
    /// Frequency band chosen by the last successful pressure reading.
    band: Regime,
    regime: Regime,
}

impl PumpController {
    /// Adopt `config`.  Nothing touches the drive until [`begin`](Self::begin).
    pub fn new(config: ControllerConfig) -> Self {
        let state = PumpState {
            run: StateItem::new(config.run_register),
            frequency: StateItem::new(config.frequency_register),
        };
        Self {
            config,
            state,
            failed_pressure: 0,
            degraded: false,
            flooded: false,
            flood_reset_armed: false,
            band: Regime::Stopped,
            regime: Regime::Stopped,
        }
    }

    /// Bring the drive to a known stopped state.
    ///
    /// Both registers are written unconditionally, then the starting
    /// pressure and flood readings are logged.
    pub fn begin(&mut self, hw: &mut (impl RegisterPort + AnalogPort), sink: &mut impl EventSink) {
        self.state = PumpState {
            run: StateItem::new(self.config.run_register),
            frequency: StateItem::new(self.config.frequency_register),
        };
        self.failed_pressure = 0;
        self.degraded = false;
        self.flooded = false;
        self.flood_reset_armed = false;
        self.band = Regime::Stopped;
        self.full_stop();

        report(push_state(hw, &self.state.run, true), sink);
        report(push_state(hw, &self.state.frequency, true), sink);

        if let Some(pressure) = read_input(hw, self.config.pressure_input, sink) {
            sink.emit(&AppEvent::MessageValue("pressure: ", u32::from(pressure)));
        }
        if let Some(source) = self.config.flood_input {
            if let Some(flood) = read_input(hw, source, sink) {
                sink.emit(&AppEvent::MessageValue("flood: ", u32::from(flood)));
            }
        }

        self.regime = self.classify();
        info!("PumpController: started, {:?}", self.regime);
    }

    /// Run one control cycle.
    ///
    /// `timers` receives the flood-reset event; `now` is the time the cycle
    /// runs at.
    pub fn update<const N: usize>(
        &mut self,
        hw: &mut (impl RegisterPort + AnalogPort),
        timers: &mut EventQueue<N>,
        now: Instant,
        sink: &mut impl EventSink,
    ) {
        report(pull_state(hw, &mut self.state.run), sink);
        report(pull_state(hw, &mut self.state.frequency), sink);

        let pressure = read_input(hw, self.config.pressure_input, sink);
        self.handle_pressure(pressure, sink);
        self.handle_flood(hw, timers, now, sink);

        report(push_state(hw, &self.state.run, false), sink);
        report(push_state(hw, &self.state.frequency, false), sink);

        sink.emit(&AppEvent::Value {
            label: "run",
            register: Some(self.state.run.reg),
            value: self.state.run.desired,
        });
        sink.emit(&AppEvent::Value {
            label: "frequency",
            register: Some(self.state.frequency.reg),
            value: self.state.frequency.desired,
        });

        let regime = self.classify();
        if regime != self.regime {
            sink.emit(&AppEvent::RegimeChanged {
                from: self.regime,
                to: regime,
            });
            self.regime = regime;
        }
    }

    /// Lift the flood override.  Called when the flood-reset event fires.
    pub fn clear_flood(&mut self) {
        if self.flooded {
            info!("PumpController: flood override cleared");
        }
        self.flooded = false;
        self.flood_reset_armed = false;
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> &PumpState {
        &self.state
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Regime as of the end of the last cycle.
    pub fn regime(&self) -> Regime {
        self.regime
    }

    pub fn is_running(&self) -> bool {
        self.state.run.desired == self.config.run_args.run
    }

    pub fn is_flooded(&self) -> bool {
        self.flooded
    }

    /// Consecutive failed pressure reads since the last success or forced stop.
    pub fn failed_pressure_reads(&self) -> u8 {
        self.failed_pressure
    }

    // ── Internal ──────────────────────────────────────────────

    fn full_stop(&mut self) {
        self.state.frequency.desired = 0;
        self.state.run.desired = self.config.run_args.stop;
    }

    fn handle_pressure(&mut self, pressure: Option<u16>, sink: &mut impl EventSink) {
        let Some(pressure) = pressure else {
            self.failed_pressure += 1;
            if self.failed_pressure >= PRESSURE_FAILURE_LIMIT {
                warn!(
                    "PumpController: {} pressure reads failed, stopping",
                    PRESSURE_FAILURE_LIMIT
                );
                self.failed_pressure = 0;
                self.degraded = true;
                self.full_stop();
            }
            return;
        };

        self.failed_pressure = 0;
        self.degraded = false;
        self.update_run(pressure);
        self.update_frequency(pressure);
        sink.emit(&AppEvent::Value {
            label: "pressure",
            register: self.config.pressure_input.register(),
            value: pressure,
        });
    }

    fn update_run(&mut self, pressure: u16) {
        let levels = &self.config.levels;
        if pressure <= levels.start.pressure {
            self.state.run.desired = self.config.run_args.run;
        }
        if pressure >= levels.stop.pressure {
            self.state.run.desired = self.config.run_args.stop;
        }
    }

    fn update_frequency(&mut self, pressure: u16) {
        let levels = self.config.levels;
        let (band, frequency) = if !self.is_running() {
            (Regime::Stopped, 0)
        } else if pressure < levels.fill.pressure {
            (Regime::RunningBoost, levels.start.frequency)
        } else if pressure < levels.stop.pressure {
            (Regime::RunningFill, levels.fill.frequency)
        } else {
            (Regime::RunningFill, levels.stop.frequency)
        };
        self.band = band;
        self.state.frequency.desired = frequency;
    }

    fn handle_flood<const N: usize>(
        &mut self,
        hw: &mut (impl RegisterPort + AnalogPort),
        timers: &mut EventQueue<N>,
        now: Instant,
        sink: &mut impl EventSink,
    ) {
        let Some(source) = self.config.flood_input else {
            return;
        };

        if let Some(flood) = read_input(hw, source, sink) {
            if flood <= self.config.flood_trigger && !self.flooded {
                warn!("PumpController: flood detected ({}), stopping", flood);
                sink.emit(&AppEvent::Message("flood detected"));
                self.flooded = true;
                self.flood_reset_armed = false;
            }
            sink.emit(&AppEvent::Value {
                label: "flood",
                register: source.register(),
                value: flood,
            });
        }

        if self.flooded {
            if !self.flood_reset_armed {
                // Retried every cycle until the queue has room.
                let due = now + self.config.flood_timeout;
                self.flood_reset_armed = timers.schedule(Task::FloodReset, due).is_ok();
            }
            self.full_stop();
        }
    }

    fn classify(&self) -> Regime {
        if self.flooded {
            Regime::Flooded
        } else if self.degraded {
            Regime::Degraded
        } else if !self.is_running() {
            Regime::Stopped
        } else {
            self.band
        }
    }
}
