//! Application service — the hexagonal core.
//!
//! [`PumpService`] owns the monotonic clock, the event queue and the pump
//! controller.  It exposes two calls to the main loop: [`begin`] once at
//! boot, then [`poll`] as often as the loop spins.  All I/O flows through
//! port traits injected at call sites, making the entire service testable
//! with mock adapters.
//!
//! ```text
//!  TickSource ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                 │          PumpService          │
//! RegisterPort ◀─▶│ clock · EventQueue · control  │
//!  AnalogPort ──▶ └──────────────────────────────┘
//! ```
//!
//! The periodic control cycle is a [`Task::PumpUpdate`] event that re-arms
//! itself after every run.  If the queue ever rejects the re-arm, `poll`
//! keeps retrying until it is accepted, so the pump is never left without
//! a control cycle.
//!
//! [`begin`]: PumpService::begin
//! [`poll`]: PumpService::poll

use core::time::Duration;

use heapless::Vec;
use log::{error, info};

use crate::clock::{Instant, MonotonicClock, TickSource};
use crate::config::{InitRegister, SystemConfig, MAX_INIT_REGISTERS};
use crate::control::pump::PumpController;
use crate::scheduler::{EventQueue, Task};

use super::events::AppEvent;
use super::ports::{AnalogPort, EventSink, RegisterPort};

// ───────────────────────────────────────────────────────────────
// PumpService
// ───────────────────────────────────────────────────────────────

pub struct PumpService<T> {
    clock: MonotonicClock<T>,
    timers: EventQueue,
    pump: PumpController,
    init_registers: Vec<InitRegister, MAX_INIT_REGISTERS>,
    update_interval: Duration,
    /// A [`Task::PumpUpdate`] is pending.
    update_armed: bool,
}

impl<T: TickSource> PumpService<T> {
    /// Construct the service from configuration.
    ///
    /// Does **not** touch the drive; call [`begin`](Self::begin) next.
    pub fn new(config: SystemConfig, ticks: T) -> Self {
        Self {
            clock: MonotonicClock::new(ticks),
            timers: EventQueue::new(),
            pump: PumpController::new(config.pump),
            init_registers: config.init_registers,
            update_interval: config.update_interval,
            update_armed: false,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Write the init registers, start the pump controller and arm the
    /// first control cycle one interval from now.
    pub fn begin(&mut self, hw: &mut (impl RegisterPort + AnalogPort), sink: &mut impl EventSink) {
        sink.emit(&AppEvent::Message("pump controller startup"));

        for init in &self.init_registers {
            match hw.write_register(init.reg, init.value) {
                Ok(()) => info!("PumpService: init {} = {}", init.reg, init.value),
                Err(e) => sink.emit(&AppEvent::ModbusError(e)),
            }
        }

        self.pump.begin(hw, sink);

        let now = self.clock.now();
        // A second begin restarts the pump but keeps the single update chain.
        if !self.update_armed {
            self.arm_update(now);
        }
        info!(
            "PumpService started, update every {}ms",
            self.update_interval.as_millis()
        );
    }

    // ── Per-iteration orchestration ───────────────────────────

    /// Sample the clock and dispatch every due event.  Returns the number
    /// of events dispatched.
    pub fn poll(&mut self, hw: &mut (impl RegisterPort + AnalogPort), sink: &mut impl EventSink) -> usize {
        let now = self.clock.now();

        let Self {
            timers,
            pump,
            update_interval,
            update_armed,
            ..
        } = self;
        let interval = *update_interval;

        let ran = timers.process_due(now, |timers, task, _due, now| match task {
            Task::PumpUpdate => {
                *update_armed = false;
                pump.update(hw, timers, now, sink);
                // Extra chains collapse into the one still pending.
                if timers.contains(Task::PumpUpdate) {
                    *update_armed = true;
                    return;
                }
                match timers.schedule(Task::PumpUpdate, now + interval) {
                    Ok(()) => *update_armed = true,
                    Err(e) => error!("PumpService: update not re-armed: {}", e),
                }
            }
            Task::FloodReset => pump.clear_flood(),
        });

        if !self.update_armed {
            self.arm_update(now);
        }
        ran
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn pump(&self) -> &PumpController {
        &self.pump
    }

    /// Time of the most recent poll.
    pub fn now(&self) -> Instant {
        self.clock.last()
    }

    pub fn timers(&self) -> &EventQueue {
        &self.timers
    }

    /// Direct queue access, for work scheduled from outside the control loop.
    /// A [`Task::PumpUpdate`] queued here runs one extra cycle; it never
    /// starts a second periodic chain.
    pub fn timers_mut(&mut self) -> &mut EventQueue {
        &mut self.timers
    }

    pub fn is_update_armed(&self) -> bool {
        self.update_armed
    }

    // ── Internal ──────────────────────────────────────────────

    fn arm_update(&mut self, now: Instant) {
        self.update_armed = self
            .timers
            .schedule(Task::PumpUpdate, now + self.update_interval)
            .is_ok();
        if !self.update_armed {
            error!("PumpService: control cycle not scheduled, retrying next poll");
        }
    }
}
