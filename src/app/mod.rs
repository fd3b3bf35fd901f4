//! Application core — pure domain logic, zero I/O.
//!
//! This module contains the orchestration for the pump controller: the
//! port traits it talks through, the events it emits, and the service
//! that ties the clock, the event queue and the control law together.
//! All interaction with hardware happens through **port traits** defined
//! in [`ports`], keeping this layer fully testable without real peripherals.

pub mod events;
pub mod ports;
pub mod service;
