//! Application core: pure domain logic, zero I/O.
//!
//! This module wires the heater protocol, the control modes, the safety
//! interlock and the fuel/persistence bookkeeping into one service.  All
//! interaction with hardware happens through **port traits** defined in
//! [`ports`], keeping this layer fully testable without real peripherals.

pub mod channels;
pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
pub mod view;
