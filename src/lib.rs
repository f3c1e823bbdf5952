//! Sunster diesel heater controller library.
//!
//! Exposes the pure-logic modules for integration testing and bench
//! simulation. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod arbiter;
pub mod bridge;
pub mod config;
pub mod control;
pub mod error;
pub mod fuel;
pub mod link;
pub mod persistence;
pub mod protocol;
pub mod safety;

pub mod pins;

// Adapters compile on every target; the hardware paths are cfg-gated
// inside.
pub mod adapters;
