//! Shared mutable context threaded through every mode handler.
//!
//! `ArbiterContext` is the blackboard the mode handlers read from and
//! write to: latest heater status, operator inputs, the two regulators,
//! and the resulting [`Demand`].

use crate::config::{AntifreezeThresholds, HeaterConfig, TuningConfig};
use crate::control::antifreeze::AntifreezeGovernor;
use crate::control::pi::PiRegulator;
use crate::protocol::telemetry::HeaterStatus;
use crate::protocol::{HeaterPhase, clamp_power_level};

/// Accepted range for the operator-provided room temperature.
const EXTERNAL_TEMPERATURE_RANGE: core::ops::RangeInclusive<f32> = -50.0..=100.0;

/// What the active mode wants: run or not, and at which level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Demand {
    pub on: bool,
    /// 1..=10.
    pub power_level: u8,
}

pub struct ArbiterContext {
    // --- Timing ---
    pub now_ms: u64,

    // --- Configuration ---
    pub tuning: TuningConfig,
    pub antifreeze_thresholds: AntifreezeThresholds,

    // --- Inputs ---
    /// Latest heater status; `None` while the link is down.
    pub status: Option<HeaterStatus>,
    /// Room temperature from the operator's sensor.
    pub external_temperature: Option<f32>,
    /// Operator start/stop (MANUAL).
    pub operator_on: bool,
    /// Operator power switch; gates AUTOMATIC.
    pub master_enabled: bool,
    /// Operator power level for MANUAL (1..=10).
    pub manual_power_level: u8,

    // --- Regulators ---
    pub pi: PiRegulator,
    pub antifreeze: AntifreezeGovernor,
    pub(crate) room_temperature_warned: bool,

    // --- Output ---
    pub demand: Demand,
}

impl ArbiterContext {
    pub fn new(config: &HeaterConfig) -> Self {
        let level = config.default_power_level();
        Self {
            now_ms: 0,
            tuning: config.tuning,
            antifreeze_thresholds: config.antifreeze,
            status: None,
            external_temperature: None,
            operator_on: false,
            master_enabled: true,
            manual_power_level: level,
            pi: PiRegulator::new(),
            antifreeze: AntifreezeGovernor::new(),
            room_temperature_warned: false,
            demand: Demand {
                on: false,
                power_level: level,
            },
        }
    }

    /// Reported phase, `Unknown` without telemetry.
    pub fn phase(&self) -> HeaterPhase {
        self.status.map_or(HeaterPhase::Unknown, |s| s.phase)
    }

    /// Store a room temperature reading; implausible values count as missing.
    pub fn set_external_temperature(&mut self, reading: Option<f32>) {
        self.external_temperature =
            reading.filter(|t| t.is_finite() && EXTERNAL_TEMPERATURE_RANGE.contains(t));
    }

    /// Room temperature for the antifreeze ladder: the operator's sensor,
    /// else the heater's intake sensor.
    pub fn ambient_temperature(&self) -> Option<f32> {
        self.external_temperature
            .or_else(|| self.status.and_then(|s| s.intake_temperature_valid()))
    }

    pub fn set_manual_power_level(&mut self, level: u8) {
        self.manual_power_level = clamp_power_level(level);
    }
}
