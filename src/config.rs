//! Controller configuration.
//!
//! [`HeaterConfig`] carries the instantiation options (fixed for the life
//! of the firmware image).  [`TuningConfig`] carries the operator-tunable
//! parameters that persist across reboots.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::arbiter::ControlMode;
use crate::error::RejectReason;

/// Bumped whenever the persisted [`TuningConfig`] layout changes.
pub const TUNING_VERSION: u32 = 3;

// ---------------------------------------------------------------------------
// Tuning (persisted)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TuningConfig {
    /// Record layout version; must be the first field.
    pub version: u32,
    pub pi_kp: f32,
    pub pi_ki: f32,
    pub pi_kd: f32,
    /// Room temperature setpoint (°C).
    pub target_temperature: f32,
    /// PI output (%) below which the off-dwell timer runs.
    pub pi_output_min_off: f32,
    /// PI output (%) required to start the heater.
    pub pi_output_min_on: f32,
    /// Fuel delivered per pump stroke (ml).
    pub injected_per_pulse: f32,
    /// Seconds the PI output must stay below `pi_output_min_off` before shutdown.
    pub pi_off_delay: f32,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            version: TUNING_VERSION,
            pi_kp: 10.0,
            pi_ki: 0.5,
            pi_kd: 0.0,
            target_temperature: 20.0,
            pi_output_min_off: 3.0,
            pi_output_min_on: 15.0,
            injected_per_pulse: 0.022,
            pi_off_delay: 60.0,
        }
    }
}

/// Individually writable tuning fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuningParam {
    TargetTemperature,
    Kp,
    Ki,
    Kd,
    OffDelay,
    OutputMinOff,
    OutputMinOn,
    InjectedPerPulse,
}

impl TuningParam {
    pub const ALL: [Self; 8] = [
        Self::TargetTemperature,
        Self::Kp,
        Self::Ki,
        Self::Kd,
        Self::OffDelay,
        Self::OutputMinOff,
        Self::OutputMinOn,
        Self::InjectedPerPulse,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::TargetTemperature => "target_temperature",
            Self::Kp => "pi_kp",
            Self::Ki => "pi_ki",
            Self::Kd => "pi_kd",
            Self::OffDelay => "pi_off_delay",
            Self::OutputMinOff => "pi_output_min_off",
            Self::OutputMinOn => "pi_output_min_on",
            Self::InjectedPerPulse => "injected_per_pulse",
        }
    }

    /// Accepted `(min, max)`.
    pub const fn range(self) -> (f32, f32) {
        match self {
            Self::TargetTemperature => (5.0, 35.0),
            Self::Kp => (0.1, 50.0),
            Self::Ki => (0.0, 5.0),
            Self::Kd => (0.0, 50.0),
            Self::OffDelay => (0.0, 3600.0),
            Self::OutputMinOff | Self::OutputMinOn => (0.0, 100.0),
            Self::InjectedPerPulse => (0.001, 1.0),
        }
    }

    pub fn get(self, t: &TuningConfig) -> f32 {
        match self {
            Self::TargetTemperature => t.target_temperature,
            Self::Kp => t.pi_kp,
            Self::Ki => t.pi_ki,
            Self::Kd => t.pi_kd,
            Self::OffDelay => t.pi_off_delay,
            Self::OutputMinOff => t.pi_output_min_off,
            Self::OutputMinOn => t.pi_output_min_on,
            Self::InjectedPerPulse => t.injected_per_pulse,
        }
    }

    fn slot(self, t: &mut TuningConfig) -> &mut f32 {
        match self {
            Self::TargetTemperature => &mut t.target_temperature,
            Self::Kp => &mut t.pi_kp,
            Self::Ki => &mut t.pi_ki,
            Self::Kd => &mut t.pi_kd,
            Self::OffDelay => &mut t.pi_off_delay,
            Self::OutputMinOff => &mut t.pi_output_min_off,
            Self::OutputMinOn => &mut t.pi_output_min_on,
            Self::InjectedPerPulse => &mut t.injected_per_pulse,
        }
    }
}

impl TuningConfig {
    /// Apply one operator write.  Returns `Ok(true)` if the value changed.
    /// Rejected writes leave the config untouched.
    pub fn apply(&mut self, param: TuningParam, value: f32) -> Result<bool, RejectReason> {
        if !value.is_finite() {
            return Err(RejectReason::NotFinite);
        }
        let (min, max) = param.range();
        if !(min..=max).contains(&value) {
            return Err(RejectReason::OutOfRange(param.name()));
        }

        let mut candidate = *self;
        *param.slot(&mut candidate) = value;
        if candidate.pi_output_min_off > candidate.pi_output_min_on {
            return Err(RejectReason::ThresholdOrder);
        }

        let changed = candidate != *self;
        *self = candidate;
        Ok(changed)
    }

    /// Full-record validation applied before persisting.
    pub fn validate(&self) -> Result<(), RejectReason> {
        for param in TuningParam::ALL {
            let v = param.get(self);
            if !v.is_finite() {
                return Err(RejectReason::NotFinite);
            }
            let (min, max) = param.range();
            if !(min..=max).contains(&v) {
                return Err(RejectReason::OutOfRange(param.name()));
            }
        }
        if self.pi_output_min_off > self.pi_output_min_on {
            return Err(RejectReason::ThresholdOrder);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Antifreeze thresholds
// ---------------------------------------------------------------------------

/// Ambient temperature thresholds (°C) for the antifreeze ladder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AntifreezeThresholds {
    /// At or below: 100 %.
    pub on: f32,
    /// At or below: 70 %.
    pub medium: f32,
    /// At or below: 30 %.
    pub low: f32,
    /// At or above (plus hysteresis): off.
    pub off: f32,
    pub hysteresis: f32,
}

impl Default for AntifreezeThresholds {
    fn default() -> Self {
        Self {
            on: 2.0,
            medium: 6.0,
            low: 8.0,
            off: 9.0,
            hysteresis: 0.4,
        }
    }
}

// ---------------------------------------------------------------------------
// Instantiation options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeaterConfig {
    // --- Climate surface ---
    /// Lowest settable target temperature (°C).
    pub min_temperature: f32,
    /// Highest settable target temperature (°C).
    pub max_temperature: f32,

    // --- Link ---
    /// Poll cadence while the heater is idle (milliseconds).
    pub polling_interval_ms: u32,
    /// Observe bus traffic only; never transmit.
    pub passive_sniff: bool,

    // --- Control ---
    pub antifreeze: AntifreezeThresholds,
    /// Manual power at boot (10..=100 %).
    pub default_power_percent: u8,
    /// Control mode entered at boot.
    pub initial_mode: ControlMode,
    /// Tuning used when nothing valid is persisted.
    pub tuning: TuningConfig,

    // --- Safety ---
    /// Ignition is refused below this supply voltage.
    pub min_voltage_start: f32,
    /// Running heater is shut down below this supply voltage.
    pub min_voltage_operate: f32,
}

impl Default for HeaterConfig {
    fn default() -> Self {
        Self {
            min_temperature: 5.0,
            max_temperature: 35.0,

            polling_interval_ms: 300_000, // 5 min
            passive_sniff: false,

            antifreeze: AntifreezeThresholds::default(),
            default_power_percent: 80,
            initial_mode: ControlMode::Manual,
            tuning: TuningConfig::default(),

            min_voltage_start: 12.3,
            min_voltage_operate: 11.4,
        }
    }
}

impl HeaterConfig {
    /// Manual power level corresponding to `default_power_percent`.
    pub fn default_power_level(&self) -> u8 {
        crate::protocol::clamp_power_level(
            (f32::from(self.default_power_percent) / 10.0).round() as u8,
        )
    }

    /// Clamp a setpoint into the visible temperature window.
    pub fn clamp_target(&self, target: f32) -> f32 {
        if target < self.min_temperature {
            self.min_temperature
        } else if target > self.max_temperature {
            self.max_temperature
        } else {
            target
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let (lo, hi) = TuningParam::TargetTemperature.range();
        if !(lo..=hi).contains(&self.min_temperature) || !(lo..=hi).contains(&self.max_temperature) {
            return Err(ConfigError::Invalid("min/max_temperature must be 5..=35"));
        }
        if self.min_temperature >= self.max_temperature {
            return Err(ConfigError::Invalid("min_temperature must be below max_temperature"));
        }
        if !(self.min_temperature..=self.max_temperature).contains(&self.tuning.target_temperature) {
            return Err(ConfigError::Invalid("seed target outside min/max_temperature"));
        }
        if !(10..=100).contains(&self.default_power_percent) {
            return Err(ConfigError::Invalid("default_power_percent must be 10..=100"));
        }
        if !(10.0..=15.0).contains(&self.min_voltage_start) {
            return Err(ConfigError::Invalid("min_voltage_start must be 10..=15 V"));
        }
        if !(9.0..=14.0).contains(&self.min_voltage_operate) {
            return Err(ConfigError::Invalid("min_voltage_operate must be 9..=14 V"));
        }
        if self.min_voltage_operate >= self.min_voltage_start {
            return Err(ConfigError::Invalid("operate voltage must be below start voltage"));
        }
        let a = &self.antifreeze;
        if !(a.on < a.medium && a.medium < a.low && a.low < a.off) {
            return Err(ConfigError::Invalid(
                "antifreeze thresholds must be strictly increasing",
            ));
        }
        if a.hysteresis < 0.0 {
            return Err(ConfigError::Invalid("antifreeze hysteresis must be non-negative"));
        }
        if self.polling_interval_ms < 1_000 {
            return Err(ConfigError::Invalid("polling_interval_ms must be at least 1000"));
        }
        self.tuning
            .validate()
            .map_err(|_| ConfigError::Invalid("seed tuning out of range"))
    }
}

/// Errors from [`HeaterConfig::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A field failed range or ordering validation.
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}
