//! Home-automation entities and how each one reads the controller state.

use serde::Serialize;

use super::climate::ClimateState;
use crate::app::view::HeaterView;
use crate::arbiter::ControlMode;
use crate::config::TuningParam;
use crate::protocol::telemetry::HeaterStatus;

/// A published entity state.  Serialises to the bare JSON value
/// (`null` for unavailable).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EntityValue {
    Unavailable,
    Number(f32),
    Bool(bool),
    Text(&'static str),
    Climate(ClimateState),
}

impl EntityValue {
    /// Non-finite readings publish as unavailable.
    pub fn number(v: f32) -> Self {
        if v.is_finite() {
            Self::Number(v)
        } else {
            Self::Unavailable
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self, Self::Unavailable)
    }
}

// ---------------------------------------------------------------------------
// Numbers (read/write)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberEntity {
    TargetTemperature,
    PowerLevel,
    Kp,
    Ki,
    Kd,
    OffDelay,
    OutputMinOff,
    OutputMinOn,
    InjectedPerPulse,
}

impl NumberEntity {
    pub const ALL: [Self; 9] = [
        Self::TargetTemperature,
        Self::PowerLevel,
        Self::Kp,
        Self::Ki,
        Self::Kd,
        Self::OffDelay,
        Self::OutputMinOff,
        Self::OutputMinOn,
        Self::InjectedPerPulse,
    ];

    /// The tuning field behind this number; `None` for the power level.
    pub const fn tuning_param(self) -> Option<TuningParam> {
        match self {
            Self::TargetTemperature => Some(TuningParam::TargetTemperature),
            Self::PowerLevel => None,
            Self::Kp => Some(TuningParam::Kp),
            Self::Ki => Some(TuningParam::Ki),
            Self::Kd => Some(TuningParam::Kd),
            Self::OffDelay => Some(TuningParam::OffDelay),
            Self::OutputMinOff => Some(TuningParam::OutputMinOff),
            Self::OutputMinOn => Some(TuningParam::OutputMinOn),
            Self::InjectedPerPulse => Some(TuningParam::InjectedPerPulse),
        }
    }

    pub const fn key(self) -> &'static str {
        match self.tuning_param() {
            Some(p) => p.name(),
            None => "power_level",
        }
    }

    pub fn value(self, view: &HeaterView) -> f32 {
        match self.tuning_param() {
            Some(p) => p.get(&view.tuning),
            None => view.manual_power_percent(),
        }
    }
}

// ---------------------------------------------------------------------------
// Sensors (read-only)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorEntity {
    ExternalTemperature,
    InputVoltage,
    State,
    PowerLevel,
    FanSpeed,
    PumpFrequency,
    GlowPlug,
    HeatExchangerTemperature,
    StateDuration,
    CoolingDown,
    HourlyConsumption,
    DailyConsumption,
    TotalConsumption,
    LowVoltageError,
    PiOutput,
}

impl SensorEntity {
    pub const ALL: [Self; 15] = [
        Self::ExternalTemperature,
        Self::InputVoltage,
        Self::State,
        Self::PowerLevel,
        Self::FanSpeed,
        Self::PumpFrequency,
        Self::GlowPlug,
        Self::HeatExchangerTemperature,
        Self::StateDuration,
        Self::CoolingDown,
        Self::HourlyConsumption,
        Self::DailyConsumption,
        Self::TotalConsumption,
        Self::LowVoltageError,
        Self::PiOutput,
    ];

    pub const fn key(self) -> &'static str {
        match self {
            Self::ExternalTemperature => "external_temperature",
            Self::InputVoltage => "input_voltage",
            Self::State => "state",
            Self::PowerLevel => "heater_power_level",
            Self::FanSpeed => "fan_speed",
            Self::PumpFrequency => "pump_frequency",
            Self::GlowPlug => "glow_plug",
            Self::HeatExchangerTemperature => "heat_exchanger_temperature",
            Self::StateDuration => "state_duration",
            Self::CoolingDown => "cooling_down",
            Self::HourlyConsumption => "hourly_consumption",
            Self::DailyConsumption => "daily_consumption",
            Self::TotalConsumption => "total_consumption",
            Self::LowVoltageError => "low_voltage_error",
            Self::PiOutput => "pi_output",
        }
    }

    /// Read from heater telemetry; unavailable while the link is down.
    pub const fn link_derived(self) -> bool {
        !matches!(
            self,
            Self::ExternalTemperature
                | Self::DailyConsumption
                | Self::TotalConsumption
                | Self::LowVoltageError
                | Self::PiOutput
        )
    }

    pub fn value(self, view: &HeaterView) -> EntityValue {
        if self.link_derived() {
            return match view.status.filter(|_| view.connected) {
                Some(status) => self.telemetry_value(&status, view),
                None => EntityValue::Unavailable,
            };
        }
        match self {
            Self::ExternalTemperature => view
                .external_temperature
                .map_or(EntityValue::Unavailable, EntityValue::number),
            Self::DailyConsumption => EntityValue::number(view.daily_ml),
            Self::TotalConsumption => EntityValue::number(view.total_ml),
            Self::LowVoltageError => EntityValue::Bool(view.low_voltage_error),
            _ => EntityValue::number(view.pi_output),
        }
    }

    fn telemetry_value(self, s: &HeaterStatus, view: &HeaterView) -> EntityValue {
        match self {
            Self::InputVoltage => EntityValue::number(s.input_voltage),
            Self::State => EntityValue::Text(s.phase.as_str()),
            Self::PowerLevel => EntityValue::Number(f32::from(s.power_level)),
            Self::FanSpeed => EntityValue::Number(f32::from(s.fan_rpm)),
            Self::PumpFrequency => EntityValue::number(s.pump_hz),
            Self::GlowPlug => EntityValue::Text(s.glow_plug_text()),
            Self::HeatExchangerTemperature => EntityValue::number(s.heat_exchanger_temperature),
            Self::StateDuration => EntityValue::Number(f32::from(s.state_duration_secs)),
            Self::CoolingDown => EntityValue::Bool(s.cooling_down()),
            _ => EntityValue::number(view.hourly_ml_per_h),
        }
    }
}

// ---------------------------------------------------------------------------
// Registry keys
// ---------------------------------------------------------------------------

pub const CONTROL_MODE_KEY: &str = "control_mode";
pub const POWER_SWITCH_KEY: &str = "power";
pub const CLIMATE_KEY: &str = "climate";
pub const RESET_TOTAL_KEY: &str = "reset_total";
pub const RESET_DAILY_KEY: &str = "reset_daily";

/// Every published entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKey {
    Number(NumberEntity),
    Sensor(SensorEntity),
    /// Select "Control Mode".
    ControlMode,
    /// Switch "Power".
    PowerSwitch,
    Climate,
}

impl EntityKey {
    pub const fn key(self) -> &'static str {
        match self {
            Self::Number(n) => n.key(),
            Self::Sensor(s) => s.key(),
            Self::ControlMode => CONTROL_MODE_KEY,
            Self::PowerSwitch => POWER_SWITCH_KEY,
            Self::Climate => CLIMATE_KEY,
        }
    }

    pub fn value(self, view: &HeaterView) -> EntityValue {
        match self {
            Self::Number(n) => EntityValue::number(n.value(view)),
            Self::Sensor(s) => s.value(view),
            Self::ControlMode => EntityValue::Text(view.mode.as_str()),
            Self::PowerSwitch => EntityValue::Bool(power_switch_state(view)),
            Self::Climate => EntityValue::Climate(ClimateState::from_view(view)),
        }
    }
}

/// What the power switch shows: the operator on/off in MANUAL, the
/// master switch otherwise.
pub fn power_switch_state(view: &HeaterView) -> bool {
    match view.mode {
        ControlMode::Manual => view.operator_on,
        ControlMode::Automatic | ControlMode::Antifreeze => view.master_enabled,
    }
}
