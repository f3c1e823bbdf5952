//! Heater status extraction.

use super::HeaterPhase;
use super::codec::{HeaterFrame, offset};

/// Everything the heater reports in one status frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeaterStatus {
    pub phase: HeaterPhase,
    /// Power level the heater is currently running at (1..=10).
    pub power_level: u8,
    /// Supply voltage in volts.
    pub input_voltage: f32,
    /// Heat exchanger temperature (°C); NaN when the sensor is out of band.
    pub heat_exchanger_temperature: f32,
    /// Heater's own air-intake sensor (°C); NaN when out of band.
    pub intake_temperature: f32,
    pub fan_rpm: u16,
    /// Fuel pump pulse frequency (Hz).
    pub pump_hz: f32,
    pub glow_plug_on: bool,
    /// Seconds spent in the current phase.
    pub state_duration_secs: u16,
}

impl HeaterStatus {
    pub fn from_frame(frame: &HeaterFrame) -> Self {
        Self {
            phase: HeaterPhase::from_byte(frame.byte(offset::PHASE)),
            power_level: frame.byte(offset::POWER_LEVEL),
            input_voltage: f32::from(frame.u16_at(offset::VOLTAGE)) / 10.0,
            heat_exchanger_temperature: frame.temperature_at(offset::HEAT_EXCHANGER_TEMP),
            intake_temperature: frame.temperature_at(offset::INTAKE_TEMP),
            fan_rpm: frame.u16_at(offset::FAN_RPM),
            pump_hz: f32::from(frame.u16_at(offset::PUMP_HZ)) / 10.0,
            glow_plug_on: frame.byte(offset::GLOW_PLUG) != 0,
            state_duration_secs: frame.u16_at(offset::STATE_DURATION),
        }
    }

    pub fn cooling_down(&self) -> bool {
        self.phase == HeaterPhase::Cooling
    }

    pub fn glow_plug_text(&self) -> &'static str {
        if self.glow_plug_on { "On" } else { "Off" }
    }

    /// Intake temperature if the sensor produced a usable reading.
    pub fn intake_temperature_valid(&self) -> Option<f32> {
        Some(self.intake_temperature).filter(|t| t.is_finite())
    }
}

impl Default for HeaterStatus {
    fn default() -> Self {
        Self {
            phase: HeaterPhase::Off,
            power_level: 1,
            input_voltage: 0.0,
            heat_exchanger_temperature: f32::NAN,
            intake_temperature: f32::NAN,
            fan_rpm: 0,
            pump_hz: 0.0,
            glow_plug_on: false,
            state_duration_secs: 0,
        }
    }
}
