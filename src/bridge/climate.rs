//! Climate card mapping.
//!
//! ```text
//!   mode        master/on   →  climate mode   preset
//!   ─────────── ──────────     ────────────   ──────────
//!   Automatic   master         HEAT           Automatic
//!   Automatic   !master        OFF            Automatic
//!   Manual      on             HEAT           Manual
//!   Manual      off            OFF            Manual
//!   Antifreeze  (ignored)      HEAT           Antifreeze
//! ```
//!
//! The action is FAN while the heater cools down, OFF when the card is
//! off, HEATING while the heater burns and IDLE otherwise.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use super::BridgeError;
use crate::app::view::HeaterView;
use crate::arbiter::ControlMode;
use crate::protocol::HeaterPhase;

/// Target temperature step on the card.
pub const TEMPERATURE_STEP: f32 = 0.5;

/// Fan modes double as the MANUAL power level.
pub const FAN_MODES: [&str; 10] = [
    "10%", "20%", "30%", "40%", "50%", "60%", "70%", "80%", "90%", "100%",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClimateMode {
    Off,
    Heat,
    /// Reserved: behaves as OFF.
    FanOnly,
}

impl FromStr for ClimateMode {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "heat" => Ok(Self::Heat),
            "fan_only" => Ok(Self::FanOnly),
            "cool" | "auto" | "heat_cool" | "dry" => Err(BridgeError::UnsupportedMode),
            _ => Err(BridgeError::UnknownOption),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClimateAction {
    Off,
    Idle,
    Heating,
    Fan,
}

/// Everything the climate card shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClimateState {
    pub mode: ClimateMode,
    pub action: ClimateAction,
    pub current_temperature: Option<f32>,
    pub target_temperature: f32,
    pub min_temperature: f32,
    pub max_temperature: f32,
    pub temperature_step: f32,
    pub preset: &'static str,
    pub fan_mode: &'static str,
}

impl ClimateState {
    pub fn from_view(v: &HeaterView) -> Self {
        let mode = match v.mode {
            ControlMode::Automatic if v.master_enabled => ClimateMode::Heat,
            ControlMode::Manual if v.operator_on => ClimateMode::Heat,
            ControlMode::Antifreeze => ClimateMode::Heat,
            ControlMode::Automatic | ControlMode::Manual => ClimateMode::Off,
        };

        let action = if v.phase() == HeaterPhase::Cooling {
            ClimateAction::Fan
        } else if mode == ClimateMode::Off {
            ClimateAction::Off
        } else if v.is_heating() {
            ClimateAction::Heating
        } else {
            ClimateAction::Idle
        };

        Self {
            mode,
            action,
            current_temperature: v.external_temperature,
            target_temperature: v.tuning.target_temperature,
            min_temperature: v.min_temperature,
            max_temperature: v.max_temperature,
            temperature_step: TEMPERATURE_STEP,
            preset: v.mode.as_str(),
            fan_mode: fan_mode_for_level(v.manual_power_level),
        }
    }
}

/// Fan mode label for a power level (1..=10).
pub fn fan_mode_for_level(level: u8) -> &'static str {
    let idx = usize::from(level.clamp(1, 10)) - 1;
    FAN_MODES.get(idx).copied().unwrap_or("100%")
}

/// Parse a fan mode label ("70%") into a power percent.
pub fn fan_mode_percent(label: &str) -> Option<u8> {
    FAN_MODES
        .iter()
        .position(|m| *m == label.trim())
        .map(|i| (i as u8 + 1) * 10)
}

/// One climate control call; absent fields are left unchanged.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct ClimateCall<'a> {
    #[serde(borrow)]
    pub mode: Option<&'a str>,
    #[serde(borrow)]
    pub preset: Option<&'a str>,
    pub target_temperature: Option<f32>,
    #[serde(borrow)]
    pub fan_mode: Option<&'a str>,
}
