//! Home-automation surface.
//!
//! The write side ([`HeaterBridge`]) turns entity writes into
//! [`OperatorCommand`]s and queues them on the command channel; the read
//! side ([`publisher::Publisher`]) publishes a [`HeaterView`] through the
//! [`EntitySink`] port.
//!
//! ```text
//!   frontend ──write──▶ HeaterBridge ──OperatorCommand──▶ channel ──▶ HeaterService
//!   frontend ◀──state── Publisher ◀──HeaterView── HeaterService
//! ```
//!
//! [`HeaterView`]: crate::app::view::HeaterView
//! [`EntitySink`]: crate::app::ports::EntitySink

pub mod climate;
pub mod entities;
pub mod publisher;

use core::fmt;

use log::warn;

use crate::app::channels::CommandSender;
use crate::app::commands::OperatorCommand;
use crate::arbiter::ControlMode;
use crate::config::TuningParam;
use climate::{ClimateCall, ClimateMode, fan_mode_percent};
use entities::{
    CLIMATE_KEY, CONTROL_MODE_KEY, NumberEntity, POWER_SWITCH_KEY, RESET_DAILY_KEY,
    RESET_TOTAL_KEY, SensorEntity,
};

/// Errors from entity writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeError {
    /// The command channel is full; the write was dropped.
    QueueFull,
    /// Option text not offered by the entity.
    UnknownOption,
    /// Climate mode the heater cannot do (cool, auto, heat_cool, dry).
    UnsupportedMode,
    /// No writable entity has this key.
    UnknownEntity,
    /// Payload does not parse for the entity.
    BadValue,
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueFull => write!(f, "command queue full"),
            Self::UnknownOption => write!(f, "unknown option"),
            Self::UnsupportedMode => write!(f, "climate mode not supported"),
            Self::UnknownEntity => write!(f, "unknown entity"),
            Self::BadValue => write!(f, "malformed value"),
        }
    }
}

/// Write side of the home-automation surface.
pub struct HeaterBridge<'a> {
    sender: CommandSender<'a>,
}

impl<'a> HeaterBridge<'a> {
    pub fn new(sender: CommandSender<'a>) -> Self {
        Self { sender }
    }

    /// Number entity write.
    pub fn write_number(&self, entity: NumberEntity, value: f32) -> Result<(), BridgeError> {
        let cmd = match entity.tuning_param() {
            Some(param) => OperatorCommand::SetTuning(param, value),
            None => OperatorCommand::SetPowerPercent(value),
        };
        self.send(cmd)
    }

    /// Select "Control Mode" write.
    pub fn select_mode(&self, option: &str) -> Result<(), BridgeError> {
        let mode = option
            .parse::<ControlMode>()
            .map_err(|_| BridgeError::UnknownOption)?;
        self.send(OperatorCommand::SelectMode(mode))
    }

    /// Switch "Power" write: master switch and on/off together.
    pub fn write_switch(&self, on: bool) -> Result<(), BridgeError> {
        self.send(OperatorCommand::SetPower(on))
    }

    /// Button "Reset Total".
    pub fn press_reset_total(&self) -> Result<(), BridgeError> {
        self.send(OperatorCommand::ResetTotalConsumption)
    }

    /// Button "Reset Daily".
    pub fn press_reset_daily(&self) -> Result<(), BridgeError> {
        self.send(OperatorCommand::ResetDailyConsumption)
    }

    /// New reading from the operator's room temperature sensor.
    pub fn update_external_temperature(&self, reading: Option<f32>) -> Result<(), BridgeError> {
        self.send(OperatorCommand::SetExternalTemperature(reading))
    }

    /// Climate card control call.  Every field is validated before
    /// anything is queued, so a bad call changes nothing.
    pub fn climate_control(&self, call: &ClimateCall<'_>) -> Result<(), BridgeError> {
        let mode = call.mode.map(|m| m.parse::<ClimateMode>()).transpose()?;
        let preset = call
            .preset
            .map(|p| p.parse::<ControlMode>().map_err(|_| BridgeError::UnknownOption))
            .transpose()?;
        let fan_percent = call
            .fan_mode
            .map(|f| fan_mode_percent(f).ok_or(BridgeError::UnknownOption))
            .transpose()?;

        if let Some(preset) = preset {
            self.send(OperatorCommand::SelectMode(preset))?;
        }
        match mode {
            Some(ClimateMode::Heat) => self.send(OperatorCommand::SetPower(true))?,
            Some(ClimateMode::Off) => self.send(OperatorCommand::SetPower(false))?,
            Some(ClimateMode::FanOnly) => {
                warn!("Climate: fan only is not supported, switching off");
                self.send(OperatorCommand::SetPower(false))?;
            }
            None => {}
        }
        if let Some(target) = call.target_temperature {
            self.send(OperatorCommand::SetTuning(TuningParam::TargetTemperature, target))?;
        }
        if let Some(percent) = fan_percent {
            self.send(OperatorCommand::SetPowerPercent(f32::from(percent)))?;
        }
        Ok(())
    }

    /// Text write as delivered by a transport: `payload` is a number,
    /// `on`/`off`, an option label, or a JSON climate call.
    pub fn write_entity(&self, key: &str, payload: &str) -> Result<(), BridgeError> {
        let payload = payload.trim();
        if let Some(n) = NumberEntity::ALL.iter().find(|n| n.key() == key) {
            return self.write_number(*n, parse_number(payload)?);
        }
        match key {
            CONTROL_MODE_KEY => self.select_mode(payload),
            POWER_SWITCH_KEY => self.write_switch(parse_switch(payload)?),
            RESET_TOTAL_KEY => self.press_reset_total(),
            RESET_DAILY_KEY => self.press_reset_daily(),
            CLIMATE_KEY => {
                let call: ClimateCall<'_> =
                    serde_json::from_str(payload).map_err(|_| BridgeError::BadValue)?;
                self.climate_control(&call)
            }
            k if k == SensorEntity::ExternalTemperature.key() => {
                let reading = match payload {
                    "unavailable" | "unknown" | "null" => None,
                    p => Some(parse_number(p)?),
                };
                self.update_external_temperature(reading)
            }
            _ => Err(BridgeError::UnknownEntity),
        }
    }

    fn send(&self, cmd: OperatorCommand) -> Result<(), BridgeError> {
        self.sender.try_send(cmd).map_err(|_| {
            warn!("Operator command {:?} dropped: queue full", cmd);
            BridgeError::QueueFull
        })
    }
}

fn parse_number(payload: &str) -> Result<f32, BridgeError> {
    payload.parse::<f32>().map_err(|_| BridgeError::BadValue)
}

fn parse_switch(payload: &str) -> Result<bool, BridgeError> {
    match payload.to_ascii_lowercase().as_str() {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        _ => Err(BridgeError::BadValue),
    }
}
