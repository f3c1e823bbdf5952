//! Read-only snapshot of the controller for the entity bridge.

use crate::arbiter::ControlMode;
use crate::config::TuningConfig;
use crate::protocol::telemetry::HeaterStatus;
use crate::protocol::{ControllerCommand, HeaterPhase};

/// Everything the home-automation surface publishes, captured once per
/// publish pass by [`HeaterService::view`](super::service::HeaterService::view).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeaterView {
    pub mode: ControlMode,
    /// A valid heater frame arrived within the communication timeout.
    pub connected: bool,
    /// At least one valid heater frame since boot.
    pub synced_once: bool,
    /// Latest heater status; `None` while disconnected.
    pub status: Option<HeaterStatus>,
    pub external_temperature: Option<f32>,
    pub operator_on: bool,
    pub master_enabled: bool,
    /// MANUAL power level (1..=10).
    pub manual_power_level: u8,
    /// Power level on the wire (1..=10).
    pub commanded_power_level: u8,
    pub command: ControllerCommand,
    pub tuning: TuningConfig,
    pub low_voltage_error: bool,
    pub pi_output: f32,
    pub antifreeze_active: bool,
    pub daily_ml: f32,
    pub total_ml: f32,
    pub hourly_ml_per_h: f32,
    /// Climate card bounds.
    pub min_temperature: f32,
    pub max_temperature: f32,
}

impl HeaterView {
    pub fn phase(&self) -> HeaterPhase {
        self.status.map_or(HeaterPhase::Unknown, |s| s.phase)
    }

    pub fn is_heating(&self) -> bool {
        self.phase().is_heating()
    }

    /// MANUAL power as shown on the number entity (10..=100 %).
    pub fn manual_power_percent(&self) -> f32 {
        f32::from(self.manual_power_level) * 10.0
    }
}
