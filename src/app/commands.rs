//! Inbound commands to the application service.
//!
//! These represent operator actions arriving from the home-automation
//! surface (climate card, number/select/switch/button entities).  The
//! [`HeaterBridge`](crate::bridge::HeaterBridge) turns entity writes into
//! commands and queues them; the
//! [`HeaterService`](super::service::HeaterService) applies them at the
//! start of the next control tick.

use crate::arbiter::ControlMode;
use crate::config::TuningParam;

/// Commands that external adapters can send into the application core.
///
/// Every command is idempotent: applying the same command twice leaves
/// the controller in the same state as applying it once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OperatorCommand {
    /// Power switch: sets the master switch and the operator on/off.
    SetPower(bool),

    /// Switch control mode.
    SelectMode(ControlMode),

    /// Manual power in percent (10..=100, 10 % steps).  MANUAL only.
    SetPowerPercent(f32),

    /// Write one tuning parameter (persisted).
    SetTuning(TuningParam, f32),

    /// Room temperature from the operator's sensor; `None` when the
    /// sensor reports unavailable.
    SetExternalTemperature(Option<f32>),

    /// Zero the daily fuel counter.
    ResetDailyConsumption,

    /// Zero the cumulative fuel counter.
    ResetTotalConsumption,
}
