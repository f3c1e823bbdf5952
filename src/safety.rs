//! Voltage safety interlock.
//!
//! Runs **every control tick after telemetry and before the mode
//! controller's command is transmitted**.  It keeps a fault bitmask and
//! post-processes the desired command:
//!
//! 1. A START is withheld while the supply is below the start threshold
//!    (or unknown).  Requesting a start at low voltage latches
//!    [`SafetyFault::UnderVoltageStart`].
//! 2. While the heater is actively burning, a supply below the operating
//!    threshold latches [`SafetyFault::UnderVoltageRun`] and forces OFF.
//! 3. A fault clears once the voltage is back above its threshold plus
//!    [`VOLTAGE_HYSTERESIS`].  The start fault also clears when no start
//!    is requested any more.
//!
//! Both faults can be active at once; `low_voltage_error` is exposed as
//! "any fault active".

use log::{error, info};

use crate::config::HeaterConfig;
use crate::error::SafetyFault;
use crate::protocol::ControllerCommand;

/// Volts above a threshold required to clear its fault.
pub const VOLTAGE_HYSTERESIS: f32 = 0.1;

/// What the interlock did to the desired command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafetyVerdict {
    /// Command to actually transmit.
    pub command: ControllerCommand,
    /// The run fault is active: callers must drop the operator's on request.
    pub force_off: bool,
    /// Faults newly set this evaluation.
    pub raised: u8,
    /// Faults cleared this evaluation.
    pub cleared: u8,
}

/// Safety interlock.
pub struct SafetyInterlock {
    min_voltage_start: f32,
    min_voltage_operate: f32,
    /// Latched fault bitmask.
    faults: u8,
}

impl SafetyInterlock {
    pub fn new(config: &HeaterConfig) -> Self {
        Self {
            min_voltage_start: config.min_voltage_start,
            min_voltage_operate: config.min_voltage_operate,
            faults: 0,
        }
    }

    /// Evaluate the latest supply voltage against `desired`.
    ///
    /// * `voltage`: `None` while no telemetry is available.
    /// * `running`: the heater reports an actively heating phase.
    pub fn evaluate(
        &mut self,
        voltage: Option<f32>,
        desired: ControllerCommand,
        running: bool,
    ) -> SafetyVerdict {
        let before = self.faults;
        let start_requested = desired == ControllerCommand::Start;

        if let Some(v) = voltage {
            // ── Start threshold ───────────────────────────────────
            let start_low = if self.has_fault(SafetyFault::UnderVoltageStart) {
                start_requested && v < self.min_voltage_start + VOLTAGE_HYSTERESIS
            } else {
                start_requested && v < self.min_voltage_start
            };
            self.eval_fault(SafetyFault::UnderVoltageStart, start_low, v);

            // ── Operating threshold ───────────────────────────────
            let run_low = if self.has_fault(SafetyFault::UnderVoltageRun) {
                v < self.min_voltage_operate + VOLTAGE_HYSTERESIS
            } else {
                running && v < self.min_voltage_operate
            };
            self.eval_fault(SafetyFault::UnderVoltageRun, run_low, v);
        } else if !start_requested {
            self.clear_fault(SafetyFault::UnderVoltageStart);
        }

        let force_off = self.has_fault(SafetyFault::UnderVoltageRun);
        let start_allowed = voltage.is_some() && !self.has_fault(SafetyFault::UnderVoltageStart);

        let command = match desired {
            _ if force_off => ControllerCommand::Off,
            ControllerCommand::Start if !start_allowed => ControllerCommand::Off,
            other => other,
        };

        SafetyVerdict {
            command,
            force_off,
            raised: self.faults & !before,
            cleared: before & !self.faults,
        }
    }

    /// Current fault bitmask.
    pub fn faults(&self) -> u8 {
        self.faults
    }

    /// True if **any** fault is active.
    pub fn has_faults(&self) -> bool {
        self.faults != 0
    }

    /// Check if a specific fault is active.
    pub fn has_fault(&self, fault: SafetyFault) -> bool {
        self.faults & fault.mask() != 0
    }

    // ── Internal ──────────────────────────────────────────────────

    /// Set or clear a fault bit based on a boolean condition.
    fn eval_fault(&mut self, fault: SafetyFault, condition: bool, volts: f32) {
        if condition {
            if self.faults & fault.mask() == 0 {
                error!("SAFETY FAULT SET: {fault} ({volts:.1} V)");
            }
            self.faults |= fault.mask();
        } else {
            if self.faults & fault.mask() != 0 {
                info!("SAFETY FAULT CLEARED: {fault} ({volts:.1} V)");
            }
            self.faults &= !fault.mask();
        }
    }

    fn clear_fault(&mut self, fault: SafetyFault) {
        if self.faults & fault.mask() != 0 {
            info!("SAFETY FAULT CLEARED: {fault} (start no longer requested)");
        }
        self.faults &= !fault.mask();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interlock() -> SafetyInterlock {
        SafetyInterlock::new(&HeaterConfig::default())
    }

    #[test]
    fn start_allowed_with_healthy_supply() {
        let mut s = interlock();
        let v = s.evaluate(Some(12.8), ControllerCommand::Start, false);
        assert_eq!(v.command, ControllerCommand::Start);
        assert!(!s.has_faults());
    }

    #[test]
    fn start_withheld_below_threshold() {
        let mut s = interlock();
        let v = s.evaluate(Some(12.1), ControllerCommand::Start, false);
        assert_eq!(v.command, ControllerCommand::Off);
        assert_eq!(v.raised, SafetyFault::UnderVoltageStart.mask());
        assert!(!v.force_off);
    }

    #[test]
    fn start_fault_needs_hysteresis_to_clear() {
        let mut s = interlock();
        s.evaluate(Some(12.1), ControllerCommand::Start, false);
        let v = s.evaluate(Some(12.35), ControllerCommand::Start, false);
        assert_eq!(v.command, ControllerCommand::Off);
        let v = s.evaluate(Some(12.45), ControllerCommand::Start, false);
        assert_eq!(v.command, ControllerCommand::Start);
        assert_eq!(v.cleared, SafetyFault::UnderVoltageStart.mask());
    }

    #[test]
    fn start_fault_clears_when_start_withdrawn() {
        let mut s = interlock();
        s.evaluate(Some(12.0), ControllerCommand::Start, false);
        s.evaluate(Some(12.0), ControllerCommand::Off, false);
        assert!(!s.has_faults());
    }

    #[test]
    fn unknown_voltage_withholds_start_without_fault() {
        let mut s = interlock();
        let v = s.evaluate(None, ControllerCommand::Start, false);
        assert_eq!(v.command, ControllerCommand::Off);
        assert!(!s.has_faults());
    }

    #[test]
    fn running_undervoltage_forces_off() {
        let mut s = interlock();
        let v = s.evaluate(Some(11.2), ControllerCommand::Running, true);
        assert!(v.force_off);
        assert_eq!(v.command, ControllerCommand::Off);
        assert!(s.has_fault(SafetyFault::UnderVoltageRun));

        // Still latched just above the threshold.
        let v = s.evaluate(Some(11.45), ControllerCommand::Off, false);
        assert!(v.force_off);
        let v = s.evaluate(Some(11.6), ControllerCommand::Off, false);
        assert!(!v.force_off);
        assert_eq!(v.cleared, SafetyFault::UnderVoltageRun.mask());
    }

    #[test]
    fn idle_heater_ignores_operating_threshold() {
        let mut s = interlock();
        let v = s.evaluate(Some(11.0), ControllerCommand::Off, false);
        assert!(!v.force_off);
        assert!(!s.has_faults());
    }
}
