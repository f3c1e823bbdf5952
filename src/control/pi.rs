//! PI regulator for AUTOMATIC mode.
//!
//! Standard PI(D) on `target − room temperature` with a clamped
//! integrator and conditional integration, followed by a start/stop gate
//! with two thresholds:
//!
//! ```text
//!   output ≥ min_on                          → heater ON
//!   output < min_off for off_delay seconds
//!     AND stable combustion for ≥ 30 s       → heater OFF
//! ```
//!
//! The gate keeps a diesel heater from short-cycling: each ignition costs
//! glow-plug wear and soot, so a started heater runs at least until it
//! has burned cleanly for a while.

use log::info;

use crate::config::TuningConfig;
use crate::protocol::{HeaterPhase, MAX_POWER_LEVEL, MIN_POWER_LEVEL};

/// Integrator clamp (same units as the error × seconds).
pub const INTEGRAL_LIMIT: f32 = 100.0;
/// Minimum stable-combustion time before the gate may switch off.
pub const MIN_ON_TIME_MS: u64 = 30_000;

const DT_MIN_S: f32 = 0.05;
const DT_MAX_S: f32 = 5.0;
const OUTPUT_MAX: f32 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PiStep {
    /// Clamped controller output, 0..=100 %.
    pub output: f32,
    /// Gate state after this step.
    pub heater_on: bool,
    /// Power level (1..=10) derived from `output`.
    pub power_level: u8,
}

#[derive(Debug, Clone)]
pub struct PiRegulator {
    integral: f32,
    last_error: Option<f32>,
    last_step_ms: Option<u64>,
    last_output: f32,
    heater_on: bool,
    below_min_off_since_ms: Option<u64>,
    stable_since_ms: Option<u64>,
    actively_heating: bool,
    gate_enabled: bool,
}

impl PiRegulator {
    pub const fn new() -> Self {
        Self {
            integral: 0.0,
            last_error: None,
            last_step_ms: None,
            last_output: 0.0,
            heater_on: false,
            below_min_off_since_ms: None,
            stable_since_ms: None,
            actively_heating: false,
            gate_enabled: true,
        }
    }

    /// Track the reported phase for the minimum-on rule.
    pub fn observe_phase(&mut self, phase: HeaterPhase, now_ms: u64) {
        match phase {
            HeaterPhase::Stable => {
                if self.stable_since_ms.is_none() {
                    info!("PI: stable combustion reached");
                    self.stable_since_ms = Some(now_ms);
                }
            }
            HeaterPhase::Unknown => {}
            _ => self.stable_since_ms = None,
        }
        if phase != HeaterPhase::Unknown {
            self.actively_heating = phase.is_heating();
        }
    }

    /// Run one regulator step.
    pub fn step(&mut self, now_ms: u64, target: f32, current: f32, tuning: &TuningConfig) -> PiStep {
        let dt = self.last_step_ms.map_or(DT_MIN_S, |last| {
            (now_ms.saturating_sub(last) as f32 / 1000.0).clamp(DT_MIN_S, DT_MAX_S)
        });
        self.last_step_ms = Some(now_ms);

        let error = target - current;

        let prev_integral = self.integral;
        self.integral = (self.integral + error * dt).clamp(-INTEGRAL_LIMIT, INTEGRAL_LIMIT);

        let derivative = self.last_error.map_or(0.0, |e| (error - e) / dt);
        self.last_error = Some(error);

        let raw = tuning.pi_kp * error + tuning.pi_ki * self.integral + tuning.pi_kd * derivative;
        let output = raw.clamp(0.0, OUTPUT_MAX);

        // Conditional integration: don't wind further into saturation.
        if (raw > OUTPUT_MAX && error > 0.0) || (raw < 0.0 && error < 0.0) {
            self.integral = prev_integral;
        }

        self.last_output = output;
        self.update_gate(now_ms, output, tuning);
        self.current()
    }

    /// Skip a step (no valid room temperature).  Keeps the gate as is and
    /// restarts the Δt time base so the gap is not integrated.
    pub fn hold(&mut self) -> PiStep {
        self.last_step_ms = None;
        self.current()
    }

    /// Enable or disable the start/stop gate (master switch).  A disabled
    /// gate stays off while the regulator keeps computing its output.
    pub fn set_gate_enabled(&mut self, enabled: bool) {
        if self.gate_enabled != enabled {
            info!("PI: gate {}", if enabled { "enabled" } else { "disabled" });
            self.gate_enabled = enabled;
        }
        if !enabled {
            self.heater_on = false;
            self.below_min_off_since_ms = None;
        }
    }

    /// Take over a heater that is already burning: the gate starts ON, so
    /// the usual off-dwell and minimum-on rules apply before it stops.
    pub fn resume_on(&mut self, phase: HeaterPhase, now_ms: u64) {
        self.observe_phase(phase, now_ms);
        if self.gate_enabled {
            info!("PI: taking over running heater ({})", phase.as_str());
            self.heater_on = true;
            self.below_min_off_since_ms = None;
        }
    }

    /// Drop all regulator state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn current(&self) -> PiStep {
        PiStep {
            output: self.last_output,
            heater_on: self.heater_on,
            power_level: power_level_for(self.last_output),
        }
    }

    pub fn integral(&self) -> f32 {
        self.integral
    }

    pub fn output(&self) -> f32 {
        self.last_output
    }

    pub fn heater_on(&self) -> bool {
        self.heater_on
    }

    fn min_on_satisfied(&self, now_ms: u64) -> bool {
        match self.stable_since_ms {
            Some(t) => now_ms.saturating_sub(t) >= MIN_ON_TIME_MS,
            // Ignition failed or never attempted: nothing to protect.
            None => !self.actively_heating,
        }
    }

    fn update_gate(&mut self, now_ms: u64, output: f32, tuning: &TuningConfig) {
        if !self.gate_enabled {
            return;
        }
        if !self.heater_on {
            if output >= tuning.pi_output_min_on {
                info!(
                    "PI: output {:.1}% >= {:.1}%, heater on",
                    output, tuning.pi_output_min_on
                );
                self.heater_on = true;
                self.below_min_off_since_ms = None;
            }
            return;
        }

        if output >= tuning.pi_output_min_off {
            self.below_min_off_since_ms = None;
            return;
        }

        let since = *self.below_min_off_since_ms.get_or_insert(now_ms);
        let dwell_ms = now_ms.saturating_sub(since);
        let off_delay_ms = (tuning.pi_off_delay * 1000.0) as u64;
        if dwell_ms >= off_delay_ms && self.min_on_satisfied(now_ms) {
            info!(
                "PI: output below {:.1}% for {} s, heater off",
                tuning.pi_output_min_off,
                dwell_ms / 1000
            );
            self.heater_on = false;
            self.below_min_off_since_ms = None;
        }
    }
}

impl Default for PiRegulator {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a 0..=100 % output to a heater power level.
pub fn power_level_for(output: f32) -> u8 {
    ((output / 10.0).round() as u8).clamp(MIN_POWER_LEVEL, MAX_POWER_LEVEL)
}
