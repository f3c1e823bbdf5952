//! Fuel consumption integrator.
//!
//! Integrates pump pulse frequency over wall time into a cumulative pulse
//! count and a daily millilitre counter.  The daily counter rolls over when
//! the calendar day changes; without a synchronised clock the rollover is
//! deferred (and a warning logged once).

use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Bumped whenever the persisted [`FuelCounters`] layout changes.
pub const FUEL_VERSION: u32 = 1;

const SECONDS_PER_HOUR: f32 = 3600.0;

/// Persisted fuel counters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FuelCounters {
    /// Record layout version; must be the first field.
    pub version: u32,
    pub daily_ml: f32,
    /// Days since the Unix epoch of the last daily reset.
    pub last_reset_day: u32,
    pub total_pulses: f32,
}

impl Default for FuelCounters {
    fn default() -> Self {
        Self {
            version: FUEL_VERSION,
            daily_ml: 0.0,
            last_reset_day: 0,
            total_pulses: 0.0,
        }
    }
}

/// What happened during one integration step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FuelStep {
    /// The daily counter was zeroed for a new day.
    pub day_rolled: bool,
    /// The clock is not synchronised (first occurrence only).
    pub rtc_unsynced: bool,
}

pub struct FuelIntegrator {
    counters: FuelCounters,
    last_update_ms: Option<u64>,
    rtc_warned: bool,
    dirty: bool,
}

impl FuelIntegrator {
    pub fn new(counters: FuelCounters) -> Self {
        Self {
            counters,
            last_update_ms: None,
            rtc_warned: false,
            dirty: false,
        }
    }

    /// Replace the counters (e.g. after loading from storage).
    pub fn restore(&mut self, counters: FuelCounters) {
        self.counters = counters;
    }

    /// Advance the integrator to `now_ms`.
    ///
    /// `day` is the current calendar day ordinal, `None` when the RTC is
    /// not synchronised.  The first call only establishes the time base.
    pub fn integrate(
        &mut self,
        now_ms: u64,
        pump_hz: f32,
        injected_per_pulse: f32,
        day: Option<u32>,
    ) -> FuelStep {
        let mut step = FuelStep::default();

        match day {
            Some(d) if d != self.counters.last_reset_day => {
                info!(
                    "New day {} (last reset {}), daily fuel counter reset from {:.1} ml",
                    d, self.counters.last_reset_day, self.counters.daily_ml
                );
                self.counters.daily_ml = 0.0;
                self.counters.last_reset_day = d;
                self.dirty = true;
                step.day_rolled = true;
            }
            Some(_) => {}
            None => {
                if !self.rtc_warned {
                    warn!("RTC not synchronised, daily fuel reset deferred");
                    self.rtc_warned = true;
                    step.rtc_unsynced = true;
                }
            }
        }

        let Some(last) = self.last_update_ms.replace(now_ms) else {
            return step;
        };
        let dt = now_ms.saturating_sub(last) as f32 / 1000.0;
        if pump_hz > 0.0 && pump_hz.is_finite() {
            let pulses = pump_hz * dt;
            self.counters.total_pulses += pulses;
            self.counters.daily_ml += pulses * injected_per_pulse;
        }
        step
    }

    pub fn reset_daily(&mut self) {
        info!("Daily fuel counter reset ({:.1} ml)", self.counters.daily_ml);
        self.counters.daily_ml = 0.0;
        self.dirty = true;
    }

    pub fn reset_total(&mut self) {
        info!(
            "Total fuel counter reset ({:.0} pulses)",
            self.counters.total_pulses
        );
        self.counters.total_pulses = 0.0;
        self.dirty = true;
    }

    pub fn counters(&self) -> &FuelCounters {
        &self.counters
    }

    pub fn daily_ml(&self) -> f32 {
        self.counters.daily_ml
    }

    pub fn total_ml(&self, injected_per_pulse: f32) -> f32 {
        self.counters.total_pulses * injected_per_pulse
    }

    /// Instantaneous consumption in ml/h.
    pub fn hourly_rate(pump_hz: f32, injected_per_pulse: f32) -> f32 {
        pump_hz * injected_per_pulse * SECONDS_PER_HOUR
    }

    /// Take the "needs persisting" flag.
    pub fn take_dirty(&mut self) -> bool {
        core::mem::take(&mut self.dirty)
    }
}
