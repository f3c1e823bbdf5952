//! Antifreeze governor.
//!
//! Keeps a space above freezing by stepping the heater through fixed power
//! bands as the ambient temperature falls:
//!
//! ```text
//!   T ≤ on            → 100 %
//!   on < T ≤ medium   →  70 %
//!   medium < T ≤ low  →  30 %
//!   T ≥ off + hyst    →  off
//! ```
//!
//! A colder band is entered as soon as T reaches its threshold.  Going
//! back to a warmer band needs T above the threshold plus hysteresis, and
//! switching off needs T ≥ off + hysteresis.  Between `low` and
//! `off + hyst` the current band is held.

use log::info;

use crate::config::AntifreezeThresholds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Band {
    #[default]
    Off,
    Low,
    Medium,
    High,
}

impl Band {
    pub const fn percent(self) -> u8 {
        match self {
            Self::Off => 0,
            Self::Low => 30,
            Self::Medium => 70,
            Self::High => 100,
        }
    }

    /// Heater power level for this band (meaningless when off).
    pub const fn power_level(self) -> u8 {
        match self {
            Self::Off | Self::Low => 3,
            Self::Medium => 7,
            Self::High => 10,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AntifreezeGovernor {
    band: Band,
}

impl AntifreezeGovernor {
    pub const fn new() -> Self {
        Self { band: Band::Off }
    }

    /// Advance the ladder with a new ambient reading.  `None` holds the
    /// current band.
    pub fn update(&mut self, ambient: Option<f32>, th: &AntifreezeThresholds) -> Band {
        let Some(t) = ambient.filter(|t| t.is_finite()) else {
            return self.band;
        };

        let next = next_band(self.band, t, th);
        if next != self.band {
            info!(
                "Antifreeze: {:.1}\u{00b0}C, {}% -> {}%",
                t,
                self.band.percent(),
                next.percent()
            );
            self.band = next;
        }
        self.band
    }

    pub fn band(&self) -> Band {
        self.band
    }

    pub fn is_active(&self) -> bool {
        self.band != Band::Off
    }

    pub fn reset(&mut self) {
        self.band = Band::Off;
    }
}

fn next_band(current: Band, t: f32, th: &AntifreezeThresholds) -> Band {
    let h = th.hysteresis;
    let mut band = current;

    // Warming edges.
    if band == Band::High && t > th.on + h {
        band = Band::Medium;
    }
    if band == Band::Medium && t > th.medium + h {
        band = Band::Low;
    }
    if band == Band::Low && t >= th.off + h {
        band = Band::Off;
    }

    // Cooling edges.
    if t <= th.on {
        Band::High
    } else if t <= th.medium && band < Band::Medium {
        Band::Medium
    } else if t <= th.low && band < Band::Low {
        Band::Low
    } else {
        band
    }
}
