//! Entity publication scheduler.
//!
//! A single [`Publisher`] walks a fixed registry of entities once per
//! main-loop pass and decides, per entity, whether its state is due:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Registry entry: (entity, cadence, last value, last publish) │
//! │                                                              │
//! │  StartupRamp  numbers, select   every 3 s for the first      │
//! │                                 minute, then every 15 s      │
//! │  Switch       power switch      on change or every 2 s once  │
//! │                                 synced; `false` once after   │
//! │                                 500 ms before the first      │
//! │                                 heater frame                 │
//! │  OnChange     sensors, climate  on change, refreshed every   │
//! │                                 60 s                         │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use super::entities::{EntityKey, EntityValue, NumberEntity, SensorEntity};
use crate::app::ports::EntitySink;
use crate::app::view::HeaterView;
use log::debug;

// ═══════════════════════════════════════════════════════════════
//  Cadences
// ═══════════════════════════════════════════════════════════════

pub const RAMP_FAST_MS: u64 = 3_000;
pub const RAMP_WINDOW_MS: u64 = 60_000;
pub const RAMP_SLOW_MS: u64 = 15_000;
pub const SWITCH_REFRESH_MS: u64 = 2_000;
pub const SWITCH_PRESYNC_MS: u64 = 500;
pub const SENSOR_REFRESH_MS: u64 = 60_000;

/// How often an entity is republished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    StartupRamp,
    Switch,
    OnChange,
}

impl EntityKey {
    pub const fn cadence(self) -> Cadence {
        match self {
            Self::Number(_) | Self::ControlMode => Cadence::StartupRamp,
            Self::PowerSwitch => Cadence::Switch,
            Self::Sensor(_) | Self::Climate => Cadence::OnChange,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Registry
// ═══════════════════════════════════════════════════════════════

pub const ENTITY_COUNT: usize = NumberEntity::ALL.len() + SensorEntity::ALL.len() + 3;

const fn registry() -> [EntityKey; ENTITY_COUNT] {
    let mut out = [EntityKey::Climate; ENTITY_COUNT];
    let mut i = 0;
    while i < NumberEntity::ALL.len() {
        out[i] = EntityKey::Number(NumberEntity::ALL[i]);
        i += 1;
    }
    let mut j = 0;
    while j < SensorEntity::ALL.len() {
        out[i + j] = EntityKey::Sensor(SensorEntity::ALL[j]);
        j += 1;
    }
    out[i + j] = EntityKey::ControlMode;
    out[i + j + 1] = EntityKey::PowerSwitch;
    out
}

/// Every entity the controller publishes (the last slot is the climate card).
pub const ENTITIES: [EntityKey; ENTITY_COUNT] = registry();

/// Internal bookkeeping for one registered entity.
#[derive(Debug, Clone)]
struct Entry {
    entity: EntityKey,
    cadence: Cadence,
    last_value: Option<EntityValue>,
    last_publish_ms: Option<u64>,
}

impl Entry {
    fn new(entity: EntityKey) -> Self {
        Self {
            entity,
            cadence: entity.cadence(),
            last_value: None,
            last_publish_ms: None,
        }
    }

    fn elapsed(&self, now_ms: u64, period_ms: u64) -> bool {
        self.last_publish_ms
            .is_none_or(|t| now_ms.saturating_sub(t) >= period_ms)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Publisher
// ═══════════════════════════════════════════════════════════════

pub struct Publisher {
    entries: [Entry; ENTITY_COUNT],
    started_ms: Option<u64>,
}

impl Default for Publisher {
    fn default() -> Self {
        Self::new()
    }
}

impl Publisher {
    pub fn new() -> Self {
        Self {
            entries: ENTITIES.map(Entry::new),
            started_ms: None,
        }
    }

    /// Publish every entity that is due.  Returns how many were published.
    pub fn publish(&mut self, now_ms: u64, view: &HeaterView, sink: &mut impl EntitySink) -> usize {
        let start = *self.started_ms.get_or_insert(now_ms);
        let uptime = now_ms.saturating_sub(start);
        let mut published = 0;

        for entry in &mut self.entries {
            let mut value = entry.entity.value(view);
            let changed = entry.last_value.as_ref() != Some(&value);

            let due = match entry.cadence {
                Cadence::StartupRamp => {
                    let period = if uptime < RAMP_WINDOW_MS {
                        RAMP_FAST_MS
                    } else {
                        RAMP_SLOW_MS
                    };
                    entry.elapsed(now_ms, period)
                }
                Cadence::Switch if !view.synced_once => {
                    // Nothing known yet: report off once so the frontend
                    // does not show a stale state.
                    if entry.last_publish_ms.is_none() && uptime >= SWITCH_PRESYNC_MS {
                        value = EntityValue::Bool(false);
                        true
                    } else {
                        false
                    }
                }
                Cadence::Switch => changed || entry.elapsed(now_ms, SWITCH_REFRESH_MS),
                Cadence::OnChange => changed || entry.elapsed(now_ms, SENSOR_REFRESH_MS),
            };

            if due {
                debug!("publish {} = {:?}", entry.entity.key(), value);
                sink.publish(entry.entity.key(), &value);
                entry.last_value = Some(value);
                entry.last_publish_ms = Some(now_ms);
                published += 1;
            }
        }
        published
    }

    /// Last published value of `key`, if any.
    pub fn last_value(&self, key: &str) -> Option<&EntityValue> {
        self.entries
            .iter()
            .find(|e| e.entity.key() == key)
            .and_then(|e| e.last_value.as_ref())
    }
}
