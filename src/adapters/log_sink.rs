//! Log-based sink adapters.
//!
//! [`LogEventSink`] writes structured heater events to the ESP-IDF logger
//! (UART / USB-CDC in production).  [`LogEntitySink`] renders entity
//! publications as JSON lines; a network transport to the home-automation
//! server would implement the same [`EntitySink`] trait.

use log::{debug, info, warn};

use crate::app::events::HeaterEvent;
use crate::app::ports::{EntitySink, EventSink};
use crate::bridge::entities::EntityValue;
use crate::error::Fault;

/// Adapter that logs every [`HeaterEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &HeaterEvent) {
        match event {
            HeaterEvent::Started(mode) => {
                info!("START | mode={}", mode);
            }
            HeaterEvent::ModeChanged { from, to } => {
                info!("MODE  | {} -> {}", from, to);
            }
            HeaterEvent::PhaseChanged { from, to } => {
                info!("PHASE | {} -> {}", from, to);
            }
            HeaterEvent::CommandChanged { from, to } => {
                info!("CMD   | {} -> {}", from, to);
            }
            HeaterEvent::LinkUp => {
                info!("LINK  | heater frames received");
            }
            HeaterEvent::LinkDown => {
                warn!("LINK  | heater silent, link lost");
            }
            // Corrupt bytes on a noisy bus are routine.
            HeaterEvent::FaultRaised(f @ Fault::BadFrame(_)) => {
                debug!("FAULT | {}", f);
            }
            HeaterEvent::FaultRaised(f) => {
                warn!("FAULT | raised: {}", f);
            }
            HeaterEvent::FaultCleared(f) => {
                info!("FAULT | cleared: {}", f);
            }
            HeaterEvent::CommandRejected { command, reason } => {
                warn!("REJECT| {:?}: {}", command, reason);
            }
            HeaterEvent::DayRollover { day } => {
                info!("FUEL  | new day {}, daily counter reset", day);
            }
            HeaterEvent::Saved { tuning, fuel } => {
                debug!("NVS   | saved tuning={} fuel={}", tuning, fuel);
            }
        }
    }
}

/// Adapter that logs entity publications as `key=<json>` lines.
#[derive(Debug, Default)]
pub struct LogEntitySink {
    published: u32,
}

impl LogEntitySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publications rendered so far.
    pub fn published(&self) -> u32 {
        self.published
    }
}

impl EntitySink for LogEntitySink {
    fn publish(&mut self, key: &str, value: &EntityValue) {
        match serde_json::to_string(value) {
            Ok(json) => {
                info!("STATE | {}={}", key, json);
                self.published += 1;
            }
            Err(e) => warn!("STATE | {} not serialisable: {}", key, e),
        }
    }
}
