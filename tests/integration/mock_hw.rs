//! Mock adapters for integration tests.
//!
//! Record every frame, event and publication so tests can assert on the
//! full history without touching a UART, flash or a network.

use std::collections::HashMap;

use sunster::app::events::HeaterEvent;
use sunster::app::ports::{
    CalendarPort, EntitySink, EventSink, StorageError, StoragePort, UartError, UartPort,
};
use sunster::bridge::entities::EntityValue;
use sunster::protocol::codec::{self, Frame, encode_heater};
use sunster::protocol::telemetry::HeaterStatus;
use sunster::protocol::{ControllerCommand, HeaterPhase};

// ── MockUart ──────────────────────────────────────────────────

#[derive(Default)]
pub struct MockUart {
    pub rx: Vec<u8>,
    pub tx: Vec<Vec<u8>>,
}

#[allow(dead_code)]
impl MockUart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one heater status frame.
    pub fn push_status(&mut self, status: &HeaterStatus) {
        self.rx.extend_from_slice(&encode_heater(status));
    }

    /// Queue a status frame with only phase and voltage set.
    pub fn push_phase(&mut self, phase: HeaterPhase, volts: f32) {
        self.push_status(&status(phase, volts));
    }

    /// Decoded `(command, power level)` of every transmitted frame.
    pub fn sent_commands(&self) -> Vec<(ControllerCommand, u8)> {
        self.tx
            .iter()
            .filter_map(|f| match codec::parse(f) {
                Ok(Frame::Controller(c)) => c.command().map(|cmd| (cmd, c.power_level)),
                _ => None,
            })
            .collect()
    }

    pub fn last_command(&self) -> Option<(ControllerCommand, u8)> {
        self.sent_commands().last().copied()
    }
}

impl UartPort for MockUart {
    fn read_available(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.rx.len());
        buf[..n].copy_from_slice(&self.rx[..n]);
        self.rx.drain(..n);
        n
    }

    fn write_frame(&mut self, frame: &[u8]) -> Result<(), UartError> {
        self.tx.push(frame.to_vec());
        Ok(())
    }
}

#[allow(dead_code)]
pub fn status(phase: HeaterPhase, volts: f32) -> HeaterStatus {
    HeaterStatus {
        phase,
        input_voltage: volts,
        ..HeaterStatus::default()
    }
}

// ── MockRtc ───────────────────────────────────────────────────

pub struct MockRtc(pub Option<u32>);

impl CalendarPort for MockRtc {
    fn day_ordinal(&self) -> Option<u32> {
        self.0
    }
}

// ── MockStorage ───────────────────────────────────────────────

#[derive(Default)]
pub struct MockStorage {
    pub data: HashMap<String, Vec<u8>>,
    pub writes: u32,
}

#[allow(dead_code)]
impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, ns: &str, key: &str) -> Option<&[u8]> {
        self.data.get(&format!("{ns}::{key}")).map(Vec::as_slice)
    }

    pub fn put(&mut self, ns: &str, key: &str, bytes: &[u8]) {
        self.data.insert(format!("{ns}::{key}"), bytes.to_vec());
    }
}

impl StoragePort for MockStorage {
    fn read(&self, ns: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let data = self.get(ns, key).ok_or(StorageError::NotFound)?;
        if data.len() > buf.len() {
            return Err(StorageError::BufferTooSmall);
        }
        buf[..data.len()].copy_from_slice(data);
        Ok(data.len())
    }

    fn write(&mut self, ns: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.writes += 1;
        self.put(ns, key, data);
        Ok(())
    }

    fn delete(&mut self, ns: &str, key: &str) -> Result<(), StorageError> {
        self.data.remove(&format!("{ns}::{key}"));
        Ok(())
    }

    fn exists(&self, ns: &str, key: &str) -> bool {
        self.data.contains_key(&format!("{ns}::{key}"))
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<HeaterEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&HeaterEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn contains(&self, event: &HeaterEvent) -> bool {
        self.events.contains(event)
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &HeaterEvent) {
        self.events.push(*event);
    }
}

// ── RecordingEntitySink ───────────────────────────────────────

#[derive(Default)]
pub struct RecordingEntitySink {
    pub published: Vec<(String, EntityValue)>,
}

#[allow(dead_code)]
impl RecordingEntitySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent value published under `key`.
    pub fn latest(&self, key: &str) -> Option<&EntityValue> {
        self.published
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }
}

impl EntitySink for RecordingEntitySink {
    fn publish(&mut self, key: &str, value: &EntityValue) {
        self.published.push((key.to_string(), value.clone()));
    }
}
