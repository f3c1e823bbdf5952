//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ HeaterService (domain)
//! ```
//!
//! Driven adapters (UART, clock, storage, sinks) implement these traits.
//! The [`HeaterService`](super::service::HeaterService) consumes them via
//! generics, so the control core never touches hardware directly.

use crate::bridge::entities::EntityValue;

// ───────────────────────────────────────────────────────────────
// Serial port (driven adapter: heater bus ↔ domain)
// ───────────────────────────────────────────────────────────────

/// Half-duplex serial line to the heater MCU.
pub trait UartPort {
    /// Copy already-received bytes into `buf` without blocking.
    /// Returns the number of bytes copied (0 when the FIFO is empty).
    fn read_available(&mut self, buf: &mut [u8]) -> usize;

    /// Queue one complete frame for transmission.
    fn write_frame(&mut self, frame: &[u8]) -> Result<(), UartError>;
}

// ───────────────────────────────────────────────────────────────
// Calendar port (driven adapter: RTC / SNTP → domain)
// ───────────────────────────────────────────────────────────────

/// Wall-clock source used for the daily fuel counter.
pub trait CalendarPort {
    /// Days since the Unix epoch, or `None` while the clock is not
    /// synchronised.
    fn day_ordinal(&self) -> Option<u32>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`HeaterEvent`](super::events::HeaterEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::HeaterEvent);
}

// ───────────────────────────────────────────────────────────────
// Entity sink port (domain → home-automation surface)
// ───────────────────────────────────────────────────────────────

/// Receives entity state publications from the
/// [`Publisher`](crate::bridge::publisher::Publisher).
pub trait EntitySink {
    fn publish(&mut self, key: &str, value: &EntityValue);
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Blob store for the versioned tuning and fuel records.
///
/// Records live under a namespace per family (`config`, `fuel`).  A write
/// replaces the whole blob or fails; readers never see half a record.
pub trait StoragePort {
    /// Copy the blob stored under `namespace`/`key` into `buf` and return
    /// its length.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Replace the blob under `namespace`/`key`.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Remove a blob; removing a missing one succeeds.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    NotFound,
    /// No room left in the partition.
    Full,
    /// Stored blob is larger than the read buffer.
    BufferTooSmall,
    IoError,
}

/// Errors from [`UartPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UartError {
    /// Driver accepted fewer bytes than the frame length.
    ShortWrite,
    /// Driver reported a failure.
    Driver,
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "record not found"),
            Self::Full => write!(f, "partition full"),
            Self::BufferTooSmall => write!(f, "record larger than buffer"),
            Self::IoError => write!(f, "storage I/O error"),
        }
    }
}

impl core::fmt::Display for UartError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ShortWrite => write!(f, "short write"),
            Self::Driver => write!(f, "UART driver error"),
        }
    }
}
