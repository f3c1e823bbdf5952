//! Fault taxonomy for the heater controller.
//!
//! None of these are fatal: the control loop records the fault, logs it,
//! degrades the affected function and keeps polling the heater.  All
//! variants are `Copy` so they can travel through events and the safety
//! interlock without allocation.

use core::fmt;

use crate::protocol::codec::DecodeError;

// ---------------------------------------------------------------------------
// Top-level fault
// ---------------------------------------------------------------------------

/// Every degraded condition the controller can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// No valid heater frame for longer than the communication timeout.
    LinkTimeout,
    /// A received frame failed validation.
    BadFrame(DecodeError),
    /// Supply voltage too low to attempt ignition.
    UnderVoltageStart,
    /// Supply voltage dropped below the operating floor while heating.
    UnderVoltageRun,
    /// A persisted record could not be decoded.
    PersistenceCorrupt,
    /// The wall clock has not been synchronised yet.
    RtcUnsynced,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LinkTimeout => write!(f, "heater link timeout"),
            Self::BadFrame(e) => write!(f, "bad frame: {e}"),
            Self::UnderVoltageStart => write!(f, "voltage too low to start"),
            Self::UnderVoltageRun => write!(f, "voltage too low while running"),
            Self::PersistenceCorrupt => write!(f, "persisted record corrupt"),
            Self::RtcUnsynced => write!(f, "RTC not synchronised"),
        }
    }
}

impl From<DecodeError> for Fault {
    fn from(e: DecodeError) -> Self {
        Self::BadFrame(e)
    }
}

impl From<SafetyFault> for Fault {
    fn from(e: SafetyFault) -> Self {
        match e {
            SafetyFault::UnderVoltageStart => Self::UnderVoltageStart,
            SafetyFault::UnderVoltageRun => Self::UnderVoltageRun,
        }
    }
}

// ---------------------------------------------------------------------------
// Operator rejections
// ---------------------------------------------------------------------------

/// Why an operator write was refused.  Reported with the command through
/// `HeaterEvent::CommandRejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Power level writes are only honoured in MANUAL.
    PowerLevelNotManual,
    /// Value outside the accepted range for the field.
    OutOfRange(&'static str),
    /// Minimum-off threshold above minimum-on threshold.
    ThresholdOrder,
    /// Value was NaN or infinite.
    NotFinite,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PowerLevelNotManual => write!(f, "Power level only works in Manual mode"),
            Self::OutOfRange(field) => write!(f, "{field} out of range"),
            Self::ThresholdOrder => write!(f, "PI min-off threshold must not exceed min-on"),
            Self::NotFinite => write!(f, "value is not a finite number"),
        }
    }
}

// ---------------------------------------------------------------------------
// Safety faults
// ---------------------------------------------------------------------------

/// Voltage faults tracked by the safety interlock.  They are accumulated
/// in a bitfield so both can be active and cleared independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SafetyFault {
    /// Ignition refused: supply below the start threshold.
    UnderVoltageStart = 0b0000_0001,
    /// Shutdown forced: supply below the operating threshold.
    UnderVoltageRun = 0b0000_0010,
}

impl SafetyFault {
    pub const ALL: [Self; 2] = [Self::UnderVoltageStart, Self::UnderVoltageRun];

    /// Return the bitmask for this fault.
    pub const fn mask(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for SafetyFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnderVoltageStart => write!(f, "under-voltage at start"),
            Self::UnderVoltageRun => write!(f, "under-voltage while running"),
        }
    }
}
