//! Sunster serial protocol: frame layout, command and phase vocabularies.
//!
//! ```text
//!   controller ──(11 B, ID 0x66)──▶ heater MCU
//!   controller ◀──(57 B, ID 0x77)── heater MCU
//! ```
//!
//! The bus is half duplex at 9600 8N1.  The heater only speaks when spoken
//! to, so every controller frame doubles as a status poll.

pub mod codec;
pub mod telemetry;

use core::fmt;

/// First byte of every frame.
pub const FRAME_START: u8 = 0xAA;
/// Originator ID of frames sent by the (handheld or emulated) controller.
pub const CONTROLLER_ID: u8 = 0x66;
/// Originator ID of frames sent by the heater MCU.
pub const HEATER_ID: u8 = 0x77;

/// Controller frames declare their total length.
pub const CONTROLLER_FRAME_DECLARED_LEN: u8 = 0x0B;
/// Heater frames declare their payload length (excluding the 3-byte
/// header and the checksum).
pub const HEATER_FRAME_DECLARED_LEN: u8 = 0x34;

pub const CONTROLLER_FRAME_LEN: usize = CONTROLLER_FRAME_DECLARED_LEN as usize;
pub const HEATER_FRAME_LEN: usize = 3 + HEATER_FRAME_DECLARED_LEN as usize + 1;

/// Power levels are 1..=10, i.e. 10 % steps.
pub const MIN_POWER_LEVEL: u8 = 1;
pub const MAX_POWER_LEVEL: u8 = 10;

// ---------------------------------------------------------------------------
// Heater phase (reported)
// ---------------------------------------------------------------------------

/// Combustion phase reported by the heater in every status frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeaterPhase {
    Off,
    Poll,
    HeatingUp,
    Stable,
    Cooling,
    #[default]
    Unknown,
}

impl HeaterPhase {
    /// Decode the phase byte.  Bytes outside the known set map to
    /// [`HeaterPhase::Unknown`] rather than failing the frame.
    pub const fn from_byte(b: u8) -> Self {
        match b {
            0x00 => Self::Off,
            0x01 => Self::Poll,
            0x02 => Self::HeatingUp,
            0x03 => Self::Stable,
            0x04 => Self::Cooling,
            _ => Self::Unknown,
        }
    }

    pub const fn to_byte(self) -> u8 {
        match self {
            Self::Off => 0x00,
            Self::Poll => 0x01,
            Self::HeatingUp => 0x02,
            Self::Stable => 0x03,
            Self::Cooling => 0x04,
            Self::Unknown => 0xFF,
        }
    }

    /// Poll, heating-up and stable combustion count as "heating".
    pub const fn is_heating(self) -> bool {
        matches!(self, Self::Poll | Self::HeatingUp | Self::Stable)
    }

    /// Display text used by the state sensor.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Off => "Off",
            Self::Poll => "Polling",
            Self::HeatingUp => "Heating Up",
            Self::Stable => "Stable",
            Self::Cooling => "Cooling",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for HeaterPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Controller command (sent)
// ---------------------------------------------------------------------------

/// Command byte carried by every controller frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ControllerCommand {
    #[default]
    Off = 0x02,
    Start = 0x06,
    Running = 0x08,
}

impl ControllerCommand {
    pub const ALL: [Self; 3] = [Self::Off, Self::Start, Self::Running];

    pub const fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x02 => Some(Self::Off),
            0x06 => Some(Self::Start),
            0x08 => Some(Self::Running),
            _ => None,
        }
    }

    pub const fn to_byte(self) -> u8 {
        self as u8
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Start => "START",
            Self::Running => "RUNNING",
        }
    }
}

impl fmt::Display for ControllerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Clamp an arbitrary level into the range the heater accepts.
pub fn clamp_power_level(level: u8) -> u8 {
    level.clamp(MIN_POWER_LEVEL, MAX_POWER_LEVEL)
}
