//! Frame codec for the Sunster serial protocol.
//!
//! Wire format (all multi-byte integers big-endian):
//! ```text
//! ┌──────┬────┬──────────┬──────────────────┬──────────┐
//! │ 0xAA │ ID │ LEN (1B) │ body             │ XOR (1B) │
//! └──────┴────┴──────────┴──────────────────┴──────────┘
//!   ID 0x66 controller: LEN = 0x0B (total), 11 bytes on the wire
//!   ID 0x77 heater:     LEN = 0x34 (payload), 57 bytes on the wire
//! ```
//!
//! The checksum is the XOR of every preceding byte.  The streaming
//! [`FrameDecoder`] hunts for `0xAA` followed by a known ID, waits for the
//! full frame, validates it, and on a checksum or length failure discards a
//! single byte and hunts again.

use core::fmt;

use heapless::Deque;
use log::{debug, warn};

use super::telemetry::HeaterStatus;
use super::{
    CONTROLLER_FRAME_DECLARED_LEN, CONTROLLER_FRAME_LEN, CONTROLLER_ID, ControllerCommand,
    FRAME_START, HEATER_FRAME_DECLARED_LEN, HEATER_FRAME_LEN, HEATER_ID, clamp_power_level,
};

/// Byte offsets inside a heater status frame.
pub mod offset {
    pub const PHASE: usize = 4;
    pub const POWER_LEVEL: usize = 5;
    pub const VOLTAGE: usize = 6;
    pub const HEAT_EXCHANGER_TEMP: usize = 8;
    pub const INTAKE_TEMP: usize = 10;
    pub const FAN_RPM: usize = 12;
    pub const PUMP_HZ: usize = 14;
    pub const GLOW_PLUG: usize = 16;
    pub const STATE_DURATION: usize = 17;

    /// Controller frame fields.
    pub const COMMAND: usize = 3;
    pub const CONTROLLER_POWER: usize = 4;
}

/// Receive buffer capacity: two heater frames plus slack.
const DECODER_CAPACITY: usize = 128;

/// Temperatures outside this band are sensor garbage.
const TEMPERATURE_MIN_C: f32 = -50.0;
const TEMPERATURE_MAX_C: f32 = 100.0;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// First byte is not `0xAA`.
    BadStart,
    /// Originator ID is neither controller nor heater.
    BadId,
    /// Declared length does not match the ID, or extra bytes follow.
    LengthMismatch,
    /// XOR checksum mismatch.
    BadChecksum,
    /// Fewer bytes than the frame requires.
    Truncated,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadStart => write!(f, "bad start byte"),
            Self::BadId => write!(f, "unknown originator id"),
            Self::LengthMismatch => write!(f, "length mismatch"),
            Self::BadChecksum => write!(f, "checksum mismatch"),
            Self::Truncated => write!(f, "truncated frame"),
        }
    }
}

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

/// A validated controller frame (ours, echoed, or a real handheld's).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerFrame {
    pub command_byte: u8,
    pub power_level: u8,
}

impl ControllerFrame {
    pub fn command(&self) -> Option<ControllerCommand> {
        ControllerCommand::from_byte(self.command_byte)
    }
}

/// A validated heater status frame.  Field extraction lives in
/// [`HeaterStatus::from_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaterFrame {
    raw: [u8; HEATER_FRAME_LEN],
}

impl HeaterFrame {
    pub fn bytes(&self) -> &[u8; HEATER_FRAME_LEN] {
        &self.raw
    }

    pub fn byte(&self, at: usize) -> u8 {
        self.raw[at]
    }

    pub fn u16_at(&self, at: usize) -> u16 {
        u16::from_be_bytes([self.raw[at], self.raw[at + 1]])
    }

    /// Signed 0.1 °C reading; out-of-band values become NaN.
    pub fn temperature_at(&self, at: usize) -> f32 {
        decode_temperature(self.u16_at(at) as i16)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Frame {
    Controller(ControllerFrame),
    Heater(HeaterFrame),
}

// ---------------------------------------------------------------------------
// Encode / parse
// ---------------------------------------------------------------------------

/// XOR of every byte in `bytes`.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

/// Build a controller frame.  The power level is clamped to 1..=10.
pub fn encode(cmd: ControllerCommand, power_level: u8) -> [u8; CONTROLLER_FRAME_LEN] {
    let mut frame = [0u8; CONTROLLER_FRAME_LEN];
    frame[0] = FRAME_START;
    frame[1] = CONTROLLER_ID;
    frame[2] = CONTROLLER_FRAME_DECLARED_LEN;
    frame[offset::COMMAND] = cmd.to_byte();
    frame[offset::CONTROLLER_POWER] = clamp_power_level(power_level);
    frame[CONTROLLER_FRAME_LEN - 1] = checksum(&frame[..CONTROLLER_FRAME_LEN - 1]);
    frame
}

/// Build a heater status frame.  Used by the bench simulator and tests.
pub fn encode_heater(status: &HeaterStatus) -> [u8; HEATER_FRAME_LEN] {
    let mut frame = [0u8; HEATER_FRAME_LEN];
    frame[0] = FRAME_START;
    frame[1] = HEATER_ID;
    frame[2] = HEATER_FRAME_DECLARED_LEN;
    frame[offset::PHASE] = status.phase.to_byte();
    frame[offset::POWER_LEVEL] = status.power_level;
    put_u16(&mut frame, offset::VOLTAGE, scaled(status.input_voltage));
    put_u16(
        &mut frame,
        offset::HEAT_EXCHANGER_TEMP,
        encode_temperature(status.heat_exchanger_temperature) as u16,
    );
    put_u16(
        &mut frame,
        offset::INTAKE_TEMP,
        encode_temperature(status.intake_temperature) as u16,
    );
    put_u16(&mut frame, offset::FAN_RPM, status.fan_rpm);
    put_u16(&mut frame, offset::PUMP_HZ, scaled(status.pump_hz));
    frame[offset::GLOW_PLUG] = u8::from(status.glow_plug_on);
    put_u16(&mut frame, offset::STATE_DURATION, status.state_duration_secs);
    frame[HEATER_FRAME_LEN - 1] = checksum(&frame[..HEATER_FRAME_LEN - 1]);
    frame
}

/// Validate one complete frame.
pub fn parse(bytes: &[u8]) -> Result<Frame, DecodeError> {
    if bytes.len() < 3 {
        return Err(DecodeError::Truncated);
    }
    if bytes[0] != FRAME_START {
        return Err(DecodeError::BadStart);
    }
    let (declared, len) = expected_len(bytes[1]).ok_or(DecodeError::BadId)?;
    if bytes[2] != declared {
        return Err(DecodeError::LengthMismatch);
    }
    if bytes.len() < len {
        return Err(DecodeError::Truncated);
    }
    if bytes.len() > len {
        return Err(DecodeError::LengthMismatch);
    }
    if checksum(&bytes[..len - 1]) != bytes[len - 1] {
        return Err(DecodeError::BadChecksum);
    }

    if bytes[1] == HEATER_ID {
        let mut raw = [0u8; HEATER_FRAME_LEN];
        raw.copy_from_slice(bytes);
        Ok(Frame::Heater(HeaterFrame { raw }))
    } else {
        Ok(Frame::Controller(ControllerFrame {
            command_byte: bytes[offset::COMMAND],
            power_level: bytes[offset::CONTROLLER_POWER],
        }))
    }
}

/// (declared length byte, total frame length) for an originator ID.
fn expected_len(id: u8) -> Option<(u8, usize)> {
    match id {
        CONTROLLER_ID => Some((CONTROLLER_FRAME_DECLARED_LEN, CONTROLLER_FRAME_LEN)),
        HEATER_ID => Some((HEATER_FRAME_DECLARED_LEN, HEATER_FRAME_LEN)),
        _ => None,
    }
}

fn decode_temperature(raw: i16) -> f32 {
    let t = f32::from(raw) / 10.0;
    if (TEMPERATURE_MIN_C..=TEMPERATURE_MAX_C).contains(&t) {
        t
    } else {
        f32::NAN
    }
}

fn encode_temperature(t: f32) -> i16 {
    if t.is_finite() {
        (t * 10.0).round() as i16
    } else {
        i16::MAX
    }
}

fn scaled(v: f32) -> u16 {
    (v * 10.0).round() as u16
}

fn put_u16(frame: &mut [u8], at: usize, v: u16) {
    frame[at..at + 2].copy_from_slice(&v.to_be_bytes());
}

// ---------------------------------------------------------------------------
// Streaming decoder
// ---------------------------------------------------------------------------

/// Reassembles frames from an arbitrary byte stream.
pub struct FrameDecoder {
    buf: Deque<u8, DECODER_CAPACITY>,
    synced: bool,
    length_warned: bool,
}

impl FrameDecoder {
    pub const fn new() -> Self {
        Self {
            buf: Deque::new(),
            synced: false,
            length_warned: false,
        }
    }

    /// True while the decoder sits on a candidate preamble.
    pub fn is_synced(&self) -> bool {
        self.synced
    }

    /// Push `data` and hand every completed frame (or failure) to `on_frame`.
    pub fn feed<F>(&mut self, data: &[u8], mut on_frame: F)
    where
        F: FnMut(Result<Frame, DecodeError>),
    {
        for &b in data {
            if self.buf.is_full() {
                self.drain(&mut on_frame);
            }
            if self.buf.is_full() {
                // Nothing frame-shaped in a full buffer: drop the oldest byte.
                self.buf.pop_front();
                self.synced = false;
            }
            // Capacity was just ensured.
            let _ = self.buf.push_back(b);
        }
        self.drain(&mut on_frame);
    }

    /// Forget buffered bytes (e.g. after a UART reinitialisation).
    pub fn reset(&mut self) {
        self.buf.clear();
        self.synced = false;
    }

    fn drain<F>(&mut self, on_frame: &mut F)
    where
        F: FnMut(Result<Frame, DecodeError>),
    {
        while let Some(result) = self.next_frame() {
            on_frame(result);
        }
    }

    fn next_frame(&mut self) -> Option<Result<Frame, DecodeError>> {
        if !self.synced && !self.hunt() {
            return None;
        }

        let mut head = self.buf.iter().copied();
        let id = head.nth(1)?;
        let declared = head.next()?;
        let (expected_declared, len) = expected_len(id)?;

        if declared != expected_declared {
            if id == HEATER_ID && !self.length_warned {
                warn!(
                    "Heater frame declares length 0x{:02X}; only 0x{:02X} is supported",
                    declared, expected_declared
                );
                self.length_warned = true;
            }
            return Some(Err(self.resync(DecodeError::LengthMismatch)));
        }

        if self.buf.len() < len {
            return None;
        }

        let mut scratch = [0u8; HEATER_FRAME_LEN];
        for (dst, src) in scratch.iter_mut().zip(self.buf.iter()) {
            *dst = *src;
        }

        match parse(&scratch[..len]) {
            Ok(frame) => {
                for _ in 0..len {
                    self.buf.pop_front();
                }
                self.synced = false;
                Some(Ok(frame))
            }
            Err(e) => Some(Err(self.resync(e))),
        }
    }

    /// Drop one byte and hunt again.
    fn resync(&mut self, e: DecodeError) -> DecodeError {
        debug!("Frame rejected ({e}), resyncing");
        self.buf.pop_front();
        self.synced = false;
        e
    }

    /// Discard bytes until the buffer starts with a known preamble.
    fn hunt(&mut self) -> bool {
        loop {
            let (first, second) = {
                let mut it = self.buf.iter().copied();
                (it.next(), it.next())
            };
            match (first, second) {
                (None, _) | (Some(FRAME_START), None) => return false,
                (Some(FRAME_START), Some(CONTROLLER_ID | HEATER_ID)) => {
                    self.synced = true;
                    return true;
                }
                _ => {
                    self.buf.pop_front();
                }
            }
        }
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}
