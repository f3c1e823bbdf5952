//! Heater link layer.
//!
//! Owns the UART side of the protocol: drains received bytes through the
//! streaming [`FrameDecoder`], tracks liveness, and rate-limits outgoing
//! controller frames.
//!
//! ```text
//!   UartPort ──bytes──▶ FrameDecoder ──frames──▶ RxSummary ──▶ service
//!   service ──(cmd, level)──▶ maybe_transmit ──encode──▶ UartPort
//! ```
//!
//! The heater only answers when polled, so a controller frame is sent on
//! every due tick even when nothing changed.

use log::{debug, info, warn};

use crate::app::ports::UartPort;
use crate::protocol::ControllerCommand;
use crate::protocol::codec::{self, DecodeError, Frame, FrameDecoder};
use crate::protocol::telemetry::HeaterStatus;

/// Minimum spacing between two transmitted frames.
pub const SEND_INTERVAL_MS: u64 = 1_000;
/// The link is considered down after this long without a valid frame.
pub const COMMUNICATION_TIMEOUT_MS: u64 = 5_000;
/// More bad frames than this per minute is worth a warning.
pub const BAD_FRAME_WARN_PER_MINUTE: u32 = 5;

const BAD_FRAME_WINDOW_MS: u64 = 60_000;
const READ_CHUNK: usize = 64;

/// Result of one RX drain.
#[derive(Debug, Default, Clone, Copy)]
pub struct RxSummary {
    /// Most recent valid heater status in this drain.
    pub latest: Option<HeaterStatus>,
    /// Valid heater frames decoded.
    pub heater_frames: u32,
    /// Valid controller frames seen (our echo or a real handheld).
    pub controller_frames: u32,
    /// Decode failures.
    pub errors: u32,
    pub last_error: Option<DecodeError>,
    /// First valid frame after an outage (or after boot).
    pub link_restored: bool,
}

pub struct HeaterLink {
    decoder: FrameDecoder,
    passive_sniff: bool,
    last_rx_ms: Option<u64>,
    last_tx_ms: Option<u64>,
    link_up: bool,
    good_frames: u32,
    bad_frames: u32,
    window_start_ms: u64,
    window_bad: u32,
    window_warned: bool,
}

impl HeaterLink {
    pub fn new(passive_sniff: bool) -> Self {
        if passive_sniff {
            info!("Heater link in passive sniff mode: transmit disabled");
        }
        Self {
            decoder: FrameDecoder::new(),
            passive_sniff,
            last_rx_ms: None,
            last_tx_ms: None,
            link_up: false,
            good_frames: 0,
            bad_frames: 0,
            window_start_ms: 0,
            window_bad: 0,
            window_warned: false,
        }
    }

    /// Read every pending byte from `uart` and decode what it completes.
    pub fn drain_rx<U: UartPort>(&mut self, uart: &mut U, now_ms: u64) -> RxSummary {
        let mut summary = RxSummary::default();
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            let n = uart.read_available(&mut chunk);
            if n == 0 {
                break;
            }
            self.decoder.feed(&chunk[..n], |result| match result {
                Ok(Frame::Heater(frame)) => {
                    summary.latest = Some(HeaterStatus::from_frame(&frame));
                    summary.heater_frames += 1;
                }
                Ok(Frame::Controller(c)) => {
                    summary.controller_frames += 1;
                    debug!(
                        "Controller frame on bus: cmd=0x{:02X} ({}) level={}",
                        c.command_byte,
                        c.command().map_or("?", ControllerCommand::as_str),
                        c.power_level
                    );
                }
                Err(e) => {
                    summary.errors += 1;
                    summary.last_error = Some(e);
                }
            });
        }

        self.record_bad_frames(now_ms, summary.errors);

        if summary.heater_frames > 0 {
            self.good_frames = self.good_frames.saturating_add(summary.heater_frames);
            self.last_rx_ms = Some(now_ms);
            if !self.link_up {
                self.link_up = true;
                summary.link_restored = true;
                info!("Heater link up");
            }
        }
        summary
    }

    /// Mark the link down once the timeout elapses.  Returns `true`
    /// exactly once per outage.
    pub fn check_timeout(&mut self, now_ms: u64) -> bool {
        if self.link_up && !self.is_connected(now_ms) {
            self.link_up = false;
            warn!(
                "No heater frame for {} ms, link down",
                COMMUNICATION_TIMEOUT_MS
            );
            return true;
        }
        false
    }

    /// Send a controller frame if `interval_ms` has elapsed since the
    /// previous one.  Never transmits in passive sniff mode.  The interval
    /// is floored at [`SEND_INTERVAL_MS`].
    pub fn maybe_transmit<U: UartPort>(
        &mut self,
        uart: &mut U,
        now_ms: u64,
        interval_ms: u64,
        cmd: ControllerCommand,
        power_level: u8,
    ) -> bool {
        if self.passive_sniff {
            return false;
        }
        let interval = interval_ms.max(SEND_INTERVAL_MS);
        if let Some(last) = self.last_tx_ms {
            if now_ms.saturating_sub(last) < interval {
                return false;
            }
        }

        let frame = codec::encode(cmd, power_level);
        self.last_tx_ms = Some(now_ms);
        match uart.write_frame(&frame) {
            Ok(()) => {
                debug!("TX {} level={}", cmd, frame[codec::offset::CONTROLLER_POWER]);
                true
            }
            Err(e) => {
                warn!("Heater TX failed: {}", e);
                false
            }
        }
    }

    pub fn is_connected(&self, now_ms: u64) -> bool {
        self.last_rx_ms
            .is_some_and(|t| now_ms.saturating_sub(t) < COMMUNICATION_TIMEOUT_MS)
    }

    pub fn is_synced(&self) -> bool {
        self.decoder.is_synced()
    }

    pub fn passive_sniff(&self) -> bool {
        self.passive_sniff
    }

    pub fn last_rx_ms(&self) -> Option<u64> {
        self.last_rx_ms
    }

    pub fn last_tx_ms(&self) -> Option<u64> {
        self.last_tx_ms
    }

    pub fn good_frames(&self) -> u32 {
        self.good_frames
    }

    pub fn bad_frames(&self) -> u32 {
        self.bad_frames
    }

    fn record_bad_frames(&mut self, now_ms: u64, count: u32) {
        if count == 0 {
            return;
        }
        self.bad_frames = self.bad_frames.saturating_add(count);

        if now_ms.saturating_sub(self.window_start_ms) >= BAD_FRAME_WINDOW_MS {
            self.window_start_ms = now_ms;
            self.window_bad = 0;
            self.window_warned = false;
        }
        self.window_bad = self.window_bad.saturating_add(count);

        if self.window_bad > BAD_FRAME_WARN_PER_MINUTE && !self.window_warned {
            warn!(
                "{} bad heater frames in the last minute (total {})",
                self.window_bad, self.bad_frames
            );
            self.window_warned = true;
        } else {
            debug!("Bad heater frame (total {})", self.bad_frames);
        }
    }
}
