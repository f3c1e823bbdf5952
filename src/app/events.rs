//! Outbound application events.
//!
//! The [`HeaterService`](super::service::HeaterService) emits these through
//! the [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log to serial, forward to the
//! home-automation surface, count them in a test.

use crate::arbiter::ControlMode;
use crate::error::{Fault, RejectReason};
use crate::protocol::{ControllerCommand, HeaterPhase};

use super::commands::OperatorCommand;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeaterEvent {
    /// The service has started (carries the initial mode).
    Started(ControlMode),

    /// Operator switched the control mode.
    ModeChanged { from: ControlMode, to: ControlMode },

    /// The heater reported a different phase.
    PhaseChanged { from: HeaterPhase, to: HeaterPhase },

    /// The command byte sent to the heater changed.
    CommandChanged {
        from: ControllerCommand,
        to: ControllerCommand,
    },

    /// First valid heater frame after boot or after an outage.
    LinkUp,

    /// No valid heater frame within the communication timeout.
    LinkDown,

    /// A fault was raised.
    FaultRaised(Fault),

    /// A previously raised fault cleared.
    FaultCleared(Fault),

    /// An operator command was refused.
    CommandRejected {
        command: OperatorCommand,
        reason: RejectReason,
    },

    /// The daily fuel counter rolled over to a new day.
    DayRollover { day: u32 },

    /// Persisted records were written.
    Saved { tuning: bool, fuel: bool },
}
