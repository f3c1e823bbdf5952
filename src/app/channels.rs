//! Operator command channel.
//!
//! Uses an `embassy-sync` bounded channel to hand operator writes from the
//! entity bridge to the synchronous control loop without heap allocation.
//!
//! ```text
//! ┌──────────────┐  OperatorCommand  ┌───────────────┐
//! │ HeaterBridge │──────────────────▶│ HeaterService │
//! │  (sender)    │                   │  (receiver)   │
//! └──────────────┘                   └───────────────┘
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Sender};

use super::commands::OperatorCommand;

/// Channel depth for operator commands.
pub const COMMAND_DEPTH: usize = 16;

/// Bridge → control loop.
pub type CommandChannel = Channel<CriticalSectionRawMutex, OperatorCommand, COMMAND_DEPTH>;

/// Sending half handed to the bridge.
pub type CommandSender<'a> = Sender<'a, CriticalSectionRawMutex, OperatorCommand, COMMAND_DEPTH>;
