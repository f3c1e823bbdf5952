//! Control-mode arbiter.
//!
//! A function-pointer mode table decides *what the operator wants the
//! heater to do* each tick:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  ModeTable                                                   │
//! │  ┌────────────┬───────────┬──────────┬───────────────────┐   │
//! │  │ ControlMode│ on_enter  │ on_exit  │ on_update         │   │
//! │  ├────────────┼───────────┼──────────┼───────────────────┤   │
//! │  │ Manual     │ fn(ctx)   │    -     │ operator on/level │   │
//! │  │ Automatic  │ fn(ctx)   │ fn(ctx)  │ PI regulator      │   │
//! │  │ Antifreeze │ fn(ctx)   │ fn(ctx)  │ band ladder       │   │
//! │  └────────────┴───────────┴──────────┴───────────────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every `on_update` writes [`Demand`](context::Demand) into the context.
//! Mode changes only happen on operator request via
//! [`ModeMachine::select`]; the exit hook of the old mode runs before the
//! enter hook of the new one.

pub mod context;
pub mod modes;

use core::fmt;
use core::str::FromStr;

use context::ArbiterContext;
use log::info;
use serde::{Deserialize, Serialize};

use crate::protocol::{ControllerCommand, HeaterPhase};

// ---------------------------------------------------------------------------
// Mode identity
// ---------------------------------------------------------------------------

/// Operator-selectable control mode.
/// Must stay in sync with the table built in [`modes::build_mode_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ControlMode {
    Manual = 0,
    Automatic = 1,
    Antifreeze = 2,
}

impl ControlMode {
    /// Total number of modes, used to size the table array.
    pub const COUNT: usize = 3;

    pub const ALL: [Self; Self::COUNT] = [Self::Manual, Self::Automatic, Self::Antifreeze];

    /// Convert an index back to `ControlMode`.  Out-of-range indices fall
    /// back to `Manual`.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            1 => Self::Automatic,
            2 => Self::Antifreeze,
            _ => Self::Manual,
        }
    }

    /// Option text on the select entity and climate preset name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "Manual",
            Self::Automatic => "Automatic",
            Self::Antifreeze => "Antifreeze",
        }
    }
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown option text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownMode;

impl FromStr for ControlMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or(UnknownMode)
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` / `on_exit` / `on_update` handlers.
pub type ModeActionFn = fn(&mut ArbiterContext);

// ---------------------------------------------------------------------------
// Mode descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single control mode.
pub struct ModeDescriptor {
    pub name: &'static str,
    pub on_enter: Option<ModeActionFn>,
    pub on_exit: Option<ModeActionFn>,
    pub on_update: ModeActionFn,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct ModeMachine {
    /// Fixed-size table indexed by `ControlMode as usize`.
    table: [ModeDescriptor; ControlMode::COUNT],
    current: usize,
}

impl ModeMachine {
    pub fn new(table: [ModeDescriptor; ControlMode::COUNT], initial: ControlMode) -> Self {
        Self {
            table,
            current: initial as usize,
        }
    }

    /// Run the initial `on_enter`.  Call once before the first `tick()`.
    pub fn start(&mut self, ctx: &mut ArbiterContext) {
        info!("Control mode at start: {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Run the current mode's `on_update`.
    pub fn tick(&mut self, ctx: &mut ArbiterContext) {
        (self.table[self.current].on_update)(ctx);
    }

    /// Switch mode on operator request.  Returns `false` if already there.
    pub fn select(&mut self, next: ControlMode, ctx: &mut ArbiterContext) -> bool {
        if next as usize == self.current {
            return false;
        }
        let next_idx = next as usize;
        info!(
            "Control mode: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
        true
    }

    pub fn current_mode(&self) -> ControlMode {
        ControlMode::from_index(self.current)
    }
}

/// Map the demand and reported phase to the command byte.
///
/// An `Unknown` phase keeps the previous command so a glitch never
/// starts or stops the heater on its own.
pub fn desired_command(
    demand_on: bool,
    phase: HeaterPhase,
    previous: ControllerCommand,
) -> ControllerCommand {
    match (demand_on, phase) {
        (_, HeaterPhase::Unknown) => previous,
        (false, _) | (true, HeaterPhase::Cooling) => ControllerCommand::Off,
        (true, HeaterPhase::Off) => ControllerCommand::Start,
        (true, HeaterPhase::Poll | HeaterPhase::HeatingUp | HeaterPhase::Stable) => {
            ControllerCommand::Running
        }
    }
}
