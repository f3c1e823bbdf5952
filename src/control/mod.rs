//! Closed-loop and rule-based power governors used by the control modes.

pub mod antifreeze;
pub mod pi;
