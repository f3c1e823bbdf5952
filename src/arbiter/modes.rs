//! Concrete mode handler functions and table builder.
//!
//! ```text
//!   MANUAL ◀──[operator select]──▶ AUTOMATIC
//!      ▲                               ▲
//!      └────[operator select]──▶ ANTIFREEZE
//! ```
//!
//! Leaving AUTOMATIC or ANTIFREEZE copies the current demand into the
//! operator on/off, so a heater that was running keeps running in MANUAL.

use super::context::{ArbiterContext, Demand};
use super::{ControlMode, ModeDescriptor};
use log::{info, warn};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static mode table.  Called once at startup.
pub fn build_mode_table() -> [ModeDescriptor; ControlMode::COUNT] {
    [
        // 0: Manual
        ModeDescriptor {
            name: "Manual",
            on_enter: None,
            on_exit: None,
            on_update: manual_update,
        },
        // 1: Automatic
        ModeDescriptor {
            name: "Automatic",
            on_enter: Some(automatic_enter),
            on_exit: Some(automatic_exit),
            on_update: automatic_update,
        },
        // 2: Antifreeze
        ModeDescriptor {
            name: "Antifreeze",
            on_enter: Some(antifreeze_enter),
            on_exit: Some(antifreeze_exit),
            on_update: antifreeze_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  MANUAL
// ═══════════════════════════════════════════════════════════════════════════

fn manual_update(ctx: &mut ArbiterContext) {
    ctx.demand = Demand {
        on: ctx.operator_on,
        power_level: ctx.manual_power_level,
    };
}

// ═══════════════════════════════════════════════════════════════════════════
//  AUTOMATIC
// ═══════════════════════════════════════════════════════════════════════════

fn automatic_enter(ctx: &mut ArbiterContext) {
    info!(
        "AUTOMATIC: target {:.1}\u{00b0}C, Kp={} Ki={} Kd={}",
        ctx.tuning.target_temperature, ctx.tuning.pi_kp, ctx.tuning.pi_ki, ctx.tuning.pi_kd
    );
    ctx.pi.reset();
    let phase = ctx.phase();
    if ctx.demand.on || phase.is_heating() {
        ctx.pi.resume_on(phase, ctx.now_ms);
    }
    ctx.room_temperature_warned = false;
}

fn automatic_update(ctx: &mut ArbiterContext) {
    let now = ctx.now_ms;
    let phase = ctx.phase();
    ctx.pi.observe_phase(phase, now);
    ctx.pi.set_gate_enabled(ctx.master_enabled);

    let step = if let Some(room) = ctx.external_temperature {
        if ctx.room_temperature_warned {
            info!("AUTOMATIC: room temperature back ({:.1}\u{00b0}C)", room);
            ctx.room_temperature_warned = false;
        }
        ctx.pi.step(now, ctx.tuning.target_temperature, room, &ctx.tuning)
    } else {
        if !ctx.room_temperature_warned {
            warn!("AUTOMATIC: no room temperature, regulator held");
            ctx.room_temperature_warned = true;
        }
        ctx.pi.hold()
    };

    ctx.demand = Demand {
        on: step.heater_on,
        power_level: step.power_level,
    };
}

fn automatic_exit(ctx: &mut ArbiterContext) {
    ctx.operator_on = ctx.demand.on;
    ctx.pi.reset();
}

// ═══════════════════════════════════════════════════════════════════════════
//  ANTIFREEZE
// ═══════════════════════════════════════════════════════════════════════════

fn antifreeze_enter(ctx: &mut ArbiterContext) {
    let th = &ctx.antifreeze_thresholds;
    info!(
        "ANTIFREEZE: on<={:.1} medium<={:.1} low<={:.1} off>={:.1} (hyst {:.1})",
        th.on, th.medium, th.low, th.off, th.hysteresis
    );
    ctx.antifreeze.reset();
}

fn antifreeze_update(ctx: &mut ArbiterContext) {
    let ambient = ctx.ambient_temperature();
    let band = ctx.antifreeze.update(ambient, &ctx.antifreeze_thresholds);
    ctx.demand = Demand {
        on: ctx.antifreeze.is_active(),
        power_level: band.power_level(),
    };
}

fn antifreeze_exit(ctx: &mut ArbiterContext) {
    ctx.operator_on = ctx.demand.on;
    ctx.antifreeze.reset();
}

#[cfg(test)]
mod tests {
    use super::super::ModeMachine;
    use super::*;
    use crate::config::HeaterConfig;
    use crate::protocol::HeaterPhase;
    use crate::protocol::telemetry::HeaterStatus;

    fn machine(initial: ControlMode) -> (ModeMachine, ArbiterContext) {
        let mut ctx = ArbiterContext::new(&HeaterConfig::default());
        let mut m = ModeMachine::new(build_mode_table(), initial);
        m.start(&mut ctx);
        (m, ctx)
    }

    #[test]
    fn manual_follows_operator() {
        let (mut m, mut ctx) = machine(ControlMode::Manual);
        ctx.operator_on = true;
        ctx.set_manual_power_level(4);
        m.tick(&mut ctx);
        assert_eq!(
            ctx.demand,
            Demand {
                on: true,
                power_level: 4
            }
        );
    }

    #[test]
    fn automatic_starts_on_cold_room() {
        let (mut m, mut ctx) = machine(ControlMode::Automatic);
        ctx.tuning.target_temperature = 22.0;
        ctx.set_external_temperature(Some(15.0));
        m.tick(&mut ctx);
        assert!(ctx.demand.on);
        assert!(ctx.pi.output() >= 15.0);
    }

    #[test]
    fn automatic_respects_master_switch() {
        let (mut m, mut ctx) = machine(ControlMode::Automatic);
        ctx.master_enabled = false;
        ctx.tuning.target_temperature = 22.0;
        ctx.set_external_temperature(Some(15.0));
        m.tick(&mut ctx);
        assert!(!ctx.demand.on);
        assert!(ctx.pi.output() > 0.0);
    }

    #[test]
    fn automatic_holds_without_room_temperature() {
        let (mut m, mut ctx) = machine(ControlMode::Automatic);
        ctx.tuning.target_temperature = 22.0;
        ctx.set_external_temperature(Some(15.0));
        m.tick(&mut ctx);
        ctx.set_external_temperature(None);
        ctx.now_ms = 10_000;
        m.tick(&mut ctx);
        assert!(ctx.demand.on);
    }

    #[test]
    fn leaving_automatic_keeps_heater_running_in_manual() {
        let (mut m, mut ctx) = machine(ControlMode::Automatic);
        ctx.tuning.target_temperature = 22.0;
        ctx.set_external_temperature(Some(15.0));
        m.tick(&mut ctx);
        m.select(ControlMode::Manual, &mut ctx);
        assert!(ctx.operator_on);
        assert!(!ctx.pi.heater_on());
        assert_eq!(ctx.pi.output(), 0.0);
    }

    #[test]
    fn entering_automatic_keeps_burning_heater_on() {
        let (mut m, mut ctx) = machine(ControlMode::Manual);
        ctx.operator_on = true;
        ctx.status = Some(HeaterStatus {
            phase: HeaterPhase::Stable,
            ..HeaterStatus::default()
        });
        ctx.now_ms = 2_000;
        m.tick(&mut ctx);

        ctx.tuning.target_temperature = 20.0;
        ctx.set_external_temperature(Some(20.0));
        m.select(ControlMode::Automatic, &mut ctx);
        assert!(ctx.pi.heater_on());

        ctx.now_ms = 3_000;
        m.tick(&mut ctx);
        assert!(ctx.demand.on);
    }

    #[test]
    fn entering_automatic_with_heater_off_starts_gate_off() {
        let (mut m, mut ctx) = machine(ControlMode::Manual);
        ctx.status = Some(HeaterStatus {
            phase: HeaterPhase::Off,
            ..HeaterStatus::default()
        });
        m.tick(&mut ctx);
        m.select(ControlMode::Automatic, &mut ctx);
        assert!(!ctx.pi.heater_on());
    }

    #[test]
    fn antifreeze_uses_intake_sensor_when_room_missing() {
        let (mut m, mut ctx) = machine(ControlMode::Antifreeze);
        ctx.status = Some(HeaterStatus {
            phase: HeaterPhase::Off,
            intake_temperature: 1.0,
            ..HeaterStatus::default()
        });
        m.tick(&mut ctx);
        assert_eq!(
            ctx.demand,
            Demand {
                on: true,
                power_level: 10
            }
        );
    }

    #[test]
    fn leaving_antifreeze_clears_band() {
        let (mut m, mut ctx) = machine(ControlMode::Antifreeze);
        ctx.set_external_temperature(Some(5.0));
        m.tick(&mut ctx);
        assert!(ctx.antifreeze.is_active());
        m.select(ControlMode::Manual, &mut ctx);
        assert!(!ctx.antifreeze.is_active());
    }
}
