//! Integration tests for the operator → mode controller → heater command
//! pipeline, driven through `HeaterService::tick` with mock adapters.

use crate::mock_hw::{MockRtc, MockStorage, MockUart, RecordingSink};

use sunster::app::commands::OperatorCommand;
use sunster::app::events::HeaterEvent;
use sunster::app::service::HeaterService;
use sunster::arbiter::ControlMode;
use sunster::config::{HeaterConfig, TuningParam};
use sunster::error::Fault;
use sunster::protocol::{ControllerCommand, HeaterPhase};

pub struct Rig {
    pub svc: HeaterService,
    pub uart: MockUart,
    pub rtc: MockRtc,
    pub nvs: MockStorage,
    pub sink: RecordingSink,
}

impl Rig {
    pub fn new(initial_mode: ControlMode) -> Self {
        let config = HeaterConfig {
            initial_mode,
            ..HeaterConfig::default()
        };
        Self::with_storage(config, MockStorage::new())
    }

    pub fn with_storage(config: HeaterConfig, nvs: MockStorage) -> Self {
        let mut svc = HeaterService::new(config);
        let mut sink = RecordingSink::new();
        svc.start(0, &nvs, &mut sink);
        Self {
            svc,
            uart: MockUart::new(),
            rtc: MockRtc(Some(20_000)),
            nvs,
            sink,
        }
    }

    pub fn cmd(&mut self, cmd: OperatorCommand) {
        self.svc
            .handle_command(cmd, &mut self.sink)
            .expect("command accepted");
    }

    pub fn tick(&mut self, now_ms: u64) {
        self.svc
            .tick(now_ms, &mut self.uart, &self.rtc, &mut self.nvs, &mut self.sink);
    }

    /// The heater answers with `phase` at 12.8 V, then the controller ticks.
    pub fn tick_with(&mut self, now_ms: u64, phase: HeaterPhase) {
        self.uart.push_phase(phase, 12.8);
        self.tick(now_ms);
    }
}

// ── Cold start in AUTOMATIC ───────────────────────────────────

#[test]
fn cold_start_ignites_and_runs() {
    let mut rig = Rig::new(ControlMode::Automatic);
    rig.cmd(OperatorCommand::SetExternalTemperature(Some(15.0)));
    rig.cmd(OperatorCommand::SetTuning(TuningParam::TargetTemperature, 22.0));

    rig.tick_with(0, HeaterPhase::Off);
    assert_eq!(rig.uart.last_command(), Some((ControllerCommand::Start, 7)));

    rig.tick_with(1_000, HeaterPhase::HeatingUp);
    assert_eq!(rig.svc.command(), ControllerCommand::Running);

    rig.tick_with(2_000, HeaterPhase::Stable);
    assert_eq!(
        rig.uart.last_command().map(|(c, _)| c),
        Some(ControllerCommand::Running)
    );
    assert!(rig.svc.is_heating());
    assert_eq!(rig.uart.tx.len(), 3, "one frame per active tick");

    assert!(rig.sink.contains(&HeaterEvent::CommandChanged {
        from: ControllerCommand::Off,
        to: ControllerCommand::Start,
    }));
    assert!(rig.sink.contains(&HeaterEvent::PhaseChanged {
        from: HeaterPhase::HeatingUp,
        to: HeaterPhase::Stable,
    }));
}

#[test]
fn automatic_without_room_temperature_stays_off() {
    let mut rig = Rig::new(ControlMode::Automatic);
    for t in 0..5u64 {
        rig.tick_with(t * 1_000, HeaterPhase::Off);
    }
    assert_eq!(rig.svc.command(), ControllerCommand::Off);
    assert_eq!(rig.svc.context().pi.output(), 0.0);
}

// ── Short-cycle prevention ────────────────────────────────────

#[test]
fn heater_runs_thirty_seconds_after_stable_before_stopping() {
    let mut rig = Rig::new(ControlMode::Automatic);
    rig.cmd(OperatorCommand::SetTuning(TuningParam::OffDelay, 0.0));
    rig.cmd(OperatorCommand::SetExternalTemperature(Some(15.0)));

    rig.tick_with(0, HeaterPhase::Off);
    rig.tick_with(1_000, HeaterPhase::HeatingUp);
    rig.tick_with(2_000, HeaterPhase::Stable);
    assert_eq!(rig.svc.command(), ControllerCommand::Running);

    // Room overshoots: the regulator output collapses to zero.
    rig.cmd(OperatorCommand::SetExternalTemperature(Some(25.0)));
    let mut now = 3_000;
    while now < 32_000 {
        rig.tick_with(now, HeaterPhase::Stable);
        assert_eq!(
            rig.svc.command(),
            ControllerCommand::Running,
            "stopped early at {now} ms"
        );
        now += 1_000;
    }

    rig.tick_with(32_000, HeaterPhase::Stable);
    assert_eq!(rig.svc.command(), ControllerCommand::Off);
}

/// Tick once a second from `from` to `until` (inclusive) with a STABLE
/// heater, asserting the controller keeps it running.
fn assert_keeps_running(rig: &mut Rig, from: u64, until: u64) {
    let mut now = from;
    while now <= until {
        rig.tick_with(now, HeaterPhase::Stable);
        assert_eq!(
            rig.svc.command(),
            ControllerCommand::Running,
            "stopped early at {now} ms"
        );
        now += 1_000;
    }
}

#[test]
fn overshoot_waits_out_default_off_delay() {
    let mut rig = Rig::new(ControlMode::Automatic);
    rig.cmd(OperatorCommand::SetExternalTemperature(Some(15.0)));

    rig.tick_with(0, HeaterPhase::Off);
    assert_eq!(rig.svc.command(), ControllerCommand::Start);
    for now in (1_000..10_000).step_by(1_000) {
        rig.tick_with(now, HeaterPhase::HeatingUp);
        assert_eq!(rig.svc.command(), ControllerCommand::Running);
    }
    rig.tick_with(10_000, HeaterPhase::Stable);

    // Output drops to zero at 11 s; the 60 s off-delay runs from there.
    rig.cmd(OperatorCommand::SetExternalTemperature(Some(25.0)));
    assert_keeps_running(&mut rig, 11_000, 70_000);

    rig.tick_with(71_000, HeaterPhase::Stable);
    assert_eq!(rig.svc.command(), ControllerCommand::Off);
    assert_eq!(rig.uart.last_command().map(|(c, _)| c), Some(ControllerCommand::Off));
}

#[test]
fn switching_burning_heater_to_automatic_keeps_it_running() {
    let mut rig = Rig::new(ControlMode::Manual);
    rig.cmd(OperatorCommand::SetPower(true));
    rig.tick_with(0, HeaterPhase::Off);
    rig.tick_with(1_000, HeaterPhase::HeatingUp);
    rig.tick_with(2_000, HeaterPhase::Stable);
    assert_eq!(rig.svc.command(), ControllerCommand::Running);

    // Room already at target: zero output from the first regulator step.
    rig.cmd(OperatorCommand::SetExternalTemperature(Some(20.0)));
    rig.cmd(OperatorCommand::SelectMode(ControlMode::Automatic));
    assert_keeps_running(&mut rig, 3_000, 62_000);

    rig.tick_with(63_000, HeaterPhase::Stable);
    assert_eq!(rig.svc.command(), ControllerCommand::Off);
}

#[test]
fn switching_to_automatic_with_no_off_delay_still_honours_min_on() {
    let mut rig = Rig::new(ControlMode::Manual);
    rig.cmd(OperatorCommand::SetTuning(TuningParam::OffDelay, 0.0));
    rig.cmd(OperatorCommand::SetPower(true));
    rig.tick_with(0, HeaterPhase::Off);
    rig.tick_with(1_000, HeaterPhase::HeatingUp);
    rig.tick_with(2_000, HeaterPhase::Stable);

    rig.cmd(OperatorCommand::SetExternalTemperature(Some(20.0)));
    rig.cmd(OperatorCommand::SelectMode(ControlMode::Automatic));
    assert_keeps_running(&mut rig, 3_000, 31_000);

    rig.tick_with(32_000, HeaterPhase::Stable);
    assert_eq!(rig.svc.command(), ControllerCommand::Off);
}

#[test]
fn master_switch_off_stops_automatic() {
    let mut rig = Rig::new(ControlMode::Automatic);
    rig.cmd(OperatorCommand::SetExternalTemperature(Some(10.0)));
    rig.tick_with(0, HeaterPhase::Off);
    assert_eq!(rig.svc.command(), ControllerCommand::Start);

    rig.cmd(OperatorCommand::SetPower(false));
    rig.tick_with(1_000, HeaterPhase::HeatingUp);
    assert_eq!(rig.svc.command(), ControllerCommand::Off);
    assert!(!rig.svc.view(1_000).master_enabled);
}

// ── Antifreeze ladder ─────────────────────────────────────────

#[test]
fn antifreeze_ladder_through_service() {
    let mut rig = Rig::new(ControlMode::Antifreeze);
    let trace: [(f32, Option<u8>); 7] = [
        (10.0, None),
        (8.0, Some(3)),
        (6.0, Some(7)),
        (2.0, Some(10)),
        (5.0, Some(7)),
        (9.0, Some(3)),
        (10.0, None),
    ];

    for (i, (temp, level)) in trace.iter().enumerate() {
        rig.cmd(OperatorCommand::SetExternalTemperature(Some(*temp)));
        rig.tick_with(i as u64 * 1_000, HeaterPhase::Off);
        match level {
            Some(level) => {
                assert_eq!(rig.svc.command(), ControllerCommand::Start, "at {temp} C");
                assert_eq!(rig.svc.power_level(), *level, "at {temp} C");
            }
            None => assert_eq!(rig.svc.command(), ControllerCommand::Off, "at {temp} C"),
        }
    }
}

#[test]
fn leaving_antifreeze_keeps_heater_running_in_manual() {
    let mut rig = Rig::new(ControlMode::Antifreeze);
    rig.cmd(OperatorCommand::SetExternalTemperature(Some(1.0)));
    rig.tick_with(0, HeaterPhase::Off);
    assert!(!rig.svc.context().operator_on);
    rig.tick_with(1_000, HeaterPhase::Stable);
    assert_eq!(rig.svc.command(), ControllerCommand::Running);

    rig.cmd(OperatorCommand::SelectMode(ControlMode::Manual));
    rig.tick_with(2_000, HeaterPhase::Stable);
    assert_eq!(rig.svc.mode(), ControlMode::Manual);
    assert!(rig.svc.context().operator_on);
    assert_eq!(rig.svc.command(), ControllerCommand::Running);
    assert!(rig.sink.contains(&HeaterEvent::ModeChanged {
        from: ControlMode::Antifreeze,
        to: ControlMode::Manual,
    }));
}

// ── Voltage interlock ─────────────────────────────────────────

#[test]
fn start_withheld_below_start_voltage() {
    let mut rig = Rig::new(ControlMode::Manual);
    rig.cmd(OperatorCommand::SetPower(true));

    rig.uart.push_phase(HeaterPhase::Off, 12.0);
    rig.tick(0);
    assert_eq!(rig.svc.command(), ControllerCommand::Off);
    assert!(rig.svc.view(0).low_voltage_error);
    assert!(rig.sink.contains(&HeaterEvent::FaultRaised(Fault::UnderVoltageStart)));
    assert!(
        rig.uart
            .sent_commands()
            .iter()
            .all(|(c, _)| *c != ControllerCommand::Start)
    );

    rig.uart.push_phase(HeaterPhase::Off, 12.8);
    rig.tick(1_000);
    assert_eq!(rig.svc.command(), ControllerCommand::Start);
    assert!(!rig.svc.view(1_000).low_voltage_error);
}

#[test]
fn manual_power_level_reaches_the_wire() {
    let mut rig = Rig::new(ControlMode::Manual);
    rig.cmd(OperatorCommand::SetPowerPercent(40.0));
    rig.cmd(OperatorCommand::SetPower(true));
    rig.tick_with(0, HeaterPhase::Off);
    assert_eq!(rig.uart.last_command(), Some((ControllerCommand::Start, 4)));
}
