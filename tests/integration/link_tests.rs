//! Integration tests for the heater link: timeout, recovery and frame
//! corruption on the bus.

use crate::control_tests::Rig;
use crate::mock_hw::{MockStorage, status};

use sunster::app::events::HeaterEvent;
use sunster::arbiter::ControlMode;
use sunster::config::HeaterConfig;
use sunster::error::Fault;
use sunster::protocol::codec::{encode_heater, offset};
use sunster::protocol::{ControllerCommand, HeaterPhase};

#[test]
fn link_survives_4900_ms_and_drops_at_5100_ms() {
    let mut rig = Rig::new(ControlMode::Manual);
    rig.tick_with(0, HeaterPhase::Off);
    assert!(rig.svc.view(0).connected);

    rig.tick(4_900);
    assert!(rig.svc.view(4_900).connected);
    assert_eq!(rig.sink.count(|e| *e == HeaterEvent::LinkDown), 0);

    rig.tick(5_100);
    let view = rig.svc.view(5_100);
    assert!(!view.connected);
    assert!(view.status.is_none());
    assert_eq!(rig.svc.phase(), HeaterPhase::Unknown);
    assert_eq!(rig.sink.count(|e| *e == HeaterEvent::LinkDown), 1);
    assert!(rig.sink.contains(&HeaterEvent::FaultRaised(Fault::LinkTimeout)));

    // One event per outage.
    rig.tick(6_100);
    assert_eq!(rig.sink.count(|e| *e == HeaterEvent::LinkDown), 1);
}

#[test]
fn link_recovers_on_next_frame() {
    let mut rig = Rig::new(ControlMode::Manual);
    rig.tick_with(0, HeaterPhase::Off);
    rig.tick(6_000);
    rig.tick_with(7_000, HeaterPhase::Off);

    assert!(rig.svc.view(7_000).connected);
    assert!(rig.sink.contains(&HeaterEvent::FaultCleared(Fault::LinkTimeout)));
    assert_eq!(rig.sink.count(|e| *e == HeaterEvent::LinkUp), 2);
}

#[test]
fn unknown_phase_keeps_previous_command() {
    let mut rig = Rig::new(ControlMode::Manual);
    rig.tick_with(0, HeaterPhase::Stable);
    assert_eq!(rig.svc.command(), ControllerCommand::Running);

    rig.tick(5_500);
    assert_eq!(rig.svc.phase(), HeaterPhase::Unknown);
    assert_eq!(rig.svc.command(), ControllerCommand::Running);
}

#[test]
fn one_corrupt_frame_in_five_is_dropped() {
    let mut rig = Rig::new(ControlMode::Manual);
    let good = encode_heater(&status(HeaterPhase::Off, 12.8));
    let mut bad = good;
    bad[offset::FAN_RPM + 1] ^= 0x01;

    for (i, frame) in [good, good, bad, good, good].iter().enumerate() {
        rig.uart.rx.extend_from_slice(frame);
        rig.svc.poll_uart(i as u64 * 200, &mut rig.uart, &mut rig.sink);
    }

    assert_eq!(rig.svc.link().good_frames(), 4);
    assert_eq!(rig.svc.link().bad_frames(), 1);
    assert_eq!(
        rig.sink.count(|e| matches!(e, HeaterEvent::FaultRaised(Fault::BadFrame(_)))),
        1
    );
}

#[test]
fn passive_sniff_never_transmits() {
    let config = HeaterConfig {
        passive_sniff: true,
        ..HeaterConfig::default()
    };
    let mut rig = Rig::with_storage(config, MockStorage::new());
    rig.tick_with(0, HeaterPhase::Off);
    rig.tick_with(1_000, HeaterPhase::Off);
    assert!(rig.uart.tx.is_empty());
    assert!(rig.svc.view(1_000).connected);
}
