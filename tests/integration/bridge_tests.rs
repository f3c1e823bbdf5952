//! End-to-end tests: entity writes through the bridge and command channel
//! into the control loop, and entity state back out through the publisher.

use crate::control_tests::Rig;
use crate::mock_hw::RecordingEntitySink;

use embassy_sync::channel::Channel;
use sunster::app::channels::CommandChannel;
use sunster::app::events::HeaterEvent;
use sunster::arbiter::ControlMode;
use sunster::bridge::climate::ClimateCall;
use sunster::bridge::entities::{CLIMATE_KEY, EntityValue, POWER_SWITCH_KEY};
use sunster::bridge::publisher::Publisher;
use sunster::bridge::HeaterBridge;
use sunster::error::RejectReason;
use sunster::protocol::{ControllerCommand, HeaterPhase};

#[test]
fn climate_heat_reaches_the_heater() {
    let channel: CommandChannel = Channel::new();
    let bridge = HeaterBridge::new(channel.sender());
    let mut rig = Rig::new(ControlMode::Manual);

    bridge
        .climate_control(&ClimateCall {
            mode: Some("heat"),
            fan_mode: Some("60%"),
            ..ClimateCall::default()
        })
        .unwrap();
    assert_eq!(rig.svc.drain_commands(&channel, &mut rig.sink), 2);

    rig.tick_with(0, HeaterPhase::Off);
    assert_eq!(rig.uart.last_command(), Some((ControllerCommand::Start, 6)));
}

#[test]
fn power_level_write_outside_manual_is_rejected() {
    let channel: CommandChannel = Channel::new();
    let bridge = HeaterBridge::new(channel.sender());
    let mut rig = Rig::new(ControlMode::Automatic);

    bridge.write_entity("power_level", "50").unwrap();
    rig.svc.drain_commands(&channel, &mut rig.sink);

    assert!(rig.sink.events.iter().any(|e| matches!(
        e,
        HeaterEvent::CommandRejected {
            reason: RejectReason::PowerLevelNotManual,
            ..
        }
    )));
    assert_eq!(rig.svc.context().manual_power_level, 8);
}

#[test]
fn out_of_range_tuning_write_changes_nothing() {
    let channel: CommandChannel = Channel::new();
    let bridge = HeaterBridge::new(channel.sender());
    let mut rig = Rig::new(ControlMode::Manual);
    let before = rig.svc.context().tuning;

    bridge.write_entity("pi_kp", "500").unwrap();
    rig.svc.drain_commands(&channel, &mut rig.sink);
    assert_eq!(rig.svc.context().tuning, before);
}

#[test]
fn publisher_reflects_service_state() {
    let channel: CommandChannel = Channel::new();
    let bridge = HeaterBridge::new(channel.sender());
    let mut rig = Rig::new(ControlMode::Manual);
    let mut publisher = Publisher::new();
    let mut entities = RecordingEntitySink::new();

    // Before the first heater frame the switch reads off once.
    publisher.publish(0, &rig.svc.view(0), &mut entities);
    publisher.publish(600, &rig.svc.view(600), &mut entities);
    assert_eq!(entities.latest(POWER_SWITCH_KEY), Some(&EntityValue::Bool(false)));
    assert_eq!(entities.latest("state"), Some(&EntityValue::Unavailable));

    bridge.write_switch(true).unwrap();
    rig.svc.drain_commands(&channel, &mut rig.sink);
    rig.tick_with(1_000, HeaterPhase::Off);
    rig.tick_with(2_000, HeaterPhase::HeatingUp);
    publisher.publish(2_000, &rig.svc.view(2_000), &mut entities);

    assert_eq!(entities.latest(POWER_SWITCH_KEY), Some(&EntityValue::Bool(true)));
    assert_eq!(entities.latest("state"), Some(&EntityValue::Text("Heating Up")));
    match entities.latest(CLIMATE_KEY) {
        Some(EntityValue::Climate(c)) => {
            assert_eq!(c.preset, "Manual");
            assert_eq!(c.fan_mode, "80%");
        }
        other => panic!("climate not published: {other:?}"),
    }
}
