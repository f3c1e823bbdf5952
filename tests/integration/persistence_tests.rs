//! Integration tests for tuning and fuel persistence across restarts.

use crate::control_tests::Rig;
use crate::mock_hw::{MockRtc, MockStorage, status};

use sunster::app::commands::OperatorCommand;
use sunster::app::events::HeaterEvent;
use sunster::arbiter::ControlMode;
use sunster::config::{HeaterConfig, TUNING_VERSION, TuningConfig, TuningParam};
use sunster::error::Fault;
use sunster::fuel::FuelCounters;
use sunster::persistence::{CONFIG_NAMESPACE, FUEL_KEY, FUEL_NAMESPACE, TUNING_KEY};
use sunster::protocol::HeaterPhase;

fn reboot(nvs: MockStorage) -> Rig {
    Rig::with_storage(HeaterConfig::default(), nvs)
}

#[test]
fn tuning_write_survives_reboot() {
    let mut rig = Rig::new(ControlMode::Manual);
    rig.cmd(OperatorCommand::SetTuning(TuningParam::Kp, 7.5));
    rig.tick(0);
    assert!(rig.sink.events.iter().any(|e| matches!(
        e,
        HeaterEvent::Saved { tuning: true, .. }
    )));

    let rig = reboot(rig.nvs);
    assert_eq!(rig.svc.context().tuning.pi_kp, 7.5);
}

#[test]
fn tuning_writes_in_one_tick_are_coalesced() {
    let mut rig = Rig::new(ControlMode::Manual);
    rig.tick(0);
    let before = rig.nvs.writes;

    rig.cmd(OperatorCommand::SetTuning(TuningParam::Kp, 7.5));
    rig.cmd(OperatorCommand::SetTuning(TuningParam::Ki, 0.8));
    rig.cmd(OperatorCommand::SetTuning(TuningParam::TargetTemperature, 21.0));
    rig.tick(1_000);
    assert_eq!(rig.nvs.writes - before, 1);

    rig.tick(2_000);
    assert_eq!(rig.nvs.writes - before, 1, "nothing left to save");
}

#[test]
fn old_tuning_version_resets_to_defaults_and_saves() {
    let stale = TuningConfig {
        version: 2,
        pi_kp: 7.5,
        ..TuningConfig::default()
    };
    let mut nvs = MockStorage::new();
    nvs.put(
        CONFIG_NAMESPACE,
        TUNING_KEY,
        &postcard::to_allocvec(&stale).unwrap(),
    );

    let mut rig = reboot(nvs);
    assert_eq!(rig.svc.context().tuning, TuningConfig::default());

    rig.tick(0);
    let stored = rig.nvs.get(CONFIG_NAMESPACE, TUNING_KEY).unwrap();
    let saved: TuningConfig = postcard::from_bytes(stored).unwrap();
    assert_eq!(saved.version, TUNING_VERSION);
    assert_eq!(saved.pi_kp, TuningConfig::default().pi_kp);
}

#[test]
fn corrupt_record_raises_fault_and_uses_defaults() {
    let mut nvs = MockStorage::new();
    nvs.put(CONFIG_NAMESPACE, TUNING_KEY, &[3, 0xFF]);

    let rig = reboot(nvs);
    assert!(rig.sink.contains(&HeaterEvent::FaultRaised(Fault::PersistenceCorrupt)));
    assert_eq!(rig.svc.context().tuning, TuningConfig::default());
}

#[test]
fn fuel_reset_persists_and_survives_reboot() {
    let mut rig = Rig::new(ControlMode::Manual);
    let mut burning = status(HeaterPhase::Stable, 12.8);
    burning.pump_hz = 4.0;

    for t in 0..=10u64 {
        rig.uart.push_status(&burning);
        rig.tick(t * 1_000);
    }
    let pulses = rig.svc.fuel_counters().total_pulses;
    assert!((pulses - 40.0).abs() < 0.01, "pulses = {pulses}");

    rig.cmd(OperatorCommand::ResetTotalConsumption);
    rig.tick(11_000);
    let rig = reboot(rig.nvs);
    assert!(rig.svc.fuel_counters().total_pulses < 4.01);
}

#[test]
fn day_rollover_zeroes_daily_once_and_persists() {
    let mut nvs = MockStorage::new();
    let counters = FuelCounters {
        daily_ml: 12.0,
        last_reset_day: 19_999,
        total_pulses: 1_000.0,
        ..FuelCounters::default()
    };
    nvs.put(FUEL_NAMESPACE, FUEL_KEY, &postcard::to_allocvec(&counters).unwrap());

    let mut rig = reboot(nvs);
    assert_eq!(rig.svc.view(0).daily_ml, 12.0);

    rig.tick(0);
    rig.tick(1_000);
    assert_eq!(rig.svc.view(1_000).daily_ml, 0.0);
    assert_eq!(
        rig.sink.count(|e| matches!(e, HeaterEvent::DayRollover { day: 20_000 })),
        1
    );

    let stored = rig.nvs.get(FUEL_NAMESPACE, FUEL_KEY).unwrap();
    let saved: FuelCounters = postcard::from_bytes(stored).unwrap();
    assert_eq!(saved.last_reset_day, 20_000);
    assert_eq!(saved.total_pulses, 1_000.0);
}

#[test]
fn unsynced_clock_defers_rollover() {
    let mut rig = Rig::new(ControlMode::Manual);
    rig.rtc = MockRtc(None);
    rig.tick(0);
    rig.tick(1_000);
    assert_eq!(
        rig.sink.count(|e| *e == HeaterEvent::FaultRaised(Fault::RtcUnsynced)),
        1
    );
    assert_eq!(rig.svc.fuel_counters().last_reset_day, 0);
}
