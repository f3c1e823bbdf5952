//! Application service, the hexagonal core.
//!
//! [`HeaterService`] owns the link layer, the mode machine, the safety
//! interlock, the fuel integrator and the persistence bookkeeping.  It
//! exposes a hardware-agnostic API; all I/O flows through port traits
//! injected at call sites, so the whole controller runs against mocks on
//! the host.
//!
//! ```text
//!   UartPort ◀──▶ ┌──────────────────────────────┐ ──▶ EventSink
//! CalendarPort ──▶│        HeaterService         │
//!  StoragePort ◀─▶│ Link · Modes · Safety · Fuel │ ──▶ HeaterView
//!                 └──────────────────────────────┘
//!                       ▲ OperatorCommand (channel)
//! ```
//!
//! One control tick runs, in order: RX drain → telemetry apply → link
//! timeout → mode controller → desired command → safety interlock → TX
//! (rate-limited) → fuel integration → persistence flush.

use log::{info, warn};

use crate::arbiter::context::ArbiterContext;
use crate::arbiter::modes::build_mode_table;
use crate::arbiter::{ControlMode, ModeMachine, desired_command};
use crate::config::{HeaterConfig, TuningParam};
use crate::error::{Fault, RejectReason, SafetyFault};
use crate::fuel::{FuelCounters, FuelIntegrator};
use crate::link::{HeaterLink, RxSummary, SEND_INTERVAL_MS};
use crate::persistence::{LoadStatus, PersistenceManager};
use crate::protocol::{ControllerCommand, HeaterPhase, MAX_POWER_LEVEL, MIN_POWER_LEVEL, clamp_power_level};
use crate::safety::{SafetyInterlock, SafetyVerdict};

use super::channels::CommandChannel;
use super::commands::OperatorCommand;
use super::events::HeaterEvent;
use super::ports::{CalendarPort, EventSink, StoragePort, UartPort};
use super::view::HeaterView;

// ───────────────────────────────────────────────────────────────
// HeaterService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct HeaterService {
    config: HeaterConfig,
    link: HeaterLink,
    modes: ModeMachine,
    ctx: ArbiterContext,
    safety: SafetyInterlock,
    fuel: FuelIntegrator,
    persistence: PersistenceManager,
    /// Mode-level command before the interlock; kept across `Unknown` phases.
    desired: ControllerCommand,
    /// Command on the wire.
    command: ControllerCommand,
    power_level: u8,
    last_phase: HeaterPhase,
    state_synced_once: bool,
    tick_count: u64,
}

impl HeaterService {
    /// Construct the service from configuration.
    ///
    /// Does **not** load persisted state; call [`start`](Self::start) next.
    pub fn new(config: HeaterConfig) -> Self {
        let ctx = ArbiterContext::new(&config);
        let power_level = ctx.manual_power_level;
        Self {
            link: HeaterLink::new(config.passive_sniff),
            modes: ModeMachine::new(build_mode_table(), config.initial_mode),
            ctx,
            safety: SafetyInterlock::new(&config),
            fuel: FuelIntegrator::new(FuelCounters::default()),
            persistence: PersistenceManager::new(),
            desired: ControllerCommand::Off,
            command: ControllerCommand::Off,
            power_level,
            last_phase: HeaterPhase::Unknown,
            state_synced_once: false,
            tick_count: 0,
            config,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Load persisted tuning and fuel counters, then enter the initial mode.
    pub fn start(&mut self, now_ms: u64, storage: &impl StoragePort, sink: &mut impl EventSink) {
        let tuning = self.persistence.load_tuning(storage, self.config.tuning);
        report_load(tuning.status, sink);
        self.ctx.tuning = tuning.value;
        let target = self.config.clamp_target(self.ctx.tuning.target_temperature);
        if target != self.ctx.tuning.target_temperature {
            warn!(
                "Stored target {:.1}\u{00b0}C outside {:.1}..{:.1}, using {:.1}",
                self.ctx.tuning.target_temperature,
                self.config.min_temperature,
                self.config.max_temperature,
                target
            );
            self.ctx.tuning.target_temperature = target;
            self.persistence.mark_tuning_dirty();
        }

        let fuel = self.persistence.load_fuel(storage);
        report_load(fuel.status, sink);
        self.fuel.restore(fuel.value);

        self.ctx.now_ms = now_ms;
        self.modes.start(&mut self.ctx);
        let mode = self.modes.current_mode();
        sink.emit(&HeaterEvent::Started(mode));
        info!(
            "HeaterService started in {} (target {:.1}\u{00b0}C, {:.1} ml today)",
            mode,
            self.ctx.tuning.target_temperature,
            self.fuel.daily_ml()
        );
    }

    // ── Fast tick ─────────────────────────────────────────────

    /// Drain the UART and apply any completed heater frames.
    pub fn poll_uart(&mut self, now_ms: u64, uart: &mut impl UartPort, sink: &mut impl EventSink) {
        let rx = self.link.drain_rx(uart, now_ms);
        self.apply_rx(&rx, sink);
    }

    // ── Operator commands ─────────────────────────────────────

    /// Apply every queued operator command.  Returns how many were taken.
    pub fn drain_commands(&mut self, channel: &CommandChannel, sink: &mut impl EventSink) -> usize {
        let mut taken = 0;
        while let Ok(cmd) = channel.try_receive() {
            // Rejections are already reported through the sink.
            let _ = self.handle_command(cmd, sink);
            taken += 1;
        }
        taken
    }

    /// Apply one operator command.  Rejected commands leave all state
    /// untouched and are reported as [`HeaterEvent::CommandRejected`].
    pub fn handle_command(
        &mut self,
        cmd: OperatorCommand,
        sink: &mut impl EventSink,
    ) -> Result<(), RejectReason> {
        let result = self.apply_command(cmd, sink);
        if let Err(reason) = result {
            warn!("Operator command {:?} rejected: {}", cmd, reason);
            sink.emit(&HeaterEvent::CommandRejected {
                command: cmd,
                reason,
            });
        }
        result
    }

    fn apply_command(
        &mut self,
        cmd: OperatorCommand,
        sink: &mut impl EventSink,
    ) -> Result<(), RejectReason> {
        match cmd {
            OperatorCommand::SetPower(on) => {
                if self.ctx.master_enabled != on || self.ctx.operator_on != on {
                    info!("Power switch {}", if on { "on" } else { "off" });
                }
                self.ctx.master_enabled = on;
                self.ctx.operator_on = on;
            }
            OperatorCommand::SelectMode(mode) => {
                let from = self.modes.current_mode();
                if self.modes.select(mode, &mut self.ctx) {
                    sink.emit(&HeaterEvent::ModeChanged { from, to: mode });
                }
            }
            OperatorCommand::SetPowerPercent(percent) => {
                if self.modes.current_mode() != ControlMode::Manual {
                    return Err(RejectReason::PowerLevelNotManual);
                }
                if !percent.is_finite() {
                    return Err(RejectReason::NotFinite);
                }
                let min = f32::from(MIN_POWER_LEVEL) * 10.0;
                let max = f32::from(MAX_POWER_LEVEL) * 10.0;
                if !(min..=max).contains(&percent) {
                    return Err(RejectReason::OutOfRange("power level"));
                }
                let level = (percent / 10.0).round() as u8;
                if level != self.ctx.manual_power_level {
                    info!("Manual power level {} -> {}", self.ctx.manual_power_level, level);
                }
                self.ctx.set_manual_power_level(level);
            }
            OperatorCommand::SetTuning(param, value) => {
                if param == TuningParam::TargetTemperature
                    && value.is_finite()
                    && !(self.config.min_temperature..=self.config.max_temperature).contains(&value)
                {
                    return Err(RejectReason::OutOfRange(param.name()));
                }
                if self.ctx.tuning.apply(param, value)? {
                    info!("Tuning {} = {}", param.name(), value);
                    self.persistence.mark_tuning_dirty();
                }
            }
            OperatorCommand::SetExternalTemperature(reading) => {
                self.ctx.set_external_temperature(reading);
            }
            OperatorCommand::ResetDailyConsumption => self.fuel.reset_daily(),
            OperatorCommand::ResetTotalConsumption => self.fuel.reset_total(),
        }
        Ok(())
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one full control cycle.
    pub fn tick(
        &mut self,
        now_ms: u64,
        uart: &mut impl UartPort,
        rtc: &impl CalendarPort,
        storage: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        self.tick_count += 1;
        self.ctx.now_ms = now_ms;

        // 1. RX drain + telemetry apply
        let rx = self.link.drain_rx(uart, now_ms);
        self.apply_rx(&rx, sink);

        // 2. Link timeout
        if self.link.check_timeout(now_ms) {
            self.ctx.status = None;
            sink.emit(&HeaterEvent::LinkDown);
            sink.emit(&HeaterEvent::FaultRaised(Fault::LinkTimeout));
            self.note_phase(HeaterPhase::Unknown, sink);
        }

        // 3. Mode controller
        self.modes.tick(&mut self.ctx);

        // 4. Desired command, post-processed by the interlock
        let phase = self.ctx.phase();
        self.desired = desired_command(self.ctx.demand.on, phase, self.desired);
        let voltage = self
            .ctx
            .status
            .map(|s| s.input_voltage)
            .filter(|v| v.is_finite());
        let verdict = self.safety.evaluate(voltage, self.desired, phase.is_heating());
        self.apply_verdict(&verdict, sink);

        // 5. TX (rate-limited)
        self.power_level = clamp_power_level(self.ctx.demand.power_level);
        let interval = self.tick_interval_ms();
        self.link
            .maybe_transmit(uart, now_ms, interval, self.command, self.power_level);

        // 6. Fuel integration
        let pump_hz = self.ctx.status.map_or(0.0, |s| s.pump_hz);
        let day = rtc.day_ordinal();
        let step = self
            .fuel
            .integrate(now_ms, pump_hz, self.ctx.tuning.injected_per_pulse, day);
        if step.day_rolled {
            if let Some(day) = day {
                sink.emit(&HeaterEvent::DayRollover { day });
            }
        }
        if step.rtc_unsynced {
            sink.emit(&HeaterEvent::FaultRaised(Fault::RtcUnsynced));
        }

        // 7. Persistence flush (tuning writes of this tick coalesce here)
        if self.fuel.take_dirty() {
            self.persistence.mark_fuel_dirty();
        }
        if self.persistence.is_dirty() {
            let report = self
                .persistence
                .flush(storage, &self.ctx.tuning, self.fuel.counters());
            if report.tuning_saved || report.fuel_saved {
                sink.emit(&HeaterEvent::Saved {
                    tuning: report.tuning_saved,
                    fuel: report.fuel_saved,
                });
            }
        }
    }

    /// Spacing of heater polls: one second while the heater burns, cools
    /// down or is asked to run, the configured polling interval otherwise.
    pub fn tick_interval_ms(&self) -> u64 {
        if self.is_active() {
            SEND_INTERVAL_MS
        } else {
            u64::from(self.config.polling_interval_ms).max(SEND_INTERVAL_MS)
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Snapshot for the entity publisher.
    pub fn view(&self, now_ms: u64) -> HeaterView {
        let ipp = self.ctx.tuning.injected_per_pulse;
        let pump_hz = self.ctx.status.map_or(0.0, |s| s.pump_hz);
        HeaterView {
            mode: self.modes.current_mode(),
            connected: self.link.is_connected(now_ms),
            synced_once: self.state_synced_once,
            status: self.ctx.status,
            external_temperature: self.ctx.external_temperature,
            operator_on: self.ctx.operator_on,
            master_enabled: self.ctx.master_enabled,
            manual_power_level: self.ctx.manual_power_level,
            commanded_power_level: self.power_level,
            command: self.command,
            tuning: self.ctx.tuning,
            low_voltage_error: self.safety.has_faults(),
            pi_output: self.ctx.pi.output(),
            antifreeze_active: self.ctx.antifreeze.is_active(),
            daily_ml: self.fuel.daily_ml(),
            total_ml: self.fuel.total_ml(ipp),
            hourly_ml_per_h: FuelIntegrator::hourly_rate(pump_hz, ipp),
            min_temperature: self.config.min_temperature,
            max_temperature: self.config.max_temperature,
        }
    }

    /// The heater reports an actively heating phase.
    pub fn is_heating(&self) -> bool {
        self.ctx.phase().is_heating()
    }

    pub fn mode(&self) -> ControlMode {
        self.modes.current_mode()
    }

    pub fn phase(&self) -> HeaterPhase {
        self.ctx.phase()
    }

    /// Command byte currently sent to the heater.
    pub fn command(&self) -> ControllerCommand {
        self.command
    }

    pub fn power_level(&self) -> u8 {
        self.power_level
    }

    /// Active safety fault bitmask (0 = no faults).
    pub fn fault_flags(&self) -> u8 {
        self.safety.faults()
    }

    pub fn link(&self) -> &HeaterLink {
        &self.link
    }

    pub fn context(&self) -> &ArbiterContext {
        &self.ctx
    }

    pub fn fuel_counters(&self) -> &FuelCounters {
        self.fuel.counters()
    }

    /// Total control ticks executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    // ── Internal ──────────────────────────────────────────────

    fn is_active(&self) -> bool {
        let phase = self.ctx.phase();
        self.ctx.demand.on || phase.is_heating() || phase == HeaterPhase::Cooling
    }

    fn apply_rx(&mut self, rx: &RxSummary, sink: &mut impl EventSink) {
        if let Some(e) = rx.last_error {
            sink.emit(&HeaterEvent::FaultRaised(Fault::BadFrame(e)));
        }

        let Some(status) = rx.latest else {
            return;
        };

        if rx.link_restored {
            if self.state_synced_once {
                sink.emit(&HeaterEvent::FaultCleared(Fault::LinkTimeout));
            }
            sink.emit(&HeaterEvent::LinkUp);
        }

        self.ctx.status = Some(status);

        if !self.state_synced_once {
            self.state_synced_once = true;
            if status.phase.is_heating() && !self.ctx.operator_on {
                info!(
                    "Heater already {} at first contact, power switch on",
                    status.phase
                );
                self.ctx.operator_on = true;
            }
        }

        self.note_phase(status.phase, sink);
    }

    fn note_phase(&mut self, phase: HeaterPhase, sink: &mut impl EventSink) {
        if phase != self.last_phase {
            info!("Heater phase: {} -> {}", self.last_phase, phase);
            sink.emit(&HeaterEvent::PhaseChanged {
                from: self.last_phase,
                to: phase,
            });
            self.last_phase = phase;
        }
    }

    fn apply_verdict(&mut self, verdict: &SafetyVerdict, sink: &mut impl EventSink) {
        for fault in SafetyFault::ALL {
            if verdict.raised & fault.mask() != 0 {
                sink.emit(&HeaterEvent::FaultRaised(fault.into()));
            }
            if verdict.cleared & fault.mask() != 0 {
                sink.emit(&HeaterEvent::FaultCleared(fault.into()));
            }
        }

        if verdict.force_off && self.ctx.operator_on {
            warn!("Under-voltage while running: heater switched off");
            self.ctx.operator_on = false;
        }

        if verdict.command != self.command {
            info!("Heater command: {} -> {}", self.command, verdict.command);
            sink.emit(&HeaterEvent::CommandChanged {
                from: self.command,
                to: verdict.command,
            });
            self.command = verdict.command;
        }
    }
}

fn report_load(status: LoadStatus, sink: &mut impl EventSink) {
    if status == LoadStatus::Corrupt {
        sink.emit(&HeaterEvent::FaultRaised(Fault::PersistenceCorrupt));
    }
}
