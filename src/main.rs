//! Sunster heater controller: main entry point.
//!
//! Hexagonal architecture around a single cooperative control loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HeaterUart     Esp32Clock      NvsAdapter     LogEventSink    │
//! │  (UartPort)     (CalendarPort)  (StoragePort)  LogEntitySink   │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │            HeaterService (pure logic)                  │    │
//! │  │  Link · Modes · PI · Antifreeze · Safety · Fuel        │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  console thread ─▶ HeaterBridge ─▶ COMMANDS ─▶ control loop    │
//! │  control loop ─▶ Publisher ─▶ LogEntitySink                    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::io::BufRead;
use std::time::Duration;

use anyhow::{Result, anyhow};
use embassy_sync::channel::Channel;
use log::{error, info, warn};

use sunster::adapters::log_sink::{LogEntitySink, LogEventSink};
use sunster::adapters::nvs::NvsAdapter;
use sunster::adapters::time::Esp32Clock;
use sunster::adapters::uart::HeaterUart;
use sunster::app::channels::CommandChannel;
use sunster::app::service::HeaterService;
use sunster::bridge::HeaterBridge;
use sunster::bridge::publisher::Publisher;
use sunster::config::HeaterConfig;
use sunster::link::SEND_INTERVAL_MS;

/// Operator writes, console thread → control loop.
static COMMANDS: CommandChannel = Channel::new();

/// Fast tick: UART drain and entity publication.
const FAST_TICK_MS: u64 = 50;

// ── Console transport ─────────────────────────────────────────
//
// Reads `key=value` entity writes from the serial console and hands them
// to the bridge.  Blocking reads stay on their own thread; the channel is
// the only shared state.

fn spawn_console() -> Result<()> {
    std::thread::Builder::new()
        .name("console".into())
        .stack_size(4096)
        .spawn(|| {
            let bridge = HeaterBridge::new(COMMANDS.sender());
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { continue };
                let Some((key, value)) = line.split_once('=') else {
                    warn!("console: expected key=value, got {:?}", line);
                    continue;
                };
                if let Err(e) = bridge.write_entity(key.trim(), value) {
                    warn!("console: {} rejected: {}", key.trim(), e);
                }
            }
        })?;
    Ok(())
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Sunster heater v{}               ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Configuration ──────────────────────────────────────
    let config = HeaterConfig::default();
    config.validate().map_err(|e| anyhow!("{}", e))?;
    info!(
        "Config: mode={} poll={}ms sniff={} start>={:.1}V run>={:.1}V",
        config.initial_mode,
        config.polling_interval_ms,
        config.passive_sniff,
        config.min_voltage_start,
        config.min_voltage_operate
    );

    // ── 3. Adapters ───────────────────────────────────────────
    let mut nvs = match NvsAdapter::new() {
        Ok(n) => n,
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults and no persistence", e);
            NvsAdapter::default()
        }
    };
    let clock = Esp32Clock::new();
    let mut uart = HeaterUart::new().map_err(|e| anyhow!("{}", e))?;
    let mut events = LogEventSink::new();
    let mut entities = LogEntitySink::new();
    let mut publisher = Publisher::new();

    // ── 4. Service ────────────────────────────────────────────
    let mut service = HeaterService::new(config);
    service.start(clock.now_ms(), &nvs, &mut events);

    if let Err(e) = spawn_console() {
        error!("console thread failed to start: {}", e);
    }

    // ── 5. Control loop ───────────────────────────────────────
    let mut next_tick_ms = clock.now_ms();
    loop {
        let now = clock.now_ms();

        service.poll_uart(now, &mut uart, &mut events);

        // Operator writes pull the control tick forward.  The link spaces
        // transmissions by `tick_interval_ms()` on its own.
        let taken = service.drain_commands(&COMMANDS, &mut events);
        if taken > 0 || now >= next_tick_ms {
            service.tick(now, &mut uart, &clock, &mut nvs, &mut events);
            next_tick_ms = now + SEND_INTERVAL_MS;
        }

        publisher.publish(now, &service.view(now), &mut entities);

        std::thread::sleep(Duration::from_millis(FAST_TICK_MS));
    }
}
