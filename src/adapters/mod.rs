//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements    | Connects to                     |
//! |------------|---------------|---------------------------------|
//! | `log_sink` | EventSink     | Serial log output               |
//! |            | EntitySink    | JSON state lines                |
//! | `nvs`      | StoragePort   | NVS / in-memory store           |
//! | `time`     | CalendarPort  | ESP32 system timer, RTC / SNTP  |
//! | `uart`     | UartPort      | Heater bus UART / loopback      |

pub mod log_sink;
pub mod nvs;
pub mod time;
pub mod uart;
