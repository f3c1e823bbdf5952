//! GPIO / peripheral assignments for the controller board.
//!
//! Single source of truth: the UART adapter references this module rather
//! than hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Heater bus (single-wire, half-duplex, TX and RX joined through a diode)
// ---------------------------------------------------------------------------

/// UART peripheral wired to the heater bus.
pub const HEATER_UART_PORT: u8 = 1;
/// Controller → heater.
pub const HEATER_UART_TX_GPIO: i32 = 17;
/// Heater → controller (also echoes our own transmissions).
pub const HEATER_UART_RX_GPIO: i32 = 16;
/// Bus speed, 8N1.
pub const HEATER_BAUD: u32 = 9_600;
/// RX ring buffer in the UART driver (bytes).
pub const HEATER_UART_RX_BUFFER: usize = 256;
