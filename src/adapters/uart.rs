//! Heater bus UART adapter.
//!
//! Implements [`UartPort`] for the link layer.
//!
//! - **`target_os = "espidf"`**: ESP-IDF UART driver on
//!   [`pins::HEATER_UART_PORT`], 9600 8N1, configured with raw sys calls.
//!   Reads never block; the driver's RX ring buffer holds bytes between
//!   polls.
//! - **host**: [`LoopbackUart`], a byte queue for bench simulation and
//!   tests.

use crate::app::ports::{UartError, UartPort};
#[cfg(target_os = "espidf")]
use crate::pins;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;
#[cfg(target_os = "espidf")]
use log::{info, warn};

/// Errors during UART driver installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UartInitError {
    ParamConfig(i32),
    SetPin(i32),
    DriverInstall(i32),
}

impl core::fmt::Display for UartInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ParamConfig(rc)   => write!(f, "UART param config failed (rc={})", rc),
            Self::SetPin(rc)        => write!(f, "UART pin assignment failed (rc={})", rc),
            Self::DriverInstall(rc) => write!(f, "UART driver install failed (rc={})", rc),
        }
    }
}

// ── ESP-IDF driver ────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub struct HeaterUart {
    port: uart_port_t,
}

#[cfg(target_os = "espidf")]
impl HeaterUart {
    /// Install the UART driver for the heater bus.  Call once from `main()`.
    pub fn new() -> Result<Self, UartInitError> {
        let port = uart_port_t::from(pins::HEATER_UART_PORT);
        let config = uart_config_t {
            baud_rate: pins::HEATER_BAUD as i32,
            data_bits: uart_word_length_t_UART_DATA_8_BITS,
            parity: uart_parity_t_UART_PARITY_DISABLE,
            stop_bits: uart_stop_bits_t_UART_STOP_BITS_1,
            flow_ctrl: uart_hw_flowcontrol_t_UART_HW_FLOWCTRL_DISABLE,
            ..Default::default()
        };

        // SAFETY: called once from main() before the control loop starts.
        let ret = unsafe { uart_param_config(port, &config) };
        if ret != ESP_OK {
            return Err(UartInitError::ParamConfig(ret));
        }

        let ret = unsafe {
            uart_set_pin(
                port,
                pins::HEATER_UART_TX_GPIO,
                pins::HEATER_UART_RX_GPIO,
                UART_PIN_NO_CHANGE,
                UART_PIN_NO_CHANGE,
            )
        };
        if ret != ESP_OK {
            return Err(UartInitError::SetPin(ret));
        }

        let ret = unsafe {
            uart_driver_install(
                port,
                pins::HEATER_UART_RX_BUFFER as i32,
                0,
                0,
                core::ptr::null_mut(),
                0,
            )
        };
        if ret != ESP_OK {
            return Err(UartInitError::DriverInstall(ret));
        }

        info!(
            "HeaterUart: UART{} at {} baud (TX={}, RX={})",
            pins::HEATER_UART_PORT,
            pins::HEATER_BAUD,
            pins::HEATER_UART_TX_GPIO,
            pins::HEATER_UART_RX_GPIO
        );
        Ok(Self { port })
    }
}

#[cfg(target_os = "espidf")]
impl UartPort for HeaterUart {
    fn read_available(&mut self, buf: &mut [u8]) -> usize {
        // Zero ticks to wait: return whatever is already buffered.
        let n = unsafe { uart_read_bytes(self.port, buf.as_mut_ptr().cast(), buf.len() as u32, 0) };
        if n < 0 {
            warn!("HeaterUart: read failed ({})", n);
            return 0;
        }
        n as usize
    }

    fn write_frame(&mut self, frame: &[u8]) -> Result<(), UartError> {
        let n = unsafe { uart_write_bytes(self.port, frame.as_ptr().cast(), frame.len()) };
        if n < 0 {
            return Err(UartError::Driver);
        }
        if n as usize != frame.len() {
            return Err(UartError::ShortWrite);
        }
        Ok(())
    }
}

// ── Host loopback ─────────────────────────────────────────────

/// In-memory bus: bytes pushed with [`inject`](Self::inject) are read
/// back by the link layer, frames written by the link are collected in
/// [`sent`](Self::sent).
#[derive(Debug, Default)]
pub struct LoopbackUart {
    rx: std::collections::VecDeque<u8>,
    sent: Vec<Vec<u8>>,
    /// Echo transmitted frames back into RX like the physical bus.
    pub echo: bool,
}

impl LoopbackUart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes as if the heater had sent them.
    pub fn inject(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied());
    }

    /// Frames written so far, oldest first.
    pub fn sent(&self) -> &[Vec<u8>] {
        &self.sent
    }

    pub fn take_sent(&mut self) -> Vec<Vec<u8>> {
        core::mem::take(&mut self.sent)
    }

    /// Bytes waiting to be read.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

impl UartPort for LoopbackUart {
    fn read_available(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.rx.len());
        for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..n)) {
            *slot = byte;
        }
        n
    }

    fn write_frame(&mut self, frame: &[u8]) -> Result<(), UartError> {
        if self.echo {
            self.rx.extend(frame.iter().copied());
        }
        self.sent.push(frame.to_vec());
        Ok(())
    }
}
