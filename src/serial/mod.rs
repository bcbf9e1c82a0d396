//! # Serial Communication Module
//!
//! Handles the serial link to the HMT temperature probe.
//!
//! The HMT must be in `STOP` mode with echo off. It answers each `send`
//! command with a single line such as `T= 19.5 'C`.

pub mod port_trait;

use crate::config::SerialConfig;
use crate::error::{Result, StationError};
use port_trait::TokioSerialPort;
use tracing::info;

/// Command that asks the HMT for its latest reading
pub const POLL_COMMAND: &[u8] = b"send\r\n";

/// Open the HMT serial port with the configured settings (8N1, no flow control)
///
/// # Errors
///
/// Returns `SerialPortNotFound` if the device cannot be opened
///
/// # Examples
///
/// ```no_run
/// use wow_station::config::SerialConfig;
/// use wow_station::serial::open_hmt_port;
///
/// let port = open_hmt_port(&SerialConfig::default())?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn open_hmt_port(config: &SerialConfig) -> Result<TokioSerialPort> {
    let port = open_port(&config.port, config.baud_rate)?;
    info!("Opened HMT serial port {} at {} baud", config.port, config.baud_rate);
    Ok(TokioSerialPort::new(port))
}

/// Open a specific serial port
fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
    use tokio_serial::SerialPortBuilderExt;

    tokio_serial::new(path, baud_rate)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()
        .map_err(|e| StationError::SerialPortNotFound(format!("Failed to open {}: {}", path, e)))
}
