//! # HMT Sensor Reader
//!
//! Polls the HMT over serial, parses the temperature out of its reply and
//! applies the calibration table.
//!
//! The reply format is loose (`T= 19.5 'C`, `T=-3 'C`, ...), so the reader
//! takes the first number on the line rather than parsing a fixed layout.

use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, warn};

use crate::calibration::CalibrationTable;
use crate::config::SerialConfig;
use crate::error::{Result, StationError};
use crate::serial::port_trait::SerialPortIO;
use crate::serial::POLL_COMMAND;

/// Reads calibrated temperatures from an HMT.
///
/// The reader holds no port; the control loop lends it one per call.
#[derive(Debug, Clone)]
pub struct SensorReader {
    calibration: CalibrationTable,
    timeout: Duration,
    max_retries: u32,
}

impl SensorReader {
    pub fn new(calibration: CalibrationTable, timeout: Duration, max_retries: u32) -> Self {
        Self {
            calibration,
            timeout,
            max_retries,
        }
    }

    pub fn from_config(config: &SerialConfig, calibration: CalibrationTable) -> Self {
        Self::new(
            calibration,
            Duration::from_millis(config.timeout_ms),
            config.max_read_retries,
        )
    }

    /// Poll the HMT for one calibrated temperature (°C, one decimal).
    ///
    /// Timeouts and transport errors are retried up to `max_retries` times;
    /// after that the last failure is returned. A reply without a number is
    /// not retried.
    ///
    /// # Errors
    ///
    /// `SensorTimeout`, `Transport` or `SensorParse`
    pub async fn read<P>(&self, port: &mut P) -> Result<f64>
    where
        P: SerialPortIO + ?Sized,
    {
        let mut retries = 0;
        loop {
            match self.poll_once(port).await {
                Ok(temp) => return Ok(temp),
                Err(e @ (StationError::SensorTimeout(_) | StationError::Transport(_)))
                    if retries < self.max_retries =>
                {
                    retries += 1;
                    warn!("Error reading from HMT ({}), retrying {}/{}", e, retries, self.max_retries);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Read and discard `count` replies so stale output and warm-up values
    /// are flushed before a reading is trusted.
    pub async fn warm_up<P>(&self, port: &mut P, count: u32)
    where
        P: SerialPortIO + ?Sized,
    {
        for n in 1..=count {
            match self.poll_once(port).await {
                Ok(temp) => debug!("Discarded warm-up reading {}: {}", n, temp),
                Err(e) => debug!("Warm-up reading {} failed: {}", n, e),
            }
        }
    }

    async fn poll_once<P>(&self, port: &mut P) -> Result<f64>
    where
        P: SerialPortIO + ?Sized,
    {
        port.discard_input()
            .await
            .map_err(|e| StationError::Transport(format!("Failed to clear serial input: {}", e)))?;
        port.write_all(POLL_COMMAND)
            .await
            .map_err(|e| StationError::Transport(format!("Failed to write poll command: {}", e)))?;
        port.flush()
            .await
            .map_err(|e| StationError::Transport(format!("Failed to flush serial port: {}", e)))?;

        let line = match timeout(self.timeout, port.read_line()).await {
            Err(_) => return Err(StationError::SensorTimeout(self.timeout.as_millis() as u64)),
            Ok(Err(e)) => return Err(StationError::Transport(format!("Failed to read HMT reply: {}", e))),
            Ok(Ok(line)) => line,
        };
        debug!("HMT replied: {:?}", line);

        let raw = parse_temperature(&line)
            .ok_or_else(|| StationError::SensorParse(format!("no temperature in {:?}", line)))?;
        let raw = round_tenth(raw);

        Ok(round_tenth(self.calibration.correct(raw)))
    }
}

/// Extract the first number on the line: an optional sign, then digits with
/// an optional fractional part, or a bare `.5` style fraction.
pub fn parse_temperature(line: &str) -> Option<f64> {
    let bytes = line.as_bytes();
    let starts_digits = |i: usize| -> bool {
        match bytes.get(i) {
            Some(b) if b.is_ascii_digit() => true,
            Some(b'.') => bytes.get(i + 1).is_some_and(u8::is_ascii_digit),
            _ => false,
        }
    };

    let mut i = 0;
    while i < bytes.len() {
        let signed = matches!(bytes[i], b'+' | b'-') && starts_digits(i + 1);
        if signed || starts_digits(i) {
            let start = i;
            let mut end = if signed { i + 1 } else { i };

            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
            if end + 1 < bytes.len() && bytes[end] == b'.' && bytes[end + 1].is_ascii_digit() {
                end += 1;
                while end < bytes.len() && bytes[end].is_ascii_digit() {
                    end += 1;
                }
            }

            return line[start..end].parse().ok();
        }
        i += 1;
    }
    None
}

/// Round to one decimal place.
pub fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
