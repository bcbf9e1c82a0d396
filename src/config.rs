//! # Configuration Module
//!
//! Handles loading, validating and saving the station configuration (TOML).
//!
//! The configuration is read once at startup and never mutated by the control
//! loop. Tools that edit settings write the whole file back through
//! [`Config::save`], which replaces it atomically.

use serde::de::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

use crate::error::{Result, StationError};
use crate::store::write_atomic;

/// Main configuration structure
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub station: StationConfig,
    pub wifi: WifiConfig,
    pub upload: UploadConfig,
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which reports are sent to WoW.
///
/// Stored in the configuration file as the integers 1, 2 and 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ReportingSchedule {
    /// Daily maximum only
    DailyMax,
    /// Daily maximum and minimum
    DailyMaxMin,
    /// Daily maximum and minimum plus an hourly temperature report
    DailyMaxMinHourly,
}

impl ReportingSchedule {
    /// Whether the hourly temperature report is enabled
    pub fn sends_hourly(self) -> bool {
        self == Self::DailyMaxMinHourly
    }

    /// Whether the daily report carries the minimum temperature
    pub fn includes_min(self) -> bool {
        self != Self::DailyMax
    }
}

impl TryFrom<u8> for ReportingSchedule {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::DailyMax),
            2 => Ok(Self::DailyMaxMin),
            3 => Ok(Self::DailyMaxMinHourly),
            other => Err(format!("reporting_schedule must be 1, 2 or 3, got {}", other)),
        }
    }
}

impl From<ReportingSchedule> for u8 {
    fn from(schedule: ReportingSchedule) -> Self {
        match schedule {
            ReportingSchedule::DailyMax => 1,
            ReportingSchedule::DailyMaxMin => 2,
            ReportingSchedule::DailyMaxMinHourly => 3,
        }
    }
}

impl fmt::Display for ReportingSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DailyMax => write!(f, "daily max"),
            Self::DailyMaxMin => write!(f, "daily max/min"),
            Self::DailyMaxMinHourly => write!(f, "daily max/min and hourly"),
        }
    }
}

/// Site identity on WoW
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StationConfig {
    pub site_id: String,

    /// Six digit site authentication key
    pub site_auth_key: String,

    #[serde(default = "default_reporting_schedule")]
    pub reporting_schedule: ReportingSchedule,
}

/// Wireless network credentials
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WifiConfig {
    pub ssid: String,

    #[serde(default)]
    pub password: String,
}

/// HMT serial port configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Extra attempts after a timeout or transport error before giving up
    #[serde(default = "default_max_read_retries")]
    pub max_read_retries: u32,
}

/// Sampling cadence
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SamplingConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// A daily report needs strictly more samples than this
    #[serde(default = "default_min_daily_samples")]
    pub min_daily_samples: u32,

    /// Readings discarded at boot while the HMT flushes stale output
    #[serde(default = "default_warmup_reads")]
    pub warmup_reads: u32,
}

/// Report trigger instants (UTC wall clock)
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ReportConfig {
    #[serde(default = "default_hourly_minute")]
    pub hourly_minute: u32,

    #[serde(default = "default_daily_hour")]
    pub daily_hour: u32,

    #[serde(default = "default_daily_minute")]
    pub daily_minute: u32,

    /// Minutes after a trigger instant during which a missed trigger still fires
    #[serde(default)]
    pub trigger_window_minutes: u32,
}

/// WoW upload configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UploadConfig {
    #[serde(default = "default_upload_url")]
    pub url: String,

    /// `Ocp-Apim-Subscription-Key` header value
    pub api_key: String,

    #[serde(default = "default_upload_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_delay_s")]
    pub retry_delay_s: u64,

    #[serde(default = "default_request_timeout_s")]
    pub request_timeout_s: u64,
}

/// Persisted aggregate location
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,

    #[serde(default = "default_max_age_s")]
    pub max_age_s: u64,
}

/// Calibration certificate corrections, one per reference temperature
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct CalibrationConfig {
    pub plus50: f64,
    pub plus40: f64,
    pub plus30: f64,
    pub plus20: f64,
    pub plus10: f64,
    pub zero: f64,
    pub minus10: f64,
    pub minus20: f64,
    pub minus30: f64,
}

/// Host network collaborators
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NetworkConfig {
    #[serde(default = "default_interface")]
    pub interface: String,

    /// Seconds to wait for association at boot before giving up
    #[serde(default = "default_connect_wait_s")]
    pub connect_wait_s: u64,

    /// Program and arguments that step the system clock from NTP
    #[serde(default = "default_time_sync_command")]
    pub time_sync_command: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for a daily rolling log file; console only when unset
    #[serde(default)]
    pub log_dir: Option<String>,
}

// Default value functions
fn default_reporting_schedule() -> ReportingSchedule { ReportingSchedule::DailyMaxMin }

fn default_serial_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_baud_rate() -> u32 { 4800 }
fn default_timeout_ms() -> u64 { 5000 }
fn default_max_read_retries() -> u32 { 3 }

fn default_interval_ms() -> u64 { 60_000 }
fn default_min_daily_samples() -> u32 { 100 }
fn default_warmup_reads() -> u32 { 2 }

fn default_hourly_minute() -> u32 { 50 }
fn default_daily_hour() -> u32 { 9 }
fn default_daily_minute() -> u32 { 0 }

fn default_upload_url() -> String { "https://mowowprod.azure-api.net/api/Observations".to_string() }
fn default_upload_max_retries() -> u32 { 3 }
fn default_retry_delay_s() -> u64 { 5 }
fn default_request_timeout_s() -> u64 { 30 }

fn default_store_path() -> String { "temps.json".to_string() }
fn default_max_age_s() -> u64 { 600 }

fn default_interface() -> String { "wlan0".to_string() }
fn default_connect_wait_s() -> u64 { 15 }
fn default_time_sync_command() -> Vec<String> { vec!["chronyc".to_string(), "makestep".to_string()] }

fn default_log_level() -> String { "info".to_string() }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
            max_read_retries: default_max_read_retries(),
        }
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            min_daily_samples: default_min_daily_samples(),
            warmup_reads: default_warmup_reads(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            hourly_minute: default_hourly_minute(),
            daily_hour: default_daily_hour(),
            daily_minute: default_daily_minute(),
            trigger_window_minutes: 0,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            max_age_s: default_max_age_s(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            interface: default_interface(),
            connect_wait_s: default_connect_wait_s(),
            time_sync_command: default_time_sync_command(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: None,
        }
    }
}

/// Baud rates the HMT serial interface can be set to
const SUPPORTED_BAUD_RATES: &[u32] = &[1200, 2400, 4800, 9600, 19200, 38400, 57600, 115200];

fn invalid(msg: impl fmt::Display) -> StationError {
    StationError::Config(toml::de::Error::custom(msg))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use wow_station::config::Config;
    ///
    /// let config = Config::load("config/station.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the whole configuration back to `path`.
    ///
    /// The file is replaced atomically: a crash mid-write leaves either the
    /// previous or the new configuration on disk.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.validate()?;
        let contents = toml::to_string_pretty(self)?;
        write_atomic(path.as_ref(), contents.as_bytes())
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        // Station identity
        if self.station.site_id.trim().is_empty() {
            return Err(invalid("site_id cannot be empty"));
        }

        let key = &self.station.site_auth_key;
        if key.len() != 6 || !key.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("site_auth_key must be a 6-digit number"));
        }

        if self.wifi.ssid.is_empty() {
            return Err(invalid("wifi ssid cannot be empty"));
        }

        // Serial port
        if self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        if !SUPPORTED_BAUD_RATES.contains(&self.serial.baud_rate) {
            return Err(invalid(format!(
                "baud_rate must be one of: {:?}",
                SUPPORTED_BAUD_RATES
            )));
        }

        if self.serial.timeout_ms == 0 || self.serial.timeout_ms > 30_000 {
            return Err(invalid("timeout_ms must be between 1 and 30000"));
        }

        if self.serial.max_read_retries > 10 {
            return Err(invalid("max_read_retries must be at most 10"));
        }

        // Sampling
        if self.sampling.interval_ms == 0 {
            return Err(invalid("sampling interval_ms must be greater than 0"));
        }

        // Report triggers
        if self.report.hourly_minute > 59 || self.report.daily_minute > 59 {
            return Err(invalid("trigger minutes must be between 0 and 59"));
        }

        if self.report.daily_hour > 23 {
            return Err(invalid("daily_hour must be between 0 and 23"));
        }

        if self.report.trigger_window_minutes > 59 {
            return Err(invalid("trigger_window_minutes must be between 0 and 59"));
        }

        // Upload
        if !self.upload.url.starts_with("http://") && !self.upload.url.starts_with("https://") {
            return Err(invalid("upload url must start with http:// or https://"));
        }

        if self.upload.api_key.is_empty() {
            return Err(invalid("upload api_key cannot be empty"));
        }

        if self.upload.retry_delay_s > 300 {
            return Err(invalid("retry_delay_s must be at most 300"));
        }

        if self.upload.request_timeout_s == 0 || self.upload.request_timeout_s > 300 {
            return Err(invalid("request_timeout_s must be between 1 and 300"));
        }

        // Store
        if self.store.path.is_empty() {
            return Err(invalid("store path cannot be empty"));
        }

        // Calibration
        let cal = &self.calibration;
        let corrections = [
            ("plus50", cal.plus50),
            ("plus40", cal.plus40),
            ("plus30", cal.plus30),
            ("plus20", cal.plus20),
            ("plus10", cal.plus10),
            ("zero", cal.zero),
            ("minus10", cal.minus10),
            ("minus20", cal.minus20),
            ("minus30", cal.minus30),
        ];
        if let Some((name, _)) = corrections.iter().find(|(_, value)| !value.is_finite()) {
            return Err(invalid(format!("calibration {} must be a finite number", name)));
        }

        if self.network.time_sync_command.is_empty() {
            return Err(invalid("time_sync_command cannot be empty"));
        }

        Ok(())
    }
}
