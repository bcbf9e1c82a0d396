//! # WoW Station
//!
//! Samples an HMT temperature probe and reports to the Met Office WoW API.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Load configuration (first argument, `WOW_STATION_CONFIG`, or
//!      `config/station.toml`)
//!    - Set up logging with tracing subscriber
//!    - Open the HMT serial port
//!    - Join the WiFi network (fatal on failure) and resync the clock
//!    - Warm up the sensor and seed the day's max/min
//!
//! 2. **Main Loop**
//!    - Tick once a second: sample when due, send hourly and daily reports
//!    - Handle Ctrl+C for graceful shutdown
//!
//! Expected output:
//! ```text
//! INFO wow_station: WoW Station v0.1.0 starting...
//! INFO wow_station::serial: Opened HMT serial port /dev/ttyUSB0 at 4800 baud
//! INFO wow_station::network: WiFi connected to station-net
//! INFO wow_station::station: Readings: 1 Temp: 18.2 Max: 18.2 Min: 18.2
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use wow_station::clock::SystemClock;
use wow_station::config::{Config, LoggingConfig};
use wow_station::network::{associate, CommandTimeSync, NmcliLink, TimeSync};
use wow_station::serial::open_hmt_port;
use wow_station::station::{Peripherals, Station};
use wow_station::upload::transport::ReqwestTransport;
use wow_station::upload::UploadClient;

/// Environment variable overriding the config file location
const CONFIG_ENV: &str = "WOW_STATION_CONFIG";

/// Config file used when neither argument nor environment names one
const DEFAULT_CONFIG_PATH: &str = "config/station.toml";

/// Control loop period
const TICK_MS: u64 = 1000;

/// Log file name prefix inside `logging.log_dir`
const LOG_FILE_PREFIX: &str = "wow-station.log";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let path = config_path(std::env::args().nth(1), std::env::var(CONFIG_ENV).ok());
    let config = Config::load(&path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;

    let _log_guard = init_logging(&config.logging);
    info!("WoW Station v{} starting...", env!("CARGO_PKG_VERSION"));
    info!(
        "Site {} reporting schedule: {}",
        config.station.site_id, config.station.reporting_schedule
    );

    let mut port = open_hmt_port(&config.serial).context("Could not open HMT serial port")?;

    info!("Connecting to WiFi {}...", config.wifi.ssid);
    let mut link = NmcliLink::new(&config.network.interface);
    associate(
        &mut link,
        &config.wifi.ssid,
        &config.wifi.password,
        Duration::from_secs(config.network.connect_wait_s),
    )
    .await
    .context("WiFi connection failed, exiting for restart")?;

    let mut time_sync = CommandTimeSync::new(config.network.time_sync_command.clone());
    info!("Syncing time...");
    if let Err(e) = time_sync.resync().await {
        warn!("Time sync failed: {}", e);
    }

    let transport = ReqwestTransport::new(Duration::from_secs(config.upload.request_timeout_s))?;
    let uploader = UploadClient::from_config(&config, transport);
    let mut station = Station::new(&config, uploader);

    let clock = SystemClock::new();
    let mut hw = Peripherals {
        port: &mut port,
        link: &mut link,
        time_sync: &mut time_sync,
    };
    station.boot(clock.now(), &mut hw).await;

    let mut ticker = interval(Duration::from_millis(TICK_MS));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!("Press Ctrl+C to exit");

    // Main control loop
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                station.tick(clock.now(), &mut hw).await;
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                info!("Final readings: {} samples", station.aggregate().count);
                break;
            }
        }
    }

    Ok(())
}

/// Resolve the config file: CLI argument, then environment, then default.
fn config_path(arg: Option<String>, env: Option<String>) -> PathBuf {
    arg.or(env)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Console logging, plus a daily rolling file when `log_dir` is set.
///
/// `RUST_LOG` overrides the configured level. The returned guard flushes the
/// file writer and must be held for the life of the program.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    guard
}
