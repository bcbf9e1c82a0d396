//! # Station Control Loop
//!
//! The reporting state machine: samples the HMT on a fixed interval, keeps
//! the day's max/min, and sends WoW reports when the wall clock crosses the
//! hourly and daily trigger instants.
//!
//! ## Tick order
//!
//! 1. **Sample** when more than `interval_ms` has passed since the last
//!    accepted sample. The aggregate is saved after every accepted sample.
//! 2. **Hourly report** (schedule 3 only) at `hh:50`, latest temperature only.
//! 3. **Daily report** at `09:00` once more than `min_daily_samples` samples
//!    are folded in. The aggregate is then reset to the latest temperature
//!    whether or not WoW accepted the report, and the clock is resynced.
//!    With too few samples nothing is sent and the aggregate keeps growing
//!    into the next day.
//!
//! The station owns no hardware. The caller lends the serial port, network
//! link and time sync through [`Peripherals`] on each call.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use tracing::{info, warn};

use crate::aggregate::Aggregate;
use crate::calibration::CalibrationTable;
use crate::clock::{Moment, MS_PER_SECOND};
use crate::config::{Config, ReportConfig, ReportingSchedule, SamplingConfig};
use crate::network::{NetworkLink, TimeSync};
use crate::sensor::SensorReader;
use crate::serial::port_trait::SerialPortIO;
use crate::store::AggregateStore;
use crate::upload::transport::HttpTransport;
use crate::upload::{Observation, UploadClient, UploadOutcome};

/// Hardware handles lent to the station for one call
pub struct Peripherals<'a> {
    pub port: &'a mut dyn SerialPortIO,
    pub link: &'a mut dyn NetworkLink,
    pub time_sync: &'a mut dyn TimeSync,
}

/// Whether the aggregate holds real data yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationState {
    /// No sample and no saved aggregate yet
    ColdStart,
    /// Aggregate seeded; folding samples
    Tracking,
}

/// What happened during one tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickReport {
    /// Temperature accepted this tick
    pub sample: Option<f64>,
    pub hourly: Option<UploadOutcome>,
    pub daily: Option<UploadOutcome>,
}

pub struct Station<T: HttpTransport> {
    sampling: SamplingConfig,
    report: ReportConfig,
    schedule: ReportingSchedule,
    sensor: SensorReader,
    store: AggregateStore,
    uploader: UploadClient<T>,
    aggregate: Aggregate,
    latest: Option<f64>,
    state: StationState,
    last_reading_ms: u64,
    last_hour: Option<(NaiveDate, u32)>,
    last_day: Option<NaiveDate>,
}

impl<T: HttpTransport> Station<T> {
    pub fn new(config: &Config, uploader: UploadClient<T>) -> Self {
        let calibration = CalibrationTable::from(&config.calibration);
        Self {
            sampling: config.sampling.clone(),
            report: config.report.clone(),
            schedule: config.station.reporting_schedule,
            sensor: SensorReader::from_config(&config.serial, calibration),
            store: AggregateStore::new(
                &config.store.path,
                Duration::from_secs(config.store.max_age_s),
            ),
            uploader,
            aggregate: Aggregate::EMPTY,
            latest: None,
            state: StationState::ColdStart,
            last_reading_ms: 0,
            last_hour: None,
            last_day: None,
        }
    }

    pub fn aggregate(&self) -> &Aggregate {
        &self.aggregate
    }

    pub fn latest(&self) -> Option<f64> {
        self.latest
    }

    pub fn state(&self) -> StationState {
        self.state
    }

    /// Warm up the sensor, take the boot reading and seed the aggregate.
    ///
    /// A fresh saved aggregate is resumed as is; otherwise the boot reading
    /// becomes the first sample. Without either the station stays in
    /// `ColdStart` until a tick produces a sample.
    pub async fn boot(&mut self, now: Moment, hw: &mut Peripherals<'_>) {
        info!("Getting HMT reading...");
        self.sensor.warm_up(&mut *hw.port, self.sampling.warmup_reads).await;
        match self.sensor.read(&mut *hw.port).await {
            Ok(temp) => {
                info!("Calibrated Temp C = {}", temp);
                self.latest = Some(temp);
            }
            Err(e) => warn!("Boot reading failed: {}", e),
        }

        info!("Loading previous temp data if available and recent...");
        let stored = self.store.load();
        if stored.has_extremes() {
            info!("Resuming saved max/min");
            self.aggregate = stored;
            self.state = StationState::Tracking;
        } else if let Some(temp) = self.latest {
            info!("No saved max/min, starting from {}", temp);
            self.aggregate = Aggregate::EMPTY;
            self.aggregate.fold(temp);
            self.store.save_or_warn(&self.aggregate);
            self.state = StationState::Tracking;
        } else {
            warn!("No temperature and no saved max/min, waiting for first sample");
        }

        self.last_reading_ms = now.ticks_ms;
        self.log_readings();
        info!(
            "Reading sensor every {} secs",
            self.sampling.interval_ms / MS_PER_SECOND
        );
    }

    /// Run one pass of the control loop.
    pub async fn tick(&mut self, now: Moment, hw: &mut Peripherals<'_>) -> TickReport {
        let mut report = TickReport::default();

        if now.ticks_ms.saturating_sub(self.last_reading_ms) > self.sampling.interval_ms {
            report.sample = self.take_sample(now, hw).await;
        }

        if self.hourly_due(&now.wall) {
            info!("Sending hourly WoW report...");
            let outcome = self
                .uploader
                .send(&mut *hw.link, Observation::latest(self.latest), &now.wall)
                .await;
            log_outcome(&outcome);
            self.last_hour = Some(hour_key(&now.wall));
            report.hourly = Some(outcome);
        }

        if self.daily_due(&now.wall) {
            report.daily = Some(self.send_daily(now, hw).await);
        }

        report
    }

    async fn take_sample(&mut self, now: Moment, hw: &mut Peripherals<'_>) -> Option<f64> {
        let temp = match self.sensor.read(&mut *hw.port).await {
            Ok(temp) => temp,
            Err(e) => {
                warn!("Skipping sample: {}", e);
                return None;
            }
        };

        info!("Temp = {}", temp);
        self.aggregate.fold(temp);
        self.latest = Some(temp);
        self.last_reading_ms = now.ticks_ms;
        if self.state == StationState::ColdStart {
            info!("First sample received, tracking max/min");
            self.state = StationState::Tracking;
        }

        self.log_readings();
        self.store.save_or_warn(&self.aggregate);
        Some(temp)
    }

    async fn send_daily(&mut self, now: Moment, hw: &mut Peripherals<'_>) -> UploadOutcome {
        let observation = Observation {
            temp: self.latest,
            max_temp: self.aggregate.max_temp,
            min_temp: if self.schedule.includes_min() {
                self.aggregate.min_temp
            } else {
                None
            },
        };

        info!("Sending daily WoW report ({})...", self.schedule);
        let outcome = self.uploader.send(&mut *hw.link, observation, &now.wall).await;
        log_outcome(&outcome);

        self.aggregate.reset(self.latest);
        self.store.save_or_warn(&self.aggregate);
        self.last_day = Some(now.wall.date_naive());

        if let Err(e) = hw.time_sync.resync().await {
            warn!("Daily time sync failed: {}", e);
        }

        outcome
    }

    fn hourly_due(&self, wall: &DateTime<Utc>) -> bool {
        self.schedule.sends_hourly()
            && self.last_hour != Some(hour_key(wall))
            && self.minute_matches(wall.minute(), self.report.hourly_minute)
    }

    fn daily_due(&self, wall: &DateTime<Utc>) -> bool {
        self.last_day != Some(wall.date_naive())
            && wall.hour() == self.report.daily_hour
            && self.minute_matches(wall.minute(), self.report.daily_minute)
            && self.aggregate.count > self.sampling.min_daily_samples
    }

    fn minute_matches(&self, minute: u32, trigger: u32) -> bool {
        minute >= trigger && minute <= trigger + self.report.trigger_window_minutes
    }

    fn log_readings(&self) {
        info!(
            "Readings: {} Temp: {} Max: {} Min: {}",
            self.aggregate.count,
            fmt_temp(self.latest),
            fmt_temp(self.aggregate.max_temp),
            fmt_temp(self.aggregate.min_temp)
        );
    }
}

fn hour_key(wall: &DateTime<Utc>) -> (NaiveDate, u32) {
    (wall.date_naive(), wall.hour())
}

fn fmt_temp(temp: Option<f64>) -> String {
    temp.map_or_else(|| "-".to_string(), |t| t.to_string())
}

fn log_outcome(outcome: &UploadOutcome) {
    info!("WoW result (201 = success): {}", outcome);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StationError;
    use crate::network::{LinkStatus, MockNetworkLink, MockTimeSync};
    use crate::serial::port_trait::mocks::MockSerialPort;
    use crate::upload::transport::MockHttpTransport;
    use chrono::TimeZone;

    const BASE_TOML: &str = r#"
[station]
site_id = "site-1"
site_auth_key = "123456"
reporting_schedule = 2

[wifi]
ssid = "station-net"
password = "pw"

[upload]
api_key = "dev-key"
"#;

    struct Rig {
        _dir: tempfile::TempDir,
        config: Config,
    }

    impl Rig {
        fn new(schedule: ReportingSchedule) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let mut config: Config = toml::from_str(BASE_TOML).unwrap();
            config.station.reporting_schedule = schedule;
            config.store.path = dir.path().join("temps.json").to_string_lossy().into_owned();
            Self { _dir: dir, config }
        }

        fn store(&self) -> AggregateStore {
            AggregateStore::new(&self.config.store.path, Duration::from_secs(600))
        }

        fn station(&self, transport: MockHttpTransport) -> Station<MockHttpTransport> {
            Station::new(&self.config, UploadClient::from_config(&self.config, transport))
        }
    }

    fn at(ticks_ms: u64, day: u32, hour: u32, minute: u32) -> Moment {
        Moment {
            ticks_ms,
            wall: Utc.with_ymd_and_hms(2024, 3, day, hour, minute, 0).unwrap(),
        }
    }

    fn no_uploads() -> MockHttpTransport {
        let mut transport = MockHttpTransport::new();
        transport.expect_post_json().never();
        transport
    }

    fn no_resync() -> MockTimeSync {
        let mut sync = MockTimeSync::new();
        sync.expect_resync().never();
        sync
    }

    /// Three warm-up/boot replies ending in `boot_line`
    fn boot_lines(boot_line: &str) -> Vec<String> {
        vec!["T= 99.9 'C".to_string(), "T= 99.9 'C".to_string(), boot_line.to_string()]
    }

    fn port_with(lines: &[String]) -> MockSerialPort {
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        MockSerialPort::with_lines(&refs)
    }

    #[tokio::test]
    async fn test_cold_boot_then_three_samples() {
        let rig = Rig::new(ReportingSchedule::DailyMaxMin);
        let mut station = rig.station(no_uploads());

        let mut lines = boot_lines("T= 18.2 'C");
        lines.push("T= 19.9 'C".to_string());
        lines.push("T= 17.5 'C".to_string());
        let mut port = port_with(&lines);
        let mut link = MockNetworkLink::new();
        let mut sync = no_resync();
        let mut hw = Peripherals {
            port: &mut port,
            link: &mut link,
            time_sync: &mut sync,
        };

        station.boot(at(0, 7, 12, 0), &mut hw).await;
        assert_eq!(station.state(), StationState::Tracking);
        assert_eq!(*station.aggregate(), Aggregate::new(18.2, 18.2, 1));

        let report = station.tick(at(60_001, 7, 12, 1), &mut hw).await;
        assert_eq!(report.sample, Some(19.9));
        let report = station.tick(at(120_002, 7, 12, 2), &mut hw).await;
        assert_eq!(report.sample, Some(17.5));

        assert_eq!(*station.aggregate(), Aggregate::new(19.9, 17.5, 3));
        assert_eq!(rig.store().load(), Aggregate::new(19.9, 17.5, 3));
    }

    #[tokio::test]
    async fn test_no_sample_before_interval_elapses() {
        let rig = Rig::new(ReportingSchedule::DailyMaxMin);
        let mut station = rig.station(no_uploads());

        let mut lines = boot_lines("T= 18.2 'C");
        lines.push("T= 19.9 'C".to_string());
        let mut port = port_with(&lines);
        let probe = port.clone();
        let mut link = MockNetworkLink::new();
        let mut sync = no_resync();
        let mut hw = Peripherals {
            port: &mut port,
            link: &mut link,
            time_sync: &mut sync,
        };

        station.boot(at(1_000, 7, 12, 0), &mut hw).await;
        let report = station.tick(at(61_000, 7, 12, 1), &mut hw).await;

        assert_eq!(report, TickReport::default());
        assert_eq!(probe.pending_replies(), 1);
        assert_eq!(station.aggregate().count, 1);
    }

    #[tokio::test]
    async fn test_failed_sample_is_retried_next_tick() {
        let rig = Rig::new(ReportingSchedule::DailyMaxMin);
        let mut station = rig.station(no_uploads());

        let mut lines = boot_lines("T= 18.2 'C");
        lines.push("ERR".to_string());
        lines.push("T= 16.0 'C".to_string());
        let mut port = port_with(&lines);
        let mut link = MockNetworkLink::new();
        let mut sync = no_resync();
        let mut hw = Peripherals {
            port: &mut port,
            link: &mut link,
            time_sync: &mut sync,
        };

        station.boot(at(0, 7, 12, 0), &mut hw).await;
        assert_eq!(station.tick(at(60_001, 7, 12, 1), &mut hw).await.sample, None);
        assert_eq!(station.tick(at(61_001, 7, 12, 1), &mut hw).await.sample, Some(16.0));
        assert_eq!(*station.aggregate(), Aggregate::new(18.2, 16.0, 2));
    }

    #[tokio::test]
    async fn test_boot_resumes_saved_aggregate() {
        let rig = Rig::new(ReportingSchedule::DailyMaxMin);
        rig.store().save(&Aggregate::new(10.0, -2.0, 5)).unwrap();
        let mut station = rig.station(no_uploads());

        let mut port = port_with(&boot_lines("T= 4.0 'C"));
        let mut link = MockNetworkLink::new();
        let mut sync = no_resync();
        let mut hw = Peripherals {
            port: &mut port,
            link: &mut link,
            time_sync: &mut sync,
        };

        station.boot(at(0, 7, 12, 0), &mut hw).await;
        assert_eq!(station.state(), StationState::Tracking);
        assert_eq!(*station.aggregate(), Aggregate::new(10.0, -2.0, 5));
        assert_eq!(station.latest(), Some(4.0));
    }

    #[tokio::test]
    async fn test_cold_start_until_first_sample() {
        let rig = Rig::new(ReportingSchedule::DailyMaxMin);
        let mut station = rig.station(no_uploads());

        let mut lines = boot_lines("ERR");
        lines.push("T= 7.5 'C".to_string());
        let mut port = port_with(&lines);
        let mut link = MockNetworkLink::new();
        let mut sync = no_resync();
        let mut hw = Peripherals {
            port: &mut port,
            link: &mut link,
            time_sync: &mut sync,
        };

        station.boot(at(0, 7, 12, 0), &mut hw).await;
        assert_eq!(station.state(), StationState::ColdStart);
        assert_eq!(*station.aggregate(), Aggregate::EMPTY);

        station.tick(at(60_001, 7, 12, 1), &mut hw).await;
        assert_eq!(station.state(), StationState::Tracking);
        assert_eq!(*station.aggregate(), Aggregate::new(7.5, 7.5, 1));
    }

    /// Boot a station whose saved aggregate holds `count` samples in 5..=25
    async fn daily_rig(
        schedule: ReportingSchedule,
        count: u32,
        transport: MockHttpTransport,
        sync: &mut MockTimeSync,
    ) -> (Rig, Station<MockHttpTransport>) {
        let rig = Rig::new(schedule);
        rig.store().save(&Aggregate::new(25.0, 5.0, count)).unwrap();
        let mut station = rig.station(transport);

        let mut port = port_with(&boot_lines("T= 12.0 'C"));
        let mut link = MockNetworkLink::new();
        let mut hw = Peripherals {
            port: &mut port,
            link: &mut link,
            time_sync: sync,
        };
        station.boot(at(0, 7, 8, 58), &mut hw).await;
        (rig, station)
    }

    #[tokio::test]
    async fn test_daily_report_and_reset() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_post_json()
            .withf(|_, _, body| {
                let json: serde_json::Value = serde_json::from_str(body).unwrap();
                json["dryBulbTemperature_Celsius"] == 12.0
                    && json["airTemperatureMax_Celsius"] == 25.0
                    && json["airTemperatureMin_Celsius"] == 5.0
                    && json["reportStartDateTime"] == "2024-03-07T09:00:00+00:00"
            })
            .times(1)
            .returning(|_, _, _| Ok(201));
        let mut sync = MockTimeSync::new();
        sync.expect_resync().times(1).returning(|| Ok(()));

        let (rig, mut station) =
            daily_rig(ReportingSchedule::DailyMaxMin, 101, transport, &mut sync).await;

        let mut port = MockSerialPort::new();
        let mut link = MockNetworkLink::new();
        let mut hw = Peripherals {
            port: &mut port,
            link: &mut link,
            time_sync: &mut sync,
        };

        let report = station.tick(at(1_000, 7, 9, 0), &mut hw).await;
        assert_eq!(report.daily, Some(UploadOutcome::Status(201)));
        assert_eq!(*station.aggregate(), Aggregate::new(12.0, 12.0, 0));
        assert_eq!(rig.store().load(), Aggregate::new(12.0, 12.0, 0));

        // Same day: not sent again
        let report = station.tick(at(2_000, 7, 9, 0), &mut hw).await;
        assert_eq!(report.daily, None);
    }

    #[tokio::test]
    async fn test_daily_waits_for_enough_samples() {
        let mut sync = no_resync();
        let (_rig, mut station) =
            daily_rig(ReportingSchedule::DailyMaxMin, 99, no_uploads(), &mut sync).await;

        let mut port = MockSerialPort::new();
        let mut link = MockNetworkLink::new();
        let mut hw = Peripherals {
            port: &mut port,
            link: &mut link,
            time_sync: &mut sync,
        };

        let report = station.tick(at(1_000, 7, 9, 0), &mut hw).await;
        assert_eq!(report.daily, None);
        assert_eq!(*station.aggregate(), Aggregate::new(25.0, 5.0, 99));
    }

    #[tokio::test]
    async fn test_daily_threshold_is_exclusive() {
        let mut sync = no_resync();
        let (_rig, mut station) =
            daily_rig(ReportingSchedule::DailyMaxMin, 100, no_uploads(), &mut sync).await;

        let mut port = MockSerialPort::new();
        let mut link = MockNetworkLink::new();
        let mut hw = Peripherals {
            port: &mut port,
            link: &mut link,
            time_sync: &mut sync,
        };

        assert_eq!(station.tick(at(1_000, 7, 9, 0), &mut hw).await.daily, None);
    }

    #[tokio::test]
    async fn test_daily_max_only_schedule() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_post_json()
            .withf(|_, _, body| {
                let json: serde_json::Value = serde_json::from_str(body).unwrap();
                json["airTemperatureMax_Celsius"] == 25.0
                    && json.get("airTemperatureMin_Celsius").is_none()
            })
            .times(1)
            .returning(|_, _, _| Ok(201));
        let mut sync = MockTimeSync::new();
        sync.expect_resync().times(1).returning(|| Ok(()));

        let (_rig, mut station) =
            daily_rig(ReportingSchedule::DailyMax, 150, transport, &mut sync).await;

        let mut port = MockSerialPort::new();
        let mut link = MockNetworkLink::new();
        let mut hw = Peripherals {
            port: &mut port,
            link: &mut link,
            time_sync: &mut sync,
        };

        assert!(station.tick(at(1_000, 7, 9, 0), &mut hw).await.daily.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_daily_reset_even_when_rejected() {
        let mut transport = MockHttpTransport::new();
        transport.expect_post_json().times(4).returning(|_, _, _| Ok(503));
        let mut sync = MockTimeSync::new();
        sync.expect_resync()
            .times(1)
            .returning(|| Err(StationError::Transport("ntp unreachable".to_string())));

        let (_rig, mut station) =
            daily_rig(ReportingSchedule::DailyMaxMin, 101, transport, &mut sync).await;

        let mut port = MockSerialPort::new();
        let mut link = MockNetworkLink::new();
        let mut hw = Peripherals {
            port: &mut port,
            link: &mut link,
            time_sync: &mut sync,
        };

        let report = station.tick(at(1_000, 7, 9, 0), &mut hw).await;
        assert_eq!(report.daily, Some(UploadOutcome::Status(503)));
        assert_eq!(*station.aggregate(), Aggregate::new(12.0, 12.0, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_daily_not_resent_after_failed_send() {
        let mut transport = MockHttpTransport::new();
        transport.expect_post_json().times(4).returning(|_, _, _| Ok(503));
        let mut sync = MockTimeSync::new();
        sync.expect_resync().times(1).returning(|| Ok(()));

        let rig = Rig::new(ReportingSchedule::DailyMaxMin);
        let mut config = rig.config.clone();
        config.sampling.min_daily_samples = 0;
        rig.store().save(&Aggregate::new(25.0, 5.0, 101)).unwrap();
        let mut station = Station::new(&config, UploadClient::from_config(&config, transport));

        let mut lines = boot_lines("T= 12.0 'C");
        lines.push("T= 13.0 'C".to_string());
        let mut port = port_with(&lines);
        let mut link = MockNetworkLink::new();
        let mut hw = Peripherals {
            port: &mut port,
            link: &mut link,
            time_sync: &mut sync,
        };
        station.boot(at(0, 7, 8, 58), &mut hw).await;

        let report = station.tick(at(1_000, 7, 9, 0), &mut hw).await;
        assert_eq!(report.daily, Some(UploadOutcome::Status(503)));

        // A fresh sample makes the window eligible again, but today is done
        let report = station.tick(at(62_000, 7, 9, 0), &mut hw).await;
        assert_eq!(report.sample, Some(13.0));
        assert_eq!(station.aggregate().count, 1);
        assert_eq!(report.daily, None);
    }

    #[tokio::test]
    async fn test_daily_trigger_is_exact_minute_by_default() {
        let mut sync = no_resync();
        let (_rig, mut station) =
            daily_rig(ReportingSchedule::DailyMaxMin, 101, no_uploads(), &mut sync).await;

        let mut port = MockSerialPort::new();
        let mut link = MockNetworkLink::new();
        let mut hw = Peripherals {
            port: &mut port,
            link: &mut link,
            time_sync: &mut sync,
        };

        assert_eq!(station.tick(at(1_000, 7, 9, 1), &mut hw).await.daily, None);
        assert_eq!(station.tick(at(2_000, 7, 10, 0), &mut hw).await.daily, None);
    }

    #[tokio::test]
    async fn test_daily_trigger_window_catches_late_tick() {
        let mut transport = MockHttpTransport::new();
        transport.expect_post_json().times(1).returning(|_, _, _| Ok(201));
        let mut sync = MockTimeSync::new();
        sync.expect_resync().times(1).returning(|| Ok(()));

        let rig = Rig::new(ReportingSchedule::DailyMaxMin);
        let mut config = rig.config.clone();
        config.report.trigger_window_minutes = 5;
        rig.store().save(&Aggregate::new(25.0, 5.0, 101)).unwrap();
        let mut station = Station::new(&config, UploadClient::from_config(&config, transport));

        let mut port = port_with(&boot_lines("T= 12.0 'C"));
        let mut link = MockNetworkLink::new();
        let mut hw = Peripherals {
            port: &mut port,
            link: &mut link,
            time_sync: &mut sync,
        };
        station.boot(at(0, 7, 8, 58), &mut hw).await;

        assert!(station.tick(at(1_000, 7, 9, 3), &mut hw).await.daily.is_some());
        assert_eq!(station.tick(at(2_000, 7, 9, 4), &mut hw).await.daily, None);
    }

    #[tokio::test]
    async fn test_hourly_report_once_per_hour() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_post_json()
            .withf(|_, _, body| {
                let json: serde_json::Value = serde_json::from_str(body).unwrap();
                json["dryBulbTemperature_Celsius"] == 18.2
                    && json.get("airTemperatureMax_Celsius").is_none()
                    && json.get("airTemperatureMin_Celsius").is_none()
            })
            .times(2)
            .returning(|_, _, _| Ok(201));

        let rig = Rig::new(ReportingSchedule::DailyMaxMinHourly);
        let mut station = rig.station(transport);

        let mut port = port_with(&boot_lines("T= 18.2 'C"));
        let mut link = MockNetworkLink::new();
        let mut sync = no_resync();
        let mut hw = Peripherals {
            port: &mut port,
            link: &mut link,
            time_sync: &mut sync,
        };
        station.boot(at(0, 7, 14, 45), &mut hw).await;

        assert_eq!(station.tick(at(1_000, 7, 14, 49), &mut hw).await.hourly, None);
        assert_eq!(
            station.tick(at(2_000, 7, 14, 50), &mut hw).await.hourly,
            Some(UploadOutcome::Status(201))
        );
        assert_eq!(station.tick(at(3_000, 7, 14, 50), &mut hw).await.hourly, None);
        assert!(station.tick(at(4_000, 7, 15, 50), &mut hw).await.hourly.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hourly_not_resent_after_rejection() {
        let mut transport = MockHttpTransport::new();
        transport.expect_post_json().times(4).returning(|_, _, _| Ok(503));

        let rig = Rig::new(ReportingSchedule::DailyMaxMinHourly);
        let mut station = rig.station(transport);

        let mut port = port_with(&boot_lines("T= 18.2 'C"));
        let mut link = MockNetworkLink::new();
        let mut sync = no_resync();
        let mut hw = Peripherals {
            port: &mut port,
            link: &mut link,
            time_sync: &mut sync,
        };
        station.boot(at(0, 7, 14, 45), &mut hw).await;

        assert_eq!(
            station.tick(at(1_000, 7, 14, 50), &mut hw).await.hourly,
            Some(UploadOutcome::Status(503))
        );
        assert_eq!(station.tick(at(2_000, 7, 14, 50), &mut hw).await.hourly, None);
    }

    #[tokio::test]
    async fn test_hourly_not_resent_after_transmission_failure() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_post_json()
            .times(1)
            .returning(|_, _, _| Err(StationError::Transport("no route".to_string())));

        let rig = Rig::new(ReportingSchedule::DailyMaxMinHourly);
        let mut station = rig.station(transport);

        let mut port = port_with(&boot_lines("T= 18.2 'C"));
        let mut link = MockNetworkLink::new();
        link.expect_is_disconnected().returning(|| true);
        link.expect_disconnect().returning(|| Ok(()));
        link.expect_connect().times(1).returning(|_, _| Ok(()));
        link.expect_status().returning(|| LinkStatus::Down);
        let mut sync = no_resync();
        let mut hw = Peripherals {
            port: &mut port,
            link: &mut link,
            time_sync: &mut sync,
        };
        station.boot(at(0, 7, 14, 45), &mut hw).await;

        assert_eq!(
            station.tick(at(1_000, 7, 14, 50), &mut hw).await.hourly,
            Some(UploadOutcome::Failed)
        );
        assert_eq!(station.tick(at(2_000, 7, 14, 50), &mut hw).await.hourly, None);
    }

    #[tokio::test]
    async fn test_no_hourly_report_without_hourly_schedule() {
        let rig = Rig::new(ReportingSchedule::DailyMaxMin);
        let mut station = rig.station(no_uploads());

        let mut port = port_with(&boot_lines("T= 18.2 'C"));
        let mut link = MockNetworkLink::new();
        let mut sync = no_resync();
        let mut hw = Peripherals {
            port: &mut port,
            link: &mut link,
            time_sync: &mut sync,
        };
        station.boot(at(0, 7, 14, 45), &mut hw).await;

        assert_eq!(station.tick(at(1_000, 7, 14, 50), &mut hw).await.hourly, None);
    }

    #[tokio::test]
    async fn test_hourly_without_temperature_sends_nothing() {
        let rig = Rig::new(ReportingSchedule::DailyMaxMinHourly);
        let mut station = rig.station(no_uploads());

        let mut port = port_with(&boot_lines("ERR"));
        let mut link = MockNetworkLink::new();
        let mut sync = no_resync();
        let mut hw = Peripherals {
            port: &mut port,
            link: &mut link,
            time_sync: &mut sync,
        };
        station.boot(at(0, 7, 14, 45), &mut hw).await;

        assert_eq!(
            station.tick(at(1_000, 7, 14, 50), &mut hw).await.hourly,
            Some(UploadOutcome::NothingToSend)
        );
    }

    #[test]
    fn test_fmt_temp() {
        assert_eq!(fmt_temp(Some(19.5)), "19.5");
        assert_eq!(fmt_temp(None), "-");
    }
}
