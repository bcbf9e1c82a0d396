//! # WoW Upload Module
//!
//! Sends observation reports to the WoW API.
//!
//! This module handles:
//! - Building the JSON observation payload
//! - Retrying rejected submissions (WoW answers 201 on success and is often
//!   slow or busy)
//! - One reconnect-and-resend cycle when the request cannot be sent at all
//!
//! Delivery is best effort. Nothing is queued for later.

pub mod report;
pub mod transport;

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::{Config, WifiConfig};
use crate::error::{Result, StationError};
use crate::network::{LinkStatus, NetworkLink};
use report::ObservationReport;
use transport::HttpTransport;

/// HTTP status WoW returns for an accepted report
pub const STATUS_CREATED: u16 = 201;

/// Result text when there is no temperature to report
pub const NOTHING_TO_SEND: &str = "No temperature or payload for transmission...";

/// Result text when the network could not be recovered
pub const TRANSMISSION_FAILED: &str = "WoW transmission failed";

/// Outcome of one [`UploadClient::send`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Last HTTP status received
    Status(u16),
    /// No temperature was available; nothing was sent
    NothingToSend,
    /// No response could be obtained even after reconnecting
    Failed,
}

impl UploadOutcome {
    pub fn is_success(&self) -> bool {
        *self == Self::Status(STATUS_CREATED)
    }
}

impl fmt::Display for UploadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(code) => write!(f, "{}", code),
            Self::NothingToSend => write!(f, "{}", NOTHING_TO_SEND),
            Self::Failed => write!(f, "{}", TRANSMISSION_FAILED),
        }
    }
}

/// Temperatures carried by one report
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Observation {
    pub temp: Option<f64>,
    pub max_temp: Option<f64>,
    pub min_temp: Option<f64>,
}

impl Observation {
    /// Latest temperature only (hourly report)
    pub fn latest(temp: Option<f64>) -> Self {
        Self {
            temp,
            ..Self::default()
        }
    }
}

/// WoW API client with retry and reconnect policy
pub struct UploadClient<T: HttpTransport> {
    transport: T,
    url: String,
    api_key: String,
    site_id: String,
    site_auth_key: String,
    wifi: WifiConfig,
    max_retries: u32,
    retry_delay: Duration,
}

impl<T: HttpTransport> UploadClient<T> {
    pub fn from_config(config: &Config, transport: T) -> Self {
        Self {
            transport,
            url: config.upload.url.clone(),
            api_key: config.upload.api_key.clone(),
            site_id: config.station.site_id.clone(),
            site_auth_key: config.station.site_auth_key.clone(),
            wifi: config.wifi.clone(),
            max_retries: config.upload.max_retries,
            retry_delay: Duration::from_secs(config.upload.retry_delay_s),
        }
    }

    /// Send one report stamped `at`.
    ///
    /// Non-201 answers are retried `max_retries` times with a fixed delay and
    /// the last status is returned. If no response arrives at all the link is
    /// reconnected once with the stored credentials and the whole retry loop
    /// runs again. Never fails: every outcome is an [`UploadOutcome`].
    pub async fn send(
        &self,
        link: &mut dyn NetworkLink,
        observation: Observation,
        at: &DateTime<Utc>,
    ) -> UploadOutcome {
        let Some(temp) = observation.temp else {
            info!("{}", NOTHING_TO_SEND);
            return UploadOutcome::NothingToSend;
        };

        info!("Preparing WoW report...");
        let body = match self.encode(temp, observation, at) {
            Ok(body) => body,
            Err(e) => {
                warn!("Could not encode WoW report: {}", e);
                return UploadOutcome::Failed;
            }
        };
        debug!("WoW payload: {}", body);

        let err = match self.post_with_retries(&body).await {
            Ok(status) => return UploadOutcome::Status(status),
            Err(e) => e,
        };
        if link.is_disconnected().await {
            warn!("Could not connect ({}), link status = {}", err, link.status().await);
        } else {
            warn!("Could not connect ({}) although the link is up", err);
        }

        if let Err(e) = self.reconnect(link).await {
            warn!("{}", e);
            return UploadOutcome::Failed;
        }

        match self.post_with_retries(&body).await {
            Ok(status) => UploadOutcome::Status(status),
            Err(e) => {
                warn!("WoW transmission failed after reconnect: {}", e);
                UploadOutcome::Failed
            }
        }
    }

    /// JSON body for one report.
    fn encode(&self, temp: f64, observation: Observation, at: &DateTime<Utc>) -> Result<String> {
        let report = ObservationReport::new(
            &self.site_id,
            &self.site_auth_key,
            at,
            temp,
            observation.max_temp,
            observation.min_temp,
        );
        Ok(serde_json::to_string(&report)?)
    }

    /// POST, then retry while the answer is not 201.
    async fn post_with_retries(&self, body: &str) -> Result<u16> {
        info!("Sending WoW report...");
        let mut status = self.transport.post_json(&self.url, &self.api_key, body).await?;
        info!("Sent ({})", status);

        let mut retries = 0;
        while status != STATUS_CREATED && retries < self.max_retries {
            tokio::time::sleep(self.retry_delay).await;
            retries += 1;
            info!("Retrying WoW transmission ({}/{})...", retries, self.max_retries);
            status = self.transport.post_json(&self.url, &self.api_key, body).await?;
            info!("Sent ({})", status);
        }

        if status != STATUS_CREATED {
            warn!("{}", StationError::UploadRejected(status));
        }
        Ok(status)
    }

    async fn reconnect(&self, link: &mut dyn NetworkLink) -> Result<()> {
        info!("Trying to reconnect to {}...", self.wifi.ssid);

        if let Err(e) = link.disconnect().await {
            debug!("Disconnect before reconnect failed: {}", e);
        }
        link.connect(&self.wifi.ssid, &self.wifi.password)
            .await
            .map_err(|e| StationError::ReconnectFailed(e.to_string()))?;

        match link.status().await {
            LinkStatus::Connected => {
                info!("Reconnected");
                Ok(())
            }
            status => Err(StationError::ReconnectFailed(format!("link status {}", status))),
        }
    }
}
