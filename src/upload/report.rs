//! # WoW Observation Payload
//!
//! JSON body of a `POST /api/Observations` request.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// WoW `collectionName` for automatic weather station data
pub const COLLECTION_NAME: u8 = 1;

/// WoW `observationType` for a surface observation
pub const OBSERVATION_TYPE: u8 = 1;

/// One observation report.
///
/// The start and end of the report period are the same instant: each report
/// carries the latest sample, and optionally the extremes since the last
/// daily reset.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationReport {
    pub report_start_date_time: String,
    pub report_end_date_time: String,
    pub site_id: String,
    pub site_authentication_key: String,
    pub is_public: String,
    pub is_latest_version: String,
    #[serde(rename = "dryBulbTemperature_Celsius")]
    pub dry_bulb_temperature_celsius: f64,
    #[serde(rename = "airTemperatureMax_Celsius", skip_serializing_if = "Option::is_none")]
    pub air_temperature_max_celsius: Option<f64>,
    #[serde(rename = "airTemperatureMin_Celsius", skip_serializing_if = "Option::is_none")]
    pub air_temperature_min_celsius: Option<f64>,
    pub collection_name: u8,
    pub observation_type: u8,
}

impl ObservationReport {
    pub fn new(
        site_id: &str,
        site_auth_key: &str,
        at: &DateTime<Utc>,
        temp: f64,
        max_temp: Option<f64>,
        min_temp: Option<f64>,
    ) -> Self {
        let stamp = format_time(at);
        Self {
            report_start_date_time: stamp.clone(),
            report_end_date_time: stamp,
            site_id: site_id.to_string(),
            site_authentication_key: site_auth_key.to_string(),
            is_public: "true".to_string(),
            is_latest_version: "true".to_string(),
            dry_bulb_temperature_celsius: temp,
            air_temperature_max_celsius: max_temp,
            air_temperature_min_celsius: min_temp,
            collection_name: COLLECTION_NAME,
            observation_type: OBSERVATION_TYPE,
        }
    }
}

/// Format a timestamp the way WoW expects: `YYYY-MM-DDTHH:MM:SS+00:00`.
pub fn format_time(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S+00:00").to_string()
}
