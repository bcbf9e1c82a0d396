//! # WoW Station Library
//!
//! Read an HMT temperature probe over serial and report to the Met Office
//! Weather Observations Website (WoW).
//!
//! The station samples once a minute, tracks the day's max/min across
//! restarts, and uploads an hourly latest-temperature report and a 09:00 UTC
//! daily summary depending on the configured reporting schedule.

pub mod aggregate;
pub mod calibration;
pub mod clock;
pub mod config;
pub mod error;
pub mod network;
pub mod sensor;
pub mod serial;
pub mod station;
pub mod store;
pub mod upload;
