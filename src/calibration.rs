//! # Calibration Module
//!
//! Applies the instrument calibration certificate to raw HMT readings.
//!
//! ## Bands
//!
//! The certificate lists one additive correction for each of nine reference
//! temperatures: -30, -20, -10, 0, 10, 20, 30, 40 and 50 °C. A reading uses the
//! correction of the nearest reference point, so each band spans 5 °C either
//! side of its reference. Bands are closed on the low side: a reading of
//! exactly 45.0 belongs to the +50 band, 44.9 to the +40 band. The -30 band is
//! open-ended downwards and the +50 band upwards.
//!
//! ## Usage
//!
//! ```
//! use wow_station::calibration::CalibrationTable;
//!
//! let mut corrections = [0.0; 9];
//! corrections[8] = 0.2; // +50 band
//! let table = CalibrationTable::new(corrections);
//!
//! assert!((table.correct(45.0) - 45.2).abs() < 1e-9);
//! assert!((table.correct(44.9) - 44.9).abs() < 1e-9);
//! ```

use crate::config::CalibrationConfig;

/// Number of calibration bands on the certificate
pub const CALIBRATION_BANDS: usize = 9;

/// Reference temperature of each band, coldest first
pub const BAND_REFERENCES: [i32; CALIBRATION_BANDS] = [-30, -20, -10, 0, 10, 20, 30, 40, 50];

/// Distance below a reference temperature at which its band starts
const BAND_HALF_WIDTH: i32 = 5;

/// Immutable table of per-band corrections.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationTable {
    /// Corrections in °C, indexed like [`BAND_REFERENCES`].
    corrections: [f64; CALIBRATION_BANDS],
}

impl Default for CalibrationTable {
    fn default() -> Self {
        Self::new([0.0; CALIBRATION_BANDS])
    }
}

impl From<&CalibrationConfig> for CalibrationTable {
    fn from(config: &CalibrationConfig) -> Self {
        Self::new([
            config.minus30,
            config.minus20,
            config.minus10,
            config.zero,
            config.plus10,
            config.plus20,
            config.plus30,
            config.plus40,
            config.plus50,
        ])
    }
}

impl CalibrationTable {
    /// Creates a table from corrections ordered coldest band first.
    #[must_use]
    pub fn new(corrections: [f64; CALIBRATION_BANDS]) -> Self {
        Self { corrections }
    }

    /// Returns the correction configured for a band.
    #[must_use]
    pub fn correction(&self, band: usize) -> f64 {
        self.corrections[band]
    }

    /// Adds the correction of the band `raw` falls into.
    #[must_use]
    pub fn correct(&self, raw: f64) -> f64 {
        raw + self.corrections[band_index(raw)]
    }
}

/// Returns the band index for a raw reading.
///
/// Bands are tested warmest first, so a value sitting exactly on a boundary
/// resolves to the warmer band.
#[must_use]
pub fn band_index(raw: f64) -> usize {
    for idx in (1..CALIBRATION_BANDS).rev() {
        if raw >= f64::from(BAND_REFERENCES[idx] - BAND_HALF_WIDTH) {
            return idx;
        }
    }
    0
}
