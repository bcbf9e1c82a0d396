//! Running daily max/min statistics.

use serde::{Deserialize, Serialize};

/// Extremes and sample count folded in since the last daily reset.
///
/// This is also the on-disk record written by [`crate::store::AggregateStore`].
/// Once `count >= 1` every folded sample lies within `min_temp..=max_temp`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Aggregate {
    pub max_temp: Option<f64>,
    pub min_temp: Option<f64>,
    #[serde(default)]
    pub count: u32,
}

impl Aggregate {
    /// An aggregate with no samples and no extremes.
    pub const EMPTY: Self = Self {
        max_temp: None,
        min_temp: None,
        count: 0,
    };

    pub fn new(max_temp: f64, min_temp: f64, count: u32) -> Self {
        Self {
            max_temp: Some(max_temp),
            min_temp: Some(min_temp),
            count,
        }
    }

    /// Whether both extremes are present, i.e. the record can seed tracking.
    pub fn has_extremes(&self) -> bool {
        self.max_temp.is_some() && self.min_temp.is_some()
    }

    /// Folds one sample in.
    ///
    /// The first sample after a reset seeds both extremes. Afterwards a sample
    /// raises the maximum or, failing that, lowers the minimum; never both.
    pub fn fold(&mut self, temp: f64) {
        self.count += 1;

        match (self.count, self.max_temp, self.min_temp) {
            (1, _, _) | (_, None, _) | (_, _, None) => {
                self.max_temp = Some(temp);
                self.min_temp = Some(temp);
            }
            (_, Some(max), Some(min)) => {
                if temp > max {
                    self.max_temp = Some(temp);
                } else if temp < min {
                    self.min_temp = Some(temp);
                }
            }
        }
    }

    /// Starts a new window at `latest` with no samples counted.
    pub fn reset(&mut self, latest: Option<f64>) {
        self.max_temp = latest;
        self.min_temp = latest;
        self.count = 0;
    }
}
