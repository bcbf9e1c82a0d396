//! # Aggregate Store
//!
//! Persists the running [`Aggregate`] so a restart (power cut, watchdog
//! reset) resumes the day's max/min instead of starting over.
//!
//! A record is only trusted while it is fresh: if the file was last written
//! more than `max_age` ago the station has been down long enough that the
//! extremes may no longer describe the current day, and the record is
//! ignored.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::aggregate::Aggregate;
use crate::error::{Result, StationError};

/// Default staleness window (10 minutes)
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(600);

/// JSON file holding the last saved aggregate
#[derive(Debug, Clone)]
pub struct AggregateStore {
    path: PathBuf,
    max_age: Duration,
}

impl AggregateStore {
    pub fn new(path: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self {
            path: path.into(),
            max_age,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the saved aggregate, or [`Aggregate::EMPTY`] when there is no
    /// usable record.
    pub fn load(&self) -> Aggregate {
        self.load_at(SystemTime::now())
    }

    /// Same as [`load`](Self::load) with an explicit current time.
    pub fn load_at(&self, now: SystemTime) -> Aggregate {
        match self.try_load_at(now) {
            Ok(aggregate) => {
                info!(
                    "Loaded saved aggregate: count={} max={:?} min={:?}",
                    aggregate.count, aggregate.max_temp, aggregate.min_temp
                );
                aggregate
            }
            Err(e) => {
                info!("No recent aggregate available ({}), starting fresh", e);
                Aggregate::EMPTY
            }
        }
    }

    /// Load the saved aggregate, reporting why it is unusable.
    ///
    /// # Errors
    ///
    /// `StoreUnavailable` if the file is missing, unreadable, corrupt or
    /// older than the staleness window.
    pub fn try_load_at(&self, now: SystemTime) -> Result<Aggregate> {
        let unavailable = |msg: String| StationError::StoreUnavailable(msg);

        let metadata = fs::metadata(&self.path)
            .map_err(|e| unavailable(format!("{}: {}", self.path.display(), e)))?;
        let modified = metadata
            .modified()
            .map_err(|e| unavailable(format!("no modification time: {}", e)))?;

        // A file stamped in the future (clock stepped back) counts as fresh
        let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
        if age >= self.max_age {
            return Err(unavailable(format!(
                "record is {}s old (limit {}s)",
                age.as_secs(),
                self.max_age.as_secs()
            )));
        }

        let contents = fs::read_to_string(&self.path)
            .map_err(|e| unavailable(format!("read failed: {}", e)))?;
        serde_json::from_str(&contents).map_err(|e| unavailable(format!("corrupt record: {}", e)))
    }

    /// Save the aggregate, replacing the previous record atomically.
    pub fn save(&self, aggregate: &Aggregate) -> Result<()> {
        let json = serde_json::to_vec(aggregate)?;
        write_atomic(&self.path, &json)?;
        debug!("Saved aggregate to {}", self.path.display());
        Ok(())
    }

    /// Save and log instead of failing; used by the control loop where a
    /// failed write must not stop sampling.
    pub fn save_or_warn(&self, aggregate: &Aggregate) {
        if let Err(e) = self.save(aggregate) {
            warn!("Failed to save aggregate to {}: {}", self.path.display(), e);
        }
    }
}

/// Write `contents` to `path` through a synced temporary file in the same
/// directory followed by a rename.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StationError::Io(e.error))?;
    Ok(())
}
