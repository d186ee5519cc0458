//! Retained record of the last hour whose telemetry upload succeeded.
//!
//! On the device this lives in memory that survives deep power-down. The
//! scheduler reaches it only through [`MarkerStore`], so it runs the same
//! against a file on disk or an in-memory slot in tests.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::tracing::prelude::*;

/// Raw value meaning "no hour recorded".
pub const NO_HOUR: i8 = -1;

#[derive(Debug, thiserror::Error)]
pub enum MarkerError {
    #[error("invalid marker value {0} (expected -1 or 0..=23)")]
    OutOfRange(i64),

    #[error("marker file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("marker file {path} is malformed: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Last successfully serviced hour, or none.
///
/// Stored and exchanged as a single integer in `{-1} ∪ {0..=23}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub struct HourMarker(Option<u8>);

impl HourMarker {
    pub const NONE: Self = Self(None);

    /// Marker for a confirmed upload during `hour`.
    pub fn sent(hour: u8) -> Result<Self, MarkerError> {
        if hour > 23 {
            return Err(MarkerError::OutOfRange(i64::from(hour)));
        }
        Ok(Self(Some(hour)))
    }

    pub fn hour(&self) -> Option<u8> {
        self.0
    }

    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }

    pub fn to_raw(self) -> i8 {
        self.0.map_or(NO_HOUR, |h| h as i8)
    }

    pub fn from_raw(raw: i8) -> Result<Self, MarkerError> {
        match raw {
            NO_HOUR => Ok(Self::NONE),
            0..=23 => Ok(Self(Some(raw as u8))),
            _ => Err(MarkerError::OutOfRange(i64::from(raw))),
        }
    }
}

impl TryFrom<i8> for HourMarker {
    type Error = MarkerError;

    fn try_from(raw: i8) -> Result<Self, Self::Error> {
        Self::from_raw(raw)
    }
}

impl From<HourMarker> for i8 {
    fn from(marker: HourMarker) -> Self {
        marker.to_raw()
    }
}

impl std::fmt::Display for HourMarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_raw())
    }
}

/// Durable single-slot storage for the [`HourMarker`].
pub trait MarkerStore: Send {
    fn read(&self) -> HourMarker;

    /// Record a new value.
    ///
    /// Implementations keep the new value readable for the rest of the
    /// process even when persisting it fails.
    fn write(&mut self, marker: HourMarker) -> Result<(), MarkerError>;
}

/// Marker kept in process memory.
///
/// Clones share the same slot, so a test can keep a handle while the
/// driver owns another.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMarkerStore {
    slot: Arc<Mutex<HourMarker>>,
}

impl InMemoryMarkerStore {
    pub fn new(initial: HourMarker) -> Self {
        Self {
            slot: Arc::new(Mutex::new(initial)),
        }
    }
}

impl MarkerStore for InMemoryMarkerStore {
    fn read(&self) -> HourMarker {
        *self.slot.lock()
    }

    fn write(&mut self, marker: HourMarker) -> Result<(), MarkerError> {
        *self.slot.lock() = marker;
        Ok(())
    }
}

/// A recorded hour is only meaningful during that same hour.
const MAX_MARKER_AGE: time::Duration = time::Duration::HOUR;

#[derive(Debug, Serialize, Deserialize)]
struct MarkerFile {
    last_tx_hour: HourMarker,
    /// Unix time of the write. Files without it predate the stamp and are
    /// treated as stale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    written_at: Option<i64>,
}

impl MarkerFile {
    /// The recorded marker, or none if it was written outside the hour
    /// ending at `now`.
    fn marker_at(&self, now: OffsetDateTime) -> HourMarker {
        if self.last_tx_hour.is_none() {
            return HourMarker::NONE;
        }
        let Some(written) = self
            .written_at
            .and_then(|t| OffsetDateTime::from_unix_timestamp(t).ok())
        else {
            return HourMarker::NONE;
        };
        let age = now - written;
        if age.is_negative() || age >= MAX_MARKER_AGE {
            return HourMarker::NONE;
        }
        self.last_tx_hour
    }
}

/// Marker persisted to a small JSON file, standing in for retained RAM.
///
/// Writes go to a sibling temporary file that is then renamed over the
/// target, so a power loss mid-write leaves either the old or the new value.
/// Each write is stamped with the wall-clock time; like retained RAM, a
/// marker does not outlive a real outage, so one found stale on open is
/// ignored.
#[derive(Debug)]
pub struct FileMarkerStore {
    path: PathBuf,
    current: HourMarker,
}

impl FileMarkerStore {
    /// Load the marker from `path`.
    ///
    /// A missing file is the very first boot and yields no marker. An
    /// unreadable or malformed file is logged and also treated as none: a
    /// lost marker costs at most one duplicate upload.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::open_at(path, OffsetDateTime::now_utc())
    }

    /// [`open`](Self::open) as of `now`, discarding a marker not written
    /// within the last hour.
    pub fn open_at(path: impl Into<PathBuf>, now: OffsetDateTime) -> Self {
        let path = path.into();
        let current = match Self::load(&path) {
            Ok(Some(file)) => {
                let marker = file.marker_at(now);
                if marker != file.last_tx_hour {
                    info!(
                        path = %path.display(),
                        stale = %file.last_tx_hour,
                        written_at = ?file.written_at,
                        "Ignoring hour marker from an earlier hour"
                    );
                } else {
                    debug!(path = %path.display(), %marker, "Loaded hour marker");
                }
                marker
            }
            Ok(None) => {
                info!(path = %path.display(), "No hour marker yet, starting fresh");
                HourMarker::NONE
            }
            Err(e) => {
                warn!(error = %e, "Discarding unreadable hour marker");
                HourMarker::NONE
            }
        };
        Self { path, current }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path) -> Result<Option<MarkerFile>, MarkerError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(MarkerError::Io {
                    path: path.to_owned(),
                    source,
                });
            }
        };
        let file: MarkerFile =
            serde_json::from_str(&contents).map_err(|source| MarkerError::Malformed {
                path: path.to_owned(),
                source,
            })?;
        Ok(Some(file))
    }

    fn persist(&self) -> Result<(), MarkerError> {
        let io_err = |source| MarkerError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let body = serde_json::to_vec(&MarkerFile {
            last_tx_hour: self.current,
            written_at: Some(OffsetDateTime::now_utc().unix_timestamp()),
        })
        .map_err(|source| MarkerError::Malformed {
            path: self.path.clone(),
            source,
        })?;

        let tmp = self.path.with_extension("tmp");
        let mut file = fs::File::create(&tmp).map_err(io_err)?;
        file.write_all(&body).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)
    }
}

impl MarkerStore for FileMarkerStore {
    fn read(&self) -> HourMarker {
        self.current
    }

    fn write(&mut self, marker: HourMarker) -> Result<(), MarkerError> {
        self.current = marker;
        self.persist()
    }
}
