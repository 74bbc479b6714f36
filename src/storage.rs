use crate::config::atomic_rename;
use crate::error::StorageError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fs, io, path::Path};

pub(crate) const HIGH_SCORE_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct HighScore {
    pub(crate) version: u32,
    pub(crate) best: u64,
    #[serde(default)]
    pub(crate) achieved_utc: Option<DateTime<Utc>>,
}

impl Default for HighScore {
    fn default() -> Self {
        Self {
            version: HIGH_SCORE_VERSION,
            best: 0,
            achieved_utc: None,
        }
    }
}

impl HighScore {
    /// Keeps `score` if it beats the record. Ties do not count.
    pub(crate) fn record(&mut self, score: u64, now: DateTime<Utc>) -> bool {
        if score <= self.best {
            return false;
        }
        self.version = HIGH_SCORE_VERSION;
        self.best = score;
        self.achieved_utc = Some(now);
        true
    }
}

/// A missing file is a fresh install, not an error.
pub(crate) fn load_high_score(path: &Path) -> Result<HighScore, StorageError> {
    let raw = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(HighScore::default()),
        Err(source) => {
            return Err(StorageError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str(&raw).map_err(|source| StorageError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn save_high_score_atomic(path: &Path, hs: &HighScore) -> Result<(), StorageError> {
    let io_err = |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    };
    let tmp = path.with_extension("json.tmp");
    let data = serde_json::to_vec_pretty(hs).map_err(|source| StorageError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(&tmp, data).map_err(io_err)?;
    atomic_rename(&tmp, path).map_err(io_err)?;
    Ok(())
}
