//! Append-only score collection, persisted as a JSON array.

use super::{NewScore, ScoreRecord, ValidationError};
use chrono::Utc;
use std::fs;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("failed to read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("{} is not a valid score file: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
}

pub struct ScoreStore {
    path: Option<PathBuf>,
    records: Vec<ScoreRecord>,
}

impl ScoreStore {
    /// Opens the store at `path`. A missing file is an empty store; it is created
    /// on the first append.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let records = match fs::read(&path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Vec::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(source) => return Err(StoreError::Read { path, source }),
        };
        log::debug!("opened score store {} ({} records)", path.display(), records.len());
        Ok(ScoreStore {
            path: Some(path),
            records,
        })
    }

    pub fn in_memory() -> Self {
        ScoreStore {
            path: None,
            records: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Validates and appends one entry, stamping it with the current time. The
    /// record only stays in memory if it reached disk.
    pub fn append(&mut self, entry: &NewScore) -> Result<ScoreRecord, StoreError> {
        let (name, score) = entry.validate()?;
        let record = ScoreRecord {
            name,
            score,
            created_at: Utc::now(),
        };
        self.records.push(record.clone());
        if let Err(e) = self.persist() {
            self.records.pop();
            return Err(e);
        }
        Ok(record)
    }

    /// Highest scores first. Equal scores keep submission order.
    pub fn top(&self, n: usize) -> Vec<ScoreRecord> {
        let mut sorted: Vec<&ScoreRecord> = self.records.iter().collect();
        sorted.sort_by(|a, b| b.score.cmp(&a.score));
        sorted.into_iter().take(n).cloned().collect()
    }

    fn persist(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let write_err = |source: io::Error| StoreError::Write {
            path: path.clone(),
            source,
        };
        let json = serde_json::to_vec_pretty(&self.records)
            .map_err(io::Error::from)
            .map_err(write_err)?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(write_err)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(write_err)?;
        fs::rename(&tmp, path).map_err(write_err)
    }
}
