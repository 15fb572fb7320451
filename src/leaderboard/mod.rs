//! Leaderboard: the score store, its HTTP front end and the clients the game uses.

pub mod client;
pub mod server;
pub mod store;
pub mod worker;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use thiserror::Error;

pub use client::HttpLeaderboard;
pub use store::{ScoreStore, StoreError};
pub use worker::LeaderboardWorker;

/// Longest player name the store accepts, in characters.
pub const MAX_NAME_LEN: usize = 10;

/// How many entries `GET /api/leaderboard` returns.
pub const TOP_N: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRecord {
    pub name: String,
    pub score: u32,
    pub created_at: DateTime<Utc>,
}

/// A submission as it arrives over the wire. Every field is optional so that a
/// missing one turns into a validation message instead of a parse failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewScore {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
}

impl NewScore {
    pub fn new(name: impl Into<String>, score: u32) -> Self {
        NewScore {
            name: Some(name.into()),
            score: Some(score.into()),
        }
    }

    /// Checks the submission and returns the trimmed name and the score.
    pub fn validate(&self) -> Result<(String, u32), ValidationError> {
        let name = self
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or(ValidationError::MissingName)?;
        if name.chars().count() > MAX_NAME_LEN {
            return Err(ValidationError::NameTooLong);
        }
        let score = self.score.ok_or(ValidationError::MissingScore)?;
        let score = u32::try_from(score).map_err(|_| ValidationError::InvalidScore(score))?;
        Ok((name.to_string(), score))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please provide a name for this score.")]
    MissingName,
    #[error("Name cannot be more than 10 characters")]
    NameTooLong,
    #[error("Please provide the score.")]
    MissingScore,
    #[error("Score must be a non-negative integer, got {0}")]
    InvalidScore(i64),
}

#[derive(Debug, Error)]
pub enum LeaderboardError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("leaderboard request failed: {0}")]
    Transport(#[from] Box<ureq::Error>),
    #[error("leaderboard response unreadable: {0}")]
    Body(#[from] std::io::Error),
    #[error("leaderboard rejected the request: {0}")]
    Rejected(String),
}

/// The two operations the game needs from a leaderboard, wherever it lives.
pub trait Leaderboard: Send + Sync {
    fn submit(&self, entry: &NewScore) -> Result<ScoreRecord, LeaderboardError>;

    /// Best `n` entries, highest score first.
    fn top(&self, n: usize) -> Result<Vec<ScoreRecord>, LeaderboardError>;
}

/// Leaderboard backed directly by a store file, for playing without a server.
pub struct LocalLeaderboard {
    store: Mutex<ScoreStore>,
}

impl LocalLeaderboard {
    pub fn new(store: ScoreStore) -> Self {
        LocalLeaderboard {
            store: Mutex::new(store),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScoreStore> {
        // A panicked writer leaves the record list intact; keep serving it.
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Leaderboard for LocalLeaderboard {
    fn submit(&self, entry: &NewScore) -> Result<ScoreRecord, LeaderboardError> {
        Ok(self.lock().append(entry)?)
    }

    fn top(&self, n: usize) -> Result<Vec<ScoreRecord>, LeaderboardError> {
        Ok(self.lock().top(n))
    }
}
