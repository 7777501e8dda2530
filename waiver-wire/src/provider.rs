// Seams to the outside world: the stats feed and the fantasy platform.

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::history::record::TeamId;
use crate::stats::boxscore::BoxScore;

/// MLB Stats API game identifier (`gamePk`).
pub type GameId = u64;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("unexpected payload from {url}: {message}")]
    Payload { url: String, message: String },
}

/// Game results and schedules.
#[async_trait]
pub trait StatsProvider: Send + Sync {
    /// Completed games played on `date`.
    async fn games_on(&self, date: NaiveDate) -> Result<Vec<GameId>, ProviderError>;

    /// Full box score for one game.
    async fn box_score(&self, game: GameId) -> Result<BoxScore, ProviderError>;

    /// Teams with a game scheduled on `date`.
    async fn teams_scheduled(&self, date: NaiveDate) -> Result<Vec<TeamId>, ProviderError>;
}

/// Fantasy league roster data.
#[async_trait]
pub trait FreeAgentSource: Send + Sync {
    /// Names of unrostered players, at most `limit` of them.
    async fn free_agents(&self, limit: usize) -> Result<Vec<String>, ProviderError>;
}
