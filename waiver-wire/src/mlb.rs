// MLB Stats API client: schedules and live-feed box scores.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::history::record::TeamId;
use crate::provider::{GameId, ProviderError, StatsProvider};
use crate::stats::boxscore::{BoxScore, TeamRef};

pub const DEFAULT_BASE_URL: &str = "https://statsapi.mlb.com/api";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScheduleResponse {
    #[serde(default)]
    pub dates: Vec<ScheduleDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScheduleDate {
    #[serde(default)]
    pub games: Vec<ScheduleGame>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleGame {
    #[serde(rename = "gamePk")]
    pub game_pk: GameId,
    #[serde(default)]
    pub status: Option<GameStatus>,
    #[serde(default)]
    pub teams: Option<ScheduleTeams>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GameStatus {
    #[serde(rename = "abstractGameState")]
    pub abstract_game_state: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleTeams {
    pub away: ScheduleSide,
    pub home: ScheduleSide,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleSide {
    pub team: TeamRef,
}

#[derive(Debug, Deserialize)]
struct LiveFeed {
    #[serde(rename = "liveData")]
    live_data: LiveData,
}

#[derive(Debug, Deserialize)]
struct LiveData {
    boxscore: BoxScore,
}

impl ScheduleResponse {
    fn games(&self) -> impl Iterator<Item = &ScheduleGame> {
        self.dates.iter().flat_map(|d| d.games.iter())
    }

    /// Games that have finished. Games without a status are kept.
    pub fn final_game_ids(&self) -> Vec<GameId> {
        self.games()
            .filter(|g| {
                let state = g
                    .status
                    .as_ref()
                    .and_then(|s| s.abstract_game_state.as_deref());
                match state {
                    None | Some("Final") => true,
                    Some(other) => {
                        debug!(game = g.game_pk, state = other, "skipping unfinished game");
                        false
                    }
                }
            })
            .map(|g| g.game_pk)
            .collect()
    }

    /// Every team on the slate, sorted and de-duplicated.
    pub fn team_ids(&self) -> Vec<TeamId> {
        let mut ids: Vec<TeamId> = self
            .games()
            .filter_map(|g| g.teams.as_ref())
            .flat_map(|t| [t.away.team.id, t.home.team.id])
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct MlbStatsClient {
    http: reqwest::Client,
    base_url: String,
}

impl MlbStatsClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| ProviderError::Http {
                url: base_url.clone(),
                source,
            })?;
        Ok(Self { http, base_url })
    }

    async fn schedule(
        &self,
        date: NaiveDate,
        extra: &[(&str, &str)],
    ) -> Result<ScheduleResponse, ProviderError> {
        let url = format!("{}/v1/schedule/", self.base_url);
        let date = date.format("%m/%d/%Y").to_string();
        let mut query: Vec<(&str, &str)> = vec![("sportId", "1"), ("date", date.as_str())];
        query.extend_from_slice(extra);
        get_json(&self.http, &url, &query).await
    }
}

#[async_trait]
impl StatsProvider for MlbStatsClient {
    async fn games_on(&self, date: NaiveDate) -> Result<Vec<GameId>, ProviderError> {
        let schedule = self.schedule(date, &[]).await?;
        Ok(schedule.final_game_ids())
    }

    async fn box_score(&self, game: GameId) -> Result<BoxScore, ProviderError> {
        let url = format!("{}/v1.1/game/{game}/feed/live", self.base_url);
        let feed: LiveFeed = get_json(&self.http, &url, &[]).await?;
        Ok(feed.live_data.boxscore)
    }

    async fn teams_scheduled(&self, date: NaiveDate) -> Result<Vec<TeamId>, ProviderError> {
        let schedule = self.schedule(date, &[("scheduleTypes", "games")]).await?;
        Ok(schedule.team_ids())
    }
}

/// GET `url` and decode the JSON body, mapping each failure mode to a
/// `ProviderError`.
pub(crate) async fn get_json<T: DeserializeOwned>(
    http: &reqwest::Client,
    url: &str,
    query: &[(&str, &str)],
) -> Result<T, ProviderError> {
    debug!(url, "GET");
    let response = http
        .get(url)
        .query(query)
        .send()
        .await
        .map_err(|source| ProviderError::Http {
            url: url.to_string(),
            source,
        })?;
    decode(url, response).await
}

pub(crate) async fn decode<T: DeserializeOwned>(
    url: &str,
    response: reqwest::Response,
) -> Result<T, ProviderError> {
    let status = response.status();
    if !status.is_success() {
        return Err(ProviderError::Status {
            url: url.to_string(),
            status,
        });
    }
    let body = response.bytes().await.map_err(|source| ProviderError::Http {
        url: url.to_string(),
        source,
    })?;
    serde_json::from_slice(&body).map_err(|e| ProviderError::Payload {
        url: url.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schedule() -> ScheduleResponse {
        serde_json::from_value(json!({
            "dates": [{
                "games": [
                    {
                        "gamePk": 745123,
                        "status": { "abstractGameState": "Final" },
                        "teams": { "away": { "team": { "id": 147 } }, "home": { "team": { "id": 111 } } }
                    },
                    {
                        "gamePk": 745124,
                        "status": { "abstractGameState": "Preview", "detailedState": "Postponed" },
                        "teams": { "away": { "team": { "id": 121 } }, "home": { "team": { "id": 147 } } }
                    },
                    { "gamePk": 745125 }
                ]
            }]
        }))
        .unwrap()
    }

    #[test]
    fn final_games_only() {
        assert_eq!(schedule().final_game_ids(), vec![745123, 745125]);
    }

    #[test]
    fn team_ids_are_deduplicated() {
        assert_eq!(schedule().team_ids(), vec![111, 121, 147]);
    }

    #[test]
    fn empty_schedule_has_no_games() {
        let empty: ScheduleResponse = serde_json::from_value(json!({ "dates": [] })).unwrap();
        assert!(empty.final_game_ids().is_empty());
        assert!(empty.team_ids().is_empty());

        let bare: ScheduleResponse = serde_json::from_value(json!({ "totalGames": 0 })).unwrap();
        assert!(bare.final_game_ids().is_empty());
    }

    #[test]
    fn live_feed_unwraps_box_score() {
        let feed: LiveFeed = serde_json::from_value(json!({
            "gamePk": 745123,
            "liveData": {
                "boxscore": {
                    "teams": {
                        "away": { "team": { "id": 147 }, "players": {} },
                        "home": { "team": { "id": 111 }, "players": {} }
                    }
                }
            }
        }))
        .unwrap();
        assert!(feed.live_data.boxscore.appearances().is_empty());
    }

    #[test]
    fn client_trims_trailing_slash() {
        let client = MlbStatsClient::new("https://example.test/api/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url, "https://example.test/api");
    }
}
