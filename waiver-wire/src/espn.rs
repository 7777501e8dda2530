// ESPN fantasy baseball client: unrostered players in the league.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use serde::Deserialize;
use tracing::{debug, info};

use crate::mlb::decode;
use crate::provider::{FreeAgentSource, ProviderError};

pub const DEFAULT_BASE_URL: &str = "https://lm-api-reads.fantasy.espn.com";

/// Private-league cookies. Public leagues need neither.
#[derive(Debug, Clone, Default)]
pub struct EspnAuth {
    pub espn_s2: Option<String>,
    pub swid: Option<String>,
}

impl EspnAuth {
    fn cookie(&self) -> Option<String> {
        fn present(v: &Option<String>) -> Option<&str> {
            v.as_deref().map(str::trim).filter(|v| !v.is_empty())
        }
        let parts: Vec<String> = [
            present(&self.espn_s2).map(|v| format!("espn_s2={v}")),
            present(&self.swid).map(|v| format!("SWID={v}")),
        ]
        .into_iter()
        .flatten()
        .collect();
        (!parts.is_empty()).then(|| parts.join("; "))
    }
}

#[derive(Debug, Deserialize)]
struct PlayerPoolResponse {
    #[serde(default)]
    players: Vec<PoolEntry>,
}

#[derive(Debug, Deserialize)]
struct PoolEntry {
    player: Option<PoolPlayer>,
}

#[derive(Debug, Deserialize)]
struct PoolPlayer {
    #[serde(rename = "fullName")]
    full_name: Option<String>,
}

pub struct EspnClient {
    http: reqwest::Client,
    league_url: String,
}

impl EspnClient {
    pub fn new(
        base_url: &str,
        league_id: u64,
        season: u16,
        auth: &EspnAuth,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let league_url = format!(
            "{}/apis/v3/games/flb/seasons/{season}/segments/0/leagues/{league_id}",
            base_url.trim_end_matches('/')
        );

        let mut headers = HeaderMap::new();
        if let Some(cookie) = auth.cookie() {
            let value = HeaderValue::from_str(&cookie).map_err(|e| ProviderError::Payload {
                url: league_url.clone(),
                message: format!("invalid ESPN cookie: {e}"),
            })?;
            headers.insert(COOKIE, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|source| ProviderError::Http {
                url: league_url.clone(),
                source,
            })?;

        Ok(Self { http, league_url })
    }
}

/// The `x-fantasy-filter` header selecting free agents and waiver players,
/// most-owned first.
pub fn free_agent_filter(limit: usize) -> serde_json::Value {
    serde_json::json!({
        "players": {
            "filterStatus": { "value": ["FREEAGENT", "WAIVERS"] },
            "limit": limit,
            "sortPercOwned": { "sortPriority": 1, "sortAsc": false }
        }
    })
}

#[async_trait]
impl FreeAgentSource for EspnClient {
    async fn free_agents(&self, limit: usize) -> Result<Vec<String>, ProviderError> {
        debug!(url = %self.league_url, limit, "GET free agents");
        let response = self
            .http
            .get(&self.league_url)
            .query(&[("view", "kona_player_info")])
            .header("x-fantasy-filter", free_agent_filter(limit).to_string())
            .send()
            .await
            .map_err(|source| ProviderError::Http {
                url: self.league_url.clone(),
                source,
            })?;

        let pool: PlayerPoolResponse = decode(&self.league_url, response).await?;
        let names = player_names(pool);
        info!(count = names.len(), "fetched free agents");
        Ok(names)
    }
}

fn player_names(pool: PlayerPoolResponse) -> Vec<String> {
    pool.players
        .into_iter()
        .filter_map(|entry| entry.player.and_then(|p| p.full_name))
        .collect()
}
