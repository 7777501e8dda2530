// Box-score payloads and per-player game appearances.
//
// Mirrors the `liveData.boxscore` object of the MLB Stats API live feed. Only
// the fields the scorer needs are modeled; everything else is ignored.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

use crate::history::record::{PlayerId, Role, TeamId};
use crate::stats::scoring::StatLine;

#[derive(Debug, Clone, Deserialize)]
pub struct BoxScore {
    pub teams: BoxScoreTeams,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BoxScoreTeams {
    pub away: TeamBox,
    pub home: TeamBox,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TeamBox {
    #[serde(default)]
    pub team: Option<TeamRef>,
    /// Keyed by `"ID<mlbam id>"`.
    #[serde(default)]
    pub players: HashMap<String, PlayerBox>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeamRef {
    pub id: TeamId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayerBox {
    #[serde(default)]
    pub person: Person,
    #[serde(rename = "parentTeamId", default)]
    pub parent_team_id: Option<TeamId>,
    #[serde(default)]
    pub stats: PlayerStats,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Person {
    pub id: Option<PlayerId>,
    #[serde(rename = "fullName")]
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayerStats {
    #[serde(default)]
    pub batting: HashMap<String, Value>,
    #[serde(default)]
    pub pitching: HashMap<String, Value>,
}

/// One player's stat line in one role for one game.
#[derive(Debug, Clone, PartialEq)]
pub struct GameAppearance {
    pub player_id: PlayerId,
    pub name: String,
    pub team_id: TeamId,
    pub role: Role,
    pub stats: StatLine,
}

impl BoxScore {
    /// Flatten both sides of the box score into appearances.
    ///
    /// Every player with a non-empty pitching or batting line yields one
    /// appearance per role; whether it counts is decided by the scorer.
    /// Players without an identifier are skipped.
    pub fn appearances(&self) -> Vec<GameAppearance> {
        let mut out = Vec::new();
        for side in [&self.teams.away, &self.teams.home] {
            let side_team = side.team.as_ref().map(|t| t.id);
            for (key, player) in &side.players {
                let Some(player_id) = player.person.id else {
                    warn!(key = %key, "box score player without an id, skipping");
                    continue;
                };
                let Some(team_id) = player.parent_team_id.or(side_team) else {
                    warn!(player_id, "box score player without a team, skipping");
                    continue;
                };
                let name = player
                    .person
                    .full_name
                    .clone()
                    .unwrap_or_else(|| format!("Player {player_id}"));

                for (role, raw) in [
                    (Role::Pitcher, &player.stats.pitching),
                    (Role::Batter, &player.stats.batting),
                ] {
                    if raw.is_empty() {
                        continue;
                    }
                    out.push(GameAppearance {
                        player_id,
                        name: name.clone(),
                        team_id,
                        role,
                        stats: numeric_stats(raw),
                    });
                }
            }
        }
        // HashMap iteration order is arbitrary; keep output stable.
        out.sort_by_key(|a| (a.role, a.player_id));
        out
    }
}

/// Keep only numeric stats. Display strings such as `inningsPitched: "6.0"`
/// or `summary` are dropped.
fn numeric_stats(raw: &HashMap<String, Value>) -> StatLine {
    raw.iter()
        .filter_map(|(k, v)| v.as_f64().map(|n| (k.clone(), n)))
        .collect()
}
