// Per-player rest and scoring history records.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Stable MLBAM person identifier.
pub type PlayerId = u32;

/// MLB team identifier (the parent club for minor-league assignments).
pub type TeamId = u32;

/// Which stat line a record tracks. A two-way player has one record per role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    Pitcher,
    Batter,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Pitcher, Role::Batter];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Pitcher => "pitcher",
            Role::Batter => "batter",
        }
    }

    /// Label of the volume denominator behind the normalized score.
    pub fn per_label(&self) -> &'static str {
        match self {
            Role::Pitcher => "inning",
            Role::Batter => "plate appearance",
        }
    }

    pub(crate) fn table(&self) -> &'static str {
        match self {
            Role::Pitcher => "pitchers",
            Role::Batter => "batters",
        }
    }

    pub(crate) fn history_table(&self) -> &'static str {
        match self {
            Role::Pitcher => "pitcher_history",
            Role::Batter => "batter_history",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rolling rest and score history for one player in one role.
///
/// The three history series grow together: every appearance after the first
/// pushes exactly one element onto each, so they always have equal length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub id: PlayerId,
    pub name: String,
    pub team_id: TeamId,
    /// Days since the last appearance; 0 on a day the player appeared.
    pub rest_days: u32,
    pub rest_history: Vec<u32>,
    pub last_score: f64,
    pub score_history: Vec<f64>,
    /// Points per inning (pitchers) or per plate appearance (batters).
    pub normalized_score: f64,
    pub normalized_history: Vec<f64>,
}

impl PlayerRecord {
    /// A record for a player seen for the first time, with empty histories.
    pub fn first_appearance(
        id: PlayerId,
        name: impl Into<String>,
        team_id: TeamId,
        score: f64,
        normalized: f64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            team_id,
            rest_days: 0,
            rest_history: Vec::new(),
            last_score: score,
            score_history: Vec::new(),
            normalized_score: normalized,
            normalized_history: Vec::new(),
        }
    }

    /// Number of appearances recorded in the history series.
    pub fn history_len(&self) -> usize {
        self.rest_history.len()
    }

    pub(crate) fn histories_in_step(&self) -> bool {
        self.rest_history.len() == self.score_history.len()
            && self.score_history.len() == self.normalized_history.len()
    }
}

/// The full set of tracked players, keyed by identifier within each role.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub pitchers: BTreeMap<PlayerId, PlayerRecord>,
    pub batters: BTreeMap<PlayerId, PlayerRecord>,
}

impl Snapshot {
    pub fn role(&self, role: Role) -> &BTreeMap<PlayerId, PlayerRecord> {
        match role {
            Role::Pitcher => &self.pitchers,
            Role::Batter => &self.batters,
        }
    }

    pub fn role_mut(&mut self, role: Role) -> &mut BTreeMap<PlayerId, PlayerRecord> {
        match role {
            Role::Pitcher => &mut self.pitchers,
            Role::Batter => &mut self.batters,
        }
    }

    pub fn get(&self, role: Role, id: PlayerId) -> Option<&PlayerRecord> {
        self.role(role).get(&id)
    }

    pub fn len(&self) -> usize {
        self.pitchers.len() + self.batters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pitchers.is_empty() && self.batters.is_empty()
    }
}
