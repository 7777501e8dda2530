// One day's scored results, folded across every game played that day.

use std::collections::BTreeMap;

use crate::history::record::{PlayerId, Role, TeamId};
use crate::stats::boxscore::{BoxScore, GameAppearance};
use crate::stats::scoring::{score_batting, score_pitching, Score, ScoringRules};

/// A player's combined score for the day in one role.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyScore {
    pub player_id: PlayerId,
    pub name: String,
    pub team_id: TeamId,
    pub score: Score,
}

/// Scored results for one game date, at most one entry per player per role.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyResults {
    pub pitchers: BTreeMap<PlayerId, DailyScore>,
    pub batters: BTreeMap<PlayerId, DailyScore>,
}

impl DailyResults {
    /// Score every appearance in `box_scores`.
    pub fn from_box_scores<'a, I>(box_scores: I, rules: &ScoringRules) -> Self
    where
        I: IntoIterator<Item = &'a BoxScore>,
    {
        let mut results = Self::default();
        for box_score in box_scores {
            for appearance in box_score.appearances() {
                results.add_appearance(&appearance, rules);
            }
        }
        results
    }

    /// Score one appearance and fold it in. Appearances with a zero
    /// denominator are dropped. A second appearance on the same day
    /// (doubleheader) is combined with the first.
    pub fn add_appearance(&mut self, appearance: &GameAppearance, rules: &ScoringRules) {
        let scored = match appearance.role {
            Role::Pitcher => score_pitching(&appearance.stats, rules),
            Role::Batter => score_batting(&appearance.stats, rules),
        };
        let Some(score) = scored else {
            return;
        };

        self.role_mut(appearance.role)
            .entry(appearance.player_id)
            .and_modify(|day| {
                day.score = day.score.combine(&score);
                day.team_id = appearance.team_id;
            })
            .or_insert_with(|| DailyScore {
                player_id: appearance.player_id,
                name: appearance.name.clone(),
                team_id: appearance.team_id,
                score,
            });
    }

    pub fn role(&self, role: Role) -> &BTreeMap<PlayerId, DailyScore> {
        match role {
            Role::Pitcher => &self.pitchers,
            Role::Batter => &self.batters,
        }
    }

    fn role_mut(&mut self, role: Role) -> &mut BTreeMap<PlayerId, DailyScore> {
        match role {
            Role::Pitcher => &mut self.pitchers,
            Role::Batter => &mut self.batters,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pitchers.is_empty() && self.batters.is_empty()
    }
}
