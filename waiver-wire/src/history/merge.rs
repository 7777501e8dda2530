// Incremental merge of one day's results into the player history snapshot.
//
// The merge is a pure function from (prior snapshot, daily results) to a new
// snapshot. Nothing is written here; the caller persists the result in one
// transaction.

use std::collections::BTreeMap;
use tracing::debug;

use crate::history::record::{PlayerId, PlayerRecord, Role, Snapshot};
use crate::stats::daily::{DailyResults, DailyScore};

/// What a merge did to one role's records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoleMergeSummary {
    /// Existing players who appeared today.
    pub appeared: usize,
    /// Players seen for the first time.
    pub created: usize,
    /// Existing players who did not appear; their rest counter advanced.
    pub rested: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub pitchers: RoleMergeSummary,
    pub batters: RoleMergeSummary,
}

impl MergeSummary {
    pub fn role(&self, role: Role) -> &RoleMergeSummary {
        match role {
            Role::Pitcher => &self.pitchers,
            Role::Batter => &self.batters,
        }
    }
}

/// Fold `today` into `prior`, returning the next snapshot.
pub fn merge_day(prior: &Snapshot, today: &DailyResults) -> (Snapshot, MergeSummary) {
    let (pitchers, pitcher_summary) = merge_role(&prior.pitchers, &today.pitchers);
    let (batters, batter_summary) = merge_role(&prior.batters, &today.batters);
    (
        Snapshot { pitchers, batters },
        MergeSummary {
            pitchers: pitcher_summary,
            batters: batter_summary,
        },
    )
}

fn merge_role(
    prior: &BTreeMap<PlayerId, PlayerRecord>,
    today: &BTreeMap<PlayerId, DailyScore>,
) -> (BTreeMap<PlayerId, PlayerRecord>, RoleMergeSummary) {
    let mut summary = RoleMergeSummary::default();
    let mut next = BTreeMap::new();

    for (id, record) in prior {
        let updated = match today.get(id) {
            Some(day) => {
                summary.appeared += 1;
                record_appearance(record, day)
            }
            None => {
                summary.rested += 1;
                PlayerRecord {
                    rest_days: record.rest_days + 1,
                    ..record.clone()
                }
            }
        };
        next.insert(*id, updated);
    }

    for (id, day) in today {
        if prior.contains_key(id) {
            continue;
        }
        summary.created += 1;
        next.insert(
            *id,
            PlayerRecord::first_appearance(
                *id,
                day.name.clone(),
                day.team_id,
                day.score.total,
                day.score.normalized,
            ),
        );
    }

    (next, summary)
}

/// Push the previous values onto each history and take today's as current.
fn record_appearance(record: &PlayerRecord, day: &DailyScore) -> PlayerRecord {
    if record.team_id != day.team_id {
        debug!(
            player_id = record.id,
            from = record.team_id,
            to = day.team_id,
            "team changed"
        );
    }

    let mut rest_history = record.rest_history.clone();
    rest_history.push(record.rest_days);
    let mut score_history = record.score_history.clone();
    score_history.push(record.last_score);
    let mut normalized_history = record.normalized_history.clone();
    normalized_history.push(record.normalized_score);

    PlayerRecord {
        id: record.id,
        name: day.name.clone(),
        team_id: day.team_id,
        rest_days: 0,
        rest_history,
        last_score: day.score.total,
        score_history,
        normalized_score: day.score.normalized,
        normalized_history,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::scoring::Score;

    fn day(id: PlayerId, total: f64, denominator: f64, normalized: f64) -> DailyScore {
        DailyScore {
            player_id: id,
            name: format!("Player {id}"),
            team_id: 147,
            score: Score {
                total,
                denominator,
                normalized,
            },
        }
    }

    fn tracked(id: PlayerId) -> PlayerRecord {
        PlayerRecord {
            id,
            name: format!("Player {id}"),
            team_id: 147,
            rest_days: 2,
            rest_history: vec![1, 3],
            last_score: 14.0,
            score_history: vec![9.0, -2.0],
            normalized_score: 3.5,
            normalized_history: vec![2.3, -0.5],
        }
    }

    #[test]
    fn appearing_player_pushes_previous_values() {
        let mut prior = Snapshot::default();
        prior.batters.insert(5, tracked(5));
        let mut today = DailyResults::default();
        today.batters.insert(5, day(5, 11.0, 4.0, 2.8));

        let (next, summary) = merge_day(&prior, &today);
        let rec = &next.batters[&5];

        assert_eq!(rec.rest_days, 0);
        assert_eq!(rec.rest_history, vec![1, 3, 2]);
        assert_eq!(rec.last_score, 11.0);
        assert_eq!(rec.score_history, vec![9.0, -2.0, 14.0]);
        assert_eq!(rec.normalized_score, 2.8);
        assert_eq!(rec.normalized_history, vec![2.3, -0.5, 3.5]);
        assert_eq!(summary.batters.appeared, 1);
    }

    #[test]
    fn absent_player_only_rests() {
        let mut prior = Snapshot::default();
        prior.pitchers.insert(9, tracked(9));

        let (next, summary) = merge_day(&prior, &DailyResults::default());
        let before = &prior.pitchers[&9];
        let after = &next.pitchers[&9];

        assert_eq!(after.rest_days, before.rest_days + 1);
        assert_eq!(after.rest_history, before.rest_history);
        assert_eq!(after.score_history, before.score_history);
        assert_eq!(after.normalized_history, before.normalized_history);
        assert_eq!(after.last_score, before.last_score);
        assert_eq!(after.normalized_score, before.normalized_score);
        assert_eq!(summary.pitchers.rested, 1);
    }

    #[test]
    fn new_player_starts_with_empty_histories() {
        let mut today = DailyResults::default();
        today.batters.insert(42, day(42, 11.0, 4.0, 2.8));

        let (next, summary) = merge_day(&Snapshot::default(), &today);
        let rec = &next.batters[&42];

        assert_eq!(rec.rest_days, 0);
        assert!(rec.rest_history.is_empty());
        assert!(rec.score_history.is_empty());
        assert!(rec.normalized_history.is_empty());
        assert_eq!(rec.last_score, 11.0);
        assert_eq!(rec.normalized_score, 2.8);
        assert_eq!(summary.batters.created, 1);
    }

    #[test]
    fn prior_snapshot_is_not_mutated() {
        let mut prior = Snapshot::default();
        prior.batters.insert(5, tracked(5));
        let copy = prior.clone();
        let mut today = DailyResults::default();
        today.batters.insert(5, day(5, 1.0, 1.0, 1.0));

        let _ = merge_day(&prior, &today);
        assert_eq!(prior, copy);
    }

    #[test]
    fn roles_merge_independently() {
        let mut prior = Snapshot::default();
        prior.pitchers.insert(1, tracked(1));
        prior.batters.insert(1, tracked(1));
        let mut today = DailyResults::default();
        today.batters.insert(1, day(1, 4.0, 4.0, 1.0));

        let (next, _) = merge_day(&prior, &today);
        assert_eq!(next.batters[&1].rest_days, 0);
        assert_eq!(next.pitchers[&1].rest_days, 3);
    }

    #[test]
    fn team_and_name_follow_latest_appearance() {
        let mut prior = Snapshot::default();
        prior.batters.insert(5, tracked(5));
        let mut today = DailyResults::default();
        let mut traded = day(5, 2.0, 4.0, 0.5);
        traded.team_id = 119;
        traded.name = "Renamed Player".into();
        today.batters.insert(5, traded);

        let (next, _) = merge_day(&prior, &today);
        assert_eq!(next.batters[&5].team_id, 119);
        assert_eq!(next.batters[&5].name, "Renamed Player");
    }

    #[test]
    fn histories_stay_in_step_over_many_days() {
        let mut snap = Snapshot::default();
        for d in 0..10u32 {
            let mut today = DailyResults::default();
            if d % 3 == 0 {
                today.pitchers.insert(3, day(3, d as f64, 6.0, 1.0));
            }
            snap = merge_day(&snap, &today).0;
        }
        let rec = &snap.pitchers[&3];
        assert!(rec.histories_in_step());
        // Appeared on days 0, 3, 6, 9: three pushes after creation.
        assert_eq!(rec.history_len(), 3);
        assert_eq!(rec.rest_history, vec![2, 2, 2]);
        assert_eq!(rec.rest_days, 0);
    }
}
