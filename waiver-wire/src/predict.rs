// Availability prediction: who is due to play, ranked by score stability.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::history::record::{PlayerId, PlayerRecord, Role, Snapshot, TeamId};

/// Threshold below which standard deviation is treated as zero.
const STDEV_EPSILON: f64 = 1e-9;

/// Median of the rest history. An empty history has median 0, so a player
/// seen only once is always considered due.
pub fn median(values: &[u32]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] as f64 + sorted[mid] as f64) / 2.0
    } else {
        sorted[mid] as f64
    }
}

/// Population mean and standard deviation. `(0.0, 0.0)` for an empty slice.
pub fn mean_and_stdev(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Mean over standard deviation of a score series.
///
/// Returns 0.0 for an empty series and for a series with no spread, which
/// includes a single data point.
pub fn sharpe_ratio(values: &[f64]) -> f64 {
    let (mean, stdev) = mean_and_stdev(values);
    if stdev < STDEV_EPSILON {
        return 0.0;
    }
    mean / stdev
}

/// A player is due when they have rested at least as long as they usually do.
pub fn is_due(record: &PlayerRecord) -> bool {
    record.rest_days as f64 >= median(&record.rest_history)
}

/// A player predicted to play, with the numbers behind the prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Probable {
    pub player_id: PlayerId,
    pub name: String,
    pub team_id: TeamId,
    pub rest_days: u32,
    pub median_rest: f64,
    pub sharpe: f64,
    pub normalized_score: f64,
    pub last_score: f64,
}

impl Probable {
    fn from_record(record: &PlayerRecord) -> Self {
        Self {
            player_id: record.id,
            name: record.name.clone(),
            team_id: record.team_id,
            rest_days: record.rest_days,
            median_rest: median(&record.rest_history),
            sharpe: sharpe_ratio(&record.normalized_history),
            normalized_score: record.normalized_score,
            last_score: record.last_score,
        }
    }
}

/// Due players of one role, best Sharpe ratio first. Ties go to the lower id.
pub fn rank_probables(records: &BTreeMap<PlayerId, PlayerRecord>) -> Vec<Probable> {
    let mut ranked: Vec<Probable> = records
        .values()
        .filter(|r| is_due(r))
        .map(Probable::from_record)
        .collect();
    ranked.sort_by(|a, b| descending(a.sharpe, b.sharpe).then(a.player_id.cmp(&b.player_id)));
    ranked
}

/// Ranked probables for both roles.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Prediction {
    pub pitchers: Vec<Probable>,
    pub batters: Vec<Probable>,
}

impl Prediction {
    pub fn role(&self, role: Role) -> &[Probable] {
        match role {
            Role::Pitcher => &self.pitchers,
            Role::Batter => &self.batters,
        }
    }
}

pub fn predict(snapshot: &Snapshot) -> Prediction {
    Prediction {
        pitchers: rank_probables(&snapshot.pitchers),
        batters: rank_probables(&snapshot.batters),
    }
}

// ---------------------------------------------------------------------------
// Recap views
// ---------------------------------------------------------------------------

/// One row of a top-N table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Leader {
    pub player_id: PlayerId,
    pub name: String,
    pub team_id: TeamId,
    pub value: f64,
}

/// The `n` records with the highest `key`, ties to the lower id.
pub fn top_by<F>(records: &BTreeMap<PlayerId, PlayerRecord>, n: usize, key: F) -> Vec<Leader>
where
    F: Fn(&PlayerRecord) -> f64,
{
    let mut leaders: Vec<Leader> = records
        .values()
        .map(|r| Leader {
            player_id: r.id,
            name: r.name.clone(),
            team_id: r.team_id,
            value: key(r),
        })
        .collect();
    leaders.sort_by(|a, b| descending(a.value, b.value).then(a.player_id.cmp(&b.player_id)));
    leaders.truncate(n);
    leaders
}

/// Latest standouts regardless of availability.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Recap {
    pub pitchers_by_normalized: Vec<Leader>,
    pub pitchers_by_last: Vec<Leader>,
    pub batters_by_normalized: Vec<Leader>,
    pub batters_by_last: Vec<Leader>,
}

pub fn recap(snapshot: &Snapshot, n: usize) -> Recap {
    Recap {
        pitchers_by_normalized: top_by(&snapshot.pitchers, n, |r| r.normalized_score),
        pitchers_by_last: top_by(&snapshot.pitchers, n, |r| r.last_score),
        batters_by_normalized: top_by(&snapshot.batters, n, |r| r.normalized_score),
        batters_by_last: top_by(&snapshot.batters, n, |r| r.last_score),
    }
}

fn descending(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}
