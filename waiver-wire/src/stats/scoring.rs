// Fantasy point scoring for a single pitching or batting stat line.

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

/// Counting stats for one appearance, keyed by MLB Stats API stat name
/// (`outs`, `earnedRuns`, `plateAppearances`, ...).
pub type StatLine = HashMap<String, f64>;

// ---------------------------------------------------------------------------
// Stat keys used outside the weight tables
// ---------------------------------------------------------------------------

pub const OUTS: &str = "outs";
pub const EARNED_RUNS: &str = "earnedRuns";
pub const PLATE_APPEARANCES: &str = "plateAppearances";
pub const HITS: &str = "hits";
pub const DOUBLES: &str = "doubles";
pub const TRIPLES: &str = "triples";
pub const HOME_RUNS: &str = "homeRuns";

/// Point value per unit of each stat. Stats absent from the table score zero.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct PointTable(BTreeMap<String, f64>);

impl PointTable {
    pub fn new<I, S>(weights: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self(weights.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn weight(&self, stat: &str) -> f64 {
        self.0.get(stat).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Weighted sum of `stats` over the table's stats. Missing stats count as zero.
    pub fn points(&self, stats: &StatLine) -> f64 {
        self.iter().map(|(stat, weight)| stat_value(stats, stat) * weight).sum()
    }
}

/// Bonus for a long, effective outing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct QualityStart {
    pub min_innings: f64,
    pub max_earned_runs: f64,
    pub points: f64,
}

impl Default for QualityStart {
    fn default() -> Self {
        Self {
            min_innings: 6.0,
            max_earned_runs: 3.0,
            points: 8.0,
        }
    }
}

/// League scoring rules for both roles. Any table left out of the config
/// keeps the league default.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScoringRules {
    pub pitching: PointTable,
    pub batting: PointTable,
    pub quality_start: QualityStart,
    /// Points per single. Singles are derived from hits since the box score
    /// does not report them directly.
    pub single_points: f64,
}

impl Default for ScoringRules {
    /// The points league the tool was built for.
    fn default() -> Self {
        Self {
            pitching: PointTable::new([
                ("outs", 1.0),
                ("earnedRuns", -2.0),
                ("wins", 5.0),
                ("losses", -3.0),
                ("saves", 12.0),
                ("blownSaves", -4.0),
                ("strikeOuts", 5.0),
                ("hits", -1.0),
                ("baseOnBalls", -1.0),
                ("shutouts", 50.0),
                ("hitByPitch", -1.0),
                ("wildPitches", -1.0),
                ("balks", -7.0),
                ("pickoffs", 7.0),
                ("completeGames", 50.0),
                ("holds", 7.0),
            ]),
            batting: PointTable::new([
                ("doubles", 5.0),
                ("triples", 10.0),
                ("homeRuns", 14.0),
                ("baseOnBalls", 1.0),
                ("runs", 2.0),
                ("rbi", 4.0),
                ("stolenBases", 9.0),
                ("strikeOuts", -1.0),
                ("intentionalWalks", 7.0),
                ("hitByPitch", 1.0),
                ("sacBunts", 1.0),
                ("sacFlies", 1.0),
                ("caughtStealing", -2.0),
                ("groundIntoDoublePlay", -1.0),
            ]),
            quality_start: QualityStart::default(),
            single_points: 2.0,
        }
    }
}

/// Fantasy points for one appearance plus the volume they were earned over.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    pub total: f64,
    /// Innings pitched or plate appearances. Always > 0.
    pub denominator: f64,
    pub normalized: f64,
}

impl Score {
    fn new(total: f64, denominator: f64) -> Self {
        Self {
            total,
            denominator,
            normalized: round_one_decimal(total / denominator),
        }
    }

    /// Combine two outings on the same day (doubleheaders) into one.
    pub fn combine(&self, other: &Score) -> Score {
        Score::new(self.total + other.total, self.denominator + other.denominator)
    }
}

/// Score a pitching line. Returns `None` when no outs were recorded.
pub fn score_pitching(stats: &StatLine, rules: &ScoringRules) -> Option<Score> {
    let innings = stat_value(stats, OUTS) / 3.0;
    if innings <= 0.0 {
        return None;
    }

    let mut total = rules.pitching.points(stats);
    let qs = &rules.quality_start;
    if innings >= qs.min_innings && stat_value(stats, EARNED_RUNS) <= qs.max_earned_runs {
        total += qs.points;
    }

    Some(Score::new(total, innings))
}

/// Score a batting line. Returns `None` when the batter had no plate appearances.
pub fn score_batting(stats: &StatLine, rules: &ScoringRules) -> Option<Score> {
    let plate_appearances = stat_value(stats, PLATE_APPEARANCES);
    if plate_appearances <= 0.0 {
        return None;
    }

    let mut total = rules.batting.points(stats);
    let hits = stat_value(stats, HITS);
    if hits > 0.0 {
        let singles = hits
            - stat_value(stats, DOUBLES)
            - stat_value(stats, TRIPLES)
            - stat_value(stats, HOME_RUNS);
        total += singles * rules.single_points;
    }

    Some(Score::new(total, plate_appearances))
}

/// Round half away from zero to one decimal place.
pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn stat_value(stats: &StatLine, stat: &str) -> f64 {
    stats.get(stat).copied().unwrap_or(0.0)
}
