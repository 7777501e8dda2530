// Identity resolution between the stats source and the fantasy platform.
//
// Stats-side players are keyed by MLBAM id; the platform only gives us names.
// Each id is resolved against the free-agent name pool once and the outcome is
// cached, so every table in a run agrees on who matched.

use std::collections::{BTreeMap, HashMap, HashSet};

use similar::TextDiff;
use tracing::{debug, warn};

use crate::history::record::{PlayerId, TeamId};
use crate::predict::{Leader, Probable};

/// Minimum similarity for two names to be treated as the same player.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.95;

/// Tolerance for treating two similarities as a tie.
const TIE_EPSILON: f64 = 1e-9;

/// Similarity in `[0, 1]` between two display names, ignoring case and
/// surrounding/duplicated whitespace.
///
/// The ratio is `2 * M / T`, with `M` the characters in matching runs and
/// `T` the combined length, so a dropped trailing period on a mid-length
/// name ("Mike Trout" against "Mike Trout.") still clears 0.95.
pub fn similarity(a: &str, b: &str) -> f64 {
    let (a, b) = (fold(a), fold(b));
    f64::from(TextDiff::from_chars(a.as_str(), b.as_str()).ratio())
}

fn fold(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Outcome of matching one name against the pool.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Matched { name: String, similarity: f64 },
    /// Two or more pool entries tie for the best similarity at or above the
    /// threshold. Dropped from output rather than guessed.
    Ambiguous { candidates: Vec<String>, similarity: f64 },
    Unmatched,
}

impl Resolution {
    pub fn matched_name(&self) -> Option<&str> {
        match self {
            Resolution::Matched { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// Find the closest name in `pool` with similarity at or above `threshold`.
pub fn closest_match(name: &str, pool: &[String], threshold: f64) -> Resolution {
    let mut best = f64::NEG_INFINITY;
    let mut candidates: Vec<&String> = Vec::new();

    for candidate in pool {
        let score = similarity(name, candidate);
        if score < threshold {
            continue;
        }
        if score > best + TIE_EPSILON {
            best = score;
            candidates.clear();
            candidates.push(candidate);
        } else if (score - best).abs() <= TIE_EPSILON {
            candidates.push(candidate);
        }
    }

    match candidates.as_slice() {
        [] => Resolution::Unmatched,
        [only] => Resolution::Matched {
            name: (*only).clone(),
            similarity: best,
        },
        many => Resolution::Ambiguous {
            candidates: many.iter().map(|c| (*c).clone()).collect(),
            similarity: best,
        },
    }
}

/// A report row that can be joined against the platform and the schedule.
pub trait Identified {
    fn player_id(&self) -> PlayerId;
    fn name(&self) -> &str;
    fn team_id(&self) -> TeamId;
    fn set_name(&mut self, name: String);
}

impl Identified for Probable {
    fn player_id(&self) -> PlayerId {
        self.player_id
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn team_id(&self) -> TeamId {
        self.team_id
    }
    fn set_name(&mut self, name: String) {
        self.name = name;
    }
}

impl Identified for Leader {
    fn player_id(&self) -> PlayerId {
        self.player_id
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn team_id(&self) -> TeamId {
        self.team_id
    }
    fn set_name(&mut self, name: String) {
        self.name = name;
    }
}

/// A platform name claimed by more than one stats-side player.
#[derive(Debug, Clone, PartialEq)]
pub struct Collision {
    pub name: String,
    pub player_ids: Vec<PlayerId>,
}

/// Caching resolver over one free-agent name pool.
pub struct IdentityResolver {
    pool: Vec<String>,
    threshold: f64,
    cache: HashMap<PlayerId, Resolution>,
}

impl IdentityResolver {
    pub fn new(pool: Vec<String>, threshold: f64) -> Self {
        Self {
            pool,
            threshold,
            cache: HashMap::new(),
        }
    }

    pub fn pool_len(&self) -> usize {
        self.pool.len()
    }

    /// Resolve a player, computing the match on first sight only.
    pub fn resolve(&mut self, player_id: PlayerId, name: &str) -> &Resolution {
        let pool = &self.pool;
        let threshold = self.threshold;
        self.cache.entry(player_id).or_insert_with(|| {
            let resolution = closest_match(name, pool, threshold);
            match &resolution {
                Resolution::Matched { name: matched, similarity } => {
                    debug!(player_id, name, matched = %matched, similarity, "resolved");
                }
                Resolution::Ambiguous { candidates, similarity } => {
                    warn!(
                        player_id,
                        name,
                        ?candidates,
                        similarity,
                        "ambiguous free-agent match, dropping player"
                    );
                }
                Resolution::Unmatched => {}
            }
            resolution
        })
    }

    /// Keep only rows whose player matched a free agent, renamed to the
    /// platform's spelling. Order is preserved.
    pub fn retain_available<T: Identified>(&mut self, rows: Vec<T>) -> Vec<T> {
        rows.into_iter()
            .filter_map(|mut row| {
                let matched = self
                    .resolve(row.player_id(), row.name())
                    .matched_name()
                    .map(str::to_owned)?;
                row.set_name(matched);
                Some(row)
            })
            .collect()
    }

    /// Resolutions that ended in a tie.
    pub fn conflicts(&self) -> Vec<(PlayerId, &Resolution)> {
        let mut out: Vec<_> = self
            .cache
            .iter()
            .filter(|(_, r)| matches!(r, Resolution::Ambiguous { .. }))
            .map(|(id, r)| (*id, r))
            .collect();
        out.sort_by_key(|(id, _)| *id);
        out
    }

    /// Platform names that more than one resolved player mapped onto.
    pub fn collisions(&self) -> Vec<Collision> {
        let mut by_name: BTreeMap<&str, Vec<PlayerId>> = BTreeMap::new();
        for (id, resolution) in &self.cache {
            if let Some(name) = resolution.matched_name() {
                by_name.entry(name).or_default().push(*id);
            }
        }
        by_name
            .into_iter()
            .filter(|(_, ids)| ids.len() > 1)
            .map(|(name, mut ids)| {
                ids.sort_unstable();
                Collision {
                    name: name.to_string(),
                    player_ids: ids,
                }
            })
            .collect()
    }
}

/// Drop rows whose team has no game on the target date.
pub fn scheduled_only<T: Identified>(rows: Vec<T>, teams_playing: &HashSet<TeamId>) -> Vec<T> {
    rows.into_iter()
        .filter(|row| teams_playing.contains(&row.team_id()))
        .collect()
}
