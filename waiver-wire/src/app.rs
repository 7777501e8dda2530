// One run of the waiver-wire pipeline.
//
// Every upstream fetch completes before the store is touched, so a network
// failure leaves history exactly as it was. Delivery happens last and cannot
// fail the run.

use std::collections::HashSet;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::db::Database;
use crate::history::merge::{merge_day, MergeSummary};
use crate::history::record::{Role, Snapshot, TeamId};
use crate::identity::{scheduled_only, IdentityResolver};
use crate::predict::{predict, recap};
use crate::provider::{FreeAgentSource, StatsProvider};
use crate::report::{deliver_all, ReportSink, ReportTables};
use crate::stats::boxscore::BoxScore;
use crate::stats::daily::DailyResults;
use crate::stats::scoring::ScoringRules;

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// Knobs for a run, lifted out of `Config` so tests can build them directly.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub scoring: ScoringRules,
    pub free_agent_limit: usize,
    pub recap_size: usize,
    pub probable_limit: Option<usize>,
    pub match_threshold: f64,
}

impl RunSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            scoring: config.scoring.clone(),
            free_agent_limit: config.league.free_agent_limit,
            recap_size: config.prediction.recap_size,
            probable_limit: config.prediction.probable_limit,
            match_threshold: config.prediction.match_threshold,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Date whose completed games are ingested.
    pub game_date: NaiveDate,
    /// Date whose schedule decides who can still score.
    pub target_date: NaiveDate,
    /// Re-apply a date the ledger says is already merged, or merge one older
    /// than the latest merged date.
    pub force: bool,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// `None` when the merge was skipped because the date was already applied.
    pub merge: Option<MergeSummary>,
    pub games: usize,
    pub report: ReportTables,
    pub conflicts: usize,
    pub collisions: usize,
    pub delivery_failures: usize,
}

/// Everything fetched from the outside world for one run.
struct Fetched {
    box_scores: Option<Vec<BoxScore>>,
    teams_playing: HashSet<TeamId>,
    free_agents: Vec<String>,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct App {
    db: Database,
    stats: Box<dyn StatsProvider>,
    free_agents: Box<dyn FreeAgentSource>,
    sinks: Vec<Box<dyn ReportSink>>,
    settings: RunSettings,
}

impl App {
    pub fn new(
        db: Database,
        stats: Box<dyn StatsProvider>,
        free_agents: Box<dyn FreeAgentSource>,
        sinks: Vec<Box<dyn ReportSink>>,
        settings: RunSettings,
    ) -> Self {
        Self {
            db,
            stats,
            free_agents,
            sinks,
            settings,
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub async fn run(&self, opts: RunOptions) -> Result<RunOutcome> {
        let already_merged = self.db.is_merged(opts.game_date)?;
        let apply_merge = !already_merged || opts.force;

        if already_merged {
            if opts.force {
                warn!(date = %opts.game_date, "date already merged, re-applying (--force)");
            } else {
                info!(date = %opts.game_date, "date already merged, skipping merge");
            }
        } else if let Some(latest) = self.db.latest_merged_date()? {
            // Histories are appended in date order; an older date would land
            // after newer results.
            if opts.game_date < latest {
                if !opts.force {
                    bail!(
                        "{} is earlier than the latest merged date {latest}; \
                         pass --force to merge it out of order",
                        opts.game_date
                    );
                }
                warn!(
                    date = %opts.game_date,
                    %latest,
                    "merging a date older than the latest merged date (--force)"
                );
            }
        }

        let fetched = self.fetch(opts, apply_merge).await?;
        let games = fetched.box_scores.as_ref().map_or(0, Vec::len);

        // Merge and persist, or reuse what is stored.
        let prior = self.db.load_snapshot().context("failed to load history")?;
        let (snapshot, merge) = match &fetched.box_scores {
            Some(box_scores) => {
                let today = DailyResults::from_box_scores(box_scores, &self.settings.scoring);
                let (next, summary) = merge_day(&prior, &today);
                self.db
                    .save_snapshot(&next, opts.game_date)
                    .context("failed to save history")?;
                log_merge(opts.game_date, &summary);
                (next, Some(summary))
            }
            None => (prior, None),
        };

        let (report, conflicts, collisions) = self.build_report(&snapshot, opts, &fetched);

        let delivery_failures = deliver_all(&self.sinks, &report).await;
        if delivery_failures > 0 {
            warn!(
                failures = delivery_failures,
                sinks = self.sinks.len(),
                "report delivery incomplete"
            );
        }

        Ok(RunOutcome {
            merge,
            games,
            report,
            conflicts,
            collisions,
            delivery_failures,
        })
    }

    /// All network calls, strictly in sequence. Box scores are skipped when
    /// the merge will not run.
    async fn fetch(&self, opts: RunOptions, with_games: bool) -> Result<Fetched> {
        let box_scores = if with_games {
            let game_ids = self
                .stats
                .games_on(opts.game_date)
                .await
                .with_context(|| format!("failed to list games for {}", opts.game_date))?;
            info!(date = %opts.game_date, games = game_ids.len(), "fetching box scores");

            let mut box_scores = Vec::with_capacity(game_ids.len());
            for game in game_ids {
                let box_score = self
                    .stats
                    .box_score(game)
                    .await
                    .with_context(|| format!("failed to fetch box score for game {game}"))?;
                box_scores.push(box_score);
            }
            Some(box_scores)
        } else {
            None
        };

        let teams_playing: HashSet<TeamId> = self
            .stats
            .teams_scheduled(opts.target_date)
            .await
            .with_context(|| format!("failed to fetch schedule for {}", opts.target_date))?
            .into_iter()
            .collect();
        debug!(date = %opts.target_date, teams = teams_playing.len(), "teams scheduled");

        let free_agents = self
            .free_agents
            .free_agents(self.settings.free_agent_limit)
            .await
            .context("failed to fetch free agents")?;

        Ok(Fetched {
            box_scores,
            teams_playing,
            free_agents,
        })
    }

    /// Predict, join against the free-agent pool and the schedule, and
    /// assemble the six tables.
    fn build_report(
        &self,
        snapshot: &Snapshot,
        opts: RunOptions,
        fetched: &Fetched,
    ) -> (ReportTables, usize, usize) {
        let prediction = predict(snapshot);
        let view = recap(snapshot, self.settings.recap_size);

        let mut resolver =
            IdentityResolver::new(fetched.free_agents.clone(), self.settings.match_threshold);

        let mut probables = |role: Role| {
            let available = resolver.retain_available(prediction.role(role).to_vec());
            let mut rows = scheduled_only(available, &fetched.teams_playing);
            if let Some(limit) = self.settings.probable_limit {
                rows.truncate(limit);
            }
            rows
        };
        let probable_pitchers = probables(Role::Pitcher);
        let probable_batters = probables(Role::Batter);

        let report = ReportTables {
            game_date: opts.game_date,
            target_date: opts.target_date,
            probable_pitchers,
            probable_batters,
            top_pitchers_by_normalized: resolver.retain_available(view.pitchers_by_normalized),
            top_pitchers_by_last: resolver.retain_available(view.pitchers_by_last),
            top_batters_by_normalized: resolver.retain_available(view.batters_by_normalized),
            top_batters_by_last: resolver.retain_available(view.batters_by_last),
        };

        let conflicts = resolver.conflicts().len();
        let collisions = resolver.collisions();
        for collision in &collisions {
            warn!(
                name = %collision.name,
                player_ids = ?collision.player_ids,
                "several players matched the same free agent"
            );
        }

        info!(
            pool = resolver.pool_len(),
            probable_pitchers = report.probable_pitchers.len(),
            probable_batters = report.probable_batters.len(),
            conflicts,
            collisions = collisions.len(),
            "report assembled"
        );

        (report, conflicts, collisions.len())
    }
}

fn log_merge(date: NaiveDate, summary: &MergeSummary) {
    for role in Role::ALL {
        let s = summary.role(role);
        info!(
            %date,
            role = %role,
            appeared = s.appeared,
            created = s.created,
            rested = s.rested,
            "merged"
        );
    }
}
