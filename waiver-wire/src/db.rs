// SQLite persistence for player rest and scoring history.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Transaction};

use crate::history::record::{PlayerId, PlayerRecord, Role, Snapshot};

/// SQLite-backed store holding one table per role plus a child table of
/// history points, and a ledger of game dates already merged.
///
/// History series are stored one row per appearance (`seq` orders them), so
/// they round-trip as typed numbers rather than serialized text.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database (useful
    /// for tests).
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        for role in Role::ALL {
            conn.execute_batch(&format!(
                "
                CREATE TABLE IF NOT EXISTS {players} (
                    mlbam_id         INTEGER PRIMARY KEY,
                    player_name      TEXT NOT NULL,
                    team_id          INTEGER NOT NULL,
                    cur_days_rest    INTEGER NOT NULL,
                    last_score       REAL NOT NULL,
                    normalized_score REAL NOT NULL
                );

                CREATE TABLE IF NOT EXISTS {history} (
                    mlbam_id   INTEGER NOT NULL REFERENCES {players}(mlbam_id) ON DELETE CASCADE,
                    seq        INTEGER NOT NULL,
                    rest_days  INTEGER NOT NULL,
                    score      REAL NOT NULL,
                    normalized REAL NOT NULL,
                    PRIMARY KEY (mlbam_id, seq)
                );
                ",
                players = role.table(),
                history = role.history_table(),
            ))
            .with_context(|| format!("failed to create {role} schema"))?;
        }

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS merge_runs (
                game_date  TEXT PRIMARY KEY,
                pitchers   INTEGER NOT NULL,
                batters    INTEGER NOT NULL,
                applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );",
        )
        .context("failed to create merge_runs table")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    /// Load every tracked player in both roles.
    pub fn load_snapshot(&self) -> Result<Snapshot> {
        let conn = self.conn();
        let mut snapshot = Snapshot::default();
        for role in Role::ALL {
            *snapshot.role_mut(role) = load_role(&conn, role)?;
        }
        Ok(snapshot)
    }

    /// Replace the stored snapshot with `snapshot` and record `game_date` as
    /// merged, all in one transaction. Either everything is written or
    /// nothing is.
    pub fn save_snapshot(&self, snapshot: &Snapshot, game_date: NaiveDate) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .context("failed to begin snapshot transaction")?;

        for role in Role::ALL {
            replace_role(&tx, role, snapshot.role(role))?;
        }

        tx.execute(
            "INSERT INTO merge_runs (game_date, pitchers, batters)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(game_date) DO UPDATE SET
                pitchers   = excluded.pitchers,
                batters    = excluded.batters,
                applied_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
            params![
                game_date.to_string(),
                snapshot.pitchers.len() as i64,
                snapshot.batters.len() as i64,
            ],
        )
        .context("failed to record merge run")?;

        tx.commit().context("failed to commit snapshot")?;
        Ok(())
    }

    /// Whether results for `game_date` have already been merged.
    pub fn is_merged(&self, game_date: NaiveDate) -> Result<bool> {
        let conn = self.conn();
        let exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM merge_runs WHERE game_date = ?1)",
                params![game_date.to_string()],
                |row| row.get(0),
            )
            .context("failed to check merge_runs")?;
        Ok(exists)
    }

    /// Game dates merged so far, oldest first.
    pub fn merged_dates(&self) -> Result<Vec<NaiveDate>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT game_date FROM merge_runs ORDER BY game_date")
            .context("failed to prepare merged_dates query")?;
        let raw = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .context("failed to query merge_runs")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map merge_runs rows")?;

        raw.iter()
            .map(|s| {
                s.parse::<NaiveDate>()
                    .with_context(|| format!("invalid game_date in merge_runs: {s}"))
            })
            .collect()
    }

    /// The most recent game date merged, if any.
    pub fn latest_merged_date(&self) -> Result<Option<NaiveDate>> {
        let conn = self.conn();
        let latest: Option<String> = conn
            .query_row("SELECT MAX(game_date) FROM merge_runs", [], |row| row.get(0))
            .context("failed to query latest merge run")?;
        latest
            .map(|s| {
                s.parse::<NaiveDate>()
                    .with_context(|| format!("invalid game_date in merge_runs: {s}"))
            })
            .transpose()
    }

    /// Number of tracked players in `role`.
    pub fn player_count(&self, role: Role) -> Result<usize> {
        let conn = self.conn();
        let count: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", role.table()), [], |row| {
                row.get(0)
            })
            .with_context(|| format!("failed to count {role} rows"))?;
        Ok(count as usize)
    }
}

fn load_role(conn: &Connection, role: Role) -> Result<BTreeMap<PlayerId, PlayerRecord>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT mlbam_id, player_name, team_id, cur_days_rest, last_score, normalized_score
             FROM {} ORDER BY mlbam_id",
            role.table()
        ))
        .with_context(|| format!("failed to prepare {role} query"))?;

    let mut records: BTreeMap<PlayerId, PlayerRecord> = stmt
        .query_map([], |row| {
            let id: PlayerId = row.get(0)?;
            Ok((
                id,
                PlayerRecord {
                    id,
                    name: row.get(1)?,
                    team_id: row.get(2)?,
                    rest_days: row.get(3)?,
                    rest_history: Vec::new(),
                    last_score: row.get(4)?,
                    score_history: Vec::new(),
                    normalized_score: row.get(5)?,
                    normalized_history: Vec::new(),
                },
            ))
        })
        .with_context(|| format!("failed to query {role} rows"))?
        .collect::<std::result::Result<_, _>>()
        .with_context(|| format!("failed to map {role} rows"))?;

    let mut stmt = conn
        .prepare(&format!(
            "SELECT mlbam_id, rest_days, score, normalized
             FROM {} ORDER BY mlbam_id, seq",
            role.history_table()
        ))
        .with_context(|| format!("failed to prepare {role} history query"))?;

    let points = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, PlayerId>(0)?,
                row.get::<_, u32>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
            ))
        })
        .with_context(|| format!("failed to query {role} history"))?;

    for point in points {
        let (id, rest, score, normalized) =
            point.with_context(|| format!("failed to map {role} history row"))?;
        let Some(record) = records.get_mut(&id) else {
            bail!("{role} history references unknown player {id}");
        };
        record.rest_history.push(rest);
        record.score_history.push(score);
        record.normalized_history.push(normalized);
    }

    Ok(records)
}

fn replace_role(
    tx: &Transaction<'_>,
    role: Role,
    records: &BTreeMap<PlayerId, PlayerRecord>,
) -> Result<()> {
    tx.execute(&format!("DELETE FROM {}", role.history_table()), [])
        .with_context(|| format!("failed to clear {role} history"))?;
    tx.execute(&format!("DELETE FROM {}", role.table()), [])
        .with_context(|| format!("failed to clear {role} rows"))?;

    let mut insert_player = tx
        .prepare(&format!(
            "INSERT INTO {} (mlbam_id, player_name, team_id, cur_days_rest, last_score, normalized_score)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            role.table()
        ))
        .with_context(|| format!("failed to prepare {role} insert"))?;
    let mut insert_point = tx
        .prepare(&format!(
            "INSERT INTO {} (mlbam_id, seq, rest_days, score, normalized)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            role.history_table()
        ))
        .with_context(|| format!("failed to prepare {role} history insert"))?;

    for record in records.values() {
        if !record.histories_in_step() {
            bail!(
                "{role} {} has history series of unequal length ({}/{}/{})",
                record.id,
                record.rest_history.len(),
                record.score_history.len(),
                record.normalized_history.len()
            );
        }

        insert_player
            .execute(params![
                record.id,
                record.name,
                record.team_id,
                record.rest_days,
                record.last_score,
                record.normalized_score,
            ])
            .with_context(|| format!("failed to insert {role} {}", record.id))?;

        for (seq, ((rest, score), normalized)) in record
            .rest_history
            .iter()
            .zip(&record.score_history)
            .zip(&record.normalized_history)
            .enumerate()
        {
            insert_point
                .execute(params![record.id, seq as i64, rest, score, normalized])
                .with_context(|| format!("failed to insert {role} {} history", record.id))?;
        }
    }

    Ok(())
}
