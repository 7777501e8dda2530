// Daily report: six result tables, rendered to HTML and CSV and handed to
// one or more delivery sinks.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{error, info};

use crate::history::record::Role;
use crate::predict::{Leader, Probable};

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportTables {
    /// Date whose games were ingested.
    pub game_date: NaiveDate,
    /// Date whose schedule the probables were filtered against.
    pub target_date: NaiveDate,
    pub probable_pitchers: Vec<Probable>,
    pub probable_batters: Vec<Probable>,
    pub top_pitchers_by_normalized: Vec<Leader>,
    pub top_pitchers_by_last: Vec<Leader>,
    pub top_batters_by_normalized: Vec<Leader>,
    pub top_batters_by_last: Vec<Leader>,
}

/// One table flattened to strings, ready for any output format.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedTable {
    pub slug: &'static str,
    pub title: String,
    pub headers: Vec<&'static str>,
    pub rows: Vec<Vec<String>>,
}

const PROBABLE_HEADERS: [&str; 8] = [
    "Player",
    "MLBAM ID",
    "Team",
    "Days rested",
    "Median rest",
    "Sharpe",
    "Score per unit",
    "Last score",
];

fn probable_table(slug: &'static str, title: String, rows: &[Probable]) -> RenderedTable {
    RenderedTable {
        slug,
        title,
        headers: PROBABLE_HEADERS.to_vec(),
        rows: rows
            .iter()
            .map(|p| {
                vec![
                    p.name.clone(),
                    p.player_id.to_string(),
                    p.team_id.to_string(),
                    p.rest_days.to_string(),
                    format!("{:.1}", p.median_rest),
                    format!("{:.2}", p.sharpe),
                    format!("{:.1}", p.normalized_score),
                    format!("{:.1}", p.last_score),
                ]
            })
            .collect(),
    }
}

fn leader_table(
    slug: &'static str,
    title: String,
    value_header: &'static str,
    rows: &[Leader],
) -> RenderedTable {
    RenderedTable {
        slug,
        title,
        headers: vec!["Player", "MLBAM ID", "Team", value_header],
        rows: rows
            .iter()
            .map(|l| {
                vec![
                    l.name.clone(),
                    l.player_id.to_string(),
                    l.team_id.to_string(),
                    format!("{:.1}", l.value),
                ]
            })
            .collect(),
    }
}

impl ReportTables {
    /// All six tables in presentation order.
    pub fn tables(&self) -> Vec<RenderedTable> {
        let per_inning = Role::Pitcher.per_label();
        let per_pa = Role::Batter.per_label();
        vec![
            probable_table(
                "probable-pitchers",
                format!("Probable pitchers for {}", self.target_date),
                &self.probable_pitchers,
            ),
            probable_table(
                "probable-batters",
                format!("Probable batters for {}", self.target_date),
                &self.probable_batters,
            ),
            leader_table(
                "top-pitchers-normalized",
                format!("Top pitchers by points per {per_inning}"),
                "Points per inning",
                &self.top_pitchers_by_normalized,
            ),
            leader_table(
                "top-pitchers-last",
                "Top pitchers by last score".to_string(),
                "Last score",
                &self.top_pitchers_by_last,
            ),
            leader_table(
                "top-batters-normalized",
                format!("Top batters by points per {per_pa}"),
                "Points per PA",
                &self.top_batters_by_normalized,
            ),
            leader_table(
                "top-batters-last",
                "Top batters by last score".to_string(),
                "Last score",
                &self.top_batters_by_last,
            ),
        ]
    }

    pub fn file_stem(&self) -> String {
        format!("waiver-wire-{}", self.game_date.format("%Y-%m-%d"))
    }

    pub fn to_html(&self) -> String {
        let mut html = String::new();
        let _ = writeln!(html, "<!DOCTYPE html>");
        let _ = writeln!(html, "<html><head><meta charset=\"utf-8\">");
        let _ = writeln!(html, "<title>Waiver wire {}</title>", self.game_date);
        let _ = writeln!(html, "</head><body>");
        let _ = writeln!(
            html,
            "<h1>Waiver wire: games of {}, schedule of {}</h1>",
            self.game_date, self.target_date
        );
        for table in self.tables() {
            render_html_table(&mut html, &table);
        }
        let _ = writeln!(html, "</body></html>");
        html
    }
}

fn render_html_table(out: &mut String, table: &RenderedTable) {
    let _ = writeln!(out, "<h2>{}</h2>", escape_html(&table.title));
    if table.rows.is_empty() {
        let _ = writeln!(out, "<p>No players.</p>");
        return;
    }
    let _ = writeln!(out, "<table border=\"1\">");
    out.push_str("<tr>");
    for header in &table.headers {
        let _ = write!(out, "<th>{}</th>", escape_html(header));
    }
    out.push_str("</tr>\n");
    for row in &table.rows {
        out.push_str("<tr>");
        for cell in row {
            let _ = write!(out, "<td>{}</td>", escape_html(cell));
        }
        out.push_str("</tr>\n");
    }
    let _ = writeln!(out, "</table>");
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Render one table as CSV with a header row.
pub fn to_csv(table: &RenderedTable) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("failed to flush CSV for {}: {e}", table.slug))?;
    String::from_utf8(bytes).context("CSV output was not UTF-8")
}

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

/// Somewhere a finished report can be sent.
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Short label for logs.
    fn name(&self) -> &str;

    async fn deliver(&self, report: &ReportTables) -> Result<()>;
}

/// Writes `<stem>.html` and one `<stem>-<table>.csv` per table.
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl ReportSink for FileSink {
    fn name(&self) -> &str {
        "file"
    }

    async fn deliver(&self, report: &ReportTables) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create {}", self.dir.display()))?;

        let stem = report.file_stem();
        let html_path = self.dir.join(format!("{stem}.html"));
        tokio::fs::write(&html_path, report.to_html())
            .await
            .with_context(|| format!("failed to write {}", html_path.display()))?;

        for table in report.tables() {
            let csv_path = self.dir.join(format!("{stem}-{}.csv", table.slug));
            tokio::fs::write(&csv_path, to_csv(&table)?)
                .await
                .with_context(|| format!("failed to write {}", csv_path.display()))?;
        }

        info!(dir = %self.dir.display(), stem, "report written");
        Ok(())
    }
}

/// POSTs the tables as JSON.
pub struct WebhookSink {
    http: reqwest::Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build webhook HTTP client")?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ReportSink for WebhookSink {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn deliver(&self, report: &ReportTables) -> Result<()> {
        self.http
            .post(&self.url)
            .json(report)
            .send()
            .await
            .with_context(|| format!("POST {} failed", self.url))?
            .error_for_status()
            .with_context(|| format!("POST {} rejected", self.url))?;
        info!(url = %self.url, "report posted");
        Ok(())
    }
}

/// Hand the report to every sink. Failures are logged and counted, never
/// propagated.
pub async fn deliver_all(sinks: &[Box<dyn ReportSink>], report: &ReportTables) -> usize {
    let mut failures = 0;
    for sink in sinks {
        if let Err(e) = sink.deliver(report).await {
            error!(sink = sink.name(), error = %format!("{e:#}"), "report delivery failed");
            failures += 1;
        }
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn sample() -> ReportTables {
        ReportTables {
            game_date: date("2024-06-01"),
            target_date: date("2024-06-02"),
            probable_pitchers: vec![Probable {
                player_id: 605400,
                name: "Aaron Nola".into(),
                team_id: 143,
                rest_days: 5,
                median_rest: 4.0,
                sharpe: 1.2345,
                normalized_score: 10.0,
                last_score: 60.0,
            }],
            probable_batters: vec![],
            top_pitchers_by_normalized: vec![],
            top_pitchers_by_last: vec![],
            top_batters_by_normalized: vec![Leader {
                player_id: 1,
                name: "O'Neil <Cruz>".into(),
                team_id: 134,
                value: 2.8,
            }],
            top_batters_by_last: vec![],
        }
    }

    #[test]
    fn six_tables_in_order() {
        let slugs: Vec<&str> = sample().tables().iter().map(|t| t.slug).collect();
        assert_eq!(
            slugs,
            vec![
                "probable-pitchers",
                "probable-batters",
                "top-pitchers-normalized",
                "top-pitchers-last",
                "top-batters-normalized",
                "top-batters-last",
            ]
        );
    }

    #[test]
    fn probable_row_formatting() {
        let tables = sample().tables();
        assert_eq!(
            tables[0].rows[0],
            vec!["Aaron Nola", "605400", "143", "5", "4.0", "1.23", "10.0", "60.0"]
        );
        assert!(tables[0].title.contains("2024-06-02"));
    }

    #[test]
    fn html_escapes_names() {
        let html = sample().to_html();
        assert!(html.contains("O&#39;Neil &lt;Cruz&gt;"));
        assert!(!html.contains("<Cruz>"));
        assert!(html.contains("<p>No players.</p>"));
    }

    #[test]
    fn csv_has_header_and_rows() {
        let tables = sample().tables();
        let csv = to_csv(&tables[0]).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("Player,MLBAM ID,Team,Days rested,Median rest,Sharpe,Score per unit,Last score")
        );
        assert_eq!(lines.next(), Some("Aaron Nola,605400,143,5,4.0,1.23,10.0,60.0"));
        assert_eq!(lines.next(), None);
    }

    #[tokio::test]
    async fn file_sink_writes_html_and_csv() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path().join("reports"));
        sink.deliver(&sample()).await.unwrap();

        let html = dir.path().join("reports/waiver-wire-2024-06-01.html");
        assert!(html.exists());
        let csv = std::fs::read_to_string(
            dir.path().join("reports/waiver-wire-2024-06-01-top-batters-normalized.csv"),
        )
        .unwrap();
        assert_eq!(csv, "Player,MLBAM ID,Team,Points per PA\nO'Neil <Cruz>,1,134,2.8\n");
    }

    #[test]
    fn csv_quotes_names_with_commas() {
        let table = leader_table(
            "top-batters-last",
            "Top batters by last score".to_string(),
            "Last score",
            &[Leader {
                player_id: 669257,
                name: "Smith, Will".into(),
                team_id: 119,
                value: 14.0,
            }],
        );
        let csv = to_csv(&table).unwrap();
        assert_eq!(csv.lines().nth(1), Some("\"Smith, Will\",669257,119,14.0"));
    }

    struct FailingSink(AtomicUsize);

    #[async_trait]
    impl ReportSink for FailingSink {
        fn name(&self) -> &str {
            "failing"
        }
        async fn deliver(&self, _report: &ReportTables) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("smtp relay unreachable")
        }
    }

    #[tokio::test]
    async fn delivery_failures_are_counted_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let sinks: Vec<Box<dyn ReportSink>> = vec![
            Box::new(FailingSink(AtomicUsize::new(0))),
            Box::new(FileSink::new(dir.path())),
        ];
        let failures = deliver_all(&sinks, &sample()).await;
        assert_eq!(failures, 1);
        assert!(dir.path().join("waiver-wire-2024-06-01.html").exists());
    }
}
