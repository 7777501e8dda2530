// Configuration loading and parsing (waiver.toml, credentials.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::stats::scoring::ScoringRules;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub league: LeagueConfig,
    pub scoring: ScoringRules,
    pub prediction: PredictionConfig,
    pub stats_api: StatsApiConfig,
    pub espn: EspnConfig,
    pub database: DatabaseConfig,
    pub report: ReportConfig,
    pub credentials: CredentialsConfig,
}

// ---------------------------------------------------------------------------
// waiver.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire waiver.toml file.
#[derive(Debug, Clone, Deserialize)]
struct WaiverFile {
    league: LeagueConfig,
    #[serde(default)]
    scoring: ScoringRules,
    #[serde(default)]
    prediction: PredictionConfig,
    #[serde(default)]
    stats_api: StatsApiConfig,
    #[serde(default)]
    espn: EspnConfig,
    #[serde(default)]
    database: DatabaseConfig,
    #[serde(default)]
    report: ReportConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeagueConfig {
    /// ESPN fantasy league identifier.
    pub league_id: u64,
    pub season: u16,
    /// How many free agents to pull from ESPN, most-owned first.
    #[serde(default = "default_free_agent_limit")]
    pub free_agent_limit: usize,
}

fn default_free_agent_limit() -> usize {
    1500
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    /// Rows in each top-by-score recap table.
    pub recap_size: usize,
    /// Cap on each probable table after filtering. `None` keeps every row.
    pub probable_limit: Option<usize>,
    /// Minimum name similarity for a free-agent match.
    pub match_threshold: f64,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            recap_size: 5,
            probable_limit: None,
            match_threshold: crate::identity::DEFAULT_MATCH_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StatsApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for StatsApiConfig {
    fn default() -> Self {
        Self {
            base_url: crate::mlb::DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EspnConfig {
    pub base_url: String,
}

impl Default for EspnConfig {
    fn default() -> Self {
        Self {
            base_url: crate::espn::DEFAULT_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file. When omitted the platform data directory is used.
    pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub output_dir: String,
    pub webhook_url: Option<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: "reports".to_string(),
            webhook_url: None,
        }
    }
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

/// ESPN session cookies for private leagues.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    pub espn_s2: Option<String>,
    pub swid: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/waiver.toml` and (optionally)
/// `config/credentials.toml`, relative to `base_dir`.
///
/// Does not copy defaults; `load_config` does.
pub(crate) fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- waiver.toml (required) ---
    let waiver_path = config_dir.join("waiver.toml");
    let waiver_text = read_file(&waiver_path)?;
    let waiver: WaiverFile = toml::from_str(&waiver_text).map_err(|e| ConfigError::ParseError {
        path: waiver_path.clone(),
        source: e,
    })?;

    // --- credentials.toml (optional) ---
    let credentials_path = config_dir.join("credentials.toml");
    let credentials = if credentials_path.exists() {
        let cred_text = read_file(&credentials_path)?;
        toml::from_str(&cred_text).map_err(|e| ConfigError::ParseError {
            path: credentials_path.clone(),
            source: e,
        })?
    } else {
        CredentialsConfig::default()
    };

    let config = Config {
        league: waiver.league,
        scoring: waiver.scoring,
        prediction: waiver.prediction,
        stats_api: waiver.stats_api,
        espn: waiver.espn,
        database: waiver.database,
        report: waiver.report,
        credentials,
    };

    validate(&config)?;

    Ok(config)
}

/// Copy every shipped template in `defaults/` that has no counterpart in
/// `config/`, in file-name order. Existing files are never touched and
/// `*.example` templates are left for the user to copy by hand.
///
/// Returns the paths written.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.is_dir() {
        return if config_dir.is_dir() {
            Ok(Vec::new())
        } else {
            Err(copy_error(format!(
                "no defaults/ or config/ under {}; pass --config-dir or run from the project root",
                base_dir.display()
            )))
        };
    }

    std::fs::create_dir_all(&config_dir)
        .map_err(|e| copy_error(format!("cannot create {}: {e}", config_dir.display())))?;

    let mut templates = Vec::new();
    for entry in std::fs::read_dir(&defaults_dir)
        .map_err(|e| copy_error(format!("cannot list {}: {e}", defaults_dir.display())))?
    {
        let path = entry
            .map_err(|e| copy_error(format!("cannot list {}: {e}", defaults_dir.display())))?
            .path();
        let is_template = path.is_file()
            && path.extension().and_then(|ext| ext.to_str()) != Some("example");
        if is_template {
            templates.push(path);
        }
    }
    templates.sort();

    let mut written = Vec::new();
    for template in templates {
        let Some(name) = template.file_name() else {
            continue;
        };
        let target = config_dir.join(name);
        if copy_if_missing(&template, &target)? {
            written.push(target);
        }
    }
    Ok(written)
}

/// Create `target` with the bytes of `source` unless it already exists.
/// `create_new` makes the existence check and the create one step.
fn copy_if_missing(source: &Path, target: &Path) -> Result<bool, ConfigError> {
    use std::io::Write;

    let mut dest = match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(target)
    {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(copy_error(format!("cannot create {}: {e}", target.display()))),
    };
    let bytes = std::fs::read(source)
        .map_err(|e| copy_error(format!("cannot read {}: {e}", source.display())))?;
    dest.write_all(&bytes)
        .map_err(|e| copy_error(format!("cannot write {}: {e}", target.display())))?;
    Ok(true)
}

fn copy_error(message: String) -> ConfigError {
    ConfigError::DefaultsCopyError { message }
}

/// Copy any missing defaults into `base_dir/config`, then load.
pub fn load_config(base_dir: &Path) -> Result<Config, ConfigError> {
    ensure_config_files(base_dir)?;
    load_config_from(base_dir)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.league.season == 0 {
        return Err(ConfigError::ValidationError {
            field: "league.season".into(),
            message: "must be greater than 0".into(),
        });
    }

    let counts: &[(&str, usize)] = &[
        ("league.free_agent_limit", config.league.free_agent_limit),
        ("prediction.recap_size", config.prediction.recap_size),
    ];
    for (name, val) in counts {
        if *val == 0 {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: "must be > 0".into(),
            });
        }
    }

    let threshold = config.prediction.match_threshold;
    if !(threshold > 0.0 && threshold <= 1.0) {
        return Err(ConfigError::ValidationError {
            field: "prediction.match_threshold".into(),
            message: format!("must be in (0.0, 1.0], got {threshold}"),
        });
    }

    let min_innings = config.scoring.quality_start.min_innings;
    if min_innings <= 0.0 {
        return Err(ConfigError::ValidationError {
            field: "scoring.quality_start.min_innings".into(),
            message: format!("must be > 0, got {min_innings}"),
        });
    }

    if config.stats_api.timeout_secs == 0 {
        return Err(ConfigError::ValidationError {
            field: "stats_api.timeout_secs".into(),
            message: "must be > 0".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const MINIMAL: &str = r#"
[league]
league_id = 12345
season = 2024
"#;

    /// The shipped defaults live next to this crate's Cargo.toml.
    fn defaults_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("defaults")
    }

    fn write_waiver(dir: &Path, text: &str) {
        let config_dir = dir.join("config");
        fs::create_dir_all(&config_dir).unwrap();
        fs::write(config_dir.join("waiver.toml"), text).unwrap();
    }

    fn expect_field(err: ConfigError, expected: &str) {
        match err {
            ConfigError::ValidationError { field, .. } => assert_eq!(field, expected),
            other => panic!("expected ValidationError, got: {other}"),
        }
    }

    #[test]
    fn shipped_defaults_load() {
        let tmp = tempfile::tempdir().unwrap();
        let config_dir = tmp.path().join("config");
        fs::create_dir_all(&config_dir).unwrap();
        fs::copy(defaults_dir().join("waiver.toml"), config_dir.join("waiver.toml")).unwrap();

        let config = load_config_from(tmp.path()).expect("should load shipped defaults");
        assert_eq!(config.league.free_agent_limit, 1500);
        assert_eq!(config.prediction.recap_size, 5);
        assert!((config.prediction.match_threshold - 0.95).abs() < f64::EPSILON);
        assert_eq!(config.scoring, ScoringRules::default());
        assert_eq!(config.stats_api.base_url, crate::mlb::DEFAULT_BASE_URL);
        assert!(config.report.webhook_url.is_none());
    }

    #[test]
    fn minimal_file_falls_back_to_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        write_waiver(tmp.path(), MINIMAL);

        let config = load_config_from(tmp.path()).unwrap();
        assert_eq!(config.league.league_id, 12345);
        assert_eq!(config.scoring, ScoringRules::default());
        assert_eq!(config.report.output_dir, "reports");
        assert!(config.database.path.is_none());
        assert!(config.credentials.espn_s2.is_none());
    }

    #[test]
    fn custom_point_table() {
        let tmp = tempfile::tempdir().unwrap();
        write_waiver(
            tmp.path(),
            r#"
[league]
league_id = 1
season = 2024

[scoring]
single_points = 3.0

[scoring.pitching]
outs = 1.0
strikeOuts = 2.0

[scoring.batting]
homeRuns = 10.0
"#,
        );

        let config = load_config_from(tmp.path()).unwrap();
        assert_eq!(config.scoring.pitching.weight("strikeOuts"), 2.0);
        assert_eq!(config.scoring.pitching.weight("wins"), 0.0);
        assert_eq!(config.scoring.batting.weight("homeRuns"), 10.0);
        assert_eq!(config.scoring.single_points, 3.0);
        assert_eq!(config.scoring.quality_start.points, 8.0);
    }

    #[test]
    fn partial_scoring_section_keeps_league_tables() {
        let tmp = tempfile::tempdir().unwrap();
        write_waiver(
            tmp.path(),
            &format!("{MINIMAL}\n[scoring]\nsingle_points = 3.0\n"),
        );

        let config = load_config_from(tmp.path()).expect("partial [scoring] should load");
        let defaults = ScoringRules::default();
        assert_eq!(config.scoring.single_points, 3.0);
        assert_eq!(config.scoring.pitching, defaults.pitching);
        assert_eq!(config.scoring.batting, defaults.batting);
        assert_eq!(config.scoring.quality_start, defaults.quality_start);
    }

    #[test]
    fn one_point_table_overrides_only_that_role() {
        let tmp = tempfile::tempdir().unwrap();
        write_waiver(
            tmp.path(),
            &format!(
                "{MINIMAL}\n[scoring.batting]\nhomeRuns = 10.0\n\n\
                 [scoring.quality_start]\npoints = 5.0\n"
            ),
        );

        let config = load_config_from(tmp.path()).unwrap();
        let defaults = ScoringRules::default();
        assert_eq!(config.scoring.batting.weight("homeRuns"), 10.0);
        assert_eq!(config.scoring.batting.weight("rbi"), 0.0);
        assert_eq!(config.scoring.pitching, defaults.pitching);
        assert_eq!(config.scoring.quality_start.points, 5.0);
        assert_eq!(config.scoring.quality_start.min_innings, 6.0);
        assert_eq!(config.scoring.single_points, 2.0);
    }

    #[test]
    fn credentials_are_read_when_present() {
        let tmp = tempfile::tempdir().unwrap();
        write_waiver(tmp.path(), MINIMAL);
        fs::write(
            tmp.path().join("config/credentials.toml"),
            "espn_s2 = \"AEB123\"\nswid = \"{ABC-DEF}\"\n",
        )
        .unwrap();

        let config = load_config_from(tmp.path()).unwrap();
        assert_eq!(config.credentials.espn_s2.as_deref(), Some("AEB123"));
        assert_eq!(config.credentials.swid.as_deref(), Some("{ABC-DEF}"));
    }

    #[test]
    fn missing_waiver_toml_is_file_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let err = load_config_from(tmp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let tmp = tempfile::tempdir().unwrap();
        write_waiver(tmp.path(), "[league\nleague_id = ");
        let err = load_config_from(tmp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn rejects_threshold_out_of_range() {
        for bad in ["0.0", "1.5", "-0.2"] {
            let tmp = tempfile::tempdir().unwrap();
            write_waiver(
                tmp.path(),
                &format!("{MINIMAL}\n[prediction]\nmatch_threshold = {bad}\n"),
            );
            expect_field(
                load_config_from(tmp.path()).unwrap_err(),
                "prediction.match_threshold",
            );
        }
    }

    #[test]
    fn threshold_of_one_is_allowed() {
        let tmp = tempfile::tempdir().unwrap();
        write_waiver(
            tmp.path(),
            &format!("{MINIMAL}\n[prediction]\nmatch_threshold = 1.0\n"),
        );
        assert!(load_config_from(tmp.path()).is_ok());
    }

    #[test]
    fn rejects_zero_counts() {
        let tmp = tempfile::tempdir().unwrap();
        write_waiver(tmp.path(), &format!("{MINIMAL}\n[prediction]\nrecap_size = 0\n"));
        expect_field(load_config_from(tmp.path()).unwrap_err(), "prediction.recap_size");

        let tmp = tempfile::tempdir().unwrap();
        write_waiver(
            tmp.path(),
            "[league]\nleague_id = 1\nseason = 2024\nfree_agent_limit = 0\n",
        );
        expect_field(
            load_config_from(tmp.path()).unwrap_err(),
            "league.free_agent_limit",
        );

        let tmp = tempfile::tempdir().unwrap();
        write_waiver(tmp.path(), "[league]\nleague_id = 1\nseason = 0\n");
        expect_field(load_config_from(tmp.path()).unwrap_err(), "league.season");
    }

    #[test]
    fn rejects_non_positive_quality_start_innings() {
        let tmp = tempfile::tempdir().unwrap();
        write_waiver(
            tmp.path(),
            &format!("{MINIMAL}\n[scoring.quality_start]\nmin_innings = 0.0\n"),
        );
        expect_field(
            load_config_from(tmp.path()).unwrap_err(),
            "scoring.quality_start.min_innings",
        );
    }

    #[test]
    fn rejects_zero_timeout() {
        let tmp = tempfile::tempdir().unwrap();
        write_waiver(tmp.path(), &format!("{MINIMAL}\n[stats_api]\ntimeout_secs = 0\n"));
        expect_field(load_config_from(tmp.path()).unwrap_err(), "stats_api.timeout_secs");
    }

    // -----------------------------------------------------------------------
    // ensure_config_files
    // -----------------------------------------------------------------------

    #[test]
    fn ensure_copies_defaults_and_skips_examples() {
        let tmp = tempfile::tempdir().unwrap();
        let defaults = tmp.path().join("defaults");
        fs::create_dir_all(&defaults).unwrap();
        fs::write(defaults.join("waiver.toml"), MINIMAL).unwrap();
        fs::write(defaults.join("credentials.toml.example"), "espn_s2 = \"x\"\n").unwrap();

        let copied = ensure_config_files(tmp.path()).unwrap();
        assert_eq!(copied, vec![tmp.path().join("config/waiver.toml")]);
        assert!(!tmp.path().join("config/credentials.toml.example").exists());

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.league.season, 2024);
    }

    #[test]
    fn ensure_never_overwrites_existing_config() {
        let tmp = tempfile::tempdir().unwrap();
        let defaults = tmp.path().join("defaults");
        fs::create_dir_all(&defaults).unwrap();
        fs::write(defaults.join("waiver.toml"), MINIMAL).unwrap();
        write_waiver(tmp.path(), "[league]\nleague_id = 99\nseason = 2023\n");

        let copied = ensure_config_files(tmp.path()).unwrap();
        assert!(copied.is_empty());
        let config = load_config_from(tmp.path()).unwrap();
        assert_eq!(config.league.league_id, 99);
    }

    #[test]
    fn ensure_fills_only_missing_files_in_name_order() {
        let tmp = tempfile::tempdir().unwrap();
        let defaults = tmp.path().join("defaults");
        fs::create_dir_all(defaults.join("nested")).unwrap();
        for name in ["waiver.toml", "credentials.toml", "alerts.toml"] {
            fs::write(defaults.join(name), "# shipped\n").unwrap();
        }
        fs::create_dir_all(tmp.path().join("config")).unwrap();
        fs::write(tmp.path().join("config/credentials.toml"), "swid = \"{ME}\"\n").unwrap();

        let copied = ensure_config_files(tmp.path()).unwrap();
        assert_eq!(
            copied,
            vec![
                tmp.path().join("config/alerts.toml"),
                tmp.path().join("config/waiver.toml"),
            ]
        );
        assert!(!tmp.path().join("config/nested").exists());
        assert_eq!(
            fs::read_to_string(tmp.path().join("config/credentials.toml")).unwrap(),
            "swid = \"{ME}\"\n"
        );
    }

    #[test]
    fn ensure_with_config_but_no_defaults_is_a_no_op() {
        let tmp = tempfile::tempdir().unwrap();
        write_waiver(tmp.path(), MINIMAL);
        assert!(ensure_config_files(tmp.path()).unwrap().is_empty());
    }

    #[test]
    fn ensure_without_any_directories_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let err = ensure_config_files(tmp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::DefaultsCopyError { .. }));
    }
}
