//! ESPN scoreboard ingestion: one-shot season import, one-shot live refresh
//! and the bounded live-poll loop.
//!
//! Every cycle normalizes the whole payload first and only then writes inside
//! a single transaction, so a bad event never leaves a half-applied game.

use anyhow::Result;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::config::AppConfig;
use crate::db::seed::canonical_team;
use crate::db::{team_exists, upsert_game_by_week, upsert_team, UpsertOutcome};
use crate::error::{IngestError, StoreError};
use crate::models::Game;
use crate::services::week::{current_postseason_round, current_week};
use crate::utils::{canonical_team_code, regular_season_weeks};

/// Events whose name contains one of these are exhibitions, not fixtures.
const SPECIAL_EVENTS: [&str; 3] = ["pro bowl", "all-star", "hall of fame"];

/// Conference or all-star placeholders that show up as competitors.
const PLACEHOLDER_CODES: [&str; 4] = ["AFC", "NFC", "PRO", "ALL"];

const PRESEASON_WEEKS: i32 = 4;
const POSTSEASON_WEEKS: i32 = 5;

// ── Season types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeasonType {
    Preseason,
    Regular,
    Postseason,
}

impl SeasonType {
    /// ESPN's `seasontype` query value.
    pub fn code(self) -> u8 {
        match self {
            SeasonType::Preseason => 1,
            SeasonType::Regular => 2,
            SeasonType::Postseason => 3,
        }
    }

    fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(SeasonType::Preseason),
            2 => Some(SeasonType::Regular),
            3 => Some(SeasonType::Postseason),
            _ => None,
        }
    }

    /// Stored week for an ESPN week number: preseason collapses to 0 and
    /// postseason continues after the 18 regular-season slots.
    pub fn stored_week(self, espn_week: i32) -> i32 {
        match self {
            SeasonType::Preseason => 0,
            SeasonType::Regular => espn_week,
            SeasonType::Postseason => 18 + espn_week,
        }
    }

    fn weeks(self, season: i32) -> i32 {
        match self {
            SeasonType::Preseason => PRESEASON_WEEKS,
            SeasonType::Regular => regular_season_weeks(season),
            SeasonType::Postseason => POSTSEASON_WEEKS,
        }
    }
}

impl fmt::Display for SeasonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SeasonType::Preseason => "preseason",
            SeasonType::Regular => "regular season",
            SeasonType::Postseason => "postseason",
        };
        f.write_str(name)
    }
}

impl FromStr for SeasonType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "1" | "pre" | "preseason" => Ok(SeasonType::Preseason),
            "2" | "reg" | "regular" => Ok(SeasonType::Regular),
            "3" | "post" | "postseason" => Ok(SeasonType::Postseason),
            other => Err(anyhow::anyhow!("unknown season type '{}'", other)),
        }
    }
}

// ── ESPN response types ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Scoreboard {
    #[serde(default)]
    events: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct EspnEvent {
    id: String,
    #[serde(default)]
    name: String,
    date: Option<String>,
    season: Option<EspnSeason>,
    week: Option<EspnWeek>,
    #[serde(default)]
    competitions: Vec<EspnCompetition>,
}

#[derive(Debug, Deserialize)]
struct EspnSeason {
    year: Option<i32>,
    #[serde(rename = "type")]
    kind: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct EspnWeek {
    number: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct EspnCompetition {
    #[serde(default)]
    competitors: Vec<EspnCompetitor>,
    status: Option<EspnStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EspnCompetitor {
    #[serde(default)]
    home_away: String,
    team: EspnTeam,
    /// A string on the scoreboard feed, a number on some others
    score: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct EspnTeam {
    abbreviation: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EspnStatus {
    #[serde(default)]
    display_clock: String,
    #[serde(default)]
    period: i32,
    #[serde(rename = "type")]
    kind: Option<EspnStatusType>,
}

#[derive(Debug, Deserialize)]
struct EspnStatusType {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
}

// ── Normalized events ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameState {
    Scheduled,
    InProgress,
    Halftime,
    Final,
    Other,
}

impl GameState {
    fn from_status_name(name: &str) -> Self {
        match name {
            "STATUS_SCHEDULED" => GameState::Scheduled,
            "STATUS_IN_PROGRESS" | "STATUS_END_PERIOD" => GameState::InProgress,
            "STATUS_HALFTIME" => GameState::Halftime,
            "STATUS_FINAL" | "STATUS_FINAL_OVERTIME" => GameState::Final,
            _ => GameState::Other,
        }
    }

    pub fn is_live(self) -> bool {
        matches!(self, GameState::InProgress | GameState::Halftime)
    }
}

/// One upstream event in the entity store's vocabulary.
#[derive(Debug, Clone, Serialize)]
pub struct GameEvent {
    pub event_id: String,
    pub home_team: String,
    pub away_team: String,
    pub home_score: i32,
    pub away_score: i32,
    pub game_date: DateTime<Utc>,
    pub season: i32,
    pub week: i32,
    pub state: GameState,
    pub status: String,
    pub period: i32,
    pub clock: String,
}

impl GameEvent {
    pub fn is_live(&self) -> bool {
        self.state.is_live()
    }

    /// Game row for the week-keyed upsert. Clock and quarter are only kept
    /// while the game is live.
    pub fn to_game(&self) -> Game {
        let mut game = Game::new(&self.home_team, &self.away_team, self.game_date, self.season, self.week)
            .with_score(self.home_score, self.away_score);
        game.is_live = self.is_live();
        game.game_status = self.status.clone();
        if game.is_live {
            game.current_quarter = Some(self.period);
            game.time_remaining = self.clock.clone();
        }
        game
    }
}

/// ESPN sends full RFC 3339 on some feeds and minute precision ("2025-09-05T00:20Z") on others.
pub fn parse_event_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Some(date.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%MZ")
        .ok()
        .map(|naive| naive.and_utc())
}

fn parse_score(event_id: &str, score: Option<&Value>) -> Result<i32, IngestError> {
    let parsed = match score {
        None | Some(Value::Null) => return Ok(0),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(0),
        Some(Value::String(s)) => s.trim().parse::<i32>().ok(),
        Some(Value::Number(n)) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
        Some(_) => None,
    };
    match parsed {
        Some(n) if n >= 0 => Ok(n),
        _ => Err(IngestError::malformed(event_id, format!("bad score {:?}", score))),
    }
}

/// Normalizes one raw scoreboard event. `Ok(None)` means the event is
/// deliberately ignored (exhibitions, placeholder teams).
pub fn normalize_event(raw: &Value, fallback_season: i32, requested: SeasonType) -> Result<Option<GameEvent>, IngestError> {
    let raw_id = raw.get("id").and_then(Value::as_str).unwrap_or("unknown");
    let event: EspnEvent =
        serde_json::from_value(raw.clone()).map_err(|e| IngestError::malformed(raw_id, e.to_string()))?;
    let id = event.id.as_str();

    let name = event.name.to_lowercase();
    if SPECIAL_EVENTS.iter().any(|term| name.contains(term)) {
        tracing::debug!("Skipping special event {} ({})", id, event.name);
        return Ok(None);
    }

    let competition = event
        .competitions
        .first()
        .ok_or_else(|| IngestError::malformed(id, "no competitions"))?;
    if competition.competitors.len() != 2 {
        return Err(IngestError::malformed(
            id,
            format!("expected 2 competitors, got {}", competition.competitors.len()),
        ));
    }

    let side = |which: &str| competition.competitors.iter().find(|c| c.home_away == which);
    let (home, away) = match (side("home"), side("away")) {
        (Some(home), Some(away)) => (home, away),
        _ => return Err(IngestError::malformed(id, "missing home/away designation")),
    };

    let home_team = canonical_team_code(&home.team.abbreviation);
    let away_team = canonical_team_code(&away.team.abbreviation);
    if PLACEHOLDER_CODES.contains(&home_team.as_str()) || PLACEHOLDER_CODES.contains(&away_team.as_str()) {
        tracing::debug!("Skipping event {} with placeholder teams {} @ {}", id, away_team, home_team);
        return Ok(None);
    }

    let game_date = event
        .date
        .as_deref()
        .and_then(parse_event_date)
        .ok_or_else(|| IngestError::malformed(id, format!("unparseable date {:?}", event.date)))?;

    let season_type = event
        .season
        .as_ref()
        .and_then(|s| s.kind)
        .and_then(SeasonType::from_code)
        .unwrap_or(requested);
    let season = event.season.as_ref().and_then(|s| s.year).unwrap_or(fallback_season);

    let espn_week = event.week.as_ref().and_then(|w| w.number);
    let week = match (season_type, espn_week) {
        (SeasonType::Preseason, _) => 0,
        (kind, Some(n)) if n >= 1 => kind.stored_week(n),
        (_, other) => return Err(IngestError::malformed(id, format!("bad week {:?}", other))),
    };

    let status = competition.status.as_ref();
    let status_type = status.and_then(|s| s.kind.as_ref());

    Ok(Some(GameEvent {
        event_id: id.to_string(),
        home_score: parse_score(id, home.score.as_ref())?,
        away_score: parse_score(id, away.score.as_ref())?,
        home_team,
        away_team,
        game_date,
        season,
        week,
        state: GameState::from_status_name(status_type.map(|t| t.name.as_str()).unwrap_or_default()),
        status: status_type.map(|t| t.description.clone()).unwrap_or_default(),
        period: status.map(|s| s.period).unwrap_or_default(),
        clock: status.map(|s| s.display_clock.clone()).unwrap_or_default(),
    }))
}

// ── Fetcher ──────────────────────────────────────────────────────────────────

pub struct EspnFetcher {
    client: Client,
    base_url: String,
}

impl EspnFetcher {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .user_agent(concat!("gridiron/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config.espn_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Raw scoreboard events for one season type, optionally one week.
    pub async fn fetch_scoreboard(
        &self,
        season: i32,
        season_type: SeasonType,
        week: Option<i32>,
    ) -> Result<Vec<Value>, IngestError> {
        let mut url = format!(
            "{}/scoreboard?dates={}&seasontype={}",
            self.base_url,
            season,
            season_type.code()
        );
        if let Some(week) = week {
            url.push_str(&format!("&week={}", week));
        }

        tracing::debug!("GET {}", url);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(IngestError::UpstreamStatus { status, body });
        }

        let board: Scoreboard = response.json().await?;
        Ok(board.events)
    }
}

// ── Applying events ──────────────────────────────────────────────────────────

/// Who may create teams while applying events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamResolution {
    /// Live polling: unknown codes are skipped
    ExistingOnly,
    /// Season import: missing codes from the 32-team directory are created
    CreateCanonical,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestSummary {
    pub fetched: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub malformed: usize,
    pub teams_created: usize,
    pub live: usize,
}

impl IngestSummary {
    fn absorb(&mut self, other: &IngestSummary) {
        self.fetched += other.fetched;
        self.created += other.created;
        self.updated += other.updated;
        self.skipped += other.skipped;
        self.malformed += other.malformed;
        self.teams_created += other.teams_created;
        self.live += other.live;
    }
}

/// Writes normalized events in one transaction. Referential and validation
/// problems skip the event; store failures roll back the whole batch.
pub async fn apply_events(pool: &SqlitePool, events: &[GameEvent], mode: TeamResolution) -> Result<IngestSummary> {
    let mut summary = IngestSummary::default();
    let mut tx = pool.begin().await?;

    for event in events {
        let mut resolved = true;
        for code in [&event.home_team, &event.away_team] {
            if team_exists(&mut *tx, code).await? {
                continue;
            }
            match (mode, canonical_team(code)) {
                (TeamResolution::CreateCanonical, Some(team)) => {
                    upsert_team(&mut *tx, &team).await?;
                    tracing::info!("Created team {} - {}", team.code, team.full_name);
                    summary.teams_created += 1;
                }
                _ => {
                    tracing::warn!("Skipping event {}: {}", event.event_id, IngestError::UnknownTeam(code.clone()));
                    resolved = false;
                }
            }
        }
        if !resolved {
            summary.skipped += 1;
            continue;
        }

        match upsert_game_by_week(&mut *tx, &event.to_game()).await {
            Ok(UpsertOutcome::Created) => summary.created += 1,
            Ok(UpsertOutcome::Updated) => summary.updated += 1,
            Err(e) if e.downcast_ref::<StoreError>().is_some() => {
                tracing::warn!("Rejected event {}: {}", event.event_id, e);
                summary.skipped += 1;
                continue;
            }
            Err(e) => return Err(e),
        }
        if event.is_live() {
            summary.live += 1;
        }
    }

    tx.commit().await?;
    Ok(summary)
}

/// Normalizes a raw batch, then applies whatever survived.
pub async fn ingest_events(
    pool: &SqlitePool,
    raw: &[Value],
    season: i32,
    season_type: SeasonType,
    mode: TeamResolution,
) -> Result<IngestSummary> {
    let mut events = Vec::with_capacity(raw.len());
    let mut malformed = 0;
    let mut ignored = 0;

    for value in raw {
        match normalize_event(value, season, season_type) {
            Ok(Some(event)) => events.push(event),
            Ok(None) => ignored += 1,
            Err(e) => {
                tracing::warn!("{}", e);
                malformed += 1;
            }
        }
    }

    let mut summary = apply_events(pool, &events, mode).await?;
    summary.fetched = raw.len();
    summary.malformed = malformed;
    summary.skipped += ignored;
    Ok(summary)
}

// ── Entry points ─────────────────────────────────────────────────────────────

/// Week-by-week import of a season. A failed week is logged and skipped.
pub async fn import_season(
    pool: &SqlitePool,
    fetcher: &EspnFetcher,
    season: i32,
    season_types: &[SeasonType],
) -> Result<IngestSummary> {
    let mut total = IngestSummary::default();

    for &season_type in season_types {
        for week in 1..=season_type.weeks(season) {
            let raw = match fetcher.fetch_scoreboard(season, season_type, Some(week)).await {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::error!("Fetch failed for {} {} week {}: {}", season, season_type, week, e);
                    continue;
                }
            };
            let summary = ingest_events(pool, &raw, season, season_type, TeamResolution::CreateCanonical).await?;
            tracing::info!(
                "{} {} week {}: {} created, {} updated, {} skipped",
                season,
                season_type,
                week,
                summary.created,
                summary.updated,
                summary.skipped
            );
            total.absorb(&summary);
        }
    }

    Ok(total)
}

/// ESPN week to ask for when none was given: the current regular-season
/// week, the current playoff round, or no week filter for the preseason.
async fn default_espn_week(pool: &SqlitePool, season: i32, season_type: SeasonType) -> Result<Option<i32>> {
    let now = Utc::now();
    let week = match season_type {
        SeasonType::Regular => Some(current_week(pool, season, now).await?),
        SeasonType::Postseason => Some(current_postseason_round(pool, season, now).await?),
        SeasonType::Preseason => None,
    };
    Ok(week)
}

/// One live refresh cycle. `week` is in ESPN numbering for the season type.
pub async fn refresh_live(
    pool: &SqlitePool,
    fetcher: &EspnFetcher,
    season: i32,
    season_type: SeasonType,
    week: Option<i32>,
) -> Result<IngestSummary> {
    let week = match week {
        Some(week) => Some(week),
        None => default_espn_week(pool, season, season_type).await?,
    };

    let raw = fetcher.fetch_scoreboard(season, season_type, week).await?;
    let summary = ingest_events(pool, &raw, season, season_type, TeamResolution::ExistingOnly).await?;
    tracing::info!(
        "Live refresh {} {} week {}: {} updated, {} created, {} live",
        season,
        season_type,
        week.map_or_else(|| "all".to_string(), |w| w.to_string()),
        summary.updated,
        summary.created,
        summary.live
    );
    Ok(summary)
}

// ── Live poller ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PollOptions {
    pub interval: Duration,
    pub season_type: SeasonType,
    pub week: Option<i32>,
    /// Stop after this many cycles
    pub max_cycles: Option<u32>,
    /// Stop after the first successful cycle that finds nothing live
    pub until_idle: bool,
}

#[derive(Debug, Default, Serialize)]
pub struct PollReport {
    pub cycles: u32,
    pub failed_cycles: u32,
    pub last: Option<IngestSummary>,
}

/// Refreshes on a fixed interval until a bound is hit or Ctrl-C arrives.
/// A failed cycle is logged and leaves the store untouched.
pub async fn poll_live(
    pool: &SqlitePool,
    fetcher: &EspnFetcher,
    season: i32,
    options: &PollOptions,
) -> Result<PollReport> {
    let mut report = PollReport::default();
    let mut ticker = tokio::time::interval(options.interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Shutdown requested, stopping live poller");
                break;
            }
            _ = ticker.tick() => {}
        }

        report.cycles += 1;
        match refresh_live(pool, fetcher, season, options.season_type, options.week).await {
            Ok(summary) => {
                let idle = summary.live == 0;
                report.last = Some(summary);
                if options.until_idle && idle {
                    tracing::info!("No live games, stopping live poller");
                    break;
                }
            }
            Err(e) => {
                tracing::error!("Live refresh cycle {} failed: {}", report.cycles, e);
                report.failed_cycles += 1;
            }
        }

        if options.max_cycles.is_some_and(|max| report.cycles >= max) {
            break;
        }
    }

    Ok(report)
}
