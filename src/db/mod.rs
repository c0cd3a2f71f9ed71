pub mod seed;
pub use seed::seed_teams;

use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteRow};
use sqlx::{Executor, Row, Sqlite, SqliteConnection, SqlitePool};
use std::str::FromStr;

use crate::error::StoreError;
use crate::models::*;
use crate::services::record::Record;

pub async fn create_pool(database_url: &str) -> Result<SqlitePool> {
    // Strip the "sqlite:" prefix to get the file path, create parent dir if needed
    let file_path = database_url
        .strip_prefix("sqlite:///")
        .or_else(|| database_url.strip_prefix("sqlite://"))
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(database_url);

    if !file_path.starts_with(":memory:") {
        if let Some(parent) = std::path::Path::new(file_path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
        }
    }

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePool::connect_with(options).await?;
    Ok(pool)
}

/// Called from the CLI where no pool exists yet.
pub async fn init_database(database_url: &str) -> Result<SqlitePool> {
    let pool = create_pool(database_url).await?;
    init_database_with_pool(&pool).await?;
    Ok(pool)
}

pub async fn init_database_with_pool(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS teams (
            code TEXT PRIMARY KEY,
            full_name TEXT NOT NULL,
            city TEXT NOT NULL,
            conference TEXT NOT NULL CHECK (conference IN ('AFC', 'NFC')),
            division TEXT NOT NULL CHECK (division IN ('North', 'East', 'South', 'West')),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS games (
            id TEXT PRIMARY KEY,
            home_team TEXT NOT NULL,
            away_team TEXT NOT NULL,
            home_score INTEGER NOT NULL DEFAULT 0 CHECK (home_score >= 0),
            away_score INTEGER NOT NULL DEFAULT 0 CHECK (away_score >= 0),
            game_date TEXT NOT NULL,
            week INTEGER NOT NULL,
            season INTEGER NOT NULL,
            is_live INTEGER NOT NULL DEFAULT 0,
            game_status TEXT NOT NULL DEFAULT '',
            current_quarter INTEGER,
            time_remaining TEXT NOT NULL DEFAULT '',
            last_updated TEXT NOT NULL,
            CHECK (home_team <> away_team),
            UNIQUE (home_team, away_team, game_date),
            FOREIGN KEY (home_team) REFERENCES teams (code) ON DELETE CASCADE,
            FOREIGN KEY (away_team) REFERENCES teams (code) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Cached per-season records and rankings, rewritten by the ranking engine
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS team_season_stats (
            team TEXT NOT NULL,
            season INTEGER NOT NULL,
            wins INTEGER NOT NULL,
            losses INTEGER NOT NULL,
            ties INTEGER NOT NULL,
            points_for INTEGER NOT NULL,
            points_against INTEGER NOT NULL,
            rank_league INTEGER NOT NULL,
            rank_conference INTEGER NOT NULL,
            rank_division INTEGER NOT NULL,
            rank_offense_league INTEGER NOT NULL,
            rank_offense_conference INTEGER NOT NULL,
            rank_offense_division INTEGER NOT NULL,
            rank_defense_league INTEGER NOT NULL,
            rank_defense_conference INTEGER NOT NULL,
            rank_defense_division INTEGER NOT NULL,
            conference_ties INTEGER NOT NULL,
            conference_tie_rank INTEGER NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (team, season),
            FOREIGN KEY (team) REFERENCES teams (code) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_games_season_week ON games(season, week)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_games_home ON games(home_team, season)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_games_away ON games(away_team, season)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_games_live ON games(is_live)")
        .execute(pool)
        .await?;

    tracing::info!("Database initialized successfully");
    Ok(())
}

// Row helpers

/// Fixed-width UTC text so lexical order matches chronological order.
pub fn timestamp(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
}

fn team_from_row(row: &SqliteRow) -> Result<Team> {
    Ok(Team {
        code: row.try_get("code")?,
        full_name: row.try_get("full_name")?,
        city: row.try_get("city")?,
        conference: row.try_get::<String, _>("conference")?.parse()?,
        division: row.try_get::<String, _>("division")?.parse()?,
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
        updated_at: parse_timestamp(&row.try_get::<String, _>("updated_at")?)?,
    })
}

fn game_from_row(row: &SqliteRow) -> Result<Game> {
    Ok(Game {
        id: row.try_get("id")?,
        home_team: row.try_get("home_team")?,
        away_team: row.try_get("away_team")?,
        home_score: row.try_get("home_score")?,
        away_score: row.try_get("away_score")?,
        game_date: parse_timestamp(&row.try_get::<String, _>("game_date")?)?,
        week: row.try_get("week")?,
        season: row.try_get("season")?,
        is_live: row.try_get("is_live")?,
        game_status: row.try_get("game_status")?,
        current_quarter: row.try_get("current_quarter")?,
        time_remaining: row.try_get("time_remaining")?,
        last_updated: parse_timestamp(&row.try_get::<String, _>("last_updated")?)?,
    })
}

fn stats_from_row(row: &SqliteRow) -> Result<TeamSeasonStats> {
    let count = |column: &str| -> Result<u32> { Ok(row.try_get::<i64, _>(column)? as u32) };
    Ok(TeamSeasonStats {
        team: row.try_get("team")?,
        season: row.try_get("season")?,
        record: Record {
            wins: count("wins")?,
            losses: count("losses")?,
            ties: count("ties")?,
            points_for: count("points_for")?,
            points_against: count("points_against")?,
        },
        rankings: TeamRankings {
            overall: ScopedRank {
                league: count("rank_league")?,
                conference: count("rank_conference")?,
                division: count("rank_division")?,
            },
            offense: ScopedRank {
                league: count("rank_offense_league")?,
                conference: count("rank_offense_conference")?,
                division: count("rank_offense_division")?,
            },
            defense: ScopedRank {
                league: count("rank_defense_league")?,
                conference: count("rank_defense_conference")?,
                division: count("rank_defense_division")?,
            },
            conference_ties: count("conference_ties")?,
            conference_tie_rank: count("conference_tie_rank")?,
        },
        updated_at: parse_timestamp(&row.try_get::<String, _>("updated_at")?)?,
    })
}

fn games_from_rows(rows: &[SqliteRow]) -> Result<Vec<Game>> {
    rows.iter().map(game_from_row).collect()
}

// Team operations

/// Insert or update by code. Updating in place keeps the team's games;
/// `INSERT OR REPLACE` would delete the row and cascade.
pub async fn upsert_team<'e, E>(executor: E, team: &Team) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO teams (code, full_name, city, conference, division, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(code) DO UPDATE SET
            full_name  = excluded.full_name,
            city       = excluded.city,
            conference = excluded.conference,
            division   = excluded.division,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&team.code)
    .bind(&team.full_name)
    .bind(&team.city)
    .bind(team.conference.as_str())
    .bind(team.division.as_str())
    .bind(timestamp(team.created_at))
    .bind(timestamp(team.updated_at))
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn get_team(pool: &SqlitePool, code: &str) -> Result<Option<Team>> {
    let row = sqlx::query("SELECT * FROM teams WHERE code = ?")
        .bind(code)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(team_from_row).transpose()
}

pub async fn get_all_teams(pool: &SqlitePool) -> Result<Vec<Team>> {
    let rows = sqlx::query("SELECT * FROM teams ORDER BY code")
        .fetch_all(pool)
        .await?;

    rows.iter().map(team_from_row).collect()
}

pub async fn team_exists<'e, E>(executor: E, code: &str) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let found: Option<String> = sqlx::query_scalar("SELECT code FROM teams WHERE code = ?")
        .bind(code)
        .fetch_optional(executor)
        .await?;
    Ok(found.is_some())
}

pub async fn count_teams(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM teams")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Deletes a team; its games and cached stats go with it.
pub async fn delete_team(pool: &SqlitePool, code: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM teams WHERE code = ?")
        .bind(code)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// Game operations

fn validate_game(game: &Game) -> std::result::Result<(), StoreError> {
    if game.home_team == game.away_team {
        return Err(StoreError::SameTeam(game.home_team.clone()));
    }
    if game.home_score < 0 || game.away_score < 0 {
        return Err(StoreError::NegativeScore {
            home: game.home_score,
            away: game.away_score,
        });
    }
    Ok(())
}

/// Date-keyed upsert: (home, away, game_date) identifies the fixture.
pub async fn insert_game<'e, E>(executor: E, game: &Game) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    validate_game(game)?;

    sqlx::query(
        r#"
        INSERT INTO games
        (id, home_team, away_team, home_score, away_score, game_date, week, season,
         is_live, game_status, current_quarter, time_remaining, last_updated)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(home_team, away_team, game_date) DO UPDATE SET
            home_score      = excluded.home_score,
            away_score      = excluded.away_score,
            week            = excluded.week,
            season          = excluded.season,
            is_live         = excluded.is_live,
            game_status     = excluded.game_status,
            current_quarter = excluded.current_quarter,
            time_remaining  = excluded.time_remaining,
            last_updated    = excluded.last_updated
        "#,
    )
    .bind(&game.id)
    .bind(&game.home_team)
    .bind(&game.away_team)
    .bind(game.home_score)
    .bind(game.away_score)
    .bind(timestamp(game.game_date))
    .bind(game.week)
    .bind(game.season)
    .bind(game.is_live)
    .bind(&game.game_status)
    .bind(game.current_quarter)
    .bind(&game.time_remaining)
    .bind(timestamp(game.last_updated))
    .execute(executor)
    .await?;

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Week-keyed upsert used by ingestion: (home, away, season, week) identifies
/// the fixture. Existing rows get score, status and date overwritten; moving
/// onto a kickoff another row of the same pairing holds is a `StoreError`.
pub async fn upsert_game_by_week(conn: &mut SqliteConnection, game: &Game) -> Result<UpsertOutcome> {
    validate_game(game)?;

    let existing: Option<String> = sqlx::query_scalar(
        "SELECT id FROM games WHERE home_team = ? AND away_team = ? AND season = ? AND week = ?",
    )
    .bind(&game.home_team)
    .bind(&game.away_team)
    .bind(game.season)
    .bind(game.week)
    .fetch_optional(&mut *conn)
    .await?;

    match existing {
        Some(id) => {
            sqlx::query(
                r#"
                UPDATE games SET
                    home_score = ?, away_score = ?, game_date = ?, is_live = ?,
                    game_status = ?, current_quarter = ?, time_remaining = ?, last_updated = ?
                WHERE id = ?
                "#,
            )
            .bind(game.home_score)
            .bind(game.away_score)
            .bind(timestamp(game.game_date))
            .bind(game.is_live)
            .bind(&game.game_status)
            .bind(game.current_quarter)
            .bind(&game.time_remaining)
            .bind(timestamp(game.last_updated))
            .bind(&id)
            .execute(&mut *conn)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    anyhow::Error::from(StoreError::DuplicateFixture {
                        home: game.home_team.clone(),
                        away: game.away_team.clone(),
                        date: timestamp(game.game_date),
                    })
                }
                other => other.into(),
            })?;
            Ok(UpsertOutcome::Updated)
        }
        None => {
            insert_game(&mut *conn, game).await?;
            Ok(UpsertOutcome::Created)
        }
    }
}

pub async fn get_game(pool: &SqlitePool, id: &str) -> Result<Option<Game>> {
    let row = sqlx::query("SELECT * FROM games WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(game_from_row).transpose()
}

pub async fn get_games_for_season(pool: &SqlitePool, season: i32) -> Result<Vec<Game>> {
    let rows = sqlx::query("SELECT * FROM games WHERE season = ? ORDER BY game_date")
        .bind(season)
        .fetch_all(pool)
        .await?;

    games_from_rows(&rows)
}

pub async fn get_team_games(pool: &SqlitePool, team: &str, season: i32) -> Result<Vec<Game>> {
    let rows = sqlx::query(
        r#"SELECT * FROM games
           WHERE (home_team = ? OR away_team = ?) AND season = ?
           ORDER BY game_date"#,
    )
    .bind(team)
    .bind(team)
    .bind(season)
    .fetch_all(pool)
    .await?;

    games_from_rows(&rows)
}

pub async fn get_games_for_week(pool: &SqlitePool, season: i32, week: i32) -> Result<Vec<Game>> {
    let rows = sqlx::query("SELECT * FROM games WHERE season = ? AND week = ? ORDER BY game_date")
        .bind(season)
        .bind(week)
        .fetch_all(pool)
        .await?;

    games_from_rows(&rows)
}

/// Every meeting between two teams, any season, either side at home.
pub async fn get_games_between(pool: &SqlitePool, team_a: &str, team_b: &str) -> Result<Vec<Game>> {
    let rows = sqlx::query(
        r#"SELECT * FROM games
           WHERE (home_team = ? AND away_team = ?) OR (home_team = ? AND away_team = ?)
           ORDER BY game_date DESC"#,
    )
    .bind(team_a)
    .bind(team_b)
    .bind(team_b)
    .bind(team_a)
    .fetch_all(pool)
    .await?;

    games_from_rows(&rows)
}

pub async fn get_live_games(pool: &SqlitePool) -> Result<Vec<Game>> {
    let rows = sqlx::query("SELECT * FROM games WHERE is_live = 1 ORDER BY game_date")
        .fetch_all(pool)
        .await?;

    games_from_rows(&rows)
}

/// (week, kickoff) for every regular-season game of a season.
pub async fn get_regular_season_kickoffs(pool: &SqlitePool, season: i32) -> Result<Vec<(i32, DateTime<Utc>)>> {
    kickoffs_between(pool, season, 1, 18).await
}

/// Stored postseason weeks (19 and up) with their kickoffs.
pub async fn get_postseason_kickoffs(pool: &SqlitePool, season: i32) -> Result<Vec<(i32, DateTime<Utc>)>> {
    kickoffs_between(pool, season, 19, i32::MAX).await
}

async fn kickoffs_between(
    pool: &SqlitePool,
    season: i32,
    first_week: i32,
    last_week: i32,
) -> Result<Vec<(i32, DateTime<Utc>)>> {
    let rows = sqlx::query(
        "SELECT week, game_date FROM games WHERE season = ? AND week BETWEEN ? AND ? ORDER BY week, game_date",
    )
    .bind(season)
    .bind(first_week)
    .bind(last_week)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok((
                row.try_get("week")?,
                parse_timestamp(&row.try_get::<String, _>("game_date")?)?,
            ))
        })
        .collect()
}

/// Removes a season's games and cached stats in one transaction.
pub async fn clear_season(pool: &SqlitePool, season: i32) -> Result<u64> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM team_season_stats WHERE season = ?")
        .bind(season)
        .execute(&mut *tx)
        .await?;
    let deleted = sqlx::query("DELETE FROM games WHERE season = ?")
        .bind(season)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    tx.commit().await?;

    tracing::info!("Cleared {} games from season {}", deleted, season);
    Ok(deleted)
}

// Season stats operations

/// Swaps in a freshly computed set of season rows. Callers run this inside a
/// transaction so readers never see a half-written season.
pub async fn replace_season_stats(conn: &mut SqliteConnection, season: i32, rows: &[TeamSeasonStats]) -> Result<()> {
    sqlx::query("DELETE FROM team_season_stats WHERE season = ?")
        .bind(season)
        .execute(&mut *conn)
        .await?;

    for s in rows {
        let r = &s.rankings;
        sqlx::query(
            r#"
            INSERT INTO team_season_stats
            (team, season, wins, losses, ties, points_for, points_against,
             rank_league, rank_conference, rank_division,
             rank_offense_league, rank_offense_conference, rank_offense_division,
             rank_defense_league, rank_defense_conference, rank_defense_division,
             conference_ties, conference_tie_rank, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&s.team)
        .bind(season)
        .bind(s.record.wins as i64)
        .bind(s.record.losses as i64)
        .bind(s.record.ties as i64)
        .bind(s.record.points_for as i64)
        .bind(s.record.points_against as i64)
        .bind(r.overall.league as i64)
        .bind(r.overall.conference as i64)
        .bind(r.overall.division as i64)
        .bind(r.offense.league as i64)
        .bind(r.offense.conference as i64)
        .bind(r.offense.division as i64)
        .bind(r.defense.league as i64)
        .bind(r.defense.conference as i64)
        .bind(r.defense.division as i64)
        .bind(r.conference_ties as i64)
        .bind(r.conference_tie_rank as i64)
        .bind(timestamp(s.updated_at))
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

pub async fn get_season_stats(pool: &SqlitePool, season: i32) -> Result<Vec<TeamSeasonStats>> {
    let rows = sqlx::query("SELECT * FROM team_season_stats WHERE season = ? ORDER BY rank_league")
        .bind(season)
        .fetch_all(pool)
        .await?;

    rows.iter().map(stats_from_row).collect()
}

pub async fn get_team_season_stats(pool: &SqlitePool, team: &str, season: i32) -> Result<Option<TeamSeasonStats>> {
    let row = sqlx::query("SELECT * FROM team_season_stats WHERE team = ? AND season = ?")
        .bind(team)
        .bind(season)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(stats_from_row).transpose()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;
    use sqlx::sqlite::SqlitePoolOptions;

    /// Single-connection in-memory database with schema and the 32 teams.
    pub(crate) async fn test_pool() -> SqlitePool {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .unwrap()
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .unwrap();
        init_database_with_pool(&pool).await.unwrap();
        seed_teams(&pool).await.unwrap();
        pool
    }

    fn kickoff(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, day, 17, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_team_round_trip_and_upsert_keeps_games() {
        let pool = test_pool().await;
        insert_game(&pool, &Game::new("GB", "CHI", kickoff(7), 2025, 1).with_score(27, 10))
            .await
            .unwrap();

        let mut gb = get_team(&pool, "GB").await.unwrap().unwrap();
        assert_eq!(gb.conference, Conference::Nfc);
        assert_eq!(gb.division, Division::North);

        gb.full_name = "Green Bay Packers".to_string();
        upsert_team(&pool, &gb).await.unwrap();
        assert_eq!(get_team_games(&pool, "GB", 2025).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_team_cascades_to_games() {
        let pool = test_pool().await;
        insert_game(&pool, &Game::new("GB", "CHI", kickoff(7), 2025, 1)).await.unwrap();
        insert_game(&pool, &Game::new("DET", "MIN", kickoff(7), 2025, 1)).await.unwrap();

        assert!(delete_team(&pool, "CHI").await.unwrap());
        let games = get_games_for_season(&pool, 2025).await.unwrap();
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].home_team, "DET");
        assert!(!delete_team(&pool, "CHI").await.unwrap());
    }

    #[tokio::test]
    async fn test_same_team_rejected() {
        let pool = test_pool().await;
        let err = insert_game(&pool, &Game::new("GB", "GB", kickoff(7), 2025, 1))
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<StoreError>().is_some());
    }

    #[tokio::test]
    async fn test_date_key_deduplicates() {
        let pool = test_pool().await;
        insert_game(&pool, &Game::new("GB", "CHI", kickoff(7), 2025, 1)).await.unwrap();
        insert_game(&pool, &Game::new("GB", "CHI", kickoff(7), 2025, 1).with_score(20, 17))
            .await
            .unwrap();

        let games = get_games_for_week(&pool, 2025, 1).await.unwrap();
        assert_eq!(games.len(), 1);
        assert_eq!((games[0].home_score, games[0].away_score), (20, 17));
    }

    #[tokio::test]
    async fn test_week_key_upsert_creates_then_updates() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let game = Game::new("GB", "CHI", kickoff(7), 2025, 1);
        let outcome = upsert_game_by_week(&mut conn, &game).await.unwrap();
        assert_eq!(outcome, UpsertOutcome::Created);

        // moved kickoff and a live score
        let mut update = Game::new("GB", "CHI", kickoff(8), 2025, 1).with_score(14, 7);
        update.is_live = true;
        update.current_quarter = Some(2);
        let outcome = upsert_game_by_week(&mut conn, &update).await.unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated);
        drop(conn);

        let games = get_games_for_week(&pool, 2025, 1).await.unwrap();
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].id, game.id);
        assert_eq!(games[0].game_date, kickoff(8));
        assert!(games[0].is_live);
        assert_eq!(get_live_games(&pool).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_clear_season_only_touches_that_season() {
        let pool = test_pool().await;
        insert_game(&pool, &Game::new("GB", "CHI", kickoff(7), 2025, 1)).await.unwrap();
        let mut old = Game::new("GB", "CHI", kickoff(7) - chrono::Duration::days(365), 2024, 1);
        old.home_score = 3;
        insert_game(&pool, &old).await.unwrap();

        assert_eq!(clear_season(&pool, 2025).await.unwrap(), 1);
        assert!(get_games_for_season(&pool, 2025).await.unwrap().is_empty());
        assert_eq!(get_games_for_season(&pool, 2024).await.unwrap().len(), 1);
        assert_eq!(get_games_between(&pool, "CHI", "GB").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_regular_season_kickoffs_skip_preseason() {
        let pool = test_pool().await;
        insert_game(&pool, &Game::new("GB", "CHI", kickoff(1), 2025, 0)).await.unwrap();
        insert_game(&pool, &Game::new("GB", "DET", kickoff(7), 2025, 1)).await.unwrap();
        insert_game(&pool, &Game::new("MIN", "GB", kickoff(14), 2025, 2)).await.unwrap();

        insert_game(&pool, &Game::new("KC", "BUF", kickoff(28), 2025, 19)).await.unwrap();

        let kickoffs = get_regular_season_kickoffs(&pool, 2025).await.unwrap();
        assert_eq!(kickoffs, vec![(1, kickoff(7)), (2, kickoff(14))]);
        let kickoffs = get_postseason_kickoffs(&pool, 2025).await.unwrap();
        assert_eq!(kickoffs, vec![(19, kickoff(28))]);
    }

    #[tokio::test]
    async fn test_week_key_update_onto_taken_kickoff_is_rejected() {
        let pool = test_pool().await;
        insert_game(&pool, &Game::new("GB", "CHI", kickoff(7), 2025, 1)).await.unwrap();
        insert_game(&pool, &Game::new("GB", "CHI", kickoff(14), 2025, 2)).await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let moved = Game::new("GB", "CHI", kickoff(7), 2025, 2).with_score(21, 14);
        let err = upsert_game_by_week(&mut conn, &moved).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::DuplicateFixture { .. })
        ));
        drop(conn);

        let week_two = get_games_for_week(&pool, 2025, 2).await.unwrap();
        assert_eq!(week_two[0].game_date, kickoff(14));
        assert_eq!(week_two[0].home_score, 0);
    }
}
