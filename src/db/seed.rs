use anyhow::Result;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::{get_team, upsert_team};
use crate::models::{Conference, Division, Team};

use Conference::{Afc, Nfc};
use Division::{East, North, South, West};

/// The 32 franchises: (code, city, nickname, conference, division)
pub const NFL_TEAMS: [(&str, &str, &str, Conference, Division); 32] = [
    ("BUF", "Buffalo", "Bills", Afc, East),
    ("MIA", "Miami", "Dolphins", Afc, East),
    ("NE", "New England", "Patriots", Afc, East),
    ("NYJ", "New York", "Jets", Afc, East),
    ("BAL", "Baltimore", "Ravens", Afc, North),
    ("CIN", "Cincinnati", "Bengals", Afc, North),
    ("CLE", "Cleveland", "Browns", Afc, North),
    ("PIT", "Pittsburgh", "Steelers", Afc, North),
    ("HOU", "Houston", "Texans", Afc, South),
    ("IND", "Indianapolis", "Colts", Afc, South),
    ("JAX", "Jacksonville", "Jaguars", Afc, South),
    ("TEN", "Tennessee", "Titans", Afc, South),
    ("DEN", "Denver", "Broncos", Afc, West),
    ("KC", "Kansas City", "Chiefs", Afc, West),
    ("LV", "Las Vegas", "Raiders", Afc, West),
    ("LAC", "Los Angeles", "Chargers", Afc, West),
    ("DAL", "Dallas", "Cowboys", Nfc, East),
    ("NYG", "New York", "Giants", Nfc, East),
    ("PHI", "Philadelphia", "Eagles", Nfc, East),
    ("WAS", "Washington", "Commanders", Nfc, East),
    ("CHI", "Chicago", "Bears", Nfc, North),
    ("DET", "Detroit", "Lions", Nfc, North),
    ("GB", "Green Bay", "Packers", Nfc, North),
    ("MIN", "Minnesota", "Vikings", Nfc, North),
    ("ATL", "Atlanta", "Falcons", Nfc, South),
    ("CAR", "Carolina", "Panthers", Nfc, South),
    ("NO", "New Orleans", "Saints", Nfc, South),
    ("TB", "Tampa Bay", "Buccaneers", Nfc, South),
    ("ARI", "Arizona", "Cardinals", Nfc, West),
    ("SF", "San Francisco", "49ers", Nfc, West),
    ("SEA", "Seattle", "Seahawks", Nfc, West),
    ("LA", "Los Angeles", "Rams", Nfc, West),
];

/// Retired codes that older data may still carry
const DEPRECATED_CODES: [&str; 3] = ["JAC", "WSH", "OAK"];

pub fn canonical_teams() -> Vec<Team> {
    NFL_TEAMS
        .iter()
        .map(|(code, city, nickname, conf, div)| Team::new(code, city, nickname, *conf, *div))
        .collect()
}

/// Directory entry for a canonical code, if there is one.
pub fn canonical_team(code: &str) -> Option<Team> {
    NFL_TEAMS
        .iter()
        .find(|(c, ..)| *c == code)
        .map(|(code, city, nickname, conf, div)| Team::new(code, city, nickname, *conf, *div))
}

#[derive(Debug, Default, Serialize)]
pub struct SeedSummary {
    pub created: usize,
    pub updated: usize,
    pub removed: Vec<String>,
    /// Deprecated codes left in place because games still reference them
    pub kept_with_games: Vec<String>,
}

/// Loads the team directory. Safe to run repeatedly: existing rows are
/// updated in place and keep their games.
pub async fn seed_teams(pool: &SqlitePool) -> Result<SeedSummary> {
    let mut summary = SeedSummary::default();

    for team in canonical_teams() {
        match get_team(pool, &team.code).await? {
            Some(existing) => {
                let team = Team {
                    created_at: existing.created_at,
                    ..team
                };
                upsert_team(pool, &team).await?;
                summary.updated += 1;
            }
            None => {
                upsert_team(pool, &team).await?;
                tracing::debug!("Created team {} - {}", team.code, team.full_name);
                summary.created += 1;
            }
        }
    }

    for code in DEPRECATED_CODES {
        if get_team(pool, code).await?.is_none() {
            continue;
        }
        let games: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM games WHERE home_team = ? OR away_team = ?")
            .bind(code)
            .bind(code)
            .fetch_one(pool)
            .await?;

        if games > 0 {
            tracing::warn!("Deprecated team {} still has {} games; leaving it in place", code, games);
            summary.kept_with_games.push(code.to_string());
        } else {
            sqlx::query("DELETE FROM teams WHERE code = ?")
                .bind(code)
                .execute(pool)
                .await?;
            summary.removed.push(code.to_string());
        }
    }

    tracing::info!(
        "Team directory loaded: {} created, {} updated, {} deprecated removed",
        summary.created,
        summary.updated,
        summary.removed.len()
    );
    Ok(summary)
}
