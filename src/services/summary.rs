//! Read-side views: team season summaries, week schedules, game detail and standings.

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::{BTreeSet, HashMap};

use crate::db::{
    get_all_teams, get_game, get_games_between, get_games_for_season, get_games_for_week, get_season_stats, get_team,
    get_team_games, get_team_season_stats,
};
use crate::error::StoreError;
use crate::models::*;
use crate::services::ranking::{defense_display, offense_display, rank_season, ranking_display};
use crate::services::record::{head_to_head, record_before, season_record, Record};
use crate::services::week::current_week;
use crate::utils::regular_season_weeks;

fn division_sizes(teams: &[Team]) -> HashMap<(Conference, Division), u32> {
    let mut sizes = HashMap::new();
    for team in teams {
        *sizes.entry((team.conference, team.division)).or_insert(0) += 1;
    }
    sizes
}

/// One slot per regular-season week (bye when empty), then any postseason games.
pub fn build_schedule(games: &[Game], season: i32) -> Vec<ScheduleSlot> {
    let weeks = regular_season_weeks(season);
    let mut slots = Vec::new();

    for week in 1..=weeks {
        let mut found = false;
        for game in games.iter().filter(|g| g.week == week) {
            slots.push(ScheduleSlot::Game {
                week,
                game: game.clone(),
            });
            found = true;
        }
        if !found {
            slots.push(ScheduleSlot::Bye { week });
        }
    }

    for game in games.iter().filter(|g| g.week > weeks) {
        slots.push(ScheduleSlot::Game {
            week: game.week,
            game: game.clone(),
        });
    }
    slots
}

async fn previous_season_line(pool: &SqlitePool, code: &str, season: i32) -> Result<Option<SeasonLine>> {
    let games = get_team_games(pool, code, season).await?;
    let record = season_record(code, &games, season);
    if record.games_played() == 0 {
        return Ok(None);
    }
    Ok(Some(SeasonLine {
        season,
        win_percentage: record.win_percentage(),
        avg_points_for: record.avg_points_for(),
        avg_points_against: record.avg_points_against(),
        record,
    }))
}

pub async fn team_season_summary(pool: &SqlitePool, code: &str, season: i32) -> Result<Option<TeamSeasonSummary>> {
    let Some(team) = get_team(pool, code).await? else {
        return Ok(None);
    };

    let games = get_team_games(pool, &team.code, season).await?;
    let record = season_record(&team.code, &games, season);
    let rankings = get_team_season_stats(pool, &team.code, season)
        .await?
        .map(|stats| stats.rankings);

    let teams = get_all_teams(pool).await?;
    let division_size = division_sizes(&teams)
        .get(&(team.conference, team.division))
        .copied()
        .unwrap_or(4);

    let weeks = regular_season_weeks(season);
    let scheduled_games = games.iter().filter(|g| (1..=weeks).contains(&g.week)).count() as u32;
    let previous_season = previous_season_line(pool, &team.code, season - 1).await?;

    Ok(Some(TeamSeasonSummary {
        season,
        previous_season,
        win_percentage: record.win_percentage(),
        avg_points_for: record.avg_points_for(),
        avg_points_against: record.avg_points_against(),
        scheduled_games,
        ranking_display: ranking_display(rankings.as_ref(), division_size),
        offense_ranking_display: offense_display(rankings.as_ref(), division_size),
        defense_ranking_display: defense_display(rankings.as_ref(), division_size),
        schedule: build_schedule(&games, season),
        rankings,
        record,
        team,
    }))
}

pub async fn week_schedule(pool: &SqlitePool, season: i32, week: i32) -> Result<WeekSchedule> {
    let games = get_games_for_week(pool, season, week).await?;
    let teams = get_all_teams(pool).await?;

    let playing: BTreeSet<&str> = games
        .iter()
        .flat_map(|g| [g.home_team.as_str(), g.away_team.as_str()])
        .collect();
    let bye_teams = teams
        .iter()
        .filter(|t| !playing.contains(t.code.as_str()))
        .map(|t| t.code.clone())
        .collect();

    Ok(WeekSchedule {
        season,
        week,
        total_games: games.len(),
        played_games: games.iter().filter(|g| g.is_played()).count(),
        games,
        bye_teams,
    })
}

/// Both teams' records going into the game and their meetings before it.
pub async fn game_detail(pool: &SqlitePool, id: &str) -> Result<Option<GameDetail>> {
    let Some(game) = get_game(pool, id).await? else {
        return Ok(None);
    };

    let home_team = get_team(pool, &game.home_team)
        .await?
        .ok_or_else(|| StoreError::TeamNotFound(game.home_team.clone()))?;
    let away_team = get_team(pool, &game.away_team)
        .await?
        .ok_or_else(|| StoreError::TeamNotFound(game.away_team.clone()))?;

    let season_games = get_games_for_season(pool, game.season).await?;
    let meetings = get_games_between(pool, &game.home_team, &game.away_team).await?;

    Ok(Some(GameDetail {
        home_pregame: record_before(&game.home_team, &season_games, game.season, game.game_date),
        away_pregame: record_before(&game.away_team, &season_games, game.season, game.game_date),
        head_to_head: head_to_head(&game.home_team, &game.away_team, &meetings, Some(game.game_date)),
        home_team,
        away_team,
        game,
    }))
}

pub async fn resolve_current_week(pool: &SqlitePool, season: i32) -> Result<CurrentWeek> {
    let week = current_week(pool, season, Utc::now()).await?;
    Ok(CurrentWeek { season, week })
}

#[derive(Debug, Clone, Serialize)]
pub struct StandingRow {
    pub team: String,
    pub full_name: String,
    pub conference: Conference,
    pub division: Division,
    pub record: Record,
    pub win_percentage: f64,
    pub rankings: TeamRankings,
    pub ranking_display: String,
}

/// League table for a season. Uses the cached rankings when they exist and
/// computes them in memory (without storing) otherwise.
pub async fn standings(pool: &SqlitePool, season: i32) -> Result<Vec<StandingRow>> {
    let teams = get_all_teams(pool).await?;
    let sizes = division_sizes(&teams);
    let by_code: HashMap<&str, &Team> = teams.iter().map(|t| (t.code.as_str(), t)).collect();

    let cached = get_season_stats(pool, season).await?;
    let entries: Vec<(String, Record, TeamRankings)> = if cached.is_empty() {
        let games = get_games_for_season(pool, season).await?;
        rank_season(&teams, &games, season)
            .into_iter()
            .map(|s| (s.team, s.record, s.rankings))
            .collect()
    } else {
        cached.into_iter().map(|s| (s.team, s.record, s.rankings)).collect()
    };

    let mut rows: Vec<StandingRow> = entries
        .into_iter()
        .filter_map(|(code, record, rankings)| {
            let team = by_code.get(code.as_str())?;
            let size = sizes.get(&(team.conference, team.division)).copied().unwrap_or(4);
            Some(StandingRow {
                full_name: team.full_name.clone(),
                conference: team.conference,
                division: team.division,
                win_percentage: record.win_percentage(),
                ranking_display: ranking_display(Some(&rankings), size),
                team: code,
                record,
                rankings,
            })
        })
        .collect();

    rows.sort_by_key(|r| r.rankings.overall.league);
    Ok(rows)
}
