use anyhow::{anyhow, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use std::io::Write;
use std::path::Path;
use strsim::jaro_winkler;

use crate::config::AppConfig;
use crate::db::{self, get_all_teams, init_database};
use crate::models::{ScheduleSlot, Team};
use crate::services::espn::{import_season, poll_live, refresh_live, EspnFetcher, PollOptions, SeasonType};
use crate::services::ranking::recompute_rankings;
use crate::services::summary::{self, StandingRow};
use crate::services::validation::season_completeness;
use crate::utils::canonical_team_code;

/// Minimum Jaro-Winkler similarity for a fuzzy team-name match
const FUZZY_THRESHOLD: f64 = 0.85;

async fn open(config: &AppConfig) -> Result<SqlitePool> {
    init_database(&config.database_url).await
}

/// Code, alias ("WSH"), nickname ("packers"), city or full name.
pub fn find_team<'a>(teams: &'a [Team], query: &str) -> Option<&'a Team> {
    let code = canonical_team_code(query);
    if let Some(team) = teams.iter().find(|t| t.code == code) {
        return Some(team);
    }

    let query = query.trim().to_lowercase();
    teams
        .iter()
        .map(|team| {
            let full = team.full_name.to_lowercase();
            let nickname = full.rsplit(' ').next().unwrap_or_default().to_string();
            let score = [full.as_str(), nickname.as_str(), team.city.to_lowercase().as_str()]
                .iter()
                .map(|candidate| jaro_winkler(&query, candidate))
                .fold(0.0_f64, f64::max);
            (team, score)
        })
        .filter(|(_, score)| *score >= FUZZY_THRESHOLD)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(team, _)| team)
}

pub async fn init_db(config: &AppConfig) -> Result<()> {
    open(config).await?;
    println!("✅ Database ready at {}", config.database_url);
    Ok(())
}

pub async fn seed_teams(config: &AppConfig) -> Result<()> {
    let pool = open(config).await?;
    println!("🏈 Loading the 32-team directory...");

    let summary = db::seed_teams(&pool).await?;
    println!("✅ {} created, {} updated", summary.created, summary.updated);
    println!("   Total teams in database: {}", db::count_teams(&pool).await?);
    for code in &summary.removed {
        println!("   🗑️  Removed deprecated team {}", code);
    }
    for code in &summary.kept_with_games {
        println!("   ⚠️  {} is deprecated but still has games; migrate them manually", code);
    }
    Ok(())
}

pub async fn load(config: &AppConfig, season: i32, season_types: &[SeasonType], rank: bool) -> Result<()> {
    let pool = open(config).await?;
    let fetcher = EspnFetcher::new(config)?;

    let kinds: Vec<String> = season_types.iter().map(|t| t.to_string()).collect();
    println!("📥 Importing {} ({}) from ESPN...", season, kinds.join(", "));

    let summary = import_season(&pool, &fetcher, season, season_types).await?;
    println!(
        "✅ {} events: {} created, {} updated, {} skipped, {} malformed, {} teams created",
        summary.fetched, summary.created, summary.updated, summary.skipped, summary.malformed, summary.teams_created
    );

    if rank {
        let ranking = recompute_rankings(&pool, season).await?;
        println!("📊 Rankings recomputed for {} teams", ranking.teams_ranked);
    }
    Ok(())
}

pub async fn poll(
    config: &AppConfig,
    season: i32,
    season_type: SeasonType,
    week: Option<i32>,
    once: bool,
    max_cycles: Option<u32>,
    until_idle: bool,
) -> Result<()> {
    let pool = open(config).await?;
    let fetcher = EspnFetcher::new(config)?;

    if once {
        let summary = refresh_live(&pool, &fetcher, season, season_type, week).await?;
        println!(
            "✅ Updated {} games, created {}, {} live",
            summary.updated, summary.created, summary.live
        );
        print_live_games(&pool).await?;
        return Ok(());
    }

    println!(
        "📡 Polling {} {} every {}s (Ctrl-C to stop)...",
        season,
        season_type,
        config.poll_interval.as_secs()
    );
    let options = PollOptions {
        interval: config.poll_interval,
        season_type,
        week,
        max_cycles,
        until_idle,
    };
    let report = poll_live(&pool, &fetcher, season, &options).await?;
    println!("✅ {} cycles, {} failed", report.cycles, report.failed_cycles);
    Ok(())
}

async fn print_live_games(pool: &SqlitePool) -> Result<()> {
    let live = db::get_live_games(pool).await?;
    if live.is_empty() {
        println!("📭 No live games.");
        return Ok(());
    }
    println!("\n🔴 Live:");
    for game in &live {
        println!(
            "   {} {} @ {} {} - {} {}",
            game.away_team,
            game.away_score,
            game.home_team,
            game.home_score,
            game.quarter_display(),
            game.time_remaining
        );
    }
    Ok(())
}

pub async fn rankings(config: &AppConfig, season: i32) -> Result<()> {
    let pool = open(config).await?;
    println!("📊 Recomputing {} rankings...", season);

    let summary = recompute_rankings(&pool, season).await?;
    println!(
        "✅ Ranked {} teams from {} played games\n",
        summary.teams_ranked, summary.games_counted
    );

    let rows = summary::standings(&pool, season).await?;
    print_standings(&rows);
    Ok(())
}

fn print_standings(rows: &[StandingRow]) {
    println!("{:>3}  {:<4} {:<24} {:>8} {:>6}  {:>4} {:>4}", "#", "Code", "Team", "Record", "Pct", "PF", "PA");
    for row in rows {
        println!(
            "{:>3}  {:<4} {:<24} {:>8} {:>6.3}  {:>4} {:>4}",
            row.rankings.overall.league,
            row.team,
            row.full_name,
            row.record.display(),
            row.win_percentage,
            row.record.points_for,
            row.record.points_against
        );
    }
}

pub async fn team(config: &AppConfig, query: &str, season: i32) -> Result<()> {
    let pool = open(config).await?;
    println!("🔍 Searching for team: {}", query);

    let teams = get_all_teams(&pool).await?;
    let Some(team) = find_team(&teams, query) else {
        println!("❌ No team matches '{}'", query);
        println!("\n💡 Try a code such as GB, KC or PHI, or a nickname like 'packers'");
        return Ok(());
    };

    let Some(summary) = summary::team_season_summary(&pool, &team.code, season).await? else {
        return Err(anyhow!("team {} disappeared during lookup", team.code));
    };

    println!("\n🏈 {} ({}) - {} {}", summary.team.full_name, summary.team.code, summary.team.conference, summary.team.division);
    println!(
        "   {} season: {} ({:.3}), {} scheduled",
        season,
        summary.record.display(),
        summary.win_percentage,
        summary.scheduled_games
    );
    println!(
        "   Points: {} for / {} against ({:.1} / {:.1} per game)",
        summary.record.points_for, summary.record.points_against, summary.avg_points_for, summary.avg_points_against
    );
    if let Some(previous) = &summary.previous_season {
        println!(
            "   {} season: {} ({:.3}), {:.1} / {:.1} points per game",
            previous.season,
            previous.record.display(),
            previous.win_percentage,
            previous.avg_points_for,
            previous.avg_points_against
        );
    }
    println!("   Overall: {}", summary.ranking_display);
    println!("   Offense: {}", summary.offense_ranking_display);
    println!("   Defense: {}", summary.defense_ranking_display);

    println!("\n📅 Schedule:");
    for slot in &summary.schedule {
        match slot {
            ScheduleSlot::Bye { week } => println!("   Week {:>2}: BYE", week),
            ScheduleSlot::Game { week, game } => {
                let (venue, opponent) = if game.home_team == team.code {
                    ("vs", &game.away_team)
                } else {
                    ("@ ", &game.home_team)
                };
                let result = if game.is_live {
                    format!("LIVE {}-{} {}", game.home_score, game.away_score, game.quarter_display())
                } else if game.is_finished() {
                    let outcome = match game.winner() {
                        Some(winner) if winner == team.code => "W",
                        Some(_) => "L",
                        None => "T",
                    };
                    format!("{} {}-{}", outcome, game.home_score, game.away_score)
                } else {
                    game.game_date.format("%a %b %-d %H:%M UTC").to_string()
                };
                println!("   Week {:>2}: {} {:<4} {}", week, venue, opponent, result);
            }
        }
    }
    Ok(())
}

pub async fn week(config: &AppConfig, season: i32, week: Option<i32>) -> Result<()> {
    let pool = open(config).await?;
    let week = match week {
        Some(week) => week,
        None => summary::resolve_current_week(&pool, season).await?.week,
    };

    let schedule = summary::week_schedule(&pool, season, week).await?;
    println!(
        "📅 {} week {}: {} games, {} played",
        season, week, schedule.total_games, schedule.played_games
    );
    for game in &schedule.games {
        let status = if game.is_live {
            format!("🔴 {} {}", game.quarter_display(), game.time_remaining)
        } else if game.is_finished() {
            "Final".to_string()
        } else {
            game.game_date.format("%a %H:%M UTC").to_string()
        };
        println!(
            "   {:<4} {:>3} @ {:<4} {:>3}  {}",
            game.away_team, game.away_score, game.home_team, game.home_score, status
        );
    }
    if !schedule.bye_teams.is_empty() {
        println!("   Bye: {}", schedule.bye_teams.join(", "));
    }
    Ok(())
}

pub async fn current_week(config: &AppConfig, season: i32) -> Result<()> {
    let pool = open(config).await?;
    let current = summary::resolve_current_week(&pool, season).await?;
    println!("📆 Current week for {}: {}", current.season, current.week);
    Ok(())
}

pub async fn check(config: &AppConfig, season: i32) -> Result<()> {
    let pool = open(config).await?;
    println!("🔎 Checking {} season data completeness...", season);

    let report = season_completeness(&pool, season).await?;
    println!("\n{} Season Data Completeness Report", season);
    println!("{}", "=".repeat(50));
    println!("Teams: {} complete, {} incomplete", report.complete_teams, report.incomplete_teams);
    println!(
        "Regular season games: {} of {} ({} scored)",
        report.regular_season_games, report.expected_regular_season_games, report.scored_games
    );
    println!("Preseason games: {}, postseason games: {}", report.preseason_games, report.postseason_games);

    if report.is_complete {
        println!("\n✅ All teams have complete {} data!", season);
    } else {
        println!("\n❌ {} issues:", report.issues.len());
        for issue in &report.issues {
            println!("   - {}", issue);
        }
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct StandingCsvRow<'a> {
    rank: u32,
    team: &'a str,
    name: &'a str,
    conference: String,
    division: String,
    wins: u32,
    losses: u32,
    ties: u32,
    points_for: u32,
    points_against: u32,
    win_percentage: String,
    conference_rank: u32,
    division_rank: u32,
    offense_rank: u32,
    defense_rank: u32,
}

pub fn write_standings_csv<W: Write>(rows: &[StandingRow], out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    for row in rows {
        writer.serialize(StandingCsvRow {
            rank: row.rankings.overall.league,
            team: &row.team,
            name: &row.full_name,
            conference: row.conference.to_string(),
            division: row.division.to_string(),
            wins: row.record.wins,
            losses: row.record.losses,
            ties: row.record.ties,
            points_for: row.record.points_for,
            points_against: row.record.points_against,
            win_percentage: format!("{:.3}", row.win_percentage),
            conference_rank: row.rankings.overall.conference,
            division_rank: row.rankings.overall.division,
            offense_rank: row.rankings.offense.league,
            defense_rank: row.rankings.defense.league,
        })?;
    }
    writer.flush()?;
    Ok(())
}

pub async fn export(config: &AppConfig, season: i32, output: &Path) -> Result<()> {
    let pool = open(config).await?;
    let rows = summary::standings(&pool, season).await?;

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let file = std::fs::File::create(output)?;
    write_standings_csv(&rows, file)?;

    println!("💾 Wrote {} standings rows to {}", rows.len(), output.display());
    Ok(())
}

pub async fn clear_season(config: &AppConfig, season: i32, confirmed: bool) -> Result<()> {
    if !confirmed {
        println!("⚠️  This deletes every {} game and its cached rankings. Re-run with --yes to confirm.", season);
        return Ok(());
    }
    let pool = open(config).await?;
    let deleted = db::clear_season(&pool, season).await?;
    println!("🗑️  Cleared {} games from {}", deleted, season);
    Ok(())
}

pub async fn delete_team(config: &AppConfig, code: &str, confirmed: bool) -> Result<()> {
    let code = canonical_team_code(code);
    if !confirmed {
        println!("⚠️  This deletes {} with all of its games and cached rankings. Re-run with --yes to confirm.", code);
        return Ok(());
    }
    let pool = open(config).await?;
    if db::delete_team(&pool, &code).await? {
        println!("🗑️  Deleted team {} and its games", code);
        Ok(())
    } else {
        Err(anyhow!("Team '{}' not found", code))
    }
}
