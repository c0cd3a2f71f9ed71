use anyhow::Result;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::db::{get_all_teams, get_games_for_season};
use crate::models::{Conference, Division, Game, Team};
use crate::utils::{expected_games, regular_season_weeks};

const TEAMS_PER_DIVISION: usize = 4;
const LEAGUE_SIZE: usize = 32;

#[derive(Debug, Clone, Serialize)]
pub struct TeamCompleteness {
    pub team: String,
    /// Regular-season games on the books
    pub scheduled_games: u32,
    /// Regular-season games with a recorded (non 0-0) score
    pub scored_games: u32,
    pub home_games: u32,
    pub away_games: u32,
    pub weeks: Vec<i32>,
    pub bye_weeks: Vec<i32>,
    pub is_complete: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletenessReport {
    pub season: i32,
    pub expected_games_per_team: u32,
    pub regular_season_weeks: i32,
    pub total_games: usize,
    pub regular_season_games: usize,
    pub expected_regular_season_games: usize,
    pub scored_games: usize,
    pub preseason_games: usize,
    pub postseason_games: usize,
    pub complete_teams: usize,
    pub incomplete_teams: usize,
    pub teams: Vec<TeamCompleteness>,
    pub duplicates: Vec<String>,
    pub week_conflicts: Vec<String>,
    pub division_issues: Vec<String>,
    pub issues: Vec<String>,
    pub is_complete: bool,
}

/// Audits one season's stored games against the shape of an NFL schedule.
pub fn check_completeness(teams: &[Team], games: &[Game], season: i32) -> CompletenessReport {
    let expected = expected_games(season);
    let weeks = regular_season_weeks(season);
    let season_games: Vec<&Game> = games.iter().filter(|g| g.season == season).collect();
    let regular: Vec<&Game> = season_games
        .iter()
        .copied()
        .filter(|g| (1..=weeks).contains(&g.week))
        .collect();

    let team_reports: Vec<TeamCompleteness> = teams
        .iter()
        .map(|team| team_completeness(&team.code, &regular, weeks, expected))
        .collect();

    let duplicates = find_duplicates(&regular);
    let week_conflicts = find_week_conflicts(&regular);
    let division_issues = check_divisions(teams);

    let expected_regular_season_games = teams.len() * expected as usize / 2;
    let complete_teams = team_reports.iter().filter(|t| t.is_complete).count();

    let mut issues = Vec::new();
    if regular.len() != expected_regular_season_games {
        issues.push(format!(
            "{} regular-season games stored, expected {}",
            regular.len(),
            expected_regular_season_games
        ));
    }
    for t in team_reports.iter().filter(|t| !t.is_complete) {
        issues.push(format!(
            "{}: {}/{} games scored, {} scheduled, bye weeks {:?}",
            t.team, t.scored_games, expected, t.scheduled_games, t.bye_weeks
        ));
    }
    issues.extend(duplicates.iter().map(|d| format!("duplicate game: {}", d)));
    issues.extend(week_conflicts.iter().map(|c| format!("week conflict: {}", c)));
    issues.extend(division_issues.iter().cloned());

    CompletenessReport {
        season,
        expected_games_per_team: expected,
        regular_season_weeks: weeks,
        total_games: season_games.len(),
        regular_season_games: regular.len(),
        expected_regular_season_games,
        scored_games: regular.iter().filter(|g| g.is_played()).count(),
        preseason_games: season_games.iter().filter(|g| g.week == 0).count(),
        postseason_games: season_games.iter().filter(|g| g.week > weeks).count(),
        complete_teams,
        incomplete_teams: team_reports.len() - complete_teams,
        teams: team_reports,
        is_complete: issues.is_empty(),
        duplicates,
        week_conflicts,
        division_issues,
        issues,
    }
}

fn team_completeness(code: &str, regular: &[&Game], weeks: i32, expected: u32) -> TeamCompleteness {
    let own: Vec<&&Game> = regular.iter().filter(|g| g.involves(code)).collect();
    let played_weeks: BTreeSet<i32> = own.iter().map(|g| g.week).collect();
    let bye_weeks: Vec<i32> = (1..=weeks).filter(|w| !played_weeks.contains(w)).collect();

    let scheduled_games = own.len() as u32;
    let scored_games = own.iter().filter(|g| g.is_played()).count() as u32;

    TeamCompleteness {
        team: code.to_string(),
        scheduled_games,
        scored_games,
        home_games: own.iter().filter(|g| g.home_team == code).count() as u32,
        away_games: own.iter().filter(|g| g.away_team == code).count() as u32,
        is_complete: scheduled_games == expected && scored_games == expected && bye_weeks.len() == 1,
        weeks: played_weeks.into_iter().collect(),
        bye_weeks,
    }
}

/// Same pair of teams more than once in a week, whichever side hosts.
fn find_duplicates(regular: &[&Game]) -> Vec<String> {
    let mut seen: BTreeSet<(String, String, i32)> = BTreeSet::new();
    let mut duplicates = Vec::new();
    for game in regular {
        let (a, b) = if game.home_team <= game.away_team {
            (&game.home_team, &game.away_team)
        } else {
            (&game.away_team, &game.home_team)
        };
        if !seen.insert((a.clone(), b.clone(), game.week)) {
            duplicates.push(format!("{} @ {} in week {}", game.away_team, game.home_team, game.week));
        }
    }
    duplicates
}

/// Teams scheduled more than once in a single week.
fn find_week_conflicts(regular: &[&Game]) -> Vec<String> {
    let mut slots: BTreeMap<(&str, i32), Vec<String>> = BTreeMap::new();
    for game in regular {
        slots
            .entry((game.home_team.as_str(), game.week))
            .or_default()
            .push(format!("vs {} (home)", game.away_team));
        slots
            .entry((game.away_team.as_str(), game.week))
            .or_default()
            .push(format!("@ {} (away)", game.home_team));
    }
    slots
        .into_iter()
        .filter(|(_, games)| games.len() > 1)
        .map(|((team, week), games)| format!("{} in week {}: {}", team, week, games.join(", ")))
        .collect()
}

fn check_divisions(teams: &[Team]) -> Vec<String> {
    let mut sizes: HashMap<(Conference, Division), usize> = HashMap::new();
    for team in teams {
        *sizes.entry((team.conference, team.division)).or_default() += 1;
    }

    let mut issues = Vec::new();
    if teams.len() != LEAGUE_SIZE {
        issues.push(format!("{} teams stored, expected {}", teams.len(), LEAGUE_SIZE));
    }
    for conference in Conference::ALL {
        for division in Division::ALL {
            let size = sizes.get(&(conference, division)).copied().unwrap_or(0);
            if size != TEAMS_PER_DIVISION {
                issues.push(format!(
                    "{} {} has {} teams, expected {}",
                    conference, division, size, TEAMS_PER_DIVISION
                ));
            }
        }
    }
    issues
}

pub async fn season_completeness(pool: &SqlitePool, season: i32) -> Result<CompletenessReport> {
    let teams = get_all_teams(pool).await?;
    let games = get_games_for_season(pool, season).await?;
    let report = check_completeness(&teams, &games, season);
    tracing::info!(
        "Season {} completeness: {}/{} teams complete, {} issues",
        season,
        report.complete_teams,
        report.teams.len(),
        report.issues.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::seed::canonical_teams;
    use chrono::{Duration, TimeZone, Utc};

    /// 18 weeks; weeks 1-16 each rest two teams, weeks 17-18 everyone plays.
    fn full_season(teams: &[Team]) -> Vec<Game> {
        let start = Utc.with_ymd_and_hms(2025, 9, 7, 17, 0, 0).unwrap();
        let mut games = Vec::new();
        for week in 1..=18 {
            let date = start + Duration::days(7 * (week as i64 - 1));
            let resting: Vec<usize> = if week <= 16 {
                let first = 2 * (week as usize - 1);
                vec![first, first + 1]
            } else {
                vec![]
            };
            let playing: Vec<&Team> = teams
                .iter()
                .enumerate()
                .filter(|(i, _)| !resting.contains(i))
                .map(|(_, t)| t)
                .collect();
            for pair in playing.chunks(2) {
                games.push(Game::new(&pair[0].code, &pair[1].code, date, 2025, week).with_score(21, 14));
            }
        }
        games
    }

    #[test]
    fn test_full_season_passes() {
        let teams = canonical_teams();
        let games = full_season(&teams);
        let report = check_completeness(&teams, &games, 2025);

        assert_eq!(report.regular_season_games, 272);
        assert_eq!(report.complete_teams, 32);
        assert!(report.issues.is_empty(), "{:?}", report.issues);
        assert!(report.is_complete);
        assert!(report.teams.iter().all(|t| t.bye_weeks.len() == 1));
    }

    #[test]
    fn test_missing_and_unplayed_games_flagged() {
        let teams = canonical_teams();
        let mut games = full_season(&teams);
        let removed = games.remove(0);
        games[0].home_score = 0;
        games[0].away_score = 0;
        let unplayed = games[0].clone();

        let report = check_completeness(&teams, &games, 2025);
        assert!(!report.is_complete);
        assert_eq!(report.incomplete_teams, 4);

        let by_code = |code: &str| report.teams.iter().find(|t| t.team == code).unwrap().clone();
        let short = by_code(&removed.home_team);
        assert_eq!(short.scheduled_games, 16);
        assert_eq!(short.bye_weeks.len(), 2);

        let zero = by_code(&unplayed.away_team);
        assert_eq!(zero.scheduled_games, 17);
        assert_eq!(zero.scored_games, 16);
    }

    #[test]
    fn test_duplicates_and_conflicts_reported() {
        let teams = canonical_teams();
        let mut games = full_season(&teams);
        let first = games[0].clone();
        // same pairing, flipped venue
        games.push(Game::new(&first.away_team, &first.home_team, first.game_date, 2025, first.week));

        let report = check_completeness(&teams, &games, 2025);
        assert_eq!(report.duplicates.len(), 1);
        assert_eq!(report.week_conflicts.len(), 2);
        assert!(!report.is_complete);
    }

    #[test]
    fn test_division_sizes_checked() {
        let mut teams = canonical_teams();
        teams.retain(|t| t.code != "GB");
        let report = check_completeness(&teams, &[], 2025);
        assert_eq!(report.division_issues.len(), 2);
        assert!(report.division_issues.iter().any(|i| i.contains("NFC North")));
    }

    #[test]
    fn test_other_weeks_not_counted() {
        let teams = canonical_teams();
        let mut games = full_season(&teams);
        let date = Utc.with_ymd_and_hms(2025, 8, 10, 17, 0, 0).unwrap();
        games.push(Game::new("GB", "CHI", date, 2025, 0));
        games.push(Game::new("KC", "BUF", date + Duration::days(160), 2025, 20));

        let report = check_completeness(&teams, &games, 2025);
        assert_eq!(report.preseason_games, 1);
        assert_eq!(report.postseason_games, 1);
        assert!(report.is_complete);
    }
}
