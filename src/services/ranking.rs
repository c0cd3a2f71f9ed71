use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashMap;

use crate::db::{get_all_teams, get_games_for_season, replace_season_stats};
use crate::models::{Conference, Division, Game, ScopedRank, Team, TeamRankings, TeamSeasonStats};
use crate::services::record::{season_record, Record};
use crate::utils::ordinal;

#[derive(Debug, Clone, Copy)]
enum Metric {
    WinPercentage,
    PointsFor,
    PointsAgainst,
}

#[derive(Debug, Clone, Serialize)]
pub struct Standing {
    pub team: String,
    pub conference: Conference,
    pub division: Division,
    pub record: Record,
    pub rankings: TeamRankings,
}

impl Standing {
    pub fn win_percentage(&self) -> f64 {
        self.record.win_percentage()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RankingSummary {
    pub season: i32,
    pub teams_ranked: usize,
    pub games_counted: usize,
}

/// Ranks every team for a season. Equal keys get consecutive ranks in team
/// code order, so the output is fully determined by the inputs.
pub fn rank_season(teams: &[Team], games: &[Game], season: i32) -> Vec<Standing> {
    let mut ordered: Vec<&Team> = teams.iter().collect();
    ordered.sort_by(|a, b| a.code.cmp(&b.code));

    let mut standings: Vec<Standing> = ordered
        .into_iter()
        .map(|t| Standing {
            team: t.code.clone(),
            conference: t.conference,
            division: t.division,
            record: season_record(&t.code, games, season),
            rankings: TeamRankings::default(),
        })
        .collect();

    for metric in [Metric::WinPercentage, Metric::PointsFor, Metric::PointsAgainst] {
        let order = sorted_order(&standings, metric);
        assign_ranks(&mut standings, &order, metric);
    }
    mark_conference_ties(&mut standings);

    standings
}

fn sorted_order(standings: &[Standing], metric: Metric) -> Vec<usize> {
    let mut order: Vec<usize> = (0..standings.len()).collect();
    // sort_by is stable: equal keys keep team code order
    order.sort_by(|&a, &b| {
        let (x, y) = (&standings[a].record, &standings[b].record);
        match metric {
            Metric::WinPercentage => y.win_percentage().total_cmp(&x.win_percentage()),
            Metric::PointsFor => y.points_for.cmp(&x.points_for),
            Metric::PointsAgainst => x.points_against.cmp(&y.points_against),
        }
    });
    order
}

fn assign_ranks(standings: &mut [Standing], order: &[usize], metric: Metric) {
    let mut by_conference: HashMap<Conference, u32> = HashMap::new();
    let mut by_division: HashMap<(Conference, Division), u32> = HashMap::new();

    for (position, &idx) in order.iter().enumerate() {
        let standing = &mut standings[idx];
        let conference = by_conference.entry(standing.conference).or_insert(0);
        *conference += 1;
        let division = by_division
            .entry((standing.conference, standing.division))
            .or_insert(0);
        *division += 1;

        let rank = ScopedRank {
            league: position as u32 + 1,
            conference: *conference,
            division: *division,
        };
        match metric {
            Metric::WinPercentage => standing.rankings.overall = rank,
            Metric::PointsFor => standing.rankings.offense = rank,
            Metric::PointsAgainst => standing.rankings.defense = rank,
        }
    }
}

fn mark_conference_ties(standings: &mut [Standing]) {
    // (conference, win% bits) -> (group size, best rank)
    let mut groups: HashMap<(Conference, u64), (u32, u32)> = HashMap::new();
    for s in standings.iter() {
        let entry = groups
            .entry((s.conference, s.win_percentage().to_bits()))
            .or_insert((0, u32::MAX));
        entry.0 += 1;
        entry.1 = entry.1.min(s.rankings.overall.conference);
    }
    for s in standings.iter_mut() {
        let (count, best) = groups[&(s.conference, s.win_percentage().to_bits())];
        s.rankings.conference_ties = count;
        s.rankings.conference_tie_rank = best;
    }
}

/// Recomputes and stores the season's records and rankings. The new rows are
/// built in memory first and swapped in with one transaction; on failure the
/// previous rankings stay in place.
pub async fn recompute_rankings(pool: &SqlitePool, season: i32) -> Result<RankingSummary> {
    let teams = get_all_teams(pool).await?;
    let games = get_games_for_season(pool, season).await?;

    let standings = rank_season(&teams, &games, season);
    let now = Utc::now();
    let rows: Vec<TeamSeasonStats> = standings
        .into_iter()
        .map(|s| TeamSeasonStats {
            team: s.team,
            season,
            record: s.record,
            rankings: s.rankings,
            updated_at: now,
        })
        .collect();

    let mut tx = pool.begin().await?;
    replace_season_stats(&mut *tx, season, &rows).await?;
    tx.commit().await?;

    let summary = RankingSummary {
        season,
        teams_ranked: rows.len(),
        games_counted: games.iter().filter(|g| g.is_played()).count(),
    };
    tracing::info!(
        "Rankings for {} recomputed: {} teams, {} played games",
        season,
        summary.teams_ranked,
        summary.games_counted
    );
    Ok(summary)
}

// ── Display ─────────────────────────────────────────────────────────────────

fn division_phrase(rank: u32, division_size: u32) -> String {
    if rank == 1 {
        "1st in division".to_string()
    } else if rank == division_size {
        "last in division".to_string()
    } else {
        format!("{} in division", ordinal(rank))
    }
}

fn scoped_display(rank: &ScopedRank, conference_phrase: String, division_size: u32) -> String {
    let mut parts = vec![format!("{} in league", ordinal(rank.league))];
    if rank.conference > 0 {
        parts.push(conference_phrase);
    }
    if rank.division > 0 {
        parts.push(division_phrase(rank.division, division_size));
    }
    parts.join(", ")
}

pub const NOT_CALCULATED: &str = "Rankings not calculated";

/// e.g. "3rd in league, Tied for 2nd in conference, 1st in division"
pub fn ranking_display(rankings: Option<&TeamRankings>, division_size: u32) -> String {
    let Some(r) = rankings.filter(|r| r.overall.league > 0) else {
        return NOT_CALCULATED.to_string();
    };
    let conference = if r.conference_ties > 1 {
        format!("Tied for {} in conference", ordinal(r.conference_tie_rank))
    } else {
        format!("{} in conference", ordinal(r.overall.conference))
    };
    scoped_display(&r.overall, conference, division_size)
}

pub fn offense_display(rankings: Option<&TeamRankings>, division_size: u32) -> String {
    match rankings.filter(|r| r.offense.league > 0) {
        Some(r) => scoped_display(
            &r.offense,
            format!("{} in conference", ordinal(r.offense.conference)),
            division_size,
        ),
        None => NOT_CALCULATED.to_string(),
    }
}

pub fn defense_display(rankings: Option<&TeamRankings>, division_size: u32) -> String {
    match rankings.filter(|r| r.defense.league > 0) {
        Some(r) => scoped_display(
            &r.defense,
            format!("{} in conference", ordinal(r.defense.conference)),
            division_size,
        ),
        None => NOT_CALCULATED.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::seed::canonical_teams;
    use chrono::{Duration, TimeZone};

    fn kickoff(n: i64) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 7, 17, 0, 0).unwrap() + Duration::hours(n)
    }

    fn game(home: &str, away: &str, hs: i32, aws: i32, n: i64) -> Game {
        Game::new(home, away, kickoff(n), 2025, 1).with_score(hs, aws)
    }

    fn sample_games() -> Vec<Game> {
        vec![
            game("GB", "CHI", 27, 10, 0),
            game("DET", "MIN", 31, 28, 1),
            game("KC", "LV", 20, 17, 2),
            game("BUF", "MIA", 10, 13, 3),
            game("PHI", "DAL", 24, 24, 4),
            game("SF", "SEA", 0, 0, 5),
            game("GB", "DET", 35, 3, 30),
        ]
    }

    fn find<'a>(standings: &'a [Standing], code: &str) -> &'a Standing {
        standings.iter().find(|s| s.team == code).unwrap()
    }

    #[test]
    fn test_all_teams_ranked_including_winless() {
        let teams = canonical_teams();
        let standings = rank_season(&teams, &sample_games(), 2025);
        assert_eq!(standings.len(), 32);
        let sf = find(&standings, "SF");
        assert_eq!(sf.record.games_played(), 0);
        assert_eq!(sf.win_percentage(), 0.0);
        assert!(sf.rankings.overall.league > 0);
    }

    #[test]
    fn test_league_ranks_are_permutations() {
        let teams = canonical_teams();
        let standings = rank_season(&teams, &sample_games(), 2025);
        let picks: [fn(&TeamRankings) -> u32; 3] = [
            |r| r.overall.league,
            |r| r.offense.league,
            |r| r.defense.league,
        ];
        for pick in picks {
            let mut ranks: Vec<u32> = standings.iter().map(|s| pick(&s.rankings)).collect();
            ranks.sort_unstable();
            assert_eq!(ranks, (1..=32).collect::<Vec<u32>>());
        }
    }

    #[test]
    fn test_overall_order_and_consecutive_ties() {
        let teams = canonical_teams();
        let standings = rank_season(&teams, &sample_games(), 2025);
        // GB, KC and MIA are all 1.000; equal win% ranks follow code order
        assert_eq!(find(&standings, "GB").rankings.overall.league, 1);
        let kc = find(&standings, "KC").rankings.overall.league;
        let mia = find(&standings, "MIA").rankings.overall.league;
        assert_eq!(mia, kc + 1);
    }

    #[test]
    fn test_defense_rank_one_has_fewest_points_against() {
        let teams = canonical_teams();
        let standings = rank_season(&teams, &sample_games(), 2025);
        let min_pa = standings.iter().map(|s| s.record.points_against).min().unwrap();
        let best = standings.iter().find(|s| s.rankings.defense.league == 1).unwrap();
        assert_eq!(best.record.points_against, min_pa);

        let top_offense = standings.iter().find(|s| s.rankings.offense.league == 1).unwrap();
        assert_eq!(top_offense.team, "GB");
        assert_eq!(top_offense.record.points_for, 62);
    }

    #[test]
    fn test_division_and_conference_scopes() {
        let teams = canonical_teams();
        let standings = rank_season(&teams, &sample_games(), 2025);
        for conference in Conference::ALL {
            let mut ranks: Vec<u32> = standings
                .iter()
                .filter(|s| s.conference == conference)
                .map(|s| s.rankings.overall.conference)
                .collect();
            ranks.sort_unstable();
            assert_eq!(ranks, (1..=16).collect::<Vec<u32>>());
        }
        let gb = find(&standings, "GB");
        assert_eq!(gb.rankings.overall.division, 1);
        let det = find(&standings, "DET");
        assert_eq!(det.rankings.overall.division, 2);
    }

    #[test]
    fn test_conference_ties_reported() {
        let teams = canonical_teams();
        let standings = rank_season(&teams, &sample_games(), 2025);
        // KC and MIA are both 1-0 in the AFC
        let kc = find(&standings, "KC");
        let mia = find(&standings, "MIA");
        assert_eq!(kc.rankings.conference_ties, 2);
        assert_eq!(mia.rankings.conference_tie_rank, kc.rankings.overall.conference);
        // GB alone at the top of the NFC
        assert_eq!(find(&standings, "GB").rankings.conference_ties, 1);
    }

    #[test]
    fn test_rank_season_is_idempotent() {
        let teams = canonical_teams();
        let games = sample_games();
        let first: Vec<TeamRankings> = rank_season(&teams, &games, 2025).into_iter().map(|s| s.rankings).collect();
        let second: Vec<TeamRankings> = rank_season(&teams, &games, 2025).into_iter().map(|s| s.rankings).collect();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_recompute_persists_and_replaces() {
        let pool = crate::db::tests::test_pool().await;
        for g in sample_games() {
            crate::db::insert_game(&pool, &g).await.unwrap();
        }

        let summary = recompute_rankings(&pool, 2025).await.unwrap();
        assert_eq!(summary.teams_ranked, 32);
        assert_eq!(summary.games_counted, 6);
        let first = crate::db::get_season_stats(&pool, 2025).await.unwrap();

        recompute_rankings(&pool, 2025).await.unwrap();
        let second = crate::db::get_season_stats(&pool, 2025).await.unwrap();
        assert_eq!(second.len(), 32);
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.team, b.team);
            assert_eq!(a.rankings, b.rankings);
        }

        let gb = crate::db::get_team_season_stats(&pool, "GB", 2025).await.unwrap().unwrap();
        assert_eq!(gb.record.display(), "2-0");
        assert_eq!(gb.rankings.overall.league, 1);
        assert!(crate::db::get_season_stats(&pool, 2024).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_recompute_keeps_previous_rankings() {
        let pool = crate::db::tests::test_pool().await;
        for g in sample_games() {
            crate::db::insert_game(&pool, &g).await.unwrap();
        }
        recompute_rankings(&pool, 2025).await.unwrap();
        let before = crate::db::get_season_stats(&pool, 2025).await.unwrap();

        // CHI would overtake GB, but the insert for WAS aborts midway through the swap
        crate::db::insert_game(&pool, &game("CHI", "GB", 30, 0, 40)).await.unwrap();
        crate::db::insert_game(&pool, &game("CHI", "GB", 28, 7, 47)).await.unwrap();
        sqlx::query(
            "CREATE TRIGGER reject_was BEFORE INSERT ON team_season_stats \
             WHEN NEW.team = 'WAS' BEGIN SELECT RAISE(ABORT, 'rejected'); END",
        )
        .execute(&pool)
        .await
        .unwrap();
        assert!(recompute_rankings(&pool, 2025).await.is_err());

        let after = crate::db::get_season_stats(&pool, 2025).await.unwrap();
        assert_eq!(after.len(), 32);
        for (a, b) in before.iter().zip(&after) {
            assert_eq!(a.team, b.team);
            assert_eq!(a.record, b.record);
            assert_eq!(a.rankings, b.rankings);
        }
        let gb = crate::db::get_team_season_stats(&pool, "GB", 2025).await.unwrap().unwrap();
        assert_eq!(gb.record.display(), "2-0");
    }

    #[test]
    fn test_ranking_display() {
        let rankings = TeamRankings {
            overall: ScopedRank { league: 3, conference: 2, division: 4 },
            offense: ScopedRank { league: 11, conference: 5, division: 2 },
            defense: ScopedRank { league: 22, conference: 13, division: 4 },
            conference_ties: 2,
            conference_tie_rank: 2,
        };
        assert_eq!(
            ranking_display(Some(&rankings), 4),
            "3rd in league, Tied for 2nd in conference, last in division"
        );
        assert_eq!(
            offense_display(Some(&rankings), 4),
            "11th in league, 5th in conference, 2nd in division"
        );
        assert_eq!(
            defense_display(Some(&rankings), 4),
            "22nd in league, 13th in conference, last in division"
        );
        assert_eq!(ranking_display(None, 4), NOT_CALCULATED);
    }
}
