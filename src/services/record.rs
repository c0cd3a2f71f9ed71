use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::models::Game;

/// Win/loss/tie and points tally for one team over a set of played games.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
    pub points_for: u32,
    pub points_against: u32,
}

impl Record {
    pub fn games_played(&self) -> u32 {
        self.wins + self.losses + self.ties
    }

    /// Ties count as half a win. 0.0 when nothing has been played.
    pub fn win_percentage(&self) -> f64 {
        let played = self.games_played();
        if played == 0 {
            return 0.0;
        }
        (self.wins as f64 + 0.5 * self.ties as f64) / played as f64
    }

    pub fn avg_points_for(&self) -> f64 {
        per_game(self.points_for, self.games_played())
    }

    pub fn avg_points_against(&self) -> f64 {
        per_game(self.points_against, self.games_played())
    }

    /// "W-L" or "W-L-T" when there are ties.
    pub fn display(&self) -> String {
        if self.ties > 0 {
            format!("{}-{}-{}", self.wins, self.losses, self.ties)
        } else {
            format!("{}-{}", self.wins, self.losses)
        }
    }

    fn add(&mut self, own: u32, opp: u32) {
        self.points_for += own;
        self.points_against += opp;
        match own.cmp(&opp) {
            Ordering::Greater => self.wins += 1,
            Ordering::Less => self.losses += 1,
            Ordering::Equal => self.ties += 1,
        }
    }
}

fn per_game(points: u32, games: u32) -> f64 {
    if games == 0 {
        0.0
    } else {
        points as f64 / games as f64
    }
}

/// Which games count toward a record.
#[derive(Debug, Clone, Copy)]
pub enum GameFilter<'a> {
    Season(i32),
    /// Same season, kickoff strictly before the cutoff.
    Before { season: i32, cutoff: DateTime<Utc> },
    /// Meetings with one opponent in any season, optionally strictly before a cutoff.
    HeadToHead { opponent: &'a str, cutoff: Option<DateTime<Utc>> },
}

impl GameFilter<'_> {
    pub fn matches(&self, team: &str, game: &Game) -> bool {
        if !game.involves(team) {
            return false;
        }
        match *self {
            GameFilter::Season(season) => game.season == season,
            GameFilter::Before { season, cutoff } => game.season == season && game.game_date < cutoff,
            GameFilter::HeadToHead { opponent, cutoff } => {
                game.opponent_of(team) == Some(opponent)
                    && cutoff.map_or(true, |c| game.game_date < c)
            }
        }
    }
}

/// Folds a game sequence into a record for `team`. Games the team is not in
/// and unplayed (0-0) games are skipped.
pub fn tally<'a, I>(team: &str, games: I) -> Record
where
    I: IntoIterator<Item = &'a Game>,
{
    games
        .into_iter()
        .filter(|g| g.is_played())
        .fold(Record::default(), |mut record, g| {
            if g.home_team == team {
                record.add(g.home_score.max(0) as u32, g.away_score.max(0) as u32);
            } else if g.away_team == team {
                record.add(g.away_score.max(0) as u32, g.home_score.max(0) as u32);
            }
            record
        })
}

pub fn record_for(team: &str, games: &[Game], filter: GameFilter<'_>) -> Record {
    tally(team, games.iter().filter(|g| filter.matches(team, g)))
}

pub fn season_record(team: &str, games: &[Game], season: i32) -> Record {
    record_for(team, games, GameFilter::Season(season))
}

pub fn record_before(team: &str, games: &[Game], season: i32, cutoff: DateTime<Utc>) -> Record {
    record_for(team, games, GameFilter::Before { season, cutoff })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meeting {
    pub game_id: String,
    pub season: i32,
    pub week: i32,
    pub game_date: DateTime<Utc>,
    pub home_team: String,
    pub away_team: String,
    pub home_score: i32,
    pub away_score: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadToHead {
    pub team: String,
    pub opponent: String,
    /// From `team`'s perspective.
    pub record: Record,
    /// Played meetings, most recent first.
    pub meetings: Vec<Meeting>,
}

pub fn head_to_head(team: &str, opponent: &str, games: &[Game], cutoff: Option<DateTime<Utc>>) -> HeadToHead {
    let filter = GameFilter::HeadToHead { opponent, cutoff };
    let mut meetings: Vec<&Game> = games
        .iter()
        .filter(|g| filter.matches(team, g) && g.is_played())
        .collect();
    meetings.sort_by(|a, b| b.game_date.cmp(&a.game_date));

    HeadToHead {
        team: team.to_string(),
        opponent: opponent.to_string(),
        record: tally(team, meetings.iter().copied()),
        meetings: meetings
            .into_iter()
            .map(|g| Meeting {
                game_id: g.id.clone(),
                season: g.season,
                week: g.week,
                game_date: g.game_date,
                home_team: g.home_team.clone(),
                away_team: g.away_team.clone(),
                home_score: g.home_score,
                away_score: g.away_score,
            })
            .collect(),
    }
}
