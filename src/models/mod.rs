use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::services::record::{HeadToHead, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Conference {
    Afc,
    Nfc,
}

impl Conference {
    pub const ALL: [Conference; 2] = [Conference::Afc, Conference::Nfc];

    pub fn as_str(&self) -> &'static str {
        match self {
            Conference::Afc => "AFC",
            Conference::Nfc => "NFC",
        }
    }
}

impl fmt::Display for Conference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Conference {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "AFC" => Ok(Conference::Afc),
            "NFC" => Ok(Conference::Nfc),
            other => Err(anyhow::anyhow!("unknown conference '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Division {
    North,
    East,
    South,
    West,
}

impl Division {
    pub const ALL: [Division; 4] = [Division::North, Division::East, Division::South, Division::West];

    pub fn as_str(&self) -> &'static str {
        match self {
            Division::North => "North",
            Division::East => "East",
            Division::South => "South",
            Division::West => "West",
        }
    }
}

impl fmt::Display for Division {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Division {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "north" => Ok(Division::North),
            "east" => Ok(Division::East),
            "south" => Ok(Division::South),
            "west" => Ok(Division::West),
            other => Err(anyhow::anyhow!("unknown division '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    /// Short code, e.g. "GB". Unique.
    pub code: String,
    pub full_name: String,
    pub city: String,
    pub conference: Conference,
    pub division: Division,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Team {
    pub fn new(code: &str, city: &str, nickname: &str, conference: Conference, division: Division) -> Self {
        let now = Utc::now();
        Self {
            code: code.to_string(),
            full_name: format!("{} {}", city, nickname),
            city: city.to_string(),
            conference,
            division,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub home_team: String,
    pub away_team: String,
    /// 0-0 means the game has not been played yet.
    pub home_score: i32,
    pub away_score: i32,
    pub game_date: DateTime<Utc>,
    /// 0 = preseason/non-standard, 1-18 = regular season, >18 = postseason
    pub week: i32,
    pub season: i32,
    pub is_live: bool,
    pub game_status: String,
    pub current_quarter: Option<i32>,
    pub time_remaining: String,
    pub last_updated: DateTime<Utc>,
}

impl Game {
    pub fn new(home_team: &str, away_team: &str, game_date: DateTime<Utc>, season: i32, week: i32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            home_team: home_team.to_string(),
            away_team: away_team.to_string(),
            home_score: 0,
            away_score: 0,
            game_date,
            week,
            season,
            is_live: false,
            game_status: String::new(),
            current_quarter: None,
            time_remaining: String::new(),
            last_updated: Utc::now(),
        }
    }

    pub fn with_score(mut self, home_score: i32, away_score: i32) -> Self {
        self.home_score = home_score;
        self.away_score = away_score;
        self
    }

    pub fn involves(&self, team: &str) -> bool {
        self.home_team == team || self.away_team == team
    }

    pub fn is_played(&self) -> bool {
        !(self.home_score == 0 && self.away_score == 0)
    }

    pub fn is_finished(&self) -> bool {
        !self.is_live && self.is_played()
    }

    pub fn winner(&self) -> Option<&str> {
        if self.home_score > self.away_score {
            Some(&self.home_team)
        } else if self.away_score > self.home_score {
            Some(&self.away_team)
        } else {
            None
        }
    }

    pub fn opponent_of(&self, team: &str) -> Option<&str> {
        if self.home_team == team {
            Some(&self.away_team)
        } else if self.away_team == team {
            Some(&self.home_team)
        } else {
            None
        }
    }

    pub fn quarter_display(&self) -> String {
        match self.current_quarter {
            Some(1) => "1st".to_string(),
            Some(2) => "2nd".to_string(),
            Some(3) => "3rd".to_string(),
            Some(4) => "4th".to_string(),
            Some(5) => "OT".to_string(),
            Some(q) if q > 5 => format!("OT{}", q - 4),
            _ => String::new(),
        }
    }
}

/// Ranks of one metric at the three scopes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopedRank {
    pub league: u32,
    pub conference: u32,
    pub division: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRankings {
    pub overall: ScopedRank,
    pub offense: ScopedRank,
    pub defense: ScopedRank,
    /// Conference teams sharing this team's exact win percentage, itself included.
    pub conference_ties: u32,
    /// Best conference rank inside that tied group.
    pub conference_tie_rank: u32,
}

/// Cached per-season statistics for one team, as written by the ranking engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamSeasonStats {
    pub team: String,
    pub season: i32,
    pub record: Record,
    pub rankings: TeamRankings,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ScheduleSlot {
    Game { week: i32, game: Game },
    Bye { week: i32 },
}

/// Record line for a season other than the one being viewed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonLine {
    pub season: i32,
    pub record: Record,
    pub win_percentage: f64,
    pub avg_points_for: f64,
    pub avg_points_against: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamSeasonSummary {
    pub team: Team,
    pub season: i32,
    pub record: Record,
    /// None when the team has no played games the season before.
    pub previous_season: Option<SeasonLine>,
    pub win_percentage: f64,
    pub scheduled_games: u32,
    pub avg_points_for: f64,
    pub avg_points_against: f64,
    pub rankings: Option<TeamRankings>,
    pub ranking_display: String,
    pub offense_ranking_display: String,
    pub defense_ranking_display: String,
    pub schedule: Vec<ScheduleSlot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeekSchedule {
    pub season: i32,
    pub week: i32,
    pub games: Vec<Game>,
    pub total_games: usize,
    pub played_games: usize,
    pub bye_teams: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameDetail {
    pub game: Game,
    pub home_team: Team,
    pub away_team: Team,
    /// Same-season records strictly before kickoff.
    pub home_pregame: Record,
    pub away_pregame: Record,
    /// From the home team's perspective, all meetings before kickoff.
    pub head_to_head: HeadToHead,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentWeek {
    pub season: i32,
    pub week: i32,
}

// API Response types
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }
}
