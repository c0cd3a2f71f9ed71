//! Runtime configuration loaded from the environment (after `.env`).

use chrono::Utc;
use std::env;
use std::time::Duration;

use crate::utils::season_for_date;

pub const DEFAULT_DATABASE_URL: &str = "sqlite:../data/gridiron.db";

pub const DEFAULT_ESPN_BASE_URL: &str = "https://site.api.espn.com/apis/site/v2/sports/football/nfl";

pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Live polling cadence while games are on
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub espn_base_url: String,
    pub http_timeout: Duration,
    pub poll_interval: Duration,
    /// Pinned season; None means infer from today's date
    pub season: Option<i32>,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let http_timeout = Duration::from_secs(
            env::var("HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
        );

        let poll_interval = Duration::from_secs(
            env::var("POLL_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(DEFAULT_POLL_INTERVAL_SECS)
                .max(5),
        );

        Self {
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            espn_base_url: env::var("ESPN_BASE_URL").unwrap_or_else(|_| DEFAULT_ESPN_BASE_URL.to_string()),
            http_timeout,
            poll_interval,
            season: env::var("NFL_SEASON").ok().and_then(|v| v.parse::<i32>().ok()),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(DEFAULT_PORT),
        }
    }

    /// Explicit season if given, else the pinned one, else today's season.
    pub fn season_or_default(&self, explicit: Option<i32>) -> i32 {
        explicit
            .or(self.season)
            .unwrap_or_else(|| season_for_date(Utc::now()))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            espn_base_url: DEFAULT_ESPN_BASE_URL.to_string(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            season: None,
            port: DEFAULT_PORT,
        }
    }
}
