use anyhow::Result;
use chrono::{DateTime, Datelike, Duration, Utc, Weekday};
use sqlx::SqlitePool;
use std::collections::BTreeMap;

use crate::db::{get_postseason_kickoffs, get_regular_season_kickoffs};

/// Week shown before any regular-season game is on the books.
pub const DEFAULT_WEEK: i32 = 1;

/// Stored postseason weeks continue after this many regular-season slots.
const REGULAR_SEASON_SLOTS: i32 = 18;

/// Next Tuesday after the week's last kickoff, same time of day. A kickoff
/// that is itself on a Tuesday rolls over a full week later.
pub fn rollover_instant(last_kickoff: DateTime<Utc>) -> DateTime<Utc> {
    let today = last_kickoff.weekday().num_days_from_monday() as i64;
    let tuesday = Weekday::Tue.num_days_from_monday() as i64;
    let mut days = (tuesday - today).rem_euclid(7);
    if days == 0 {
        days = 7;
    }
    last_kickoff + Duration::days(days)
}

/// Latest kickoff per week.
pub fn last_kickoffs<I>(kickoffs: I) -> BTreeMap<i32, DateTime<Utc>>
where
    I: IntoIterator<Item = (i32, DateTime<Utc>)>,
{
    let mut weeks = BTreeMap::new();
    for (week, date) in kickoffs {
        weeks
            .entry(week)
            .and_modify(|last: &mut DateTime<Utc>| {
                if date > *last {
                    *last = date;
                }
            })
            .or_insert(date);
    }
    weeks
}

/// The first week whose rollover is still ahead of `now`; past every rollover
/// this is the last week with games.
pub fn resolve_current_week(now: DateTime<Utc>, last_kickoffs: &BTreeMap<i32, DateTime<Utc>>) -> i32 {
    last_kickoffs
        .iter()
        .find(|(_, last)| now < rollover_instant(**last))
        .or_else(|| last_kickoffs.iter().next_back())
        .map(|(&week, _)| week)
        .unwrap_or(DEFAULT_WEEK)
}

pub async fn current_week(pool: &SqlitePool, season: i32, now: DateTime<Utc>) -> Result<i32> {
    let kickoffs = get_regular_season_kickoffs(pool, season).await?;
    let week = resolve_current_week(now, &last_kickoffs(kickoffs));
    tracing::debug!("Current week for {} at {}: {}", season, now, week);
    Ok(week)
}

/// Current postseason round as ESPN numbers it (stored week minus 18).
/// Before any playoff game is stored this is the first round.
pub async fn current_postseason_round(pool: &SqlitePool, season: i32, now: DateTime<Utc>) -> Result<i32> {
    let kickoffs = last_kickoffs(get_postseason_kickoffs(pool, season).await?);
    let round = if kickoffs.is_empty() {
        DEFAULT_WEEK
    } else {
        resolve_current_week(now, &kickoffs) - REGULAR_SEASON_SLOTS
    };
    tracing::debug!("Current postseason round for {} at {}: {}", season, now, round);
    Ok(round)
}
