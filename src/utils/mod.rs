use chrono::{DateTime, Datelike, Utc};

/// External abbreviations that differ from our team codes, including
/// relocated franchises. Every ingestion path goes through this table.
const TEAM_ALIASES: &[(&str, &str)] = &[
    ("WSH", "WAS"),
    ("LAR", "LA"),
    ("STL", "LA"),
    ("OAK", "LV"),
    ("JAC", "JAX"),
    ("SD", "LAC"),
];

/// Map an external team abbreviation to the internal team code.
pub fn canonical_team_code(abbr: &str) -> String {
    let upper = abbr.trim().to_uppercase();
    TEAM_ALIASES
        .iter()
        .find(|(alias, _)| *alias == upper)
        .map(|(_, code)| code.to_string())
        .unwrap_or(upper)
}

/// 1 -> "1st", 2 -> "2nd", 11 -> "11th", 22 -> "22nd"
pub fn ordinal(n: u32) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

/// NFL season a date belongs to: September onwards is the new season,
/// anything before that still counts toward last year's.
pub fn season_for_date(date: DateTime<Utc>) -> i32 {
    if date.month() >= 9 {
        date.year()
    } else {
        date.year() - 1
    }
}

/// Regular-season game count per team.
pub fn expected_games(season: i32) -> u32 {
    if season >= 2021 {
        17
    } else {
        16
    }
}

/// Number of regular-season weeks.
pub fn regular_season_weeks(season: i32) -> i32 {
    if season >= 2021 {
        18
    } else {
        17
    }
}

/// Validate team code format
pub fn validate_team_code(code: &str) -> bool {
    let code = code.trim();
    !code.is_empty() && code.len() <= 4 && code.chars().all(|c| c.is_ascii_alphabetic())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_ordinal() {
        assert_eq!(ordinal(1), "1st");
        assert_eq!(ordinal(2), "2nd");
        assert_eq!(ordinal(3), "3rd");
        assert_eq!(ordinal(4), "4th");
        assert_eq!(ordinal(11), "11th");
        assert_eq!(ordinal(12), "12th");
        assert_eq!(ordinal(13), "13th");
        assert_eq!(ordinal(21), "21st");
        assert_eq!(ordinal(32), "32nd");
    }

    #[test]
    fn test_canonical_team_code() {
        assert_eq!(canonical_team_code("WSH"), "WAS");
        assert_eq!(canonical_team_code("lar"), "LA");
        assert_eq!(canonical_team_code("OAK"), "LV");
        assert_eq!(canonical_team_code("GB"), "GB");
        assert_eq!(canonical_team_code(" kc "), "KC");
    }

    #[test]
    fn test_season_for_date() {
        assert_eq!(season_for_date(Utc.with_ymd_and_hms(2025, 9, 4, 0, 0, 0).unwrap()), 2025);
        assert_eq!(season_for_date(Utc.with_ymd_and_hms(2026, 1, 10, 0, 0, 0).unwrap()), 2025);
        assert_eq!(season_for_date(Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap()), 2025);
    }

    #[test]
    fn test_season_shape() {
        assert_eq!(expected_games(2025), 17);
        assert_eq!(expected_games(2019), 16);
        assert_eq!(regular_season_weeks(2021), 18);
        assert_eq!(regular_season_weeks(2020), 17);
    }

    #[test]
    fn test_validate_team_code() {
        assert!(validate_team_code("GB"));
        assert!(validate_team_code("JAX"));
        assert!(!validate_team_code(""));
        assert!(!validate_team_code("G-B"));
    }
}
