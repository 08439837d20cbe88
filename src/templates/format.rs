// src/templates/format.rs
use chrono::{DateTime, Utc};

pub const UNAVAILABLE: &str = "Unavailable";

pub fn or_unavailable(value: Option<&str>) -> &str {
    value.unwrap_or(UNAVAILABLE)
}

/// "5 minutes ago", "about 3 hours ago", "in 2 days"...
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds();
    let distance = distance_words(secs.unsigned_abs());
    if secs >= 0 {
        format!("{distance} ago")
    } else {
        format!("in {distance}")
    }
}

fn plural(n: u64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit}")
    } else {
        format!("{n} {unit}s")
    }
}

fn distance_words(secs: u64) -> String {
    const MINUTES_IN_DAY: u64 = 1440;
    const MINUTES_IN_MONTH: u64 = 43_200;
    const MINUTES_IN_TWO_MONTHS: u64 = 86_400;

    // Round to the nearest minute.
    let minutes = (secs + 30) / 60;

    if minutes < 1 {
        return "less than a minute".to_string();
    }
    if minutes < 45 {
        return plural(minutes, "minute");
    }
    if minutes < 90 {
        return "about 1 hour".to_string();
    }
    if minutes < MINUTES_IN_DAY {
        let hours = (minutes + 30) / 60;
        return format!("about {}", plural(hours, "hour"));
    }
    if minutes < 2520 {
        return "1 day".to_string();
    }
    if minutes < MINUTES_IN_MONTH {
        let days = (minutes + MINUTES_IN_DAY / 2) / MINUTES_IN_DAY;
        return plural(days, "day");
    }
    if minutes < MINUTES_IN_TWO_MONTHS {
        let months = (minutes + MINUTES_IN_MONTH / 2) / MINUTES_IN_MONTH;
        return format!("about {}", plural(months, "month"));
    }

    let months = minutes / MINUTES_IN_MONTH;
    if months < 12 {
        return plural(months, "month");
    }

    let years = months / 12;
    match months % 12 {
        0..=2 => format!("about {}", plural(years, "year")),
        3..=8 => format!("over {}", plural(years, "year")),
        _ => format!("almost {}", plural(years + 1, "year")),
    }
}
