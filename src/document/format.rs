// Display helpers used when presenting search results

use chrono::{DateTime, Utc};

const WORDS_PER_MINUTE: f64 = 200.0;

/// Describe how long ago `then` was relative to `now`
#[inline]
pub fn format_age(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = now.signed_duration_since(then);
    let days = diff.num_days();

    if days > 0 {
        return match days {
            1 => "1 day ago".to_string(),
            2..=6 => format!("{} days ago", days),
            7..=29 => plural(days / 7, "week"),
            _ => plural(days / 30, "month"),
        };
    }

    let hours = diff.num_hours();
    if hours > 0 {
        return plural(hours, "hour");
    }

    let minutes = diff.num_minutes();
    if minutes > 0 {
        return plural(minutes, "minute");
    }

    "Just now".to_string()
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("1 {} ago", unit)
    } else {
        format!("{} {}s ago", count, unit)
    }
}

/// Shorten `text` to at most `max_length` characters, ending in "..." when cut
#[inline]
pub fn truncate_text(text: &str, max_length: usize) -> String {
    if text.chars().count() <= max_length {
        return text.to_string();
    }

    let mut truncated: String = text.chars().take(max_length.saturating_sub(3)).collect();
    truncated.push_str("...");
    truncated
}

#[inline]
pub fn format_score(score: i64) -> String {
    if score >= 1000 {
        format!("{:.1}k", score as f64 / 1000.0)
    } else {
        score.to_string()
    }
}

/// Estimated reading time in whole minutes, at least one for non-empty text
#[inline]
pub fn reading_time_minutes(text: &str) -> u64 {
    let word_count = text.split_whitespace().count();
    if word_count == 0 {
        return 0;
    }

    ((word_count as f64 / WORDS_PER_MINUTE).round() as u64).max(1)
}
