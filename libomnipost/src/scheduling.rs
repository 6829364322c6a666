//! Time parsing for schedule requests
//!
//! Accepts the forms a person types on a command line and resolves them
//! against a caller-supplied `now`.

use chrono::{DateTime, Duration, Utc};

use crate::error::{OmnipostError, Result};

/// Parse a schedule string into a UTC instant
///
/// Supports, in order of precedence:
/// - `now`
/// - Relative durations: "90s", "30m", "1h 30m", "in 2h"
/// - RFC 3339 timestamps: "2030-06-01T10:00:00Z", "2030-06-01T12:00:00+02:00"
/// - Natural language understood by `chrono-english`: "tomorrow", "friday 8pm"
///
/// # Errors
///
/// Returns `InvalidInput` if the string is empty or matches none of the forms.
pub fn parse_schedule(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return Err(OmnipostError::InvalidInput(
            "Schedule string cannot be empty".to_string(),
        ));
    }

    if input.eq_ignore_ascii_case("now") {
        return Ok(now);
    }

    let relative = input.strip_prefix("in ").unwrap_or(input);
    if let Some(duration) = parse_duration(relative) {
        return Ok(now + duration);
    }

    if let Ok(at) = DateTime::parse_from_rfc3339(input) {
        return Ok(at.with_timezone(&Utc));
    }

    chrono_english::parse_date_string(input, now, chrono_english::Dialect::Us).map_err(|e| {
        OmnipostError::InvalidInput(format!("Could not parse schedule '{}': {}", input, e))
    })
}

fn parse_duration(input: &str) -> Option<Duration> {
    let std_duration = humantime::parse_duration(input).ok()?;
    let millis = i64::try_from(std_duration.as_millis()).ok()?;
    Duration::try_milliseconds(millis)
}
