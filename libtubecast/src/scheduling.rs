//! Scheduled-time parsing
//!
//! Accepts the formats a submission may carry for `scheduled_time`.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};

use crate::{Result, TubecastError};

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parse a scheduled time relative to `now`
///
/// Supports:
/// - RFC 3339 / ISO-8601 with an offset or a `Z` suffix: "2026-03-01T15:00:00Z"
/// - Naive date-times, taken as UTC: "2026-03-01T15:00", "2026-03-01 15:00:00"
/// - Relative durations: "30m", "2h", "1day 2h"
///
/// # Errors
///
/// Returns a validation error if the input is empty or in none of these
/// formats.
pub fn parse_scheduled_time(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return Err(TubecastError::Validation(
            "Scheduled time is required".to_string(),
        ));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    if let Ok(duration) = parse_duration(input) {
        return now.checked_add_signed(duration).ok_or_else(|| {
            TubecastError::Validation(format!("Scheduled time out of range: '{}'", input))
        });
    }

    Err(TubecastError::Validation(format!(
        "Could not parse scheduled time '{}'. Use ISO-8601 (2026-03-01T15:00:00Z) or a duration (30m, 2h)",
        input
    )))
}

/// Parse a duration string into a chrono::Duration
fn parse_duration(input: &str) -> Result<Duration> {
    // humantime handles "1h", "30m", "2days 4h"
    let std_duration = humantime::parse_duration(input)
        .map_err(|e| TubecastError::Validation(format!("Could not parse duration: {}", e)))?;

    Duration::from_std(std_duration)
        .map_err(|_| TubecastError::Validation("Duration out of range".to_string()))
}
