use crate::error::{invalid_format, AppResult, Error};
use crate::utils::time::parse_time;
use chrono::{DateTime, Duration, LocalResult, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

/// Resolve an IANA timezone name
pub fn resolve_timezone(name: &str) -> AppResult<Tz> {
    name.parse::<Tz>()
        .map_err(|_| Error::Config(format!("Unknown timezone: {}", name)))
}

/// Local-time boundaries of a calendar day: midnight inclusive to the next
/// midnight exclusive, both as absolute timestamps.
pub fn day_window(date: NaiveDate, tz: Tz) -> AppResult<(DateTime<Utc>, DateTime<Utc>)> {
    let start = local_midnight(date, tz)?;
    let next = date
        .checked_add_signed(Duration::days(1))
        .ok_or_else(|| invalid_format("Date out of range"))?;
    let end = local_midnight(next, tz)?;
    Ok((start, end))
}

fn local_midnight(date: NaiveDate, tz: Tz) -> AppResult<DateTime<Utc>> {
    let naive = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| invalid_format("Failed to create datetime"))?;
    let local = match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        // Midnight repeated by a fall-back transition: take the earlier one
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => {
            return Err(invalid_format(&format!(
                "Midnight does not exist on {} in this timezone",
                date
            )));
        }
    };
    Ok(local.with_timezone(&Utc))
}

/// Convert an absolute timestamp to the user's local HH:MM display form
pub fn to_local_display(timestamp: DateTime<Utc>, tz: Tz) -> String {
    timestamp.with_timezone(&tz).format("%H:%M").to_string()
}

/// Convert a local HH:MM string on the given date back to an absolute
/// timestamp
pub fn from_local_time(date: NaiveDate, time_str: &str, tz: Tz) -> AppResult<DateTime<Utc>> {
    let (hour, minute) = parse_time(time_str)
        .ok_or_else(|| invalid_format(&format!("Invalid time format: {}", time_str)))?;

    let naive = date
        .and_hms_opt(hour, minute, 0)
        .ok_or_else(|| invalid_format("Failed to create datetime"))?;

    let local = match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(_, _) => {
            return Err(invalid_format(&format!(
                "Ambiguous local time: {} {}",
                date, time_str
            )));
        }
        LocalResult::None => {
            return Err(invalid_format(&format!(
                "Invalid local time: {} {}",
                date, time_str
            )));
        }
    };

    Ok(local.with_timezone(&Utc))
}
