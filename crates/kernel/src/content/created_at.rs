//! Conversion of the submitted `created_at` timestamp.
//!
//! The edit form shows and accepts `created_at` in the acting user's
//! timezone; storage uses the site timezone.

use chrono::{DateTime, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;

/// Form format, e.g. `05/Mar/2024 02:30:00 pm`.
pub const CREATED_AT_FORMAT: &str = "%d/%b/%Y %I:%M:%S %P";

/// Human-readable form of [`CREATED_AT_FORMAT`] used in messages.
pub const CREATED_AT_FORMAT_HINT: &str = "dd/Mon/yyyy hh:mm:ss am|pm";

/// Format of the converted value recorded in revision snapshots.
pub const SNAPSHOT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CreatedAtError {
    #[error("created_at {0:?} does not match the expected format")]
    Malformed(String),

    #[error("created_at {0:?} does not exist in timezone {1}")]
    NonexistentLocalTime(String, Tz),
}

/// Parse a form timestamp in `user_tz`.
///
/// Ambiguous local times (DST fall-back) resolve to the earlier instant.
pub fn parse_in_timezone(input: &str, user_tz: Tz) -> Result<DateTime<Tz>, CreatedAtError> {
    let trimmed = input.trim();
    let naive = NaiveDateTime::parse_from_str(trimmed, CREATED_AT_FORMAT)
        .map_err(|_| CreatedAtError::Malformed(trimmed.to_string()))?;

    match user_tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt),
        LocalResult::Ambiguous(a, b) => Ok(a.min(b)),
        LocalResult::None => Err(CreatedAtError::NonexistentLocalTime(
            trimmed.to_string(),
            user_tz,
        )),
    }
}

/// Parse a form timestamp in `user_tz` and convert it into `app_tz`.
pub fn convert(input: &str, user_tz: Tz, app_tz: Tz) -> Result<DateTime<Tz>, CreatedAtError> {
    Ok(parse_in_timezone(input, user_tz)?.with_timezone(&app_tz))
}

/// Format check only; timezone gaps are reported by [`parse_in_timezone`].
pub fn matches_format(input: &str) -> bool {
    NaiveDateTime::parse_from_str(input.trim(), CREATED_AT_FORMAT).is_ok()
}

/// Render a stored timestamp for the form in the user's timezone.
pub fn format_for_form(value: DateTime<Utc>, user_tz: Tz) -> String {
    value
        .with_timezone(&user_tz)
        .format(CREATED_AT_FORMAT)
        .to_string()
}

/// Render the converted value the way revision snapshots record it.
pub fn format_for_snapshot(value: &DateTime<Tz>) -> String {
    value.format(SNAPSHOT_FORMAT).to_string()
}

/// Read a snapshot value back, interpreting it in `app_tz`.
pub fn parse_snapshot(value: &str, app_tz: Tz) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(value.trim(), SNAPSHOT_FORMAT).ok()?;
    app_tz
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn converts_user_time_to_app_timezone() {
        let converted = convert(
            "05/Mar/2024 02:30:00 pm",
            Tz::America__New_York,
            Tz::UTC,
        )
        .unwrap();

        assert_eq!(format_for_snapshot(&converted), "2024-03-05 19:30:00");
    }

    #[test]
    fn accepts_uppercase_meridiem_and_month() {
        let parsed = parse_in_timezone("05/MAR/2024 02:30:00 PM", Tz::UTC).unwrap();
        assert_eq!(parsed.hour(), 14);
    }

    #[test]
    fn midnight_and_noon() {
        let midnight = parse_in_timezone("01/Jan/2024 12:00:00 am", Tz::UTC).unwrap();
        let noon = parse_in_timezone("01/Jan/2024 12:00:00 pm", Tz::UTC).unwrap();
        assert_eq!(midnight.hour(), 0);
        assert_eq!(noon.hour(), 12);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(matches!(
            parse_in_timezone("2024-03-05 14:30:00", Tz::UTC),
            Err(CreatedAtError::Malformed(_))
        ));
        assert!(!matches_format("yesterday"));
        assert!(matches_format(" 05/Mar/2024 02:30:00 pm "));
    }

    #[test]
    fn rejects_nonexistent_local_time() {
        // 2024-03-10 02:30 does not exist in New York (spring forward).
        assert!(matches!(
            parse_in_timezone("10/Mar/2024 02:30:00 am", Tz::America__New_York),
            Err(CreatedAtError::NonexistentLocalTime(_, _))
        ));
    }

    #[test]
    fn ambiguous_local_time_takes_earlier_instant() {
        // 2024-11-03 01:30 happens twice in New York; EDT (UTC-4) comes first.
        let parsed =
            parse_in_timezone("03/Nov/2024 01:30:00 am", Tz::America__New_York).unwrap();
        assert_eq!(
            format_for_snapshot(&parsed.with_timezone(&Tz::UTC)),
            "2024-11-03 05:30:00"
        );
    }

    #[test]
    fn form_rendering_round_trips() {
        let stored = Utc.with_ymd_and_hms(2024, 3, 5, 19, 30, 0).unwrap();
        let shown = format_for_form(stored, Tz::America__New_York);
        assert_eq!(shown, "05/Mar/2024 02:30:00 pm");
    }

    #[test]
    fn snapshot_reads_back_in_app_timezone() {
        let parsed = parse_snapshot("2024-03-05 14:30:00", Tz::America__New_York).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 3, 5, 19, 30, 0).unwrap());
        assert!(parse_snapshot("05/Mar/2024 02:30:00 pm", Tz::UTC).is_none());
    }
}
