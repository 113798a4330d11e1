//! Timezone conversion and display formatting
//!
//! All scheduling inputs arrive as naive wall-clock values in some IANA
//! timezone and are normalized to UTC instants here. DST transitions are
//! never resolved silently: a wall-clock time that occurs twice (fall-back)
//! or never (spring-forward) is returned as an error for the caller to
//! disambiguate or reject.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::errors::{BookwiseError, Result};

/// Parse an IANA timezone name.
pub fn parse_zone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|_| BookwiseError::InvalidInput(format!("Unknown timezone '{name}'")))
}

/// Whether `name` is a valid IANA timezone.
pub fn zone_is_valid(name: &str) -> bool {
    name.parse::<Tz>().is_ok()
}

/// Convert a naive local date and time in `zone` to an absolute UTC instant.
///
/// # Errors
/// - `AmbiguousLocalTime` when the wall-clock time occurs twice (fall-back)
/// - `NonexistentLocalTime` when it is skipped entirely (spring-forward)
pub fn local_to_utc(date: NaiveDate, time: NaiveTime, zone: &str) -> Result<DateTime<Utc>> {
    let tz = parse_zone(zone)?;
    let naive = NaiveDateTime::new(date, time);
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(_, _) => Err(BookwiseError::AmbiguousLocalTime {
            zone: zone.to_string(),
            local: naive.to_string(),
        }),
        LocalResult::None => Err(BookwiseError::NonexistentLocalTime {
            zone: zone.to_string(),
            local: naive.to_string(),
        }),
    }
}

/// Convert a UTC instant to the local time in `zone`.
pub fn utc_to_local(instant: DateTime<Utc>, zone: &str) -> Result<DateTime<Tz>> {
    let tz = parse_zone(zone)?;
    Ok(instant.with_timezone(&tz))
}

/// UTC instant of the start of `date` in `zone`, for day/week windows.
///
/// Unlike user-supplied wall-clock times, an internal day boundary must
/// always resolve: on the rare zones where midnight falls inside a DST gap
/// the earliest existing time that day is used, and an ambiguous midnight
/// takes its earlier occurrence.
pub fn resolve_day_start(date: NaiveDate, zone: &str) -> Result<DateTime<Utc>> {
    let tz = parse_zone(zone)?;
    let mut probe = NaiveDateTime::new(date, NaiveTime::MIN);
    let day_end = probe + Duration::days(1);
    while probe < day_end {
        match tz.from_local_datetime(&probe) {
            LocalResult::Single(dt) => return Ok(dt.with_timezone(&Utc)),
            LocalResult::Ambiguous(earliest, _) => return Ok(earliest.with_timezone(&Utc)),
            LocalResult::None => probe = probe + Duration::minutes(15),
        }
    }
    Err(BookwiseError::Internal(format!(
        "No representable instant on {date} in {zone}"
    )))
}

/// Format a `[start, end)` window in `zone`, optionally annotated with the
/// visitor's equivalent local times when their zone differs.
///
/// Example: `"14:00 - 14:30 Europe/Copenhagen (08:00 - 08:30 America/New_York your time)"`
pub fn format_window(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    zone: &str,
    visitor_zone: Option<&str>,
) -> Result<String> {
    let local_start = utc_to_local(start, zone)?;
    let local_end = utc_to_local(end, zone)?;
    let base = format!(
        "{} - {} {}",
        local_start.format("%H:%M"),
        local_end.format("%H:%M"),
        zone
    );

    match visitor_zone {
        Some(visitor) if visitor != zone => {
            let visitor_start = utc_to_local(start, visitor)?;
            let visitor_end = utc_to_local(end, visitor)?;
            Ok(format!(
                "{base} ({} - {} {visitor} your time)",
                visitor_start.format("%H:%M"),
                visitor_end.format("%H:%M"),
            ))
        }
        _ => Ok(base),
    }
}

/// UTC offset of `zone` at a given instant, formatted as `+HH:MM`.
pub fn zone_offset(zone: &str, at: DateTime<Utc>) -> Result<String> {
    let local = utc_to_local(at, zone)?;
    let formatted = local.format("%z").to_string();
    if formatted.len() == 5 {
        Ok(format!("{}:{}", &formatted[..3], &formatted[3..]))
    } else {
        Ok(formatted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn time(h: u32, min: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, min, 0).unwrap()
    }

    #[test]
    fn converts_local_to_utc_and_back() {
        // CEST is UTC+2 in June
        let instant = local_to_utc(date(2024, 6, 3), time(14, 0), "Europe/Copenhagen").unwrap();
        assert_eq!(instant.hour(), 12);

        let round_trip = utc_to_local(instant, "Europe/Copenhagen").unwrap();
        assert_eq!(round_trip.hour(), 14);
    }

    #[test]
    fn spring_forward_gap_is_rejected() {
        // 2024-03-10 02:30 never happened in US Eastern
        let err = local_to_utc(date(2024, 3, 10), time(2, 30), "America/New_York").unwrap_err();
        assert!(matches!(err, BookwiseError::NonexistentLocalTime { .. }));
    }

    #[test]
    fn fall_back_fold_is_rejected() {
        // 2024-11-03 01:30 happened twice in US Eastern
        let err = local_to_utc(date(2024, 11, 3), time(1, 30), "America/New_York").unwrap_err();
        assert!(matches!(err, BookwiseError::AmbiguousLocalTime { .. }));
    }

    #[test]
    fn unknown_zone_is_invalid_input() {
        let err = local_to_utc(date(2024, 6, 3), time(9, 0), "Mars/Olympus").unwrap_err();
        assert!(matches!(err, BookwiseError::InvalidInput(_)));
        assert!(!zone_is_valid("Mars/Olympus"));
        assert!(zone_is_valid("Europe/Copenhagen"));
    }

    #[test]
    fn day_start_resolves_even_inside_dst_gap() {
        // Midnight 2018-11-04 did not exist in Sao Paulo (clocks jumped
        // 00:00 -> 01:00); the day must still have a usable start.
        let start = resolve_day_start(date(2018, 11, 4), "America/Sao_Paulo").unwrap();
        let local = utc_to_local(start, "America/Sao_Paulo").unwrap();
        assert_eq!(local.hour(), 1);
    }

    #[test]
    fn window_formats_with_visitor_zone() {
        let start = local_to_utc(date(2024, 6, 3), time(14, 0), "Europe/Copenhagen").unwrap();
        let end = start + Duration::minutes(30);

        let same = format_window(start, end, "Europe/Copenhagen", None).unwrap();
        assert_eq!(same, "14:00 - 14:30 Europe/Copenhagen");

        let annotated =
            format_window(start, end, "Europe/Copenhagen", Some("America/New_York")).unwrap();
        assert_eq!(
            annotated,
            "14:00 - 14:30 Europe/Copenhagen (08:00 - 08:30 America/New_York your time)"
        );
    }

    #[test]
    fn offset_is_formatted_with_colon() {
        let at = local_to_utc(date(2024, 1, 15), time(12, 0), "Europe/Copenhagen").unwrap();
        assert_eq!(zone_offset("Europe/Copenhagen", at).unwrap(), "+01:00");
        assert_eq!(zone_offset("America/New_York", at).unwrap(), "-05:00");
    }
}
