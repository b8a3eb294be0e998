//! Date and timestamp rendering.
//!
//! Infinity sentinels are recognised before any calendar arithmetic.
//! Finite values are decomposed with proleptic Gregorian day arithmetic
//! over the whole range the server accepts, 4714-11-24 BC up to the end
//! of 5874897 AD for dates and 294276 AD for timestamps. Anything outside
//! that range is a range error, never a clamped or wrapped value.

use crate::buffer::JsonBuffer;
use bottledwater_core::{
    BottledWaterResult, RangeError, SessionZone, DATE_INFINITY, DATE_NEG_INFINITY,
    TIMESTAMP_INFINITY, TIMESTAMP_NEG_INFINITY,
};
use std::fmt::Write;

const INFINITY: &str = "\"infinity\"";
const NEG_INFINITY: &str = "\"-infinity\"";

/// First valid day (4714-11-24 BC), counted from 2000-01-01.
pub const MIN_DATE_DAYS: i32 = -2_451_545;
/// One past the last valid day (5874898-01-01).
pub const END_DATE_DAYS: i32 = 2_145_031_949;
/// First valid timestamp (4714-11-24 BC 00:00), in microseconds from 2000-01-01.
pub const MIN_TIMESTAMP_MICROS: i64 = -211_813_488_000_000_000;
/// One past the last valid timestamp (294277-01-01 00:00).
pub const END_TIMESTAMP_MICROS: i64 = 9_223_371_331_200_000_000;

const MICROS_PER_DAY: i64 = 86_400_000_000;
/// Days from 0000-03-01 to 2000-01-01.
const EPOCH_SHIFT_DAYS: i64 = 730_425;
const DAYS_PER_ERA: i64 = 146_097;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CivilDate {
    /// Proleptic year; 0 is 1 BC.
    year: i64,
    month: u32,
    day: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CivilTime {
    date: CivilDate,
    micros_of_day: i64,
}

/// Write a date as `"YYYY-MM-DD"` (`"YYYY-MM-DD BC"` before year 1) or an infinity sentinel.
pub fn encode_date(days: i32, out: &mut JsonBuffer) -> BottledWaterResult<()> {
    match days {
        DATE_NEG_INFINITY => out.push_raw(NEG_INFINITY),
        DATE_INFINITY => out.push_raw(INFINITY),
        _ => {
            let date = decompose_date(days)?;
            let mut text = String::with_capacity(16);
            write_date(&mut text, date);
            if date.year <= 0 {
                text.push_str(" BC");
            }
            out.push_escaped(&text)?;
        }
    }
    Ok(())
}

/// Write a zoneless timestamp as `"YYYY-MM-DDTHH:MM:SS[.ffffff]"` or an infinity sentinel.
pub fn encode_timestamp(micros: i64, out: &mut JsonBuffer) -> BottledWaterResult<()> {
    match micros {
        TIMESTAMP_NEG_INFINITY => out.push_raw(NEG_INFINITY),
        TIMESTAMP_INFINITY => out.push_raw(INFINITY),
        _ => {
            let ts = decompose_timestamp(micros, 0)?;
            let mut text = String::with_capacity(32);
            write_datetime(&mut text, ts);
            if ts.date.year <= 0 {
                text.push_str(" BC");
            }
            out.push_escaped(&text)?;
        }
    }
    Ok(())
}

/// Write a zoned timestamp in the session zone, with numeric offset and
/// the zone abbreviation when the session knows one.
pub fn encode_timestamptz(
    micros: i64,
    zone: &SessionZone,
    out: &mut JsonBuffer,
) -> BottledWaterResult<()> {
    match micros {
        TIMESTAMP_NEG_INFINITY => out.push_raw(NEG_INFINITY),
        TIMESTAMP_INFINITY => out.push_raw(INFINITY),
        _ => {
            let local = decompose_timestamp(micros, zone.offset_seconds)?;
            let mut text = String::with_capacity(40);
            write_datetime(&mut text, local);
            write_offset(&mut text, zone.offset_seconds);
            if let Some(abbrev) = &zone.abbreviation {
                text.push(' ');
                text.push_str(abbrev);
            }
            if local.date.year <= 0 {
                text.push_str(" BC");
            }
            out.push_escaped(&text)?;
        }
    }
    Ok(())
}

fn decompose_date(days: i32) -> Result<CivilDate, RangeError> {
    if !(MIN_DATE_DAYS..END_DATE_DAYS).contains(&days) {
        return Err(RangeError::DateOutOfRange { days });
    }
    Ok(civil_from_days(i64::from(days)))
}

/// Split `micros` into a calendar date and time of day, shifted east by
/// `offset_seconds`. The range check applies to the unshifted value.
fn decompose_timestamp(micros: i64, offset_seconds: i32) -> Result<CivilTime, RangeError> {
    if !(MIN_TIMESTAMP_MICROS..END_TIMESTAMP_MICROS).contains(&micros) {
        return Err(RangeError::TimestampOutOfRange { micros });
    }
    let local = micros
        .checked_add(i64::from(offset_seconds) * 1_000_000)
        .ok_or(RangeError::TimestampOutOfRange { micros })?;
    Ok(CivilTime {
        date: civil_from_days(local.div_euclid(MICROS_PER_DAY)),
        micros_of_day: local.rem_euclid(MICROS_PER_DAY),
    })
}

/// Proleptic Gregorian date of a day number counted from 2000-01-01.
///
/// Works in 400-year eras starting on March 1st so that the leap day is
/// the last day of each computed year.
fn civil_from_days(days: i64) -> CivilDate {
    let shifted = days + EPOCH_SHIFT_DAYS;
    let era = shifted.div_euclid(DAYS_PER_ERA);
    let day_of_era = shifted.rem_euclid(DAYS_PER_ERA);
    let year_of_era =
        (day_of_era - day_of_era / 1_460 + day_of_era / 36_524 - day_of_era / 146_096) / 365;
    let day_of_year = day_of_era - (365 * year_of_era + year_of_era / 4 - year_of_era / 100);
    let month_index = (5 * day_of_year + 2) / 153;
    let day = day_of_year - (153 * month_index + 2) / 5 + 1;
    let month = if month_index < 10 {
        month_index + 3
    } else {
        month_index - 9
    };
    CivilDate {
        year: era * 400 + year_of_era + i64::from(month <= 2),
        month: month as u32,
        day: day as u32,
    }
}

fn write_date(text: &mut String, date: CivilDate) {
    // BC years count down from 1 BC, which is proleptic year 0.
    let year = if date.year <= 0 {
        1 - date.year
    } else {
        date.year
    };
    let _ = write!(text, "{:04}-{:02}-{:02}", year, date.month, date.day);
}

fn write_datetime(text: &mut String, ts: CivilTime) {
    write_date(text, ts.date);
    let seconds = ts.micros_of_day / 1_000_000;
    let _ = write!(
        text,
        "T{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds / 60) % 60,
        seconds % 60
    );
    let micros = ts.micros_of_day % 1_000_000;
    if micros != 0 {
        let frac = format!("{:06}", micros);
        text.push('.');
        text.push_str(frac.trim_end_matches('0'));
    }
}

fn write_offset(text: &mut String, offset_seconds: i32) {
    let sign = if offset_seconds < 0 { '-' } else { '+' };
    let abs = offset_seconds.unsigned_abs();
    let (hours, minutes, seconds) = (abs / 3600, (abs / 60) % 60, abs % 60);
    let _ = write!(text, "{}{:02}:{:02}", sign, hours, minutes);
    if seconds != 0 {
        let _ = write!(text, ":{:02}", seconds);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bottledwater_core::storage_epoch;
    use chrono::{Datelike, NaiveDate};

    fn date(days: i32) -> BottledWaterResult<String> {
        let mut buf = JsonBuffer::new();
        encode_date(days, &mut buf)?;
        buf.into_document()
    }

    fn ts(micros: i64) -> BottledWaterResult<String> {
        let mut buf = JsonBuffer::new();
        encode_timestamp(micros, &mut buf)?;
        buf.into_document()
    }

    fn tstz(micros: i64, zone: &SessionZone) -> BottledWaterResult<String> {
        let mut buf = JsonBuffer::new();
        encode_timestamptz(micros, zone, &mut buf)?;
        buf.into_document()
    }

    #[test]
    fn test_date_epoch_and_offsets() {
        assert_eq!(date(0).unwrap(), "\"2000-01-01\"");
        assert_eq!(date(-1).unwrap(), "\"1999-12-31\"");
        assert_eq!(date(366).unwrap(), "\"2001-01-01\"");
    }

    #[test]
    fn test_date_bc() {
        let days = NaiveDate::from_ymd_opt(-43, 3, 15)
            .unwrap()
            .signed_duration_since(storage_epoch())
            .num_days() as i32;
        assert_eq!(date(days).unwrap(), "\"0044-03-15 BC\"");
    }

    #[test]
    fn test_date_sentinels() {
        assert_eq!(date(DATE_INFINITY).unwrap(), "\"infinity\"");
        assert_eq!(date(DATE_NEG_INFINITY).unwrap(), "\"-infinity\"");
    }

    #[test]
    fn test_date_beyond_calendar_is_range_error() {
        let err = date(DATE_INFINITY - 1).unwrap_err();
        assert!(matches!(
            err,
            bottledwater_core::BottledWaterError::Range(RangeError::DateOutOfRange { .. })
        ));
    }

    #[test]
    fn test_date_range_edges() {
        assert_eq!(date(MIN_DATE_DAYS).unwrap(), "\"4714-11-24 BC\"");
        assert_eq!(date(END_DATE_DAYS - 1).unwrap(), "\"5874897-12-31\"");
        assert!(date(MIN_DATE_DAYS - 1).is_err());
        assert!(date(END_DATE_DAYS).is_err());
    }

    #[test]
    fn test_calendar_agrees_with_chrono() {
        for days in (-800_000i64..800_000).step_by(997).chain([-730_425, 59, 60, 365, 36_524]) {
            let expected = storage_epoch() + chrono::TimeDelta::days(days);
            let actual = civil_from_days(days);
            assert_eq!(
                (actual.year, actual.month, actual.day),
                (i64::from(expected.year()), expected.month(), expected.day()),
                "day {days}"
            );
        }
    }

    #[test]
    fn test_timestamp_beyond_year_262143() {
        let micros = END_TIMESTAMP_MICROS - 1;
        assert_eq!(ts(micros).unwrap(), "\"294276-12-31T23:59:59.999999\"");
        let mid_year_270000 = 97_885_156 * MICROS_PER_DAY + 45_000_000_000;
        assert_eq!(ts(mid_year_270000).unwrap(), "\"270000-06-15T12:30:00\"");
        assert!(matches!(
            ts(END_TIMESTAMP_MICROS),
            Err(bottledwater_core::BottledWaterError::Range(
                RangeError::TimestampOutOfRange { .. }
            ))
        ));
    }

    #[test]
    fn test_timestamp_lower_edge() {
        assert_eq!(
            ts(MIN_TIMESTAMP_MICROS).unwrap(),
            "\"4714-11-24T00:00:00 BC\""
        );
        assert!(ts(MIN_TIMESTAMP_MICROS - 1).is_err());
        assert_eq!(
            tstz(MIN_TIMESTAMP_MICROS, &SessionZone::fixed(-3600, None)).unwrap(),
            "\"4714-11-23T23:00:00-01:00 BC\""
        );
    }

    #[test]
    fn test_timestamp_fraction_trimmed() {
        assert_eq!(ts(0).unwrap(), "\"2000-01-01T00:00:00\"");
        assert_eq!(ts(1_500_000).unwrap(), "\"2000-01-01T00:00:01.5\"");
        assert_eq!(ts(1_000_001).unwrap(), "\"2000-01-01T00:00:01.000001\"");
        assert_eq!(ts(-1).unwrap(), "\"1999-12-31T23:59:59.999999\"");
    }

    #[test]
    fn test_timestamp_sentinels_skip_decomposition() {
        assert_eq!(ts(TIMESTAMP_INFINITY).unwrap(), "\"infinity\"");
        assert_eq!(ts(TIMESTAMP_NEG_INFINITY).unwrap(), "\"-infinity\"");
    }

    #[test]
    fn test_timestamp_overflow_is_range_error() {
        assert!(matches!(
            ts(TIMESTAMP_INFINITY - 1),
            Err(bottledwater_core::BottledWaterError::Range(
                RangeError::TimestampOutOfRange { .. }
            ))
        ));
        assert!(ts(TIMESTAMP_NEG_INFINITY + 1).is_err());
    }

    #[test]
    fn test_timestamptz_utc_offset() {
        assert_eq!(
            tstz(0, &SessionZone::utc()).unwrap(),
            "\"2000-01-01T00:00:00+00:00\""
        );
    }

    #[test]
    fn test_timestamptz_shifts_into_session_zone() {
        let zone = SessionZone::fixed(2 * 3600, Some("CEST"));
        assert_eq!(
            tstz(0, &zone).unwrap(),
            "\"2000-01-01T02:00:00+02:00 CEST\""
        );

        let zone = SessionZone::fixed(-(5 * 3600 + 30 * 60), None);
        assert_eq!(
            tstz(0, &zone).unwrap(),
            "\"1999-12-31T18:30:00-05:30\""
        );
    }

    #[test]
    fn test_timestamptz_sentinels() {
        let zone = SessionZone::fixed(3600, Some("CET"));
        assert_eq!(tstz(TIMESTAMP_INFINITY, &zone).unwrap(), "\"infinity\"");
        assert_eq!(tstz(TIMESTAMP_NEG_INFINITY, &zone).unwrap(), "\"-infinity\"");
    }
}
