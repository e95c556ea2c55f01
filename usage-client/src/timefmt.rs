use time::{
    format_description::{well_known::Rfc3339, FormatItem},
    macros::format_description,
    OffsetDateTime, PrimitiveDateTime, Time, UtcOffset,
};

use crate::domain::SolarClock;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeParseError {
    #[error("invalid timestamp '{0}'")]
    Timestamp(String),
    #[error("invalid time of day '{0}'")]
    TimeOfDay(String),
    #[error("invalid unix timestamp {0}")]
    Unix(i64),
}

const WALL_CLOCK_FORMATS: &[&[FormatItem<'static>]] = &[
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]"),
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day] [hour]:[minute]"),
    format_description!("[month padding:none]/[day padding:none]/[year] [hour padding:none]:[minute]:[second]"),
    format_description!("[month padding:none]/[day padding:none]/[year] [hour padding:none]:[minute]"),
];

const CLOCK_12H: &[FormatItem<'static>] =
    format_description!("[hour repr:12 padding:none]:[minute]:[second] [period]");
const CLOCK_24H: &[FormatItem<'static>] = format_description!("[hour padding:none]:[minute]:[second]");
const CLOCK_24H_SHORT: &[FormatItem<'static>] = format_description!("[hour padding:none]:[minute]");

/// Parse a usage timestamp into its local wall-clock value.
///
/// A trailing UTC offset (`Z`, `-07:00`, `+0100`) is accepted and discarded:
/// the reading is bucketed by the clock on the meter's wall, not by UTC.
pub fn parse_wall_clock(s: &str) -> Result<PrimitiveDateTime, TimeParseError> {
    let trimmed = s.trim();
    if let Ok(odt) = OffsetDateTime::parse(trimmed, &Rfc3339) {
        return Ok(PrimitiveDateTime::new(odt.date(), odt.time()));
    }

    let (body, _offset) = split_offset(trimmed).ok_or_else(|| TimeParseError::Timestamp(s.to_string()))?;
    parse_primitive(body).ok_or_else(|| TimeParseError::Timestamp(s.to_string()))
}

/// Parse a weather timestamp and normalize it to UTC.
///
/// Handles OpenWeather bulk exports (`2019-01-01 00:00:00 +0000 UTC`) as well
/// as RFC3339. A value without any offset is taken to already be UTC.
pub fn parse_weather_instant(s: &str) -> Result<PrimitiveDateTime, TimeParseError> {
    let trimmed = s.trim();
    if let Ok(odt) = OffsetDateTime::parse(trimmed, &Rfc3339) {
        return Ok(to_utc_primitive(odt));
    }

    let without_zone = trimmed
        .strip_suffix("UTC")
        .or_else(|| trimmed.strip_suffix("utc"))
        .unwrap_or(trimmed)
        .trim_end();

    let (body, offset) =
        split_offset(without_zone).ok_or_else(|| TimeParseError::Timestamp(s.to_string()))?;
    let local = parse_primitive(body).ok_or_else(|| TimeParseError::Timestamp(s.to_string()))?;

    Ok(match offset {
        Some(off) => to_utc_primitive(local.assume_offset(off)),
        None => local,
    })
}

/// Convert unix seconds (OpenWeather `dt`) to a UTC wall-clock value.
pub fn from_unix_seconds(secs: i64) -> Result<PrimitiveDateTime, TimeParseError> {
    OffsetDateTime::from_unix_timestamp(secs)
        .map(to_utc_primitive)
        .map_err(|_| TimeParseError::Unix(secs))
}

/// Parse a recorded sunrise/sunset value.
///
/// Full instants keep their date and offset; bare clock times (`7:27:02 AM`,
/// `19:04:11`) are UTC times of day as returned by the sunrise-sunset API.
pub fn parse_solar_clock(s: &str) -> Result<SolarClock, TimeParseError> {
    let trimmed = s.trim();
    if let Ok(odt) = OffsetDateTime::parse(trimmed, &Rfc3339) {
        return Ok(SolarClock::Instant(odt));
    }

    if looks_like_date(trimmed) {
        let utc = parse_weather_instant(trimmed)?;
        return Ok(SolarClock::Instant(utc.assume_utc()));
    }

    let upper = trimmed.to_ascii_uppercase();
    [CLOCK_12H, CLOCK_24H, CLOCK_24H_SHORT]
        .iter()
        .find_map(|fmt| Time::parse(&upper, fmt).ok())
        .map(SolarClock::Clock)
        .ok_or_else(|| TimeParseError::TimeOfDay(s.to_string()))
}

fn to_utc_primitive(odt: OffsetDateTime) -> PrimitiveDateTime {
    let utc = odt.to_offset(UtcOffset::UTC);
    PrimitiveDateTime::new(utc.date(), utc.time())
}

fn looks_like_date(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() >= 10 && bytes[4] == b'-' && bytes[7] == b'-'
}

fn parse_primitive(body: &str) -> Option<PrimitiveDateTime> {
    let normalized = normalize_separator(body.trim());
    WALL_CLOCK_FORMATS
        .iter()
        .find_map(|fmt| PrimitiveDateTime::parse(&normalized, fmt).ok())
}

fn normalize_separator(s: &str) -> String {
    if s.len() > 10 && s.as_bytes()[10] == b'T' {
        let mut out = String::with_capacity(s.len());
        out.push_str(&s[..10]);
        out.push(' ');
        out.push_str(&s[11..]);
        out
    } else {
        s.to_string()
    }
}

/// Split a trailing UTC offset off a timestamp string.
///
/// Returns `None` only when an offset-looking suffix is present but malformed.
fn split_offset(s: &str) -> Option<(&str, Option<UtcOffset>)> {
    if let Some(body) = s.strip_suffix('Z') {
        return Some((body, Some(UtcOffset::UTC)));
    }

    // Offsets can only start inside the time part; the date uses '-' too.
    let search_from = s.find(|c: char| c == ' ' || c == 'T').map_or(s.len(), |i| i + 1);
    let Some(rel) = s[search_from..].rfind(|c: char| c == '+' || c == '-') else {
        return Some((s, None));
    };
    let idx = search_from + rel;
    let offset = parse_offset(&s[idx..])?;
    Some((&s[..idx], Some(offset)))
}

fn parse_offset(s: &str) -> Option<UtcOffset> {
    let sign: i8 = match s.as_bytes().first()? {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    let digits: String = s[1..].chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let (hours, minutes) = match digits.len() {
        2 => (digits.parse::<i8>().ok()?, 0),
        4 => (digits[..2].parse::<i8>().ok()?, digits[2..].parse::<i8>().ok()?),
        _ => return None,
    };
    UtcOffset::from_hms(sign * hours, sign * minutes, 0).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{datetime, time};

    #[test]
    fn wall_clock_accepts_common_shapes() {
        let expected = datetime!(2023-07-04 13:15:00);
        for raw in [
            "2023-07-04 13:15:00",
            "2023-07-04 13:15",
            "2023-07-04T13:15:00",
            "2023-07-04T13:15:00-07:00",
            "2023-07-04 13:15:00-0700",
            "2023-07-04 13:15:00.000000-07:00",
            "7/4/2023 13:15",
        ] {
            assert_eq!(parse_wall_clock(raw).unwrap(), expected, "input {raw}");
        }
    }

    #[test]
    fn wall_clock_rejects_garbage() {
        assert!(matches!(
            parse_wall_clock("not a date"),
            Err(TimeParseError::Timestamp(_))
        ));
        assert!(parse_wall_clock("2023-13-40 10:00").is_err());
    }

    #[test]
    fn weather_instant_normalizes_to_utc() {
        assert_eq!(
            parse_weather_instant("2019-01-01 00:00:00 +0000 UTC").unwrap(),
            datetime!(2019-01-01 00:00:00)
        );
        assert_eq!(
            parse_weather_instant("2019-01-01 00:00:00 -0500").unwrap(),
            datetime!(2019-01-01 05:00:00)
        );
        assert_eq!(
            parse_weather_instant("2019-01-01T02:00:00+02:00").unwrap(),
            datetime!(2019-01-01 00:00:00)
        );
        assert_eq!(
            parse_weather_instant("2019-01-01 03:00:00").unwrap(),
            datetime!(2019-01-01 03:00:00)
        );
    }

    #[test]
    fn unix_seconds_round_to_utc() {
        assert_eq!(
            from_unix_seconds(1_546_300_800).unwrap(),
            datetime!(2019-01-01 00:00:00)
        );
    }

    #[test]
    fn solar_clock_accepts_api_shapes() {
        assert_eq!(
            parse_solar_clock("7:27:02 AM").unwrap(),
            SolarClock::Clock(time!(07:27:02))
        );
        assert_eq!(
            parse_solar_clock("12:05:00 am").unwrap(),
            SolarClock::Clock(time!(00:05:00))
        );
        assert_eq!(
            parse_solar_clock("3:04:11 PM").unwrap(),
            SolarClock::Clock(time!(15:04:11))
        );
        assert_eq!(
            parse_solar_clock("19:04:11").unwrap(),
            SolarClock::Clock(time!(19:04:11))
        );
        assert_eq!(
            parse_solar_clock("2023-07-04T12:47:01+00:00").unwrap(),
            SolarClock::Instant(datetime!(2023-07-04 12:47:01 UTC))
        );
        assert_eq!(
            parse_solar_clock("2023-07-04 12:47:01").unwrap(),
            SolarClock::Instant(datetime!(2023-07-04 12:47:01 UTC))
        );
        assert!(matches!(
            parse_solar_clock("sunrise"),
            Err(TimeParseError::TimeOfDay(_))
        ));
    }
}
