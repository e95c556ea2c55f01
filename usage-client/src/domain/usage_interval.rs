use std::fmt;

use time::{format_description::well_known::Rfc3339, Duration, OffsetDateTime, PrimitiveDateTime, Time};

/// A sub-hourly energy reading from a UtilityAPI interval export.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageInterval {
    /// Local wall-clock start of the interval.
    pub interval_start: PrimitiveDateTime,
    pub interval_kwh: f64,
    pub sunrise: Option<SolarClock>,
    pub sunset: Option<SolarClock>,
}

/// A sunrise or sunset value as recorded next to the usage data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolarClock {
    /// A full instant, e.g. `2023-07-04T12:47:01+00:00`.
    Instant(OffsetDateTime),
    /// A bare UTC time of day, e.g. `12:47:01 PM`.
    Clock(Time),
}

impl SolarClock {
    /// Time of day on the property's local clock, `hour_diff` hours behind UTC.
    ///
    /// Wraps across midnight.
    pub fn to_local_time(&self, hour_diff: i8) -> Time {
        let shift = Duration::hours(hour_diff.into());
        match self {
            // Time-of-day arithmetic only; the date may sit at the edge of the
            // representable range.
            Self::Instant(at) => at.time() - Duration::seconds(at.offset().whole_seconds().into()) - shift,
            Self::Clock(t) => *t - shift,
        }
    }
}

impl fmt::Display for SolarClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instant(at) => match at.format(&Rfc3339) {
                Ok(s) => f.write_str(&s),
                Err(_) => Err(fmt::Error),
            },
            Self::Clock(t) => write!(f, "{:02}:{:02}:{:02}", t.hour(), t.minute(), t.second()),
        }
    }
}
