//! Assembly of the model-ready hourly dataset.
//!
//! Usage intervals are bucketed to the hour on the property's wall clock,
//! decorated with calendar features and joined (left) to weather shifted
//! into the same clock.

use std::collections::HashMap;

use time::{Duration, PrimitiveDateTime, Time};
use usage_client::{
    domain::{HourlyRecord, Season, Sunlight, UsageInterval, WeatherObservation},
    HolidayCalendar,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureOptions {
    /// Hours the property's local clock is behind UTC.
    pub hour_diff: i8,
    /// Sum intervals sharing an hour into one row before joining.
    pub rollup_hourly: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureStats {
    pub usage_rows: usize,
    pub weather_rows: usize,
    pub weather_duplicates: usize,
    pub unmatched_rows: usize,
    pub holidays: usize,
}

#[derive(Debug, Clone)]
pub struct FeatureSet {
    pub records: Vec<HourlyRecord>,
    pub stats: FeatureStats,
}

/// Weather row after lagging and shifting into local time.
#[derive(Debug, Clone)]
struct LocalWeather {
    obs: WeatherObservation,
    hour_before_temp: Option<f64>,
}

pub fn hour_bucket(at: PrimitiveDateTime) -> PrimitiveDateTime {
    PrimitiveDateTime::new(at.date(), Time::MIDNIGHT) + Duration::hours(i64::from(at.hour()))
}

pub fn build_hourly_records(
    usage: Vec<UsageInterval>,
    weather: Vec<WeatherObservation>,
    opts: &FeatureOptions,
    calendar: &dyn HolidayCalendar,
) -> FeatureSet {
    let usage = if opts.rollup_hourly {
        rollup_hourly(usage)
    } else {
        usage
    };

    let mut stats = FeatureStats {
        usage_rows: usage.len(),
        weather_rows: weather.len(),
        ..FeatureStats::default()
    };

    let (weather_by_hour, duplicates) = index_weather(weather, opts.hour_diff);
    stats.weather_duplicates = duplicates;

    let holidays = match (
        usage.iter().map(|u| u.interval_start.date()).min(),
        usage.iter().map(|u| u.interval_start.date()).max(),
    ) {
        (Some(start), Some(end)) => calendar.holidays(start, end),
        _ => Default::default(),
    };
    stats.holidays = holidays.len();

    let records: Vec<HourlyRecord> = usage
        .into_iter()
        .map(|u| {
            let timestamp = hour_bucket(u.interval_start);
            let date = timestamp.date();
            let weekday = date.weekday().number_days_from_monday();
            let holiday = holidays.contains(&date);
            let workday = weekday <= 4 && !holiday;

            let sunrise_local = u.sunrise.map(|s| s.to_local_time(opts.hour_diff));
            let sunset_local = u.sunset.map(|s| s.to_local_time(opts.hour_diff));
            let sunlight = Sunlight::between(timestamp.time(), sunrise_local, sunset_local);

            let weather = weather_by_hour.get(&timestamp);
            if weather.is_none() {
                stats.unmatched_rows += 1;
            }
            let w = weather.map(|w| &w.obs);

            HourlyRecord {
                timestamp,
                date,
                hour: timestamp.hour(),
                weekday,
                holiday,
                workday,
                season: Season::from_month(u8::from(date.month())),
                interval_kwh: u.interval_kwh,
                sunrise_local,
                sunset_local,
                sunlight,
                temp: w.and_then(|w| w.temp),
                hour_before_temp: weather.and_then(|w| w.hour_before_temp),
                feels_like: w.and_then(|w| w.feels_like),
                pressure: w.and_then(|w| w.pressure),
                humidity: w.and_then(|w| w.humidity),
                wind_speed: w.and_then(|w| w.wind_speed),
                wind_deg: w.and_then(|w| w.wind_deg),
                rain_1h: w.and_then(|w| w.rain_1h),
                clouds_all: w.and_then(|w| w.clouds_all),
                weather_main: w.and_then(|w| w.weather_main.clone()),
                weather_description: w.and_then(|w| w.weather_description.clone()),
            }
        })
        .collect();

    FeatureSet { records, stats }
}

/// Lag temperature in file order, shift to local time, then keep the first
/// row per timestamp.
fn index_weather(weather: Vec<WeatherObservation>, hour_diff: i8) -> (HashMap<PrimitiveDateTime, LocalWeather>, usize) {
    let shift = Duration::hours(i64::from(hour_diff));
    let mut by_hour = HashMap::with_capacity(weather.len());
    let mut duplicates = 0;
    let mut previous_temp = None;

    for mut obs in weather {
        let hour_before_temp = previous_temp;
        previous_temp = obs.temp;

        // Past the calendar limits nothing can join; the row is dropped.
        let Some(local) = obs.timestamp.checked_sub(shift) else {
            tracing::warn!(timestamp = %obs.timestamp, hour_diff, "weather timestamp cannot be shifted; row dropped");
            continue;
        };
        obs.timestamp = local;
        match by_hour.entry(obs.timestamp) {
            std::collections::hash_map::Entry::Occupied(_) => duplicates += 1,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(LocalWeather { obs, hour_before_temp });
            }
        }
    }

    (by_hour, duplicates)
}

fn rollup_hourly(usage: Vec<UsageInterval>) -> Vec<UsageInterval> {
    let mut order: Vec<UsageInterval> = Vec::new();
    let mut slot_of: HashMap<PrimitiveDateTime, usize> = HashMap::new();

    for u in usage {
        let bucket = hour_bucket(u.interval_start);
        match slot_of.get(&bucket) {
            Some(&idx) => order[idx].interval_kwh += u.interval_kwh,
            None => {
                slot_of.insert(bucket, order.len());
                order.push(UsageInterval {
                    interval_start: bucket,
                    ..u
                });
            }
        }
    }

    order
}
