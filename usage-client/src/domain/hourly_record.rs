use std::fmt;

use time::{Date, PrimitiveDateTime, Time};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Fall,
}

impl Season {
    /// Fixed meteorological grouping of calendar months (1-12).
    pub fn from_month(month: u8) -> Self {
        match month {
            3..=5 => Self::Spring,
            6..=8 => Self::Summer,
            9..=11 => Self::Fall,
            _ => Self::Winter,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Winter => "Winter",
            Self::Spring => "Spring",
            Self::Summer => "Summer",
            Self::Fall => "Fall",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sunlight {
    Yes,
    No,
}

impl Sunlight {
    /// `Yes` only when `at` falls strictly between sunrise and sunset.
    pub fn between(at: Time, sunrise: Option<Time>, sunset: Option<Time>) -> Self {
        match (sunrise, sunset) {
            (Some(rise), Some(set)) if at > rise && at < set => Self::Yes,
            _ => Self::No,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yes => "Yes",
            Self::No => "No",
        }
    }
}

impl fmt::Display for Sunlight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the model-ready dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyRecord {
    pub timestamp: PrimitiveDateTime,
    pub date: Date,
    pub hour: u8,
    /// Monday = 0.
    pub weekday: u8,
    pub holiday: bool,
    pub workday: bool,
    pub season: Season,
    pub interval_kwh: f64,
    pub sunrise_local: Option<Time>,
    pub sunset_local: Option<Time>,
    pub sunlight: Sunlight,
    pub temp: Option<f64>,
    pub hour_before_temp: Option<f64>,
    pub feels_like: Option<f64>,
    pub pressure: Option<f64>,
    pub humidity: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_deg: Option<f64>,
    pub rain_1h: Option<f64>,
    pub clouds_all: Option<f64>,
    pub weather_main: Option<String>,
    pub weather_description: Option<String>,
}

impl HourlyRecord {
    pub const HEADER: [&'static str; 30] = [
        "timestamp",
        "date",
        "hour",
        "weekday",
        "Holiday",
        "workday",
        "season",
        "interval_kWh",
        "sunrise_local",
        "sunset_local",
        "sunlight",
        "temp",
        "hour_before_temp",
        "feels_like",
        "pressure",
        "humidity",
        "wind_speed",
        "wind_deg",
        "rain_1h",
        "clouds_all",
        "weather_main",
        "weather_description",
        "sunlight_No",
        "sunlight_Yes",
        "workday_0",
        "workday_1",
        "season_Fall",
        "season_Spring",
        "season_Summer",
        "season_Winter",
    ];

    /// Render the row in `HEADER` order. Missing values become empty fields.
    pub fn to_fields(&self) -> Vec<String> {
        let opt_f64 = |v: Option<f64>| v.map(|x| x.to_string()).unwrap_or_default();
        let opt_time = |v: Option<Time>| v.map(format_time).unwrap_or_default();
        let flag = |b: bool| if b { "1" } else { "0" }.to_string();

        vec![
            format!("{} {}", self.timestamp.date(), format_time(self.timestamp.time())),
            self.date.to_string(),
            self.hour.to_string(),
            self.weekday.to_string(),
            if self.holiday { "True" } else { "False" }.to_string(),
            flag(self.workday),
            self.season.to_string(),
            self.interval_kwh.to_string(),
            opt_time(self.sunrise_local),
            opt_time(self.sunset_local),
            self.sunlight.to_string(),
            opt_f64(self.temp),
            opt_f64(self.hour_before_temp),
            opt_f64(self.feels_like),
            opt_f64(self.pressure),
            opt_f64(self.humidity),
            opt_f64(self.wind_speed),
            opt_f64(self.wind_deg),
            opt_f64(self.rain_1h),
            opt_f64(self.clouds_all),
            self.weather_main.clone().unwrap_or_default(),
            self.weather_description.clone().unwrap_or_default(),
            flag(self.sunlight == Sunlight::No),
            flag(self.sunlight == Sunlight::Yes),
            flag(!self.workday),
            flag(self.workday),
            flag(self.season == Season::Fall),
            flag(self.season == Season::Spring),
            flag(self.season == Season::Summer),
            flag(self.season == Season::Winter),
        ]
    }
}

fn format_time(t: Time) -> String {
    format!("{:02}:{:02}:{:02}", t.hour(), t.minute(), t.second())
}
