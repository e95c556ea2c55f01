use time::PrimitiveDateTime;

/// One hourly observation from an OpenWeather history export.
///
/// `timestamp` is UTC as read from the file; callers shift it into the
/// property's local clock before joining.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherObservation {
    pub timestamp: PrimitiveDateTime,
    pub temp: Option<f64>,
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

impl WeatherObservation {
    /// An observation with no measured fields.
    pub fn at(timestamp: PrimitiveDateTime) -> Self {
        Self {
            timestamp,
            temp: None,
            feels_like: None,
            pressure: None,
            humidity: None,
            wind_speed: None,
            wind_deg: None,
            rain_1h: None,
            clouds_all: None,
            weather_main: None,
            weather_description: None,
        }
    }
}
