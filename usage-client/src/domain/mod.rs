mod hourly_record;
mod usage_interval;
mod weather_observation;

pub use hourly_record::{HourlyRecord, Season, Sunlight};
pub use usage_interval::{SolarClock, UsageInterval};
pub use weather_observation::WeatherObservation;
