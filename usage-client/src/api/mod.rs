pub mod sunrise_sunset;

pub use sunrise_sunset::{SolarApiError, SolarTimes, SunriseSunsetClient, DEFAULT_BASE_URL};
