use std::{fs::File, path::PathBuf};

use csv::StringRecord;
use usage_client::{domain::WeatherObservation, timefmt};

use super::csv_fields::{field, parse_optional_f64, parse_optional_string, row_of, Columns};
use crate::pipeline::{Envelope, EnvelopeStream, PipelineError, Source};

/// CSV source for `WeatherObservation` (OpenWeather history bulk export).
///
/// The timestamp comes from `dt_iso` (e.g. `2019-01-01 00:00:00 +0000 UTC`),
/// falling back to unix seconds in `dt`. Measured columns are optional:
/// temp, feels_like, pressure, humidity, wind_speed, wind_deg, rain_1h,
/// clouds_all, weather_main, weather_description.
pub struct WeatherCsvFileSource {
    path: PathBuf,
}

impl WeatherCsvFileSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

struct WeatherColumns {
    dt_iso: Option<usize>,
    dt: Option<usize>,
    temp: Option<usize>,
    feels_like: Option<usize>,
    pressure: Option<usize>,
    humidity: Option<usize>,
    wind_speed: Option<usize>,
    wind_deg: Option<usize>,
    rain_1h: Option<usize>,
    clouds_all: Option<usize>,
    weather_main: Option<usize>,
    weather_description: Option<usize>,
}

impl WeatherColumns {
    fn resolve(cols: &Columns) -> Result<Self, PipelineError> {
        let resolved = Self {
            dt_iso: cols.index("dt_iso"),
            dt: cols.index("dt"),
            temp: cols.index("temp"),
            feels_like: cols.index("feels_like"),
            pressure: cols.index("pressure"),
            humidity: cols.index("humidity"),
            wind_speed: cols.index("wind_speed"),
            wind_deg: cols.index("wind_deg"),
            rain_1h: cols.index("rain_1h"),
            clouds_all: cols.index("clouds_all"),
            weather_main: cols.index("weather_main"),
            weather_description: cols.index("weather_description"),
        };

        if resolved.dt_iso.is_none() && resolved.dt.is_none() {
            return Err(PipelineError::Source(
                "missing column 'dt_iso' (or 'dt') in weather CSV header".to_string(),
            ));
        }
        Ok(resolved)
    }
}

fn record_to_weather(record: &StringRecord, cols: &WeatherColumns) -> Result<WeatherObservation, PipelineError> {
    let row = row_of(record);

    let iso = field(record, cols.dt_iso);
    let timestamp = if !iso.is_empty() {
        timefmt::parse_weather_instant(iso)
    } else {
        let dt = field(record, cols.dt);
        let secs: i64 = dt
            .parse()
            .map_err(|e| PipelineError::record(row, format!("invalid dt '{dt}': {e}")))?;
        timefmt::from_unix_seconds(secs)
    }
    .map_err(|e| PipelineError::record(row, format!("invalid weather timestamp: {e}")))?;

    let num = |name: &str, idx: Option<usize>| parse_optional_f64(row, name, field(record, idx));

    Ok(WeatherObservation {
        timestamp,
        temp: num("temp", cols.temp)?,
        feels_like: num("feels_like", cols.feels_like)?,
        pressure: num("pressure", cols.pressure)?,
        humidity: num("humidity", cols.humidity)?,
        wind_speed: num("wind_speed", cols.wind_speed)?,
        wind_deg: num("wind_deg", cols.wind_deg)?,
        rain_1h: num("rain_1h", cols.rain_1h)?,
        clouds_all: num("clouds_all", cols.clouds_all)?,
        weather_main: parse_optional_string(field(record, cols.weather_main)),
        weather_description: parse_optional_string(field(record, cols.weather_description)),
    })
}

#[async_trait::async_trait]
impl Source<WeatherObservation> for WeatherCsvFileSource {
    async fn stream(&self) -> EnvelopeStream<WeatherObservation> {
        let path = self.path.clone();
        let s = async_stream::stream! {
            let file = match File::open(&path) {
                Ok(f) => f,
                Err(e) => {
                    yield Err(PipelineError::Source(format!(
                        "failed to open weather CSV {}: {e}",
                        path.display()
                    )));
                    return;
                }
            };
            let mut rdr = csv::Reader::from_reader(file);
            let cols = match rdr
                .headers()
                .map_err(|e| PipelineError::Source(format!("failed to read weather CSV headers: {e}")))
                .and_then(|h| WeatherColumns::resolve(&Columns::new(h.clone())))
            {
                Ok(c) => c,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            for result in rdr.records() {
                let record = match result {
                    Ok(r) => r,
                    Err(e) => {
                        yield Err(PipelineError::Source(format!("failed to read weather CSV record: {e}")));
                        return;
                    }
                };

                match record_to_weather(&record, &cols) {
                    Ok(obs) => yield Ok(Envelope::new(obs, row_of(&record))),
                    Err(e) => {
                        metrics::counter!("weather_csv_parse_errors_total").increment(1);
                        yield Err(e);
                    }
                }
            }
        };

        Box::pin(s)
    }
}
