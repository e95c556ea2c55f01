use std::{fs::File, path::PathBuf};

use csv::StringRecord;
use usage_client::{
    domain::{SolarClock, UsageInterval},
    timefmt,
};

use super::csv_fields::{field, row_of, Columns};
use crate::pipeline::{Envelope, EnvelopeStream, PipelineError, Source};

/// CSV source for `UsageInterval` (UtilityAPI interval export).
///
/// Expected header columns (by name, case-insensitive):
/// - interval_start (local wall-clock timestamp, offset ignored)
/// - interval_kWh
/// - sunrise (optional; RFC3339 or `h:mm:ss AM` UTC clock)
/// - sunset (optional; same formats)
///
/// Any other column is ignored.
pub struct UsageCsvFileSource {
    path: PathBuf,
}

impl UsageCsvFileSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

struct UsageColumns {
    interval_start: usize,
    kwh: usize,
    sunrise: Option<usize>,
    sunset: Option<usize>,
}

impl UsageColumns {
    fn resolve(cols: &Columns) -> Result<Self, PipelineError> {
        Ok(Self {
            interval_start: cols.require(&["interval_start"])?,
            kwh: cols.require(&["interval_kWh", "kwh"])?,
            sunrise: cols.index("sunrise"),
            sunset: cols.index("sunset"),
        })
    }
}

fn parse_solar(row: u64, name: &str, raw: &str) -> Result<Option<SolarClock>, PipelineError> {
    if raw.is_empty() {
        return Ok(None);
    }
    timefmt::parse_solar_clock(raw)
        .map(Some)
        .map_err(|e| PipelineError::record(row, format!("invalid {name}: {e}")))
}

fn record_to_usage(record: &StringRecord, cols: &UsageColumns) -> Result<UsageInterval, PipelineError> {
    let row = row_of(record);

    let start_str = field(record, Some(cols.interval_start));
    let interval_start = timefmt::parse_wall_clock(start_str)
        .map_err(|e| PipelineError::record(row, format!("invalid interval_start: {e}")))?;

    let kwh_str = field(record, Some(cols.kwh));
    let interval_kwh: f64 = kwh_str
        .parse()
        .map_err(|e| PipelineError::record(row, format!("invalid interval_kWh '{kwh_str}': {e}")))?;

    Ok(UsageInterval {
        interval_start,
        interval_kwh,
        sunrise: parse_solar(row, "sunrise", field(record, cols.sunrise))?,
        sunset: parse_solar(row, "sunset", field(record, cols.sunset))?,
    })
}

#[async_trait::async_trait]
impl Source<UsageInterval> for UsageCsvFileSource {
    async fn stream(&self) -> EnvelopeStream<UsageInterval> {
        // Blocking CSV reader wrapped in a single async task; inputs are one
        // property's export and fit comfortably in memory.
        let path = self.path.clone();
        let s = async_stream::stream! {
            let file = match File::open(&path) {
                Ok(f) => f,
                Err(e) => {
                    yield Err(PipelineError::Source(format!(
                        "failed to open usage CSV {}: {e}",
                        path.display()
                    )));
                    return;
                }
            };
            let mut rdr = csv::Reader::from_reader(file);
            let cols = match rdr
                .headers()
                .map_err(|e| PipelineError::Source(format!("failed to read usage CSV headers: {e}")))
                .and_then(|h| UsageColumns::resolve(&Columns::new(h.clone())))
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
                        yield Err(PipelineError::Source(format!("failed to read usage CSV record: {e}")));
                        return;
                    }
                };

                match record_to_usage(&record, &cols) {
                    Ok(usage) => yield Ok(Envelope::new(usage, row_of(&record))),
                    Err(e) => {
                        metrics::counter!("usage_csv_parse_errors_total").increment(1);
                        yield Err(e);
                    }
                }
            }
        };

        Box::pin(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::io::Write;
    use time::macros::{datetime, time};

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(contents.as_bytes()).unwrap();
        tmp.flush().unwrap();
        tmp
    }

    #[tokio::test]
    async fn reads_intervals_with_solar_times() {
        let tmp = write_csv(
            "meter_uid,interval_start,interval_end,interval_kWh,sunrise,sunset\n\
             m-1,2023-07-04 13:00:00-07:00,2023-07-04 13:15:00-07:00,0.42,2023-07-04T12:47:01+00:00,3:31:10 AM\n\
             m-1,2023-07-04 13:15:00-07:00,2023-07-04 13:30:00-07:00,0.38,,\n",
        );

        let items: Vec<_> = UsageCsvFileSource::new(tmp.path()).stream().await.collect().await;
        assert_eq!(items.len(), 2);

        let first = items[0].as_ref().unwrap();
        assert_eq!(first.row, 2);
        assert_eq!(first.payload.interval_start, datetime!(2023-07-04 13:00));
        assert_eq!(first.payload.interval_kwh, 0.42);
        assert_eq!(
            first.payload.sunrise,
            Some(SolarClock::Instant(datetime!(2023-07-04 12:47:01 UTC)))
        );
        assert_eq!(first.payload.sunset, Some(SolarClock::Clock(time!(03:31:10))));

        let second = items[1].as_ref().unwrap();
        assert_eq!(second.payload.sunrise, None);
    }

    #[tokio::test]
    async fn bad_rows_are_reported_and_reading_continues() {
        let tmp = write_csv(
            "interval_start,interval_kWh\n\
             garbage,0.1\n\
             2023-07-04 13:15,n/a\n\
             2023-07-04 13:30,0.2\n",
        );

        let items: Vec<_> = UsageCsvFileSource::new(tmp.path()).stream().await.collect().await;
        assert_eq!(items.len(), 3);
        assert!(matches!(&items[0], Err(PipelineError::Record { row: 2, .. })));
        assert!(matches!(&items[1], Err(PipelineError::Record { row: 3, .. })));
        assert_eq!(items[2].as_ref().unwrap().payload.interval_kwh, 0.2);
    }

    #[tokio::test]
    async fn missing_required_column_is_fatal() {
        let tmp = write_csv("interval_start,net_kWh\n2023-07-04 13:00,1.0\n");
        let items: Vec<_> = UsageCsvFileSource::new(tmp.path()).stream().await.collect().await;
        assert_eq!(items.len(), 1);
        assert!(matches!(&items[0], Err(PipelineError::Source(_))));
    }

    #[tokio::test]
    async fn missing_file_is_fatal() {
        let items: Vec<_> = UsageCsvFileSource::new("/nonexistent/usage.csv")
            .stream()
            .await
            .collect()
            .await;
        assert!(matches!(items.as_slice(), [Err(PipelineError::Source(_))]));
    }
}
