use std::path::{Path, PathBuf};

use futures::StreamExt;
use usage_client::domain::HourlyRecord;

use crate::pipeline::{Envelope, PipelineError, Sink};

/// Writes the model-ready dataset as CSV.
///
/// The header is always written, so an empty input still yields a valid file.
/// A failed run leaves an existing file as it was.
pub struct FeatureCsvSink {
    path: PathBuf,
}

impl FeatureCsvSink {
    /// `.csv` is appended when `path` has no extension.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        let mut path = path.into();
        if path.extension().is_none() {
            path.set_extension("csv");
        }
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn sink_err(e: impl std::fmt::Display) -> PipelineError {
    PipelineError::Sink(e.to_string())
}

#[async_trait::async_trait]
impl Sink<HourlyRecord> for FeatureCsvSink {
    async fn run<S>(&self, mut input: S) -> Result<(), PipelineError>
    where
        S: futures::Stream<Item = Result<Envelope<HourlyRecord>, PipelineError>> + Send + Unpin + 'static,
    {
        // Nothing touches the target until the input has ended cleanly.
        let mut records = Vec::new();
        while let Some(item) = input.next().await {
            match item {
                Ok(env) => records.push(env.payload),
                Err(e) => {
                    tracing::error!(error = %e, "error in upstream pipeline for FeatureCsvSink");
                    return Err(e);
                }
            }
        }

        let mut wtr = csv::Writer::from_path(&self.path).map_err(sink_err)?;
        wtr.write_record(HourlyRecord::HEADER).map_err(sink_err)?;
        for record in &records {
            wtr.write_record(record.to_fields()).map_err(sink_err)?;
        }
        let written = records.len() as u64;

        wtr.flush().map_err(sink_err)?;
        metrics::counter!("feature_rows_written_total").increment(written);

        if written == 0 {
            tracing::warn!(path = %self.path.display(), "no usage rows; wrote header only");
        } else {
            tracing::info!(path = %self.path.display(), rows = written, "feature dataset written");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};
    use usage_client::domain::{Season, Sunlight};

    fn record() -> HourlyRecord {
        HourlyRecord {
            timestamp: datetime!(2023-07-05 10:00),
            date: date!(2023-07-05),
            hour: 10,
            weekday: 2,
            holiday: false,
            workday: true,
            season: Season::Summer,
            interval_kwh: 0.75,
            sunrise_local: None,
            sunset_local: None,
            sunlight: Sunlight::No,
            temp: Some(20.5),
            hour_before_temp: None,
            feels_like: None,
            pressure: None,
            humidity: None,
            wind_speed: None,
            wind_deg: None,
            rain_1h: None,
            clouds_all: None,
            weather_main: Some("Clear".to_string()),
            weather_description: Some("clear sky, light wind".to_string()),
        }
    }

    #[test]
    fn appends_csv_extension_only_when_missing() {
        assert_eq!(FeatureCsvSink::new("out/model_prep").path(), Path::new("out/model_prep.csv"));
        assert_eq!(FeatureCsvSink::new("out/model.tsv").path(), Path::new("out/model.tsv"));
    }

    #[tokio::test]
    async fn writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FeatureCsvSink::new(dir.path().join("model_prep"));

        let rows = vec![Ok(Envelope::new(record(), 2))];
        sink.run(futures::stream::iter(rows)).await.unwrap();

        let written = std::fs::read_to_string(sink.path()).unwrap();
        let mut lines = written.lines();
        assert_eq!(lines.next().unwrap(), HourlyRecord::HEADER.join(","));
        let row = lines.next().unwrap();
        assert!(row.starts_with("2023-07-05 10:00:00,2023-07-05,10,2,False,1,Summer,0.75,,,No,20.5,"));
        assert!(row.contains("\"clear sky, light wind\""));
        assert!(row.ends_with("1,0,0,1,0,0,1,0"));
        assert!(lines.next().is_none());
    }

    #[tokio::test]
    async fn empty_input_writes_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FeatureCsvSink::new(dir.path().join("empty.csv"));
        let rows: Vec<Result<Envelope<HourlyRecord>, PipelineError>> = Vec::new();
        sink.run(futures::stream::iter(rows)).await.unwrap();

        let written = std::fs::read_to_string(sink.path()).unwrap();
        assert_eq!(written.lines().count(), 1);
    }

    #[tokio::test]
    async fn upstream_errors_abort() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FeatureCsvSink::new(dir.path().join("broken.csv"));
        let rows = vec![
            Ok(Envelope::new(record(), 2)),
            Err(PipelineError::Source("boom".to_string())),
        ];
        let err = sink.run(futures::stream::iter(rows)).await;
        assert!(matches!(err, Err(PipelineError::Source(_))));
        assert!(!sink.path().exists());
    }

    #[tokio::test]
    async fn failed_run_keeps_previous_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FeatureCsvSink::new(dir.path().join("model_prep.csv"));
        std::fs::write(sink.path(), "previous run\n").unwrap();

        let rows = vec![
            Ok(Envelope::new(record(), 2)),
            Err(PipelineError::record(3, "invalid interval_start")),
        ];
        assert!(sink.run(futures::stream::iter(rows)).await.is_err());
        assert_eq!(std::fs::read_to_string(sink.path()).unwrap(), "previous run\n");
    }
}
