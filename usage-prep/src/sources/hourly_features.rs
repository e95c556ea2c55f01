use std::sync::Arc;

use usage_client::{
    domain::{HourlyRecord, UsageInterval, WeatherObservation},
    HolidayCalendar, UsFederalHolidayCalendar,
};

use crate::{
    pipeline::{self, Envelope, EnvelopeStream, PipelineError, Source, TransformChain},
    transform::{build_hourly_records, FeatureOptions},
};

/// Joins usage and weather into hourly feature rows.
///
/// Both inputs are drained into memory first; the holiday range and the
/// weather dedup need the whole file.
pub struct HourlyFeatureSource {
    usage: Box<dyn Source<UsageInterval>>,
    weather: Box<dyn Source<WeatherObservation>>,
    usage_transforms: TransformChain<UsageInterval>,
    calendar: Arc<dyn HolidayCalendar>,
    options: FeatureOptions,
    strict: bool,
}

impl HourlyFeatureSource {
    pub fn new(
        usage: impl Source<UsageInterval> + 'static,
        weather: impl Source<WeatherObservation> + 'static,
        options: FeatureOptions,
        strict: bool,
    ) -> Self {
        Self {
            usage: Box::new(usage),
            weather: Box::new(weather),
            usage_transforms: Vec::new(),
            calendar: Arc::new(UsFederalHolidayCalendar),
            options,
            strict,
        }
    }

    pub fn with_usage_transforms(mut self, transforms: TransformChain<UsageInterval>) -> Self {
        self.usage_transforms = transforms;
        self
    }

    pub fn with_calendar(mut self, calendar: Arc<dyn HolidayCalendar>) -> Self {
        self.calendar = calendar;
        self
    }

    async fn build(&self) -> Result<Vec<HourlyRecord>, PipelineError> {
        let usage: Vec<UsageInterval> =
            pipeline::collect(self.usage.as_ref(), &self.usage_transforms, self.strict)
                .await?
                .into_iter()
                .map(|env| env.payload)
                .collect();

        let no_transforms: TransformChain<WeatherObservation> = Vec::new();
        let weather: Vec<WeatherObservation> =
            pipeline::collect(self.weather.as_ref(), &no_transforms, self.strict)
                .await?
                .into_iter()
                .map(|env| env.payload)
                .collect();

        if usage.is_empty() {
            tracing::warn!("usage input has no rows");
        }

        let set = build_hourly_records(usage, weather, &self.options, self.calendar.as_ref());
        let stats = &set.stats;

        metrics::counter!("weather_duplicates_dropped_total").increment(stats.weather_duplicates as u64);
        metrics::counter!("feature_rows_without_weather_total").increment(stats.unmatched_rows as u64);
        tracing::info!(
            usage_rows = stats.usage_rows,
            weather_rows = stats.weather_rows,
            weather_duplicates = stats.weather_duplicates,
            unmatched_rows = stats.unmatched_rows,
            holidays = stats.holidays,
            hour_diff = self.options.hour_diff,
            rollup_hourly = self.options.rollup_hourly,
            "hourly features built"
        );
        if stats.unmatched_rows > 0 {
            tracing::warn!(
                unmatched_rows = stats.unmatched_rows,
                "some usage hours have no weather observation; weather fields left empty"
            );
        }

        Ok(set.records)
    }
}

#[async_trait::async_trait]
impl Source<HourlyRecord> for HourlyFeatureSource {
    async fn stream(&self) -> EnvelopeStream<HourlyRecord> {
        match self.build().await {
            Ok(records) => {
                let items = records
                    .into_iter()
                    .enumerate()
                    .map(|(i, r)| Ok(Envelope::new(r, i as u64 + 1)));
                Box::pin(futures::stream::iter(items))
            }
            Err(e) => Box::pin(futures::stream::iter(std::iter::once(Err(e)))),
        }
    }
}
